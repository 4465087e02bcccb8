//! Consistency check of the episode store against its invariants.

use crate::db::{episodes, queries, watermark};
use crate::errors::AppResult;
use crate::models::episode::Episode;
use crate::models::pin::{PinIndex, PinLevel};
use rusqlite::Connection;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    Overlap {
        client_id: String,
        pin: PinIndex,
        first: i64,
        second: i64,
    },
    MultipleOpen {
        client_id: String,
        pin: PinIndex,
        count: usize,
    },
    EndBeforeStart {
        id: i64,
    },
    StaleOpen {
        id: i64,
        client_id: String,
        pin: PinIndex,
    },
    WatermarkAhead {
        watermark: i64,
        newest_reading: i64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Overlap {
                client_id,
                pin,
                first,
                second,
            } => write!(
                f,
                "episodes #{first} and #{second} overlap ({client_id}, pin {pin})"
            ),
            Violation::MultipleOpen {
                client_id,
                pin,
                count,
            } => write!(f, "{count} open episodes for ({client_id}, pin {pin})"),
            Violation::EndBeforeStart { id } => write!(f, "episode #{id} ends before it starts"),
            Violation::StaleOpen { id, client_id, pin } => write!(
                f,
                "episode #{id} is open but the last folded reading of {client_id} has pin {pin} inactive"
            ),
            Violation::WatermarkAhead {
                watermark,
                newest_reading,
            } => write!(
                f,
                "watermark {watermark} is ahead of the newest reading {newest_reading}"
            ),
        }
    }
}

pub struct VerifyLogic;

impl VerifyLogic {
    pub fn run(conn: &Connection) -> AppResult<Vec<Violation>> {
        let mut out = Vec::new();

        let wm = watermark::read(conn)?;
        let newest = queries::max_reading_id(conn)?;
        if wm > newest {
            out.push(Violation::WatermarkAhead {
                watermark: wm,
                newest_reading: newest,
            });
        }

        let all = episodes::all_episodes(conn)?;
        for group in all.chunk_by(|a, b| a.client_id == b.client_id && a.pin_index == b.pin_index) {
            check_group(conn, group, wm, &mut out)?;
        }

        Ok(out)
    }
}

/// `group` holds one (client, pin), ordered by start time. Open rows are
/// checked against the latest reading already folded (`id <= wm`).
fn check_group(
    conn: &Connection,
    group: &[Episode],
    wm: i64,
    out: &mut Vec<Violation>,
) -> AppResult<()> {
    let Some(head) = group.first() else {
        return Ok(());
    };
    let (client_id, pin) = (head.client_id.clone(), head.pin_index);

    for ep in group {
        if let Some(end) = ep.event_end_time
            && end < ep.event_start_time
        {
            out.push(Violation::EndBeforeStart { id: ep.id });
        }
    }

    for pair in group.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        // an open episode extends to "now", so anything after it overlaps
        let overlaps = match a.event_end_time {
            None => true,
            Some(end) => end > b.event_start_time,
        };
        if overlaps {
            out.push(Violation::Overlap {
                client_id: client_id.clone(),
                pin,
                first: a.id,
                second: b.id,
            });
        }
    }

    let open: Vec<&Episode> = group.iter().filter(|e| e.is_open()).collect();
    if open.len() > 1 {
        out.push(Violation::MultipleOpen {
            client_id: client_id.clone(),
            pin,
            count: open.len(),
        });
    }

    if let Some(ep) = open.first() {
        // an absent pin says nothing; only a folded `0` makes the row stale
        let latest = queries::sample_at_or_before(conn, &client_id, pin, wm)?;
        let cleared = latest.and_then(|(_, level)| level) == Some(PinLevel::Low);
        if cleared {
            out.push(Violation::StaleOpen {
                id: ep.id,
                client_id,
                pin,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fold::FoldLogic;
    use crate::core::ingest::IngestLogic;
    use crate::db::initialize::init_db;
    use crate::models::episode::EpisodeMode;
    use crate::models::reading::NewReading;
    use chrono::{Duration, TimeZone, Utc};

    fn setup(values: &[i64]) -> (Connection, PinIndex) {
        let mut conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let pin = PinIndex::new(3).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        for (i, v) in values.iter().enumerate() {
            let at = t0 + Duration::seconds(i as i64);
            IngestLogic::append_at(&conn, &NewReading::single_pin("lab1", pin, *v), at).unwrap();
        }
        FoldLogic::run_cycle(&mut conn, EpisodeMode::Eager).unwrap();
        (conn, pin)
    }

    #[test]
    fn folded_store_is_consistent() {
        let (conn, _) = setup(&[0, 1, 1, 0, 1, 0, 1]);
        assert!(VerifyLogic::run(&conn).unwrap().is_empty());
    }

    #[test]
    fn reports_overlap_and_stale_open_rows() {
        let (conn, pin) = setup(&[1, 0]);
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        episodes::insert_open(&conn, "lab1", pin, &(t + Duration::milliseconds(500))).unwrap();

        let found = VerifyLogic::run(&conn).unwrap();
        assert!(found.iter().any(|v| matches!(v, Violation::Overlap { .. })));
        assert!(found.iter().any(|v| matches!(v, Violation::StaleOpen { .. })));
    }

    #[test]
    fn reports_watermark_ahead_of_readings() {
        let (conn, _) = setup(&[0]);
        conn.execute("UPDATE alarm_processor_state SET last_processed_reading_id = 99", [])
            .unwrap();
        let found = VerifyLogic::run(&conn).unwrap();
        assert_eq!(
            found,
            vec![Violation::WatermarkAhead {
                watermark: 99,
                newest_reading: 1
            }]
        );
    }
}
