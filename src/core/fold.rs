//! Episode fold: turns readings newer than the watermark into episode rows.
//!
//! One cycle = one IMMEDIATE transaction holding every episode write, the
//! watermark advance and the audit log row. Any error drops the transaction,
//! which rolls all of it back.

use crate::core::history::{PinHistory, SqliteHistory};
use crate::core::resolve::resolve_start;
use crate::db::{episodes, log, queries, watermark};
use crate::errors::AppResult;
use crate::models::episode::EpisodeMode;
use crate::models::pin::{PinIndex, PinLevel};
use crate::models::reading::Reading;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of one fold cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub readings: usize,
    pub opened: usize,
    pub closed: usize,
    /// Falling edges skipped because no start time could be found.
    pub unresolved: usize,
    /// Open rows dropped because their alarm cleared across a gap.
    pub discarded: usize,
    pub watermark_before: i64,
    pub watermark_after: i64,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.readings == 0
    }
}

pub struct FoldLogic;

impl FoldLogic {
    /// Run one complete cycle and commit it.
    pub fn run_cycle(conn: &mut Connection, mode: EpisodeMode) -> AppResult<CycleReport> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report = Self::stage(&tx, mode)?;
        tx.commit()?;

        if !report.is_idle() {
            info!(
                readings = report.readings,
                opened = report.opened,
                closed = report.closed,
                unresolved = report.unresolved,
                discarded = report.discarded,
                watermark = report.watermark_after,
                "fold cycle committed"
            );
        }
        Ok(report)
    }

    /// Stage a cycle's writes on `conn` without committing.
    ///
    /// The caller owns the transaction; `run_cycle` is the normal entry point.
    pub fn stage(conn: &Connection, mode: EpisodeMode) -> AppResult<CycleReport> {
        watermark::ensure(conn)?;
        let before = watermark::read(conn)?;

        let batch = queries::readings_after(conn, before)?;
        let mut report = CycleReport {
            watermark_before: before,
            watermark_after: before,
            ..Default::default()
        };

        let Some(last_id) = batch.last().map(|r| r.id) else {
            return Ok(report);
        };

        debug!(count = batch.len(), from = before, "folding readings");

        let history = SqliteHistory::new(conn);
        let mut previous: HashMap<String, Reading> = HashMap::new();

        for reading in &batch {
            let prev = match previous.insert(reading.client_id.clone(), reading.clone()) {
                Some(p) => Some(p),
                None => queries::previous_reading(conn, &reading.client_id, reading.id)?,
            };

            for pin in PinIndex::all() {
                fold_pin(conn, &history, mode, prev.as_ref(), reading, pin, &mut report)?;
            }
        }

        watermark::advance(conn, last_id)?;
        report.readings = batch.len();
        report.watermark_after = last_id;

        log::ttlog(
            conn,
            "fold",
            &format!("{}..{}", before + 1, last_id),
            &format!(
                "{} reading(s), {} opened, {} closed, {} unresolved, {} discarded",
                report.readings,
                report.opened,
                report.closed,
                report.unresolved,
                report.discarded
            ),
        )?;

        Ok(report)
    }
}

/// Apply one reading to one pin.
///
/// Both modes share the closing rule: a `1 -> 0` pair between consecutive
/// readings of the client closes the episode. A `0` whose previous reading
/// did not carry the pin at `1` never observed the alarm end, so any row
/// still open for the pin is discarded. Eager mode also opens a row on the
/// first `1`.
fn fold_pin<H: PinHistory>(
    conn: &Connection,
    history: &H,
    mode: EpisodeMode,
    prev: Option<&Reading>,
    reading: &Reading,
    pin: PinIndex,
    report: &mut CycleReport,
) -> AppResult<()> {
    let Some(level) = reading.level(pin) else {
        return Ok(());
    };
    let prev_level = prev.and_then(|p| p.level(pin));

    match (level, prev) {
        (PinLevel::Low, Some(p)) if prev_level == Some(PinLevel::High) => {
            // a row opened by an eager cycle is closed, not duplicated
            match episodes::find_open(conn, &reading.client_id, pin)? {
                Some(ep) => {
                    episodes::close_open(conn, ep.id, &reading.created_at)?;
                    report.closed += 1;
                }
                None => close_on_edge(conn, history, p, reading, pin, report)?,
            }
        }

        (PinLevel::Low, _) => {
            if let Some(ep) = episodes::find_open(conn, &reading.client_id, pin)? {
                episodes::delete_open(conn, ep.id)?;
                report.discarded += 1;
                warn!(
                    client = %reading.client_id,
                    pin = pin.get(),
                    reading = reading.id,
                    "alarm cleared without an observed falling edge; open episode discarded"
                );
            }
        }

        (PinLevel::High, _) if mode == EpisodeMode::Eager => {
            if episodes::find_open(conn, &reading.client_id, pin)?.is_some() {
                return Ok(());
            }
            match resolve_start(history, &reading.client_id, pin, reading.id)? {
                Some(start) => {
                    if episodes::insert_open(conn, &reading.client_id, pin, &start.at)? {
                        report.opened += 1;
                    }
                }
                None => skip_unresolved(reading, pin, report),
            }
        }

        (PinLevel::High, _) => {}
    }

    Ok(())
}

/// Record the episode closed by the falling edge `prev (1) -> reading (0)`.
fn close_on_edge<H: PinHistory>(
    conn: &Connection,
    history: &H,
    prev: &Reading,
    reading: &Reading,
    pin: PinIndex,
    report: &mut CycleReport,
) -> AppResult<()> {
    let Some(start) = resolve_start(history, &reading.client_id, pin, prev.id)? else {
        skip_unresolved(reading, pin, report);
        return Ok(());
    };

    if episodes::insert_closed(
        conn,
        &reading.client_id,
        pin,
        &start.at,
        &reading.created_at,
    )? {
        report.closed += 1;
        debug!(client = %reading.client_id, pin = pin.get(), reading = reading.id, "episode closed");
    } else {
        debug!(client = %reading.client_id, pin = pin.get(), "episode already recorded");
    }
    Ok(())
}

fn skip_unresolved(reading: &Reading, pin: PinIndex, report: &mut CycleReport) {
    warn!(
        client = %reading.client_id,
        pin = pin.get(),
        reading = reading.id,
        "could not determine alarm start time; no episode recorded"
    );
    report.unresolved += 1;
}
