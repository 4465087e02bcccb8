use chrono::{DateTime, Utc};
use pinwatch::core::fold::FoldLogic;
use pinwatch::core::history::SqliteHistory;
use pinwatch::core::live::LiveLogic;
use pinwatch::core::verify::VerifyLogic;
use pinwatch::db::{episodes, watermark};
use pinwatch::errors::AppError;
use pinwatch::models::episode::EpisodeMode;
use pinwatch::models::pin::PinIndex;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::BTreeSet;

mod common;
use common::{at, memory_db, pin, seed_pin, seed_pin_from};

type Span = (DateTime<Utc>, Option<DateTime<Utc>>);

fn spans(conn: &Connection, client: &str, p: PinIndex) -> Vec<Span> {
    episodes::episodes_for_pin(conn, client, p)
        .unwrap()
        .into_iter()
        .map(|e| (e.event_start_time, e.event_end_time))
        .collect()
}

fn fold(conn: &mut Connection, mode: EpisodeMode) {
    FoldLogic::run_cycle(conn, mode).unwrap();
}

#[test]
fn test_lab1_alarm_sequence() {
    // t1..t6 = 0 1 1 0 1 0
    let mut conn = memory_db();
    let p = pin(1);
    seed_pin(&conn, "lab1", p, &[Some(0), Some(1), Some(1), Some(0), Some(1), Some(0)]);

    let report = FoldLogic::run_cycle(&mut conn, EpisodeMode::Lazy).unwrap();
    assert_eq!(report.readings, 6);
    assert_eq!(report.closed, 2);
    assert_eq!(report.watermark_after, 6);

    assert_eq!(
        spans(&conn, "lab1", p),
        vec![(at(2), Some(at(4))), (at(5), Some(at(6)))]
    );
}

#[test]
fn test_lab1_pin2_single_long_alarm() {
    let mut conn = memory_db();
    let p = pin(2);
    seed_pin(&conn, "lab1", p, &[Some(0), Some(0), Some(1), Some(1), Some(1), Some(0)]);
    fold(&mut conn, EpisodeMode::Lazy);

    assert_eq!(spans(&conn, "lab1", p), vec![(at(3), Some(at(6)))]);
}

#[test]
fn test_alarm_from_first_reading() {
    let mut conn = memory_db();
    let p = pin(0);
    seed_pin(&conn, "lab1", p, &[Some(1), Some(1), Some(0)]);
    fold(&mut conn, EpisodeMode::Lazy);

    assert_eq!(spans(&conn, "lab1", p), vec![(at(1), Some(at(3)))]);
}

#[test]
fn test_uncleared_alarm_is_live_only_in_lazy_mode() {
    let mut conn = memory_db();
    let p = pin(7);
    let ids = seed_pin(&conn, "lab1", p, &[Some(0), Some(1), Some(1)]);
    fold(&mut conn, EpisodeMode::Lazy);

    assert!(spans(&conn, "lab1", p).is_empty());
    let history = SqliteHistory::new(&conn);
    let live = LiveLogic::pin_states(&history, "lab1", &[p], ids[2]).unwrap();
    assert!(live[&p].is_active);
    assert_eq!(live[&p].start_time, at(2));
}

#[test]
fn test_refold_is_idle_and_changes_nothing() {
    let mut conn = memory_db();
    let p = pin(0);
    seed_pin(&conn, "lab1", p, &[Some(1), Some(0), Some(1), Some(0)]);

    fold(&mut conn, EpisodeMode::Lazy);
    let first = spans(&conn, "lab1", p);

    let again = FoldLogic::run_cycle(&mut conn, EpisodeMode::Lazy).unwrap();
    assert!(again.is_idle());
    assert_eq!(again.watermark_before, again.watermark_after);
    assert_eq!(spans(&conn, "lab1", p), first);
}

#[test]
fn test_absent_pin_breaks_the_falling_edge() {
    // 1, absent, 0: no reading pair shows 1 -> 0, so nothing is recorded
    let mut conn = memory_db();
    let p = pin(2);
    seed_pin(&conn, "lab1", p, &[Some(1), None, Some(0)]);

    let report = FoldLogic::run_cycle(&mut conn, EpisodeMode::Lazy).unwrap();
    assert_eq!(report.closed, 0);
    assert_eq!(report.watermark_after, 3);
    assert!(spans(&conn, "lab1", p).is_empty());
}

#[test]
fn test_incremental_fold_matches_single_fold() {
    let values = [
        Some(0),
        Some(1),
        Some(1),
        Some(0),
        Some(1),
        None,
        Some(1),
        Some(0),
        Some(0),
        Some(1),
    ];
    let p = pin(4);

    let mut control = memory_db();
    seed_pin(&control, "lab1", p, &values);
    fold(&mut control, EpisodeMode::Lazy);

    // split the same history across three cycles, including mid-alarm
    let mut conn = memory_db();
    seed_pin_from(&conn, "lab1", p, &values[..3], 1);
    fold(&mut conn, EpisodeMode::Lazy);
    seed_pin_from(&conn, "lab1", p, &values[3..6], 4);
    fold(&mut conn, EpisodeMode::Lazy);
    seed_pin_from(&conn, "lab1", p, &values[6..], 7);
    fold(&mut conn, EpisodeMode::Lazy);

    assert_eq!(spans(&conn, "lab1", p), spans(&control, "lab1", p));
    assert_eq!(watermark::read(&conn).unwrap(), 10);
}

#[test]
fn test_clients_are_folded_independently() {
    let mut conn = memory_db();
    let p = pin(1);
    // interleave two clients so every reading's predecessor is another client
    for i in 0..4 {
        let level = [Some(1), Some(0), Some(1), Some(0)][i];
        seed_pin_from(&conn, "lab1", p, &[level], 2 * i + 1);
        seed_pin_from(&conn, "lab2", p, &[Some(0)], 2 * i + 2);
    }
    fold(&mut conn, EpisodeMode::Lazy);

    assert_eq!(
        spans(&conn, "lab1", p),
        vec![(at(1), Some(at(3))), (at(5), Some(at(7)))]
    );
    assert!(spans(&conn, "lab2", p).is_empty());
}

#[test]
fn test_dropped_cycle_leaves_no_trace() {
    let values = [Some(0), Some(1), Some(0), Some(1), Some(0)];
    let p = pin(1);

    let mut conn = memory_db();
    seed_pin(&conn, "lab1", p, &values);
    {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .unwrap();
        let staged = FoldLogic::stage(&tx, EpisodeMode::Lazy).unwrap();
        assert_eq!(staged.closed, 2);
        // dropped without commit
    }
    assert_eq!(watermark::read(&conn).unwrap(), 0);
    assert!(spans(&conn, "lab1", p).is_empty());

    let mut control = memory_db();
    seed_pin(&control, "lab1", p, &values);
    fold(&mut control, EpisodeMode::Lazy);
    fold(&mut conn, EpisodeMode::Lazy);
    assert_eq!(spans(&conn, "lab1", p), spans(&control, "lab1", p));
}

#[test]
fn test_watermark_never_moves_backwards() {
    let mut conn = memory_db();
    seed_pin(&conn, "lab1", pin(0), &[Some(0), Some(1)]);
    fold(&mut conn, EpisodeMode::Lazy);

    let err = watermark::advance(&conn, 1).unwrap_err();
    assert!(matches!(
        err,
        AppError::WatermarkRegression {
            current: 2,
            requested: 1
        }
    ));
    assert_eq!(watermark::read(&conn).unwrap(), 2);
}

#[test]
fn test_eager_mode_opens_then_closes() {
    let mut conn = memory_db();
    let p = pin(6);
    seed_pin(&conn, "lab1", p, &[Some(0), Some(1)]);

    let report = FoldLogic::run_cycle(&mut conn, EpisodeMode::Eager).unwrap();
    assert_eq!(report.opened, 1);
    assert_eq!(spans(&conn, "lab1", p), vec![(at(2), None)]);

    seed_pin_from(&conn, "lab1", p, &[Some(1), Some(0)], 3);
    let report = FoldLogic::run_cycle(&mut conn, EpisodeMode::Eager).unwrap();
    assert_eq!(report.opened, 0);
    assert_eq!(report.closed, 1);
    assert_eq!(spans(&conn, "lab1", p), vec![(at(2), Some(at(4)))]);
}

#[test]
fn test_lazy_run_closes_row_left_open_by_eager_run() {
    let mut conn = memory_db();
    let p = pin(6);
    seed_pin(&conn, "lab1", p, &[Some(0), Some(1)]);
    fold(&mut conn, EpisodeMode::Eager);

    seed_pin_from(&conn, "lab1", p, &[Some(0)], 3);
    fold(&mut conn, EpisodeMode::Lazy);
    assert_eq!(spans(&conn, "lab1", p), vec![(at(2), Some(at(3)))]);
}

#[test]
fn test_eager_alarm_cleared_across_gap_is_discarded() {
    // 0, 1, absent, 0: the row opened at t2 never sees its falling edge
    let mut conn = memory_db();
    let p = pin(3);
    let ids = seed_pin(&conn, "lab1", p, &[Some(0), Some(1), None, Some(0)]);

    let report = FoldLogic::run_cycle(&mut conn, EpisodeMode::Eager).unwrap();
    assert_eq!(report.opened, 1);
    assert_eq!(report.closed, 0);
    assert_eq!(report.discarded, 1);
    assert!(spans(&conn, "lab1", p).is_empty());

    let history = SqliteHistory::new(&conn);
    let live = LiveLogic::pin_states(&history, "lab1", &[p], ids[3]).unwrap();
    assert!(live.get(&p).is_none());
}

#[test]
fn test_lazy_run_discards_eager_row_cleared_across_gap() {
    let mut conn = memory_db();
    let p = pin(6);
    seed_pin(&conn, "lab1", p, &[Some(0), Some(1)]);
    fold(&mut conn, EpisodeMode::Eager);
    assert_eq!(spans(&conn, "lab1", p), vec![(at(2), None)]);

    seed_pin_from(&conn, "lab1", p, &[None, Some(0)], 3);
    let report = FoldLogic::run_cycle(&mut conn, EpisodeMode::Lazy).unwrap();
    assert_eq!(report.discarded, 1);
    assert!(spans(&conn, "lab1", p).is_empty());
    assert!(VerifyLogic::run(&conn).unwrap().is_empty());
}

#[test]
fn test_eager_row_survives_gap_while_alarm_continues() {
    // 1, absent, 1, 0: the gap does not split the alarm
    let mut conn = memory_db();
    let p = pin(0);
    seed_pin(&conn, "lab1", p, &[Some(1), None]);
    fold(&mut conn, EpisodeMode::Eager);
    assert_eq!(spans(&conn, "lab1", p), vec![(at(1), None)]);

    seed_pin_from(&conn, "lab1", p, &[Some(1), Some(0)], 3);
    fold(&mut conn, EpisodeMode::Eager);
    assert_eq!(spans(&conn, "lab1", p), vec![(at(1), Some(at(4)))]);
}

fn levels() -> impl Strategy<Value = Vec<Option<i64>>> {
    prop::collection::vec(prop_oneof![Just(None), Just(Some(0)), Just(Some(1))], 1..32)
}

fn modes() -> impl Strategy<Value = EpisodeMode> {
    prop_oneof![Just(EpisodeMode::Lazy), Just(EpisodeMode::Eager)]
}

/// Seed `values` on pin `p`, folding once after the first `split` readings
/// and once after the rest. Returns the reading ids.
fn seed_and_fold(
    conn: &mut Connection,
    p: PinIndex,
    values: &[Option<i64>],
    split: usize,
    mode: EpisodeMode,
) -> Vec<i64> {
    let cut = split.min(values.len());
    let mut ids = seed_pin(conn, "lab1", p, &values[..cut]);
    fold(conn, mode);
    ids.extend(seed_pin_from(conn, "lab1", p, &values[cut..], cut + 1));
    fold(conn, mode);
    ids
}

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_folded_sequences_never_overlap(
        values in levels(),
        mode in modes(),
        split in 0usize..32,
    ) {
        let mut conn = memory_db();
        seed_and_fold(&mut conn, pin(3), &values, split, mode);

        let violations = VerifyLogic::run(&conn).unwrap();
        prop_assert!(violations.is_empty(), "{} {:?}: {:?}", mode, values, violations);
    }

    #[test]
    fn prop_live_answer_matches_folded_rows(
        values in levels(),
        mode in modes(),
        split in 0usize..32,
    ) {
        let p = pin(5);
        let mut conn = memory_db();
        let ids = seed_and_fold(&mut conn, p, &values, split, mode);

        let history = SqliteHistory::new(&conn);
        let stored = spans(&conn, "lab1", p);
        let closed_rows: BTreeSet<Span> = stored.iter().filter(|s| s.1.is_some()).cloned().collect();
        let open_rows: Vec<Span> = stored.iter().filter(|s| s.1.is_none()).cloned().collect();

        // the closed rows are exactly the closed episodes the live path
        // reported at some point of the history
        let mut live_closed = BTreeSet::new();
        for id in &ids {
            let live = LiveLogic::pin_states(&history, "lab1", &[p], *id).unwrap();
            if let Some(view) = live.get(&p).filter(|v| !v.is_active) {
                live_closed.insert((view.start_time, view.end_time));
            }
        }
        prop_assert_eq!(&closed_rows, &live_closed, "{} {:?}", mode, values);

        // an alarm whose next reading is not a 0 has no end, and no row claims one
        if let Some(h) = values.iter().rposition(|v| *v == Some(1))
            && values.get(h + 1) != Some(&Some(0))
        {
            let last_alarm = Some(at(h + 1));
            prop_assert!(
                closed_rows.iter().all(|(_, end)| *end < last_alarm),
                "{} {:?}: {:?}", mode, values, closed_rows
            );
        }

        let last = *ids.last().unwrap();
        let live = LiveLogic::pin_states(&history, "lab1", &[p], last).unwrap();
        let present = values.iter().rposition(|v| v.is_some());

        match mode {
            EpisodeMode::Lazy => {
                prop_assert!(open_rows.is_empty(), "{:?}: {:?}", values, open_rows);
            }
            EpisodeMode::Eager => match present {
                // the alarm is still running as of the last reading carrying the pin
                Some(k) if values[k] == Some(1) => {
                    let view = LiveLogic::pin_states(&history, "lab1", &[p], ids[k]).unwrap()[&p];
                    prop_assert!(view.is_active);
                    prop_assert_eq!(&open_rows, &vec![(view.start_time, None)], "{:?}", values);
                }
                _ => prop_assert!(open_rows.is_empty(), "{:?}: {:?}", values, open_rows),
            },
        }

        // with no live answer, the final reading closed nothing
        if live.get(&p).is_none() {
            let end = Some(at(values.len()));
            prop_assert!(
                closed_rows.iter().all(|(_, e)| *e != end),
                "{} {:?}: {:?}", mode, values, closed_rows
            );
        }
    }
}
