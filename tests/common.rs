#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use chrono::{DateTime, Duration, TimeZone, Utc};
use pinwatch::core::ingest::IngestLogic;
use pinwatch::db::initialize::init_db;
use pinwatch::models::pin::PinIndex;
use pinwatch::models::reading::NewReading;
use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::PathBuf;

pub fn pw() -> Command {
    cargo_bin_cmd!("pinwatch")
}

/// Create a unique test DB path inside the system temp dir and remove any existing file
pub fn setup_test_db(name: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_pinwatch.sqlite", name));
    let db_path = path.to_string_lossy().to_string();
    for suffix in ["", "-wal", "-shm"] {
        fs::remove_file(format!("{db_path}{suffix}")).ok();
    }
    db_path
}

/// Fresh in-memory store with the full schema.
pub fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().expect("open db");
    init_db(&conn).expect("init db");
    conn
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
}

/// `t0 + n` seconds; reading n of a seeded sequence lands at `at(n)`.
pub fn at(n: usize) -> DateTime<Utc> {
    t0() + Duration::seconds(n as i64)
}

pub fn pin(n: i64) -> PinIndex {
    PinIndex::new(n).expect("valid pin")
}

/// Append one reading per value for a single pin. `None` leaves the pin
/// absent from that reading. Reading `i` (0-based) is stamped `at(i + 1)`.
pub fn seed_pin(conn: &Connection, client: &str, p: PinIndex, values: &[Option<i64>]) -> Vec<i64> {
    seed_pin_from(conn, client, p, values, 1)
}

/// Like `seed_pin`, with the first reading stamped `at(first)`.
pub fn seed_pin_from(
    conn: &Connection,
    client: &str,
    p: PinIndex,
    values: &[Option<i64>],
    first: usize,
) -> Vec<i64> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let payload = match v {
                Some(v) => NewReading::single_pin(client, p, *v),
                None => NewReading::new(client),
            };
            IngestLogic::append_at(conn, &payload, at(first + i)).expect("append")
        })
        .collect()
}
