use crate::errors::{AppError, AppResult};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

/// Ensure that the `log` table exists. Migrations record themselves there,
/// so it is created before anything else.
fn ensure_log_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn create_readings_table(conn: &Connection) -> rusqlite::Result<()> {
    let mut channels = String::new();
    for i in 0..8 {
        channels.push_str(&format!(
            "gpio{i} INTEGER CHECK(gpio{i} IS NULL OR gpio{i} IN (0, 1)),\n"
        ));
    }
    for i in 0..8 {
        channels.push_str(&format!("temp{i} REAL,\n"));
    }
    for i in 0..8 {
        channels.push_str(&format!("hum{i} REAL,\n"));
    }

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id  TEXT NOT NULL,
            created_at TEXT NOT NULL,
            {channels}
            CHECK(length(client_id) BETWEEN 1 AND 80)
        );

        CREATE INDEX IF NOT EXISTS idx_readings_client_id ON readings(client_id, id);
        "#
    ))?;
    Ok(())
}

fn create_alarm_events_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS alarm_events (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id        TEXT NOT NULL,
            pin_index        INTEGER NOT NULL CHECK(pin_index BETWEEN 0 AND 7),
            event_start_time TEXT NOT NULL,
            event_end_time   TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_alarm_events_start
            ON alarm_events(client_id, pin_index, event_start_time);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_alarm_events_single_open
            ON alarm_events(client_id, pin_index)
            WHERE event_end_time IS NULL;
        "#,
    )?;
    Ok(())
}

fn create_processor_state_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS alarm_processor_state (
            id                        INTEGER PRIMARY KEY CHECK(id = 1),
            last_processed_reading_id INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )?;
    Ok(())
}

type Step = fn(&Connection) -> rusqlite::Result<()>;

/// Ordered list of schema migrations. Append only.
const MIGRATIONS: &[(&str, &str, Step)] = &[
    (
        "20250901_0001_create_readings",
        "Created readings table",
        create_readings_table,
    ),
    (
        "20250901_0002_create_alarm_events",
        "Created alarm_events table",
        create_alarm_events_table,
    ),
    (
        "20250901_0003_create_processor_state",
        "Created alarm_processor_state table",
        create_processor_state_table,
    ),
];

fn is_applied(conn: &Connection, version: &str) -> rusqlite::Result<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log
         WHERE operation = 'migration_applied' AND target = ?1
         LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

/// Public entry point: run all pending migrations.
///
/// Invoked by db::initialize::init_db(). Each migration and its log row
/// commit together; returns the versions applied by this call.
pub fn run_pending_migrations(conn: &Connection) -> AppResult<Vec<&'static str>> {
    ensure_log_table(conn)?;

    let mut applied = Vec::new();

    for (version, message, step) in MIGRATIONS {
        if is_applied(conn, version)? {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        step(&tx).map_err(|e| AppError::Migration(format!("{version}: {e}")))?;
        tx.execute(
            "INSERT INTO log (date, operation, target, message)
             VALUES (?1, 'migration_applied', ?2, ?3)",
            params![chrono::Utc::now().to_rfc3339(), version, message],
        )?;
        tx.commit()?;

        info!(version, "migration applied");
        applied.push(*version);
    }

    Ok(applied)
}
