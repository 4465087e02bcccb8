//! Single-row cursor: highest reading id already folded into episodes.
//!
//! `advance` is only ever called inside the fold transaction, so its
//! isolation is the transaction's.

use crate::errors::{AppError, AppResult};
use rusqlite::{Connection, params};
use tracing::info;

const STATE_ROW: i64 = 1;

/// Create the row at 0 if it does not exist. Returns `true` on first run.
pub fn ensure(conn: &Connection) -> AppResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO alarm_processor_state (id, last_processed_reading_id)
         VALUES (?1, 0)",
        [STATE_ROW],
    )?;

    if inserted == 1 {
        info!("first-time run: watermark initialized to 0");
    }
    Ok(inserted == 1)
}

pub fn read(conn: &Connection) -> AppResult<i64> {
    let id: i64 = conn.query_row(
        "SELECT last_processed_reading_id FROM alarm_processor_state WHERE id = ?1",
        [STATE_ROW],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Move the watermark forward to `id`. Refuses to move it backwards.
pub fn advance(conn: &Connection, id: i64) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE alarm_processor_state
         SET last_processed_reading_id = ?1
         WHERE id = ?2 AND last_processed_reading_id <= ?1",
        params![id, STATE_ROW],
    )?;

    if changed == 0 {
        let current = read(conn)?;
        return Err(AppError::WatermarkRegression {
            current,
            requested: id,
        });
    }
    Ok(())
}
