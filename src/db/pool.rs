//! SQLite connection wrapper.
//!
//! Every connection runs in WAL mode so that live queries keep reading while
//! the fold worker holds its write transaction.

use rusqlite::{Connection, Result};
use std::path::Path;
use std::time::Duration;

/// How long a statement waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DbPool {
    pub conn: Connection,
}

impl DbPool {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(Path::new(path))?;
        configure(&conn)?;
        Ok(Self { conn })
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // journal_mode returns the resulting mode as a row
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(())
}
