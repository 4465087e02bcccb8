use crate::db::migrate::run_pending_migrations;
use crate::db::watermark;
use crate::errors::AppResult;
use rusqlite::Connection;

/// Initialize the database.
/// Schema comes from the migration runner; the watermark row is seeded at 0.
pub fn init_db(conn: &Connection) -> AppResult<()> {
    run_pending_migrations(conn)?;
    watermark::ensure(conn)?;
    Ok(())
}
