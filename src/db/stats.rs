use crate::db::pool::DbPool;
use crate::db::{episodes, queries, watermark};
use crate::errors::AppResult;
use crate::utils::colors::{CYAN, GREEN, GREY, RESET, YELLOW};
use rusqlite::OptionalExtension;
use std::fs;

pub fn print_db_info(pool: &mut DbPool, db_path: &str) -> AppResult<()> {
    println!();

    //
    // 1) FILE SIZE
    //
    let file_size = fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
    let file_mb = (file_size as f64) / (1024.0 * 1024.0);

    println!("{}• File:{} {}{}{}", CYAN, RESET, YELLOW, db_path, RESET);
    println!("{}• Size:{} {:.2} MB", CYAN, RESET, file_mb);

    //
    // 2) READINGS
    //
    let count: i64 = pool
        .conn
        .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
    let clients = queries::client_ids(&pool.conn)?;
    println!(
        "{}• Total readings:{} {}{}{} from {} client(s)",
        CYAN,
        RESET,
        GREEN,
        count,
        RESET,
        clients.len()
    );

    //
    // 3) TIME RANGE
    //
    let first: Option<String> = pool
        .conn
        .query_row(
            "SELECT created_at FROM readings ORDER BY id ASC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let last: Option<String> = pool
        .conn
        .query_row(
            "SELECT created_at FROM readings ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    println!("{}• Reading range:{}", CYAN, RESET);
    println!(
        "    from: {}",
        first.unwrap_or_else(|| format!("{GREY}--{RESET}"))
    );
    println!(
        "    to:   {}",
        last.unwrap_or_else(|| format!("{GREY}--{RESET}"))
    );

    //
    // 4) EPISODES + WATERMARK
    //
    let (total, open) = episodes::count_episodes(&pool.conn)?;
    let wm = watermark::read(&pool.conn)?;
    let max_id = queries::max_reading_id(&pool.conn)?;

    println!(
        "{}• Alarm episodes:{} {}{}{} ({} open)",
        CYAN, RESET, GREEN, total, RESET, open
    );
    println!(
        "{}• Watermark:{} {} / {} ({} reading(s) pending)",
        CYAN,
        RESET,
        wm,
        max_id,
        (max_id - wm).max(0)
    );

    println!();
    Ok(())
}
