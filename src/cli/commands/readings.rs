use crate::cli::parser::Commands;
use crate::config::Config;
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::errors::AppResult;
use crate::models::reading::ReadingRecord;
use crate::ui::messages;
use crate::utils::table::Table;
use crate::utils::time;
use std::fmt;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Readings {
        client,
        limit,
        json,
    } = cmd
    {
        let pool = DbPool::new(&cfg.database)?;
        let rows: Vec<ReadingRecord> = queries::list_readings(&pool.conn, client.as_deref(), *limit)?
            .iter()
            .map(ReadingRecord::from)
            .collect();

        if *json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        if rows.is_empty() {
            messages::info("No readings recorded yet.");
            return Ok(());
        }

        let mut t = Table::new(&["ID", "CLIENT", "TIME", "GPIO", "TEMP", "HUM"]);
        for r in &rows {
            t.add_row(vec![
                r.id.to_string(),
                cfg.client_display_name(&r.client_id),
                time::display(&r.created_at),
                channels(&r.gpio),
                channels(&r.temp),
                channels(&r.hum),
            ]);
        }
        print!("{}", t.render());
        println!("\n{} reading(s) shown", rows.len());
    }

    Ok(())
}

/// `ch:value` for each channel the reading carried, e.g. `0:1 3:0`.
fn channels<T: fmt::Display>(values: &[Option<T>]) -> String {
    let cells: Vec<String> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_ref().map(|v| format!("{i}:{v}")))
        .collect();
    if cells.is_empty() {
        "--".to_string()
    } else {
        cells.join(" ")
    }
}
