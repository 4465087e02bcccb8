use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::ingest::IngestLogic;
use crate::db::log;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::ui::messages;
use std::fs;
use std::io::{self, Read};
use tracing::warn;

/// Handle the `ingest` command
///
/// Each non-empty line is one device payload. A bad line is reported and
/// skipped; the rest are still appended.
pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Ingest { file } = cmd {
        let raw = match file {
            Some(path) => fs::read_to_string(path)?,
            None => {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf)?;
                buf
            }
        };

        let pool = DbPool::new(&cfg.database)?;
        let mut accepted = 0usize;
        let mut rejected = 0usize;

        for (n, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let res = IngestLogic::parse_json(line)
                .and_then(|payload| IngestLogic::append(&pool.conn, &payload));
            match res {
                Ok(_) => accepted += 1,
                Err(e) => {
                    rejected += 1;
                    warn!(line = n + 1, error = %e, "payload rejected");
                    messages::warning(format!("line {}: {}", n + 1, e));
                }
            }
        }

        if accepted > 0 {
            log::ttlog(
                &pool.conn,
                "ingest",
                file.as_deref().unwrap_or("stdin"),
                &format!("{accepted} reading(s) appended, {rejected} rejected"),
            )?;
        }

        if rejected == 0 {
            messages::success(format!("{accepted} reading(s) appended"));
        } else {
            messages::warning(format!(
                "{accepted} reading(s) appended, {rejected} rejected"
            ));
        }
    }

    Ok(())
}
