use crate::db::log::{LogEntry, load_log};
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use ansi_term::Colour;
use regex::Regex;

const OP_WIDTH_MAX: usize = 60;

fn strip_ansi(s: &str) -> String {
    match Regex::new(r"\x1B\[[0-9;]*[mK]") {
        Ok(re) => re.replace_all(s, "").into_owned(),
        Err(_) => s.to_string(),
    }
}

/// ANSI colour for an audit operation.
fn color_for_operation(op: &str) -> Colour {
    match op {
        "fold" => Colour::Green,
        "ingest" => Colour::Cyan,
        "watermark" => Colour::Yellow,
        "migration_applied" => Colour::Purple,
        "init" => Colour::RGB(255, 153, 51),
        _ => Colour::White,
    }
}

fn op_target(e: &LogEntry) -> String {
    if e.target.is_empty() {
        e.operation.clone()
    } else {
        format!("{} ({})", e.operation, e.target)
    }
}

/// Cut to `max` visible chars, recolouring only the operation word.
fn render_op(e: &LogEntry, max: usize) -> String {
    let color = color_for_operation(&e.operation);
    let visible = op_target(e);
    let cut = if visible.chars().count() > max {
        let mut s: String = visible.chars().take(max - 3).collect();
        s.push_str("...");
        s
    } else {
        visible
    };

    match cut.split_once(' ') {
        Some((op, rest)) => format!("{} {}", color.paint(op), rest),
        None => color.paint(cut.as_str()).to_string(),
    }
}

pub struct LogLogic;

impl LogLogic {
    pub fn print_log(pool: &mut DbPool) -> AppResult<()> {
        let entries = load_log(&pool.conn)?;
        if entries.is_empty() {
            println!("📜 Internal log is empty.");
            return Ok(());
        }

        let op_w = entries
            .iter()
            .map(|e| op_target(e).chars().count())
            .max()
            .unwrap_or(10)
            .min(OP_WIDTH_MAX);
        let id_w = entries
            .iter()
            .map(|e| e.id.to_string().len())
            .max()
            .unwrap_or(1);

        println!("📜 Internal log:\n");

        for e in &entries {
            let date = chrono::DateTime::parse_from_rfc3339(&e.date)
                .map(|dt| dt.format("%FT%T%:z").to_string())
                .unwrap_or_else(|_| e.date.clone());

            let op = render_op(e, OP_WIDTH_MAX);
            let padding = " ".repeat(op_w.saturating_sub(strip_ansi(&op).chars().count()));

            println!(
                "{:>id_w$}: {} | {}{} => {}",
                e.id, date, op, padding, e.message
            );
        }

        Ok(())
    }
}
