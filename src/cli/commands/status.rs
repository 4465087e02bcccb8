use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::live::LiveLogic;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::models::episode::EpisodeView;
use crate::models::status::ClientStatus;
use crate::ui::messages;
use crate::utils::colors::{GREEN, GREY, RED, RESET, color_for_alarm};
use crate::utils::table::Table;
use crate::utils::time;
use chrono::Utc;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Status { client, json } = cmd {
        let pool = DbPool::new(&cfg.database)?;
        let snapshot = LiveLogic::snapshot(&pool.conn, cfg, Utc::now(), client.as_deref())?;

        if *json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            return Ok(());
        }

        if snapshot.is_empty() {
            messages::warning("No readings recorded yet.");
            return Ok(());
        }

        for status in &snapshot {
            print_client(status);
        }
    }

    Ok(())
}

fn print_client(status: &ClientStatus) {
    let state = if status.is_connected {
        format!("{GREEN}online{RESET}")
    } else {
        format!("{RED}offline{RESET}")
    };
    messages::header(format!("{} [{}] {}", status.display_name, status.client_id, state));

    if !status.is_connected {
        println!("{GREY}no reading in the last few seconds{RESET}\n");
        return;
    }
    if let Some(ts) = &status.timestamp {
        println!("Last reading: {ts}\n");
    }

    if !status.combined_sensors.is_empty() {
        let mut t = Table::new(&["CH", "SENSOR", "TEMP °C", "HUM %"]);
        for s in &status.combined_sensors {
            t.add_row(vec![
                s.channel.to_string(),
                s.display_name.clone(),
                fmt_value(s.temperature),
                fmt_value(s.humidity),
            ]);
        }
        println!("{}", t.render());
    }

    for g in &status.gpio {
        let level = if g.status == 1 { "HIGH" } else { "low" };
        let alarm = g.alarm.map(describe_alarm).unwrap_or_default();
        println!(
            "  GPIO {} {:<16} {}{:<4}{}  {}",
            g.pin,
            g.alias,
            color_for_alarm(g.status == 1),
            level,
            RESET,
            alarm
        );
    }
    println!();
}

fn describe_alarm(view: EpisodeView) -> String {
    let start = time::display(&view.start_time);
    if view.is_active {
        format!("{RED}alarm since {start}{RESET}")
    } else {
        format!(
            "{GREY}last alarm {start} → {}{RESET}",
            time::display_opt(view.end_time.as_ref())
        )
    }
}

fn fmt_value(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.1}")).unwrap_or_else(|| "--".into())
}
