use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::series::SeriesLogic;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::models::status::ClientSeries;
use crate::ui::messages;
use crate::utils::table::Table;
use crate::utils::time;
use chrono::{Duration, Utc};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Series {
        client,
        minutes,
        until,
        json,
    } = cmd
    {
        let end = time::parse_optional_user(until.as_ref())?.unwrap_or_else(Utc::now);
        let window = Duration::minutes(i64::from(*minutes));

        let pool = DbPool::new(&cfg.database)?;
        let series = SeriesLogic::build(&pool.conn, cfg, end, window, client.as_deref())?;

        if *json {
            println!("{}", serde_json::to_string_pretty(&series)?);
            return Ok(());
        }

        if series.is_empty() {
            messages::info(format!("No readings in the last {minutes} minute(s)."));
            return Ok(());
        }

        for s in &series {
            print_client(s);
        }
    }

    Ok(())
}

fn print_client(s: &ClientSeries) {
    messages::header(format!("{} [{}]", s.display_name, s.client_id));
    if let (Some(first), Some(last)) = (s.timestamps.first(), s.timestamps.last()) {
        println!(
            "{} reading(s), {} → {}\n",
            s.timestamps.len(),
            time::display(first),
            time::display(last)
        );
    }

    let mut t = Table::new(&["SERIES", "N", "MIN", "MAX", "LAST"]);
    for (name, values) in s.temp.iter().chain(&s.hum) {
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        t.add_row(vec![
            name.clone(),
            values.len().to_string(),
            format!("{min:.1}"),
            format!("{max:.1}"),
            values.last().map(|v| format!("{v:.1}")).unwrap_or_default(),
        ]);
    }
    for (name, values) in &s.gpio {
        let show = |v: Option<&i64>| v.map(|v| v.to_string()).unwrap_or_default();
        t.add_row(vec![
            name.clone(),
            values.len().to_string(),
            show(values.iter().min()),
            show(values.iter().max()),
            show(values.last()),
        ]);
    }
    println!("{}", t.render());
}
