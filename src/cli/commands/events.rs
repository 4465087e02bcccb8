use crate::cli::parser::Commands;
use crate::config::Config;
use crate::db::episodes;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::models::episode::{EpisodeFilter, MAX_PAGE_SIZE};
use crate::models::pin::PinIndex;
use crate::ui::messages;
use crate::utils::table::Table;
use crate::utils::time;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Events {
        client,
        pin,
        from,
        to,
        open,
        limit,
        offset,
        json,
    } = cmd
    {
        let filter = EpisodeFilter {
            client_id: client.clone(),
            pin: pin.map(PinIndex::new).transpose()?,
            from: time::parse_optional_user(from.as_ref())?,
            to: time::parse_optional_user(to.as_ref())?,
            only_open: *open,
            limit: (*limit).clamp(1, MAX_PAGE_SIZE),
            offset: *offset,
        };

        let pool = DbPool::new(&cfg.database)?;
        let page = episodes::list_episodes(&pool.conn, &filter)?;

        if *json {
            println!("{}", serde_json::to_string_pretty(&page)?);
            return Ok(());
        }

        if page.is_empty() {
            messages::info("No alarm episodes match.");
            return Ok(());
        }

        let mut t = Table::new(&["ID", "CLIENT", "GPIO", "START", "END", "DURATION"]);
        for ep in &page {
            let duration = ep
                .event_end_time
                .map(|end| {
                    let secs = (end - ep.event_start_time).num_seconds();
                    format!("{}m {:02}s", secs / 60, secs.rem_euclid(60))
                })
                .unwrap_or_else(|| "active".into());

            t.add_row(vec![
                ep.id.to_string(),
                cfg.client_display_name(&ep.client_id),
                cfg.gpio_alias(&ep.client_id, ep.pin_index),
                time::display(&ep.event_start_time),
                time::display_opt(ep.event_end_time.as_ref()),
                duration,
            ]);
        }
        print!("{}", t.render());
        println!(
            "\n{} episode(s) shown (offset {}, limit {})",
            page.len(),
            filter.offset,
            filter.limit
        );
    }

    Ok(())
}
