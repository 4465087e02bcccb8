//! Recent per-channel values for trend views.

use crate::config::Config;
use crate::db::queries;
use crate::errors::AppResult;
use crate::models::pin::{CHANNELS, PinIndex};
use crate::models::status::ClientSeries;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

pub struct SeriesLogic;

impl SeriesLogic {
    /// Values of every client (or just `only_client`) stamped within
    /// `window` before `end`. Clients with no reading in the window are
    /// left out.
    pub fn build(
        conn: &Connection,
        cfg: &Config,
        end: DateTime<Utc>,
        window: Duration,
        only_client: Option<&str>,
    ) -> AppResult<Vec<ClientSeries>> {
        let start = end - window;
        let mut out = Vec::new();

        for client_id in queries::client_ids(conn)? {
            if only_client.is_some_and(|c| c != client_id) {
                continue;
            }

            let readings = queries::readings_between(conn, &client_id, &start, &end)?;
            if readings.is_empty() {
                continue;
            }

            let mut series = ClientSeries {
                client_id: client_id.clone(),
                display_name: cfg.client_display_name(&client_id),
                ..Default::default()
            };

            for r in &readings {
                series.timestamps.push(r.created_at);

                for ch in 0..CHANNELS {
                    let n = ch as u8;
                    if let Some(t) = r.temp[ch] {
                        series
                            .temp
                            .entry(cfg.temp_alias(&client_id, n))
                            .or_default()
                            .push(t);
                    }
                    if let Some(h) = r.hum[ch] {
                        series
                            .hum
                            .entry(cfg.hum_alias(&client_id, n))
                            .or_default()
                            .push(h);
                    }
                }

                for pin in PinIndex::all() {
                    if let Some(level) = r.level(pin) {
                        series
                            .gpio
                            .entry(cfg.gpio_alias(&client_id, pin))
                            .or_default()
                            .push(level.to_db());
                    }
                }
            }

            out.push(series);
        }

        Ok(out)
    }
}
