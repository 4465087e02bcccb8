//! Live episode reconstruction and the dashboard snapshot built on it.
//!
//! Read-only. Every answer is re-derived from the reading history, so it
//! does not depend on how far the fold worker has got.

use crate::config::Config;
use crate::core::history::{PinHistory, SqliteHistory};
use crate::core::resolve::resolve_episode;
use crate::db::queries;
use crate::errors::AppResult;
use crate::models::episode::EpisodeView;
use crate::models::pin::{CHANNELS, PinIndex};
use crate::models::reading::Reading;
use crate::models::status::{ClientStatus, GpioStatus, SensorStatus};
use crate::utils::time;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::BTreeMap;

pub struct LiveLogic;

impl LiveLogic {
    /// Alarm state of each requested pin as of reading `as_of`.
    /// Pins with nothing to report are left out of the map.
    pub fn pin_states<H: PinHistory + ?Sized>(
        history: &H,
        client_id: &str,
        pins: &[PinIndex],
        as_of: i64,
    ) -> AppResult<BTreeMap<PinIndex, EpisodeView>> {
        let mut out = BTreeMap::new();
        for pin in pins {
            if let Some(view) = resolve_episode(history, client_id, *pin, as_of)? {
                out.insert(*pin, view);
            }
        }
        Ok(out)
    }

    /// Live query boundary: per visible pin state for one client, evaluated
    /// at its latest reading.
    pub fn client_pin_states(
        conn: &Connection,
        cfg: &Config,
        client_id: &str,
    ) -> AppResult<BTreeMap<PinIndex, EpisodeView>> {
        let Some(latest) = queries::latest_for_client(conn, client_id)? else {
            return Ok(BTreeMap::new());
        };
        let history = SqliteHistory::new(conn);
        Self::pin_states(&history, client_id, &cfg.visible_pins(client_id), latest.id)
    }

    /// Dashboard data for every known client (or just `only_client`).
    pub fn snapshot(
        conn: &Connection,
        cfg: &Config,
        now: DateTime<Utc>,
        only_client: Option<&str>,
    ) -> AppResult<Vec<ClientStatus>> {
        let history = SqliteHistory::new(conn);
        let mut out = Vec::new();

        for client_id in queries::client_ids(conn)? {
            if only_client.is_some_and(|c| c != client_id) {
                continue;
            }
            let latest = queries::latest_for_client(conn, &client_id)?;
            out.push(Self::client_status(&history, cfg, &client_id, latest, now)?);
        }

        Ok(out)
    }

    fn client_status<H: PinHistory>(
        history: &H,
        cfg: &Config,
        client_id: &str,
        latest: Option<Reading>,
        now: DateTime<Utc>,
    ) -> AppResult<ClientStatus> {
        let mut status = ClientStatus {
            client_id: client_id.to_string(),
            display_name: cfg.client_display_name(client_id),
            is_connected: false,
            timestamp: None,
            combined_sensors: Vec::new(),
            gpio: Vec::new(),
        };

        let Some(latest) = latest else {
            return Ok(status);
        };

        let age = now.signed_duration_since(latest.created_at);
        status.is_connected = age.num_seconds() < cfg.offline_threshold_secs as i64;
        if !status.is_connected {
            return Ok(status);
        }

        status.timestamp = Some(time::display(&latest.created_at));

        for channel in 0..CHANNELS {
            let (temp, hum) = (latest.temp[channel], latest.hum[channel]);
            let ch = channel as u8;
            if (temp.is_some() || hum.is_some()) && cfg.sensor_visible(client_id, ch) {
                status.combined_sensors.push(SensorStatus {
                    channel: ch,
                    display_name: if temp.is_some() {
                        cfg.temp_alias(client_id, ch)
                    } else {
                        cfg.hum_alias(client_id, ch)
                    },
                    temperature: temp,
                    humidity: hum,
                });
            }
        }

        for pin in cfg.visible_pins(client_id) {
            let Some(level) = latest.level(pin) else {
                continue;
            };
            status.gpio.push(GpioStatus {
                pin: pin.get(),
                alias: cfg.gpio_alias(client_id, pin),
                status: level.to_db(),
                alarm: resolve_episode(history, client_id, pin, latest.id)?,
            });
        }

        Ok(status)
    }
}
