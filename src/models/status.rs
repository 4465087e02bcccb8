//! Dashboard snapshot returned by the live query boundary.

use super::episode::EpisodeView;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    pub client_id: String,
    pub display_name: String,
    pub is_connected: bool,
    /// Latest reading time; only filled while the client is connected.
    pub timestamp: Option<String>,
    pub combined_sensors: Vec<SensorStatus>,
    pub gpio: Vec<GpioStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorStatus {
    pub channel: u8,
    pub display_name: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GpioStatus {
    pub pin: u8,
    pub alias: String,
    pub status: i64,
    /// Current or most recent alarm episode, if one was ever observed.
    pub alarm: Option<EpisodeView>,
}

/// Recent values of one client, one list per channel alias. A channel's
/// list only holds the readings that carried it, so it can be shorter
/// than `timestamps`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientSeries {
    pub client_id: String,
    pub display_name: String,
    pub timestamps: Vec<DateTime<Utc>>,
    pub temp: BTreeMap<String, Vec<f64>>,
    pub hum: BTreeMap<String, Vec<f64>>,
    pub gpio: BTreeMap<String, Vec<i64>>,
}
