use super::pin::{CHANNELS, PinIndex, PinLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored sample from a field device (⇔ a `readings` row).
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub id: i64,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub gpio: [Option<PinLevel>; CHANNELS],
    pub temp: [Option<f64>; CHANNELS],
    pub hum: [Option<f64>; CHANNELS],
}

impl Reading {
    pub fn level(&self, pin: PinIndex) -> Option<PinLevel> {
        self.gpio[pin.as_usize()]
    }

    pub fn mark(&self) -> Mark {
        Mark {
            id: self.id,
            at: self.created_at,
        }
    }
}

/// Listing shape of a reading: channel values as the device sent them.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingRecord {
    pub id: i64,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub gpio: [Option<i64>; CHANNELS],
    pub temp: [Option<f64>; CHANNELS],
    pub hum: [Option<f64>; CHANNELS],
}

impl From<&Reading> for ReadingRecord {
    fn from(r: &Reading) -> Self {
        Self {
            id: r.id,
            client_id: r.client_id.clone(),
            created_at: r.created_at,
            gpio: r.gpio.map(|g| g.map(PinLevel::to_db)),
            temp: r.temp,
            hum: r.hum,
        }
    }
}

/// Position of a reading in the history: its id and store timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mark {
    pub id: i64,
    pub at: DateTime<Utc>,
}

/// Inbound payload accepted by the ingestion boundary.
///
/// Arrays are positional: index `i` is channel `i`, `null` (or a missing
/// tail) means the device reported nothing on that channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewReading {
    pub client_id: String,
    #[serde(default)]
    pub gpio: Vec<Option<i64>>,
    #[serde(default)]
    pub temp: Vec<Option<f64>>,
    #[serde(default)]
    pub hum: Vec<Option<f64>>,
}

impl NewReading {
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            ..Default::default()
        }
    }

    /// Builder used mostly by tests: gpio values only.
    pub fn with_gpio(client_id: &str, gpio: &[Option<i64>]) -> Self {
        Self {
            client_id: client_id.to_string(),
            gpio: gpio.to_vec(),
            ..Default::default()
        }
    }

    /// Convenience for a single pin, every other channel absent.
    pub fn single_pin(client_id: &str, pin: PinIndex, value: i64) -> Self {
        let mut gpio = vec![None; pin.as_usize() + 1];
        gpio[pin.as_usize()] = Some(value);
        Self::with_gpio(client_id, &gpio)
    }
}
