use super::pin::PinIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A persisted alarm episode (⇔ an `alarm_events` row).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub id: i64,
    pub client_id: String,
    pub pin_index: PinIndex,
    pub event_start_time: DateTime<Utc>,
    /// `None` while the episode is still open.
    pub event_end_time: Option<DateTime<Utc>>,
}

impl Episode {
    pub fn is_open(&self) -> bool {
        self.event_end_time.is_none()
    }
}

/// Episode derived from the reading history at some point in time.
///
/// This is what both the batch fold and the live path compute; it has the
/// live query boundary's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpisodeView {
    pub is_active: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// When the fold writes rows for an alarm that has not cleared yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeMode {
    /// Write a row only on the falling edge, with both start and end.
    #[default]
    Lazy,
    /// Open a row (null end) as soon as the pin is seen active, close it
    /// on the falling edge.
    Eager,
}

impl fmt::Display for EpisodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodeMode::Lazy => write!(f, "lazy"),
            EpisodeMode::Eager => write!(f, "eager"),
        }
    }
}

/// Filter for the historical query boundary.
#[derive(Debug, Clone)]
pub struct EpisodeFilter {
    pub client_id: Option<String>,
    pub pin: Option<PinIndex>,
    /// Inclusive lower bound on `event_start_time`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `event_start_time`.
    pub to: Option<DateTime<Utc>>,
    pub only_open: bool,
    pub limit: usize,
    pub offset: usize,
}

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 1000;

impl Default for EpisodeFilter {
    fn default() -> Self {
        Self {
            client_id: None,
            pin: None,
            from: None,
            to: None,
            only_open: false,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}
