use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of binary (and analog) channels a device can report.
pub const CHANNELS: usize = 8;

/// A validated GPIO channel index (0-7).
///
/// Also used to build the per-pin column name, so only values that went
/// through `new` may reach SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct PinIndex(u8);

impl PinIndex {
    pub fn new(idx: i64) -> AppResult<Self> {
        if (0..CHANNELS as i64).contains(&idx) {
            Ok(Self(idx as u8))
        } else {
            Err(AppError::InvalidPin(idx))
        }
    }

    pub fn all() -> impl Iterator<Item = PinIndex> {
        (0..CHANNELS as u8).map(PinIndex)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Column holding this pin in the `readings` table.
    pub fn column(self) -> String {
        format!("gpio{}", self.0)
    }
}

impl TryFrom<i64> for PinIndex {
    type Error = AppError;

    fn try_from(v: i64) -> AppResult<Self> {
        PinIndex::new(v)
    }
}

impl From<PinIndex> for u8 {
    fn from(p: PinIndex) -> u8 {
        p.0
    }
}

impl fmt::Display for PinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a binary channel. Absent channels are `None` at the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PinLevel {
    /// `0`: safe.
    Low,
    /// `1`: alarm.
    High,
}

impl PinLevel {
    pub fn from_db(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Low),
            1 => Some(Self::High),
            _ => None,
        }
    }

    pub fn to_db(self) -> i64 {
        match self {
            PinLevel::Low => 0,
            PinLevel::High => 1,
        }
    }

    pub fn is_high(self) -> bool {
        matches!(self, PinLevel::High)
    }
}
