//! Ingestion boundary: validate a device payload and append it.

use crate::db::queries::insert_reading;
use crate::errors::{AppError, AppResult};
use crate::models::pin::{CHANNELS, PinLevel};
use crate::models::reading::NewReading;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

pub const MAX_CLIENT_ID_LEN: usize = 80;

/// A payload that passed validation, padded to `CHANNELS` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidReading {
    pub client_id: String,
    pub gpio: [Option<PinLevel>; CHANNELS],
    pub temp: [Option<f64>; CHANNELS],
    pub hum: [Option<f64>; CHANNELS],
}

pub struct IngestLogic;

impl IngestLogic {
    pub fn validate(payload: &NewReading) -> AppResult<ValidReading> {
        let client_id = payload.client_id.trim();
        if client_id.is_empty() {
            return Err(AppError::MalformedReading("client_id is empty".into()));
        }
        if client_id.chars().count() > MAX_CLIENT_ID_LEN {
            return Err(AppError::MalformedReading(format!(
                "client_id longer than {MAX_CLIENT_ID_LEN} characters"
            )));
        }

        check_len("gpio", payload.gpio.len())?;
        check_len("temp", payload.temp.len())?;
        check_len("hum", payload.hum.len())?;

        let mut gpio = [None; CHANNELS];
        for (i, v) in payload.gpio.iter().enumerate() {
            gpio[i] = match v {
                None => None,
                Some(raw) => Some(PinLevel::from_db(*raw).ok_or_else(|| {
                    AppError::MalformedReading(format!("gpio{i} must be 0 or 1, got {raw}"))
                })?),
            };
        }

        Ok(ValidReading {
            client_id: client_id.to_string(),
            gpio,
            temp: analog("temp", &payload.temp)?,
            hum: analog("hum", &payload.hum)?,
        })
    }

    /// Validate and append with a store-assigned timestamp (now).
    pub fn append(conn: &Connection, payload: &NewReading) -> AppResult<i64> {
        Self::append_at(conn, payload, Utc::now())
    }

    /// Validate and append with an explicit timestamp.
    pub fn append_at(
        conn: &Connection,
        payload: &NewReading,
        created_at: DateTime<Utc>,
    ) -> AppResult<i64> {
        let valid = Self::validate(payload)?;
        let id = insert_reading(
            conn,
            &valid.client_id,
            &created_at,
            &valid.gpio,
            &valid.temp,
            &valid.hum,
        )?;
        debug!(id, client = %valid.client_id, "reading appended");
        Ok(id)
    }

    /// Parse a JSON payload as sent by a device.
    pub fn parse_json(raw: &str) -> AppResult<NewReading> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn check_len(name: &str, len: usize) -> AppResult<()> {
    if len > CHANNELS {
        return Err(AppError::MalformedReading(format!(
            "{name} has {len} values, at most {CHANNELS} allowed"
        )));
    }
    Ok(())
}

fn analog(name: &str, values: &[Option<f64>]) -> AppResult<[Option<f64>; CHANNELS]> {
    let mut out = [None; CHANNELS];
    for (i, v) in values.iter().enumerate() {
        if let Some(x) = v
            && !x.is_finite()
        {
            return Err(AppError::MalformedReading(format!(
                "{name}{i} is not a finite number"
            )));
        }
        out[i] = *v;
    }
    Ok(out)
}
