//! Reading store queries. The table is append-only: nothing here updates or
//! deletes a reading.

use crate::errors::{AppError, AppResult};
use crate::models::pin::{CHANNELS, PinIndex, PinLevel};
use crate::models::reading::{Mark, Reading};
use crate::utils::time;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Result, Row, params, params_from_iter};

fn conversion_failure(idx: usize, err: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

pub fn map_row(row: &Row) -> Result<Reading> {
    let created_str: String = row.get("created_at")?;
    let created_at = time::from_db(&created_str).map_err(|e| conversion_failure(2, e))?;

    let mut gpio = [None; CHANNELS];
    let mut temp = [None; CHANNELS];
    let mut hum = [None; CHANNELS];

    for i in 0..CHANNELS {
        let raw: Option<i64> = row.get(format!("gpio{i}").as_str())?;
        gpio[i] = match raw {
            None => None,
            Some(v) => Some(PinLevel::from_db(v).ok_or_else(|| {
                conversion_failure(
                    3 + i,
                    AppError::MalformedReading(format!("gpio{i} holds {v}")),
                )
            })?),
        };
        temp[i] = row.get(format!("temp{i}").as_str())?;
        hum[i] = row.get(format!("hum{i}").as_str())?;
    }

    Ok(Reading {
        id: row.get("id")?,
        client_id: row.get("client_id")?,
        created_at,
        gpio,
        temp,
        hum,
    })
}

fn map_mark(row: &Row) -> Result<Mark> {
    let at_str: String = row.get(1)?;
    let at = time::from_db(&at_str).map_err(|e| conversion_failure(1, e))?;
    Ok(Mark {
        id: row.get(0)?,
        at,
    })
}

/// Map `(id, created_at, gpioN)` into a mark plus the pin level it carries.
fn map_sample(row: &Row) -> Result<(Mark, Option<PinLevel>)> {
    let mark = map_mark(row)?;
    let raw: Option<i64> = row.get(2)?;
    Ok((mark, raw.and_then(PinLevel::from_db)))
}

/// Append one validated reading. `gpio/temp/hum` are already padded to
/// `CHANNELS`. Returns the store-assigned id.
pub fn insert_reading(
    conn: &Connection,
    client_id: &str,
    created_at: &DateTime<Utc>,
    gpio: &[Option<PinLevel>; CHANNELS],
    temp: &[Option<f64>; CHANNELS],
    hum: &[Option<f64>; CHANNELS],
) -> AppResult<i64> {
    let mut cols = vec!["client_id".to_string(), "created_at".to_string()];
    let mut values: Vec<Value> = vec![
        Value::Text(client_id.to_string()),
        Value::Text(time::to_db(created_at)),
    ];

    for (i, g) in gpio.iter().enumerate() {
        cols.push(format!("gpio{i}"));
        values.push(g.map_or(Value::Null, |l| Value::Integer(l.to_db())));
    }
    for (i, t) in temp.iter().enumerate() {
        cols.push(format!("temp{i}"));
        values.push(t.map_or(Value::Null, Value::Real));
    }
    for (i, h) in hum.iter().enumerate() {
        cols.push(format!("hum{i}"));
        values.push(h.map_or(Value::Null, Value::Real));
    }

    let placeholders: Vec<String> = (1..=values.len()).map(|n| format!("?{n}")).collect();
    let sql = format!(
        "INSERT INTO readings ({}) VALUES ({})",
        cols.join(", "),
        placeholders.join(", ")
    );

    conn.prepare_cached(&sql)?
        .execute(params_from_iter(values))?;
    Ok(conn.last_insert_rowid())
}

/// All readings with `id > after`, oldest first.
pub fn readings_after(conn: &Connection, after: i64) -> AppResult<Vec<Reading>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM readings WHERE id > ?1 ORDER BY id ASC")?;
    let rows = stmt.query_map([after], map_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// The reading of `client_id` immediately before `id`.
pub fn previous_reading(conn: &Connection, client_id: &str, id: i64) -> AppResult<Option<Reading>> {
    let reading = conn
        .prepare_cached(
            "SELECT * FROM readings
             WHERE client_id = ?1 AND id < ?2
             ORDER BY id DESC
             LIMIT 1",
        )?
        .query_row(params![client_id, id], map_row)
        .optional()?;
    Ok(reading)
}

pub fn latest_for_client(conn: &Connection, client_id: &str) -> AppResult<Option<Reading>> {
    let reading = conn
        .prepare_cached(
            "SELECT * FROM readings
             WHERE client_id = ?1
             ORDER BY id DESC
             LIMIT 1",
        )?
        .query_row([client_id], map_row)
        .optional()?;
    Ok(reading)
}

/// Upper bound for one `readings` listing page.
pub const MAX_READING_PAGE: usize = 1000;

/// Newest readings first, for every client or only `client_id`.
/// `limit` is clamped to `1..=MAX_READING_PAGE`.
pub fn list_readings(
    conn: &Connection,
    client_id: Option<&str>,
    limit: usize,
) -> AppResult<Vec<Reading>> {
    let limit = limit.clamp(1, MAX_READING_PAGE) as i64;
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM readings
         WHERE ?1 IS NULL OR client_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![client_id, limit], map_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Readings of `client_id` stamped within `[from, to]`, in id order.
pub fn readings_between(
    conn: &Connection,
    client_id: &str,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
) -> AppResult<Vec<Reading>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM readings
         WHERE client_id = ?1 AND created_at BETWEEN ?2 AND ?3
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(
        params![client_id, time::to_db(from), time::to_db(to)],
        map_row,
    )?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn client_ids(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT DISTINCT client_id FROM readings ORDER BY client_id")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn max_reading_id(conn: &Connection) -> AppResult<i64> {
    let id: i64 = conn.query_row("SELECT IFNULL(MAX(id), 0) FROM readings", [], |row| {
        row.get(0)
    })?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Per-pin lookups backing `SqliteHistory`.
// The column name comes from a validated `PinIndex`.
// ---------------------------------------------------------------------------

/// Latest reading of the client with `id <= as_of`, with the pin's level.
pub fn sample_at_or_before(
    conn: &Connection,
    client_id: &str,
    pin: PinIndex,
    as_of: i64,
) -> AppResult<Option<(Mark, Option<PinLevel>)>> {
    let sql = format!(
        "SELECT id, created_at, {col} FROM readings
         WHERE client_id = ?1 AND id <= ?2
         ORDER BY id DESC
         LIMIT 1",
        col = pin.column()
    );
    let sample = conn
        .prepare_cached(&sql)?
        .query_row(params![client_id, as_of], map_sample)
        .optional()?;
    Ok(sample)
}

/// First reading of the client with `after < id <= upto`, with the pin's level.
pub fn sample_after(
    conn: &Connection,
    client_id: &str,
    pin: PinIndex,
    after: i64,
    upto: i64,
) -> AppResult<Option<(Mark, Option<PinLevel>)>> {
    let sql = format!(
        "SELECT id, created_at, {col} FROM readings
         WHERE client_id = ?1 AND id > ?2 AND id <= ?3
         ORDER BY id ASC
         LIMIT 1",
        col = pin.column()
    );
    let sample = conn
        .prepare_cached(&sql)?
        .query_row(params![client_id, after, upto], map_sample)
        .optional()?;
    Ok(sample)
}

/// Most recent reading with `id < before` whose pin equals `level`.
pub fn last_at_level(
    conn: &Connection,
    client_id: &str,
    pin: PinIndex,
    level: PinLevel,
    before: i64,
) -> AppResult<Option<Mark>> {
    let sql = format!(
        "SELECT id, created_at FROM readings
         WHERE client_id = ?1 AND id < ?2 AND {col} = ?3
         ORDER BY id DESC
         LIMIT 1",
        col = pin.column()
    );
    let mark = conn
        .prepare_cached(&sql)?
        .query_row(params![client_id, before, level.to_db()], map_mark)
        .optional()?;
    Ok(mark)
}

/// Earliest reading with `after < id <= upto` (no lower bound when `after`
/// is `None`) whose pin equals `level`.
pub fn first_at_level(
    conn: &Connection,
    client_id: &str,
    pin: PinIndex,
    level: PinLevel,
    after: Option<i64>,
    upto: i64,
) -> AppResult<Option<Mark>> {
    let sql = format!(
        "SELECT id, created_at FROM readings
         WHERE client_id = ?1 AND id > ?2 AND id <= ?3 AND {col} = ?4
         ORDER BY id ASC
         LIMIT 1",
        col = pin.column()
    );
    let mark = conn
        .prepare_cached(&sql)?
        .query_row(
            params![client_id, after.unwrap_or(0), upto, level.to_db()],
            map_mark,
        )
        .optional()?;
    Ok(mark)
}
