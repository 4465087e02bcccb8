//! Episode store. Written only by the fold cycle; everything else reads.

use crate::errors::{AppError, AppResult};
use crate::models::episode::{Episode, EpisodeFilter, MAX_PAGE_SIZE};
use crate::models::pin::PinIndex;
use crate::utils::time;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Result, Row, params, params_from_iter};

pub fn map_row(row: &Row) -> Result<Episode> {
    let pin_raw: i64 = row.get("pin_index")?;
    let pin_index = PinIndex::new(pin_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Integer, Box::new(e))
    })?;

    let start_str: String = row.get("event_start_time")?;
    let end_str: Option<String> = row.get("event_end_time")?;

    let to_err = |e: AppError| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    };

    Ok(Episode {
        id: row.get("id")?,
        client_id: row.get("client_id")?,
        pin_index,
        event_start_time: time::from_db(&start_str).map_err(to_err)?,
        event_end_time: end_str
            .as_deref()
            .map(time::from_db)
            .transpose()
            .map_err(to_err)?,
    })
}

/// Insert a closed episode. Returns `false` when an episode with the same
/// (client, pin, start) already exists and nothing was written.
pub fn insert_closed(
    conn: &Connection,
    client_id: &str,
    pin: PinIndex,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> AppResult<bool> {
    let changed = conn
        .prepare_cached(
            "INSERT INTO alarm_events (client_id, pin_index, event_start_time, event_end_time)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT DO NOTHING",
        )?
        .execute(params![
            client_id,
            pin.get(),
            time::to_db(start),
            time::to_db(end)
        ])?;
    Ok(changed == 1)
}

/// Insert an open episode (null end). Same conflict rule as `insert_closed`.
pub fn insert_open(
    conn: &Connection,
    client_id: &str,
    pin: PinIndex,
    start: &DateTime<Utc>,
) -> AppResult<bool> {
    let changed = conn
        .prepare_cached(
            "INSERT INTO alarm_events (client_id, pin_index, event_start_time, event_end_time)
             VALUES (?1, ?2, ?3, NULL)
             ON CONFLICT DO NOTHING",
        )?
        .execute(params![client_id, pin.get(), time::to_db(start)])?;
    Ok(changed == 1)
}

pub fn close_open(conn: &Connection, id: i64, end: &DateTime<Utc>) -> AppResult<()> {
    conn.prepare_cached(
        "UPDATE alarm_events SET event_end_time = ?1
         WHERE id = ?2 AND event_end_time IS NULL",
    )?
    .execute(params![time::to_db(end), id])?;
    Ok(())
}

/// Remove an open row whose alarm ended without an observed falling edge.
pub fn delete_open(conn: &Connection, id: i64) -> AppResult<()> {
    conn.prepare_cached("DELETE FROM alarm_events WHERE id = ?1 AND event_end_time IS NULL")?
        .execute(params![id])?;
    Ok(())
}

pub fn find_open(conn: &Connection, client_id: &str, pin: PinIndex) -> AppResult<Option<Episode>> {
    let ep = conn
        .prepare_cached(
            "SELECT * FROM alarm_events
             WHERE client_id = ?1 AND pin_index = ?2 AND event_end_time IS NULL
             LIMIT 1",
        )?
        .query_row(params![client_id, pin.get()], map_row)
        .optional()?;
    Ok(ep)
}

/// Every episode of one (client, pin), oldest start first.
pub fn episodes_for_pin(conn: &Connection, client_id: &str, pin: PinIndex) -> AppResult<Vec<Episode>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM alarm_events
         WHERE client_id = ?1 AND pin_index = ?2
         ORDER BY event_start_time ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![client_id, pin.get()], map_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Every episode in the store, grouped by (client, pin) and ordered by start.
pub fn all_episodes(conn: &Connection) -> AppResult<Vec<Episode>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM alarm_events
         ORDER BY client_id ASC, pin_index ASC, event_start_time ASC, id ASC",
    )?;
    let rows = stmt.query_map([], map_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Historical listing: newest start first, filtered and paginated.
pub fn list_episodes(conn: &Connection, filter: &EpisodeFilter) -> AppResult<Vec<Episode>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(client) = &filter.client_id {
        clauses.push("client_id = ?");
        values.push(Value::Text(client.clone()));
    }
    if let Some(pin) = filter.pin {
        clauses.push("pin_index = ?");
        values.push(Value::Integer(pin.get() as i64));
    }
    if let Some(from) = &filter.from {
        clauses.push("event_start_time >= ?");
        values.push(Value::Text(time::to_db(from)));
    }
    if let Some(to) = &filter.to {
        clauses.push("event_start_time <= ?");
        values.push(Value::Text(time::to_db(to)));
    }
    if filter.only_open {
        clauses.push("event_end_time IS NULL");
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
    values.push(Value::Integer(limit as i64));
    values.push(Value::Integer(filter.offset as i64));

    let sql = format!(
        "SELECT * FROM alarm_events {where_sql}
         ORDER BY event_start_time DESC, id DESC
         LIMIT ? OFFSET ?"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), map_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn count_episodes(conn: &Connection) -> AppResult<(i64, i64)> {
    let counts = conn.query_row(
        "SELECT COUNT(*), IFNULL(SUM(CASE WHEN event_end_time IS NULL THEN 1 ELSE 0 END), 0)
         FROM alarm_events",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(counts)
}
