//! History lookup capability used by episode derivation.
//!
//! All positions are reading ids; ordering is by id, never by wall-clock.

use crate::db::queries;
use crate::errors::AppResult;
use crate::models::pin::{PinIndex, PinLevel};
use crate::models::reading::{Mark, Reading};
use rusqlite::Connection;

pub trait PinHistory {
    /// Latest reading of `client` with `id <= as_of` and the pin's level there.
    fn sample_at_or_before(
        &self,
        client: &str,
        pin: PinIndex,
        as_of: i64,
    ) -> AppResult<Option<(Mark, Option<PinLevel>)>>;

    /// Reading of `client` immediately after `after` (bounded by `upto`).
    fn sample_after(
        &self,
        client: &str,
        pin: PinIndex,
        after: i64,
        upto: i64,
    ) -> AppResult<Option<(Mark, Option<PinLevel>)>>;

    /// Most recent reading strictly before `before` with the pin at `level`.
    fn last_at_level(
        &self,
        client: &str,
        pin: PinIndex,
        level: PinLevel,
        before: i64,
    ) -> AppResult<Option<Mark>>;

    /// Earliest reading strictly after `after` (or from the beginning) and
    /// at most `upto`, with the pin at `level`.
    fn first_at_level(
        &self,
        client: &str,
        pin: PinIndex,
        level: PinLevel,
        after: Option<i64>,
        upto: i64,
    ) -> AppResult<Option<Mark>>;
}

/// History backed by the `readings` table.
///
/// Works equally on a plain connection (live path) and on a transaction
/// (fold cycle), which derefs to `Connection`.
pub struct SqliteHistory<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteHistory<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl PinHistory for SqliteHistory<'_> {
    fn sample_at_or_before(
        &self,
        client: &str,
        pin: PinIndex,
        as_of: i64,
    ) -> AppResult<Option<(Mark, Option<PinLevel>)>> {
        queries::sample_at_or_before(self.conn, client, pin, as_of)
    }

    fn sample_after(
        &self,
        client: &str,
        pin: PinIndex,
        after: i64,
        upto: i64,
    ) -> AppResult<Option<(Mark, Option<PinLevel>)>> {
        queries::sample_after(self.conn, client, pin, after, upto)
    }

    fn last_at_level(
        &self,
        client: &str,
        pin: PinIndex,
        level: PinLevel,
        before: i64,
    ) -> AppResult<Option<Mark>> {
        queries::last_at_level(self.conn, client, pin, level, before)
    }

    fn first_at_level(
        &self,
        client: &str,
        pin: PinIndex,
        level: PinLevel,
        after: Option<i64>,
        upto: i64,
    ) -> AppResult<Option<Mark>> {
        queries::first_at_level(self.conn, client, pin, level, after, upto)
    }
}

/// History over an in-memory slice of readings sorted by id.
pub struct MemoryHistory<'r> {
    readings: &'r [Reading],
}

impl<'r> MemoryHistory<'r> {
    /// `readings` must be sorted by ascending id.
    pub fn new(readings: &'r [Reading]) -> Self {
        Self { readings }
    }

    fn of<'a>(&'a self, client: &'a str) -> impl DoubleEndedIterator<Item = &'r Reading> + 'a {
        self.readings.iter().filter(move |r| r.client_id == client)
    }
}

impl PinHistory for MemoryHistory<'_> {
    fn sample_at_or_before(
        &self,
        client: &str,
        pin: PinIndex,
        as_of: i64,
    ) -> AppResult<Option<(Mark, Option<PinLevel>)>> {
        Ok(self
            .of(client)
            .rev()
            .find(|r| r.id <= as_of)
            .map(|r| (r.mark(), r.level(pin))))
    }

    fn sample_after(
        &self,
        client: &str,
        pin: PinIndex,
        after: i64,
        upto: i64,
    ) -> AppResult<Option<(Mark, Option<PinLevel>)>> {
        Ok(self
            .of(client)
            .find(|r| r.id > after)
            .filter(|r| r.id <= upto)
            .map(|r| (r.mark(), r.level(pin))))
    }

    fn last_at_level(
        &self,
        client: &str,
        pin: PinIndex,
        level: PinLevel,
        before: i64,
    ) -> AppResult<Option<Mark>> {
        Ok(self
            .of(client)
            .rev()
            .find(|r| r.id < before && r.level(pin) == Some(level))
            .map(Reading::mark))
    }

    fn first_at_level(
        &self,
        client: &str,
        pin: PinIndex,
        level: PinLevel,
        after: Option<i64>,
        upto: i64,
    ) -> AppResult<Option<Mark>> {
        let after = after.unwrap_or(i64::MIN);
        Ok(self
            .of(client)
            .find(|r| r.id > after && r.level(pin) == Some(level))
            .filter(|r| r.id <= upto)
            .map(Reading::mark))
    }
}
