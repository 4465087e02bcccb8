//! Episode derivation shared by the fold cycle and the live path.
//!
//! Both callers go through `resolve_start`, so a live answer computed up to
//! reading `X` matches what the fold persists once it has passed `X`.

use crate::core::history::PinHistory;
use crate::errors::AppResult;
use crate::models::episode::EpisodeView;
use crate::models::pin::{PinIndex, PinLevel};
use crate::models::reading::Mark;

/// Start of the episode that contains the active reading `alarm_id`.
///
/// Walks back to the last reading with the pin at `0` before `alarm_id`; the
/// start is the first `1` after it. With no `0` in history, the start is the
/// first `1` ever seen. `None` when nothing can be resolved.
pub fn resolve_start<H: PinHistory + ?Sized>(
    history: &H,
    client: &str,
    pin: PinIndex,
    alarm_id: i64,
) -> AppResult<Option<Mark>> {
    let last_safe = history.last_at_level(client, pin, PinLevel::Low, alarm_id)?;
    history.first_at_level(
        client,
        pin,
        PinLevel::High,
        last_safe.map(|m| m.id),
        alarm_id,
    )
}

/// Current or most recent episode of (client, pin) as of reading `as_of`.
///
/// - pin active on the latest reading: open episode, `end_time = None`;
/// - pin inactive: the last episode that closed on a falling edge, ending
///   at the reading that carried the `0`;
/// - pin absent, never active, or last alarm not closed by a `0`: `None`.
pub fn resolve_episode<H: PinHistory + ?Sized>(
    history: &H,
    client: &str,
    pin: PinIndex,
    as_of: i64,
) -> AppResult<Option<EpisodeView>> {
    let Some((latest, level)) = history.sample_at_or_before(client, pin, as_of)? else {
        return Ok(None);
    };

    match level {
        None => Ok(None),

        Some(PinLevel::High) => {
            let start = resolve_start(history, client, pin, latest.id)?;
            Ok(start.map(|s| EpisodeView {
                is_active: true,
                start_time: s.at,
                end_time: None,
            }))
        }

        Some(PinLevel::Low) => {
            let Some(last_alarm) = history.last_at_level(client, pin, PinLevel::High, latest.id)?
            else {
                return Ok(None);
            };

            // The falling edge is the reading right after the last alarm one.
            let closing = history.sample_after(client, pin, last_alarm.id, as_of)?;
            let Some((closing, Some(PinLevel::Low))) = closing else {
                return Ok(None);
            };

            let start = resolve_start(history, client, pin, last_alarm.id)?;
            Ok(start.map(|s| EpisodeView {
                is_active: false,
                start_time: s.at,
                end_time: Some(closing.at),
            }))
        }
    }
}
