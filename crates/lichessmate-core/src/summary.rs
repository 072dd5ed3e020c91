//! One-line game summaries posted to the channel.

use crate::model::{Clock, GameRecord};

/// `minutes+increment` for real-time games, e.g. `5+5` or `15+15`.
///
/// Initial times under a minute are kept in seconds (`30+0`); longer ones are
/// truncated to whole minutes.
pub fn format_clock(clock: &Clock) -> String {
    let initial = if clock.initial > 59 {
        clock.initial / 60
    } else {
        clock.initial
    };
    format!("{initial}+{}", clock.increment)
}

/// `white(rating) vs. black(rating) [clock] opening`.
///
/// The separator before the opening is always present, so a summary without an
/// opening ends with a single space.
pub fn format_summary(game: &GameRecord, include_opening: bool) -> String {
    let white = &game.players.white;
    let black = &game.players.black;
    let opening = if include_opening {
        game.opening
            .as_ref()
            .and_then(|o| o.name.as_deref())
            .unwrap_or("")
    } else {
        ""
    };

    format!(
        "{}({}) vs. {}({}) [{}] {}",
        white.display_name(),
        white.rating_text(),
        black.display_name(),
        black.rating_text(),
        format_clock(&game.clock),
        opening
    )
}

/// Announcement for a game picked up by the poller.
pub fn format_live(summary: &str, tv_url: &str) -> String {
    format!("LIVE: {summary} @ {tv_url}")
}
