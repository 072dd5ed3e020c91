//! Game URL recognition.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::GameId;

// Whole-message match: https, optional two-letter locale subdomain, the game id
// segment, then an optional `/color` or `#ply` style suffix.
const GAME_URL_PATTERN: &str = r"^https://(?:[a-zA-Z]{2}\.)?lichess\.org/(?P<id>\w+)/?[#\w]*$";

fn game_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(GAME_URL_PATTERN).expect("valid regex"))
}

/// Extract the game id when `msg` is exactly a Lichess game URL.
pub fn parse_game_id(msg: &str) -> Option<GameId> {
    let caps = game_url_re().captures(msg)?;
    let id = caps.name("id")?.as_str();
    if id.is_empty() {
        return None;
    }
    Some(GameId(id.to_string()))
}
