//! Lichess API payloads.
//!
//! Every field the bot reads is optional on the wire; the defaults used when a
//! field is missing are spelled out here rather than left to the call sites.

use serde::Deserialize;

use crate::domain::PlayerId;

/// One entry of `GET users/status?ids=...`.
#[derive(Clone, Debug, Deserialize)]
pub struct PlayerStatus {
    pub id: PlayerId,
    /// Absent when the player is not in a game.
    #[serde(default)]
    pub playing: Option<bool>,
}

impl PlayerStatus {
    pub fn is_playing(&self) -> bool {
        self.playing.unwrap_or(false)
    }
}

/// Subset of `GET user/{id}`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserProfile {
    /// Profile page, e.g. `https://lichess.org/@/alice`.
    #[serde(default)]
    pub url: Option<String>,
    /// URL of the game currently being played, if any.
    #[serde(default)]
    pub playing: Option<String>,
}

impl UserProfile {
    /// Lichess TV page following this player.
    pub fn tv_url(&self) -> String {
        format!("{}/tv", self.url.as_deref().unwrap_or(""))
    }
}

/// Subset of `GET game/{id}`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GameRecord {
    #[serde(default)]
    pub players: Players,
    #[serde(default)]
    pub clock: Clock,
    #[serde(default)]
    pub opening: Option<Opening>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Players {
    #[serde(default)]
    pub white: PlayerSide,
    #[serde(default)]
    pub black: PlayerSide,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlayerSide {
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
    /// Display name, set for anonymous players.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rating: Option<i64>,
}

impl PlayerSide {
    /// `userId` when present and non-empty, else `name`, else empty.
    pub fn display_name(&self) -> &str {
        self.user_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.name.as_deref())
            .unwrap_or("")
    }

    /// Rating as sent by the server, empty when unrated or missing.
    pub fn rating_text(&self) -> String {
        self.rating.map(|r| r.to_string()).unwrap_or_default()
    }
}

/// Time control in seconds. Correspondence games have no clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Clock {
    #[serde(default)]
    pub initial: i64,
    #[serde(default)]
    pub increment: i64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Opening {
    #[serde(default)]
    pub name: Option<String>,
}
