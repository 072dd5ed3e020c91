//! Lichess API port and the typed requests the bot makes through it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    domain::{GameId, PlayerId},
    model::{GameRecord, PlayerStatus, UserProfile},
    Result,
};

/// Port for the Lichess HTTP API.
///
/// `path` is relative to the API base (e.g. `user/alice`). Implementations
/// return `Ok(None)` when the server asked us to back off (HTTP 429), after
/// having waited out the backoff themselves; callers treat that as "nothing to
/// do this time" rather than as a failure.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    async fn send(&self, path: &str) -> Result<Option<serde_json::Value>>;
}

async fn fetch<T: DeserializeOwned>(api: &dyn ApiGateway, path: &str) -> Result<Option<T>> {
    let Some(raw) = api.send(path).await? else {
        debug!("No data for {path}");
        return Ok(None);
    };
    Ok(Some(serde_json::from_value(raw)?))
}

pub fn statuses_path(ids: &[PlayerId]) -> String {
    let joined = ids.iter().map(PlayerId::as_str).collect::<Vec<_>>().join(",");
    format!("users/status?ids={joined}")
}

pub fn user_path(id: &PlayerId) -> String {
    format!("user/{id}")
}

pub fn game_path(id: &GameId, with_opening: bool) -> String {
    format!(
        "game/{id}?with_opening={}",
        if with_opening { "1" } else { "0" }
    )
}

/// Online/playing status for all `ids` in one request.
pub async fn fetch_statuses(
    api: &dyn ApiGateway,
    ids: &[PlayerId],
) -> Result<Option<Vec<PlayerStatus>>> {
    fetch(api, &statuses_path(ids)).await
}

pub async fn fetch_user(api: &dyn ApiGateway, id: &PlayerId) -> Result<Option<UserProfile>> {
    fetch(api, &user_path(id)).await
}

pub async fn fetch_game(
    api: &dyn ApiGateway,
    id: &GameId,
    with_opening: bool,
) -> Result<Option<GameRecord>> {
    fetch(api, &game_path(id, with_opening)).await
}
