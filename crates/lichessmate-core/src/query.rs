//! Replies to game URLs pasted into the channel.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    api::{self, ApiGateway},
    gameref::parse_game_id,
    messaging::port::Notifier,
    summary::format_summary,
    Result,
};

/// Look up the game behind `msg` and summarize it, opening included.
///
/// `Ok(None)` when `msg` is not a game URL or the API had nothing to return.
pub async fn game_info(api: &dyn ApiGateway, msg: &str) -> Result<Option<String>> {
    let Some(game_id) = parse_game_id(msg) else {
        return Ok(None);
    };
    let Some(game) = api::fetch_game(api, &game_id, true).await? else {
        return Ok(None);
    };
    Ok(Some(format_summary(&game, true)))
}

/// The chat-side lookup path. Independent of the poller and its cooldowns.
pub struct GameQuery {
    api: Arc<dyn ApiGateway>,
    notifier: Arc<dyn Notifier>,
    min_length: usize,
}

impl GameQuery {
    pub fn new(api: Arc<dyn ApiGateway>, notifier: Arc<dyn Notifier>, min_length: usize) -> Self {
        Self {
            api,
            notifier,
            min_length,
        }
    }

    /// Answer `text` in the channel if it is a game URL. Returns whether a
    /// reply was sent. Messages of `min_length` characters or fewer are
    /// ignored without parsing.
    pub async fn handle_message(&self, text: &str) -> bool {
        if text.chars().count() <= self.min_length {
            return false;
        }

        let reply = match game_info(self.api.as_ref(), text).await {
            Ok(Some(reply)) => reply,
            Ok(None) => return false,
            Err(e) => {
                warn!("Game lookup failed for {text}: {e}");
                return false;
            }
        };

        match self.notifier.send_text(&reply).await {
            Ok(()) => {
                debug!("Answered game query: {reply}");
                true
            }
            Err(e) => {
                warn!("Failed to answer game query: {e}");
                false
            }
        }
    }
}
