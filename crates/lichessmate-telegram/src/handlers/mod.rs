//! Telegram update handlers.
//!
//! Commands (`/reload`, `/disconnect`, `/die`) are accepted from admins in any
//! chat. Plain text is only looked at when it comes from the channel chat.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;
mod text;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Command,
    Query,
    Ignore,
}

fn route(text: Option<&str>, chat_id: i64, channel: i64) -> Route {
    match text {
        None => Route::Ignore,
        Some(t) if t.starts_with('/') => Route::Command,
        Some(_) if chat_id == channel => Route::Query,
        Some(_) => Route::Ignore,
    }
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    match route(msg.text(), msg.chat.id.0, state.cfg.channel.0) {
        Route::Command => commands::handle_command(bot, msg, state).await,
        Route::Query => text::handle_text(msg, state).await,
        Route::Ignore => Ok(()),
    }
}
