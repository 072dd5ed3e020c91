use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};

use lichessmate_core::domain::UserId;

use crate::router::{AppState, Exit};

#[derive(Debug, PartialEq, Eq)]
struct ParsedCommand {
    name: String,
    /// Bot named in `/cmd@botname`, if any.
    target: Option<String>,
    args: String,
}

fn parse_command(text: &str) -> ParsedCommand {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let args = parts.next().unwrap_or("").trim().to_string();

    let mut head = first.trim_start_matches('/').splitn(2, '@');
    let name = head.next().unwrap_or("").to_lowercase();
    let target = head
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    ParsedCommand { name, target, args }
}

fn addressed_to_us(target: Option<&str>, bot_username: Option<&str>) -> bool {
    match (target, bot_username) {
        (Some(target), Some(me)) => target.eq_ignore_ascii_case(me),
        _ => true,
    }
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let cmd = parse_command(text);
    if !addressed_to_us(cmd.target.as_deref(), state.bot_username.as_deref()) {
        return Ok(());
    }

    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));
    if !state.cfg.is_admin(user_id) {
        let _ = bot.send_message(msg.chat.id, "Unauthorized.").await;
        return Ok(());
    }
    let user_id = user_id.map(|u| u.0).unwrap_or_default();

    match cmd.name.as_str() {
        "reload" => match state.settings.reload() {
            Ok(settings) => {
                info!("Settings reloaded by {user_id}");
                let body = format!(
                    "Settings reloaded: {} players, poll every {}s, cooldown {}s.",
                    settings.players.len(),
                    settings.poll_interval_secs,
                    settings.report_cooldown_secs
                );
                let _ = bot.send_message(msg.chat.id, body).await;
            }
            Err(e) => {
                warn!("Settings reload failed: {e}");
                let _ = bot
                    .send_message(msg.chat.id, format!("Reload failed: {e}"))
                    .await;
            }
        },
        "disconnect" => {
            info!("Disconnect requested by {user_id}");
            let body = format!(
                "Disconnecting. Reconnecting in {}s.",
                state.cfg.reconnect_delay.as_secs()
            );
            let _ = bot.send_message(msg.chat.id, body).await;
            state.control.request(Exit::Disconnect);
        }
        "die" => {
            info!("Shutdown requested by {user_id}");
            let _ = bot.send_message(msg.chat.id, "Bye.").await;
            state.control.request(Exit::Die);
        }
        _ => {
            let shown = if cmd.args.is_empty() {
                format!("/{}", cmd.name)
            } else {
                format!("/{} {}", cmd.name, cmd.args)
            };
            let _ = bot
                .send_message(msg.chat.id, format!("Not understood: {shown}"))
                .await;
        }
    }

    Ok(())
}
