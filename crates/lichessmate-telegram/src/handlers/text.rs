use std::sync::Arc;

use teloxide::prelude::*;
use tracing::debug;

use crate::router::AppState;

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if state.query.handle_message(text).await {
        debug!("Answered game query from chat {}", msg.chat.id.0);
    }
    Ok(())
}
