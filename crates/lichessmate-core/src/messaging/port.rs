use async_trait::async_trait;

use crate::Result;

/// Delivers text to the bot's channel.
///
/// Callers treat delivery as fire-and-forget: a failed send is logged, never
/// propagated into the poller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
}
