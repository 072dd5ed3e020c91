use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{messaging::port::Notifier, Result};

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// Notifier decorator that spaces outbound sends at least `min_interval` apart.
///
/// The poller and the chat query path share one instance, so their sends are
/// serialized through a single slot reservation and never burst past the chat
/// service's flood limits.
pub struct ThrottledNotifier {
    inner: Arc<dyn Notifier>,
    limiter: Mutex<IntervalLimiter>,
}

impl ThrottledNotifier {
    pub fn new(inner: Arc<dyn Notifier>, min_interval: Duration) -> Self {
        Self {
            inner,
            limiter: Mutex::new(IntervalLimiter::new(min_interval)),
        }
    }

    async fn throttle(&self) {
        let wait = { self.limiter.lock().await.reserve_at(Instant::now()) };
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl Notifier for ThrottledNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.throttle().await;
        self.inner.send_text(text).await
    }
}
