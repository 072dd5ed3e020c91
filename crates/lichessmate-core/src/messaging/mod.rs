//! Outbound chat messaging.

pub mod port;
pub mod throttled;
