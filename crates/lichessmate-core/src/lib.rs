//! Core logic for lichessmate: live-game announcements and game lookups.
//!
//! This crate is intentionally framework-agnostic. The Lichess HTTP API and the
//! Telegram chat live behind ports (traits) implemented in adapter crates.

pub mod api;
pub mod config;
pub mod cooldown;
pub mod domain;
pub mod errors;
pub mod gameref;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod poller;
pub mod query;
pub mod summary;

pub use errors::{Error, Result};
