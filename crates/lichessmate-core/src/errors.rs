/// Core error type.
///
/// Adapter crates map their client errors into this type so the poller and the
/// query path can log and recover from failures consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
