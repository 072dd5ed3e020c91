use std::sync::Arc;

use lichessmate_lichess::LichessClient;

use lichessmate_core::config::{Config, SettingsStore};

#[tokio::main]
async fn main() -> Result<(), lichessmate_core::Error> {
    lichessmate_core::logging::init("lichessmate")?;

    let cfg = Arc::new(Config::load()?);
    let settings = Arc::new(SettingsStore::load(cfg.settings_path.clone())?);

    let api = Arc::new(LichessClient::new(
        &cfg.api_url,
        cfg.http_timeout,
        cfg.rate_limit_backoff,
    )?);

    lichessmate_telegram::router::run(cfg, settings, api)
        .await
        .map_err(|e| lichessmate_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
