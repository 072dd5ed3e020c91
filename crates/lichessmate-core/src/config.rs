use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::{
    domain::{ChatId, PlayerId, UserId},
    errors::Error,
    Result,
};

pub const DEFAULT_SETTINGS_PATH: &str = "settings.toml";
pub const DEFAULT_API_URL: &str = "https://lichess.org/api/";

/// Process configuration, read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub channel: ChatId,
    pub admin_users: Vec<UserId>,

    // Lichess
    pub api_url: String,
    pub http_timeout: Duration,
    pub rate_limit_backoff: Duration,

    // Behavior
    pub settings_path: PathBuf,
    pub send_min_interval: Duration,
    pub query_min_length: usize,
    pub reconnect_delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // A missing .env is fine; real env vars always win.
        let _ = dotenvy::dotenv();

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let channel = env_str("LICHESSMATE_CHAT_ID")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(ChatId)
            .ok_or_else(|| {
                Error::Config("LICHESSMATE_CHAT_ID must be a numeric chat id".to_string())
            })?;

        let admin_users: Vec<UserId> = parse_csv_i64(env_str("LICHESSMATE_ADMIN_USERS"))
            .into_iter()
            .map(UserId)
            .collect();
        if admin_users.is_empty() {
            return Err(Error::Config(
                "LICHESSMATE_ADMIN_USERS environment variable is required".to_string(),
            ));
        }

        let api_url = env_str("LICHESS_API_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let http_timeout = Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS").unwrap_or(10));
        let rate_limit_backoff =
            Duration::from_secs(env_u64("RATE_LIMIT_BACKOFF_SECS").unwrap_or(61));

        let settings_path = env_str("LICHESSMATE_SETTINGS")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
        let send_min_interval =
            Duration::from_millis(env_u64("SEND_MIN_INTERVAL_MS").unwrap_or(1000));
        let query_min_length = env_usize("QUERY_MIN_LENGTH").unwrap_or(20);
        let reconnect_delay = Duration::from_secs(env_u64("RECONNECT_DELAY_SECS").unwrap_or(60));

        Ok(Self {
            telegram_bot_token,
            channel,
            admin_users,
            api_url,
            http_timeout,
            rate_limit_backoff,
            settings_path,
            send_min_interval,
            query_min_length,
            reconnect_delay,
        })
    }

    pub fn is_admin(&self, user_id: Option<UserId>) -> bool {
        user_id.is_some_and(|id| self.admin_users.contains(&id))
    }
}

/// Runtime settings, reloadable from `settings.toml` without a restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Lichess usernames to watch.
    #[serde(default)]
    pub players: Vec<PlayerId>,
    /// Minimum time between two live-game checks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// How long a reported player stays quiet before being announced again.
    #[serde(default = "default_report_cooldown")]
    pub report_cooldown_secs: u64,
}

fn default_poll_interval() -> u64 {
    300
}

fn default_report_cooldown() -> u64 {
    3600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            poll_interval_secs: default_poll_interval(),
            report_cooldown_secs: default_report_cooldown(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::Config(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn report_cooldown(&self) -> Duration {
        Duration::from_secs(self.report_cooldown_secs)
    }
}

/// Publishes the current [`Settings`] snapshot to the poller.
///
/// Readers hold an `Arc<Settings>` for as long as they need it, so a reload
/// never changes values under a running poll cycle.
pub struct SettingsStore {
    path: PathBuf,
    tx: watch::Sender<Arc<Settings>>,
}

impl SettingsStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = Settings::load(&path)?;
        info!(
            "Loaded settings from {} ({} players)",
            path.display(),
            settings.players.len()
        );
        Ok(Self::with_settings(path, settings))
    }

    pub fn with_settings(path: impl Into<PathBuf>, settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(settings));
        Self {
            path: path.into(),
            tx,
        }
    }

    pub fn current(&self) -> Arc<Settings> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Settings>> {
        self.tx.subscribe()
    }

    /// Re-read the settings file. On error the previous settings stay active.
    pub fn reload(&self) -> Result<Arc<Settings>> {
        let settings = Arc::new(Settings::load(&self.path)?);
        self.tx.send_replace(settings.clone());
        info!(
            "Reloaded settings from {} ({} players)",
            self.path.display(),
            settings.players.len()
        );
        Ok(settings)
    }

    pub fn replace(&self, settings: Settings) {
        self.tx.send_replace(Arc::new(settings));
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
