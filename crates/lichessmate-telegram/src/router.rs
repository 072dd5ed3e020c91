use std::sync::{Arc, Mutex};

use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    dptree,
    prelude::*,
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use lichessmate_core::{
    api::ApiGateway,
    config::{Config, SettingsStore},
    messaging::{port::Notifier, throttled::ThrottledNotifier},
    poller::LivePoller,
    query::GameQuery,
};

use crate::handlers;
use crate::TelegramNotifier;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub settings: Arc<SettingsStore>,
    pub query: Arc<GameQuery>,
    pub control: Arc<BotControl>,
    /// Our own username, used to ignore `/cmd@otherbot` in group chats.
    pub bot_username: Option<String>,
}

/// Why the update dispatcher was asked to stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    /// Drop the connection and reconnect after the configured delay.
    Disconnect,
    /// Stop everything and let the process exit.
    Die,
}

/// Lets command handlers stop the dispatcher they are running under.
pub struct BotControl {
    exit: Mutex<Option<Exit>>,
    dispatcher: Mutex<Option<ShutdownToken>>,
    cancel: CancellationToken,
}

impl BotControl {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            exit: Mutex::new(None),
            dispatcher: Mutex::new(None),
            cancel,
        }
    }

    fn attach(&self, token: ShutdownToken) {
        if let Ok(mut slot) = self.dispatcher.lock() {
            *slot = Some(token);
        }
    }

    pub fn request(&self, exit: Exit) {
        if let Ok(mut slot) = self.exit.lock() {
            // A pending Die is never downgraded to a reconnect.
            if *slot != Some(Exit::Die) {
                *slot = Some(exit);
            }
        }
        if exit == Exit::Die {
            self.cancel.cancel();
        }

        let token = self.dispatcher.lock().ok().and_then(|t| t.clone());
        if let Some(token) = token {
            // The returned future only waits for in-flight handlers, one of
            // which is probably the caller.
            if token.shutdown().is_err() {
                warn!("Dispatcher is not running");
            }
        }
    }

    fn take_exit(&self) -> Option<Exit> {
        self.exit.lock().ok().and_then(|mut e| e.take())
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` until it finishes or a `Die` request lands, whichever is
    /// first. A `Die` issued before the dispatcher was attached still stops it.
    pub async fn run_until_stopped<F: std::future::Future>(&self, fut: F) -> Option<F::Output> {
        self.cancel.run_until_cancelled(fut).await
    }
}

pub async fn run(
    cfg: Arc<Config>,
    settings: Arc<SettingsStore>,
    api: Arc<dyn ApiGateway>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("lichessmate started: @{}", me.username());
            Some(me.username().to_string())
        }
        Err(e) => {
            warn!("Could not fetch bot identity: {e}");
            None
        }
    };
    info!("Channel: {}", cfg.channel.0);
    info!("Admins: {}", cfg.admin_users.len());

    // Both the poller and the query path send through this one throttled notifier.
    let raw_notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone(), cfg.channel));
    let notifier: Arc<dyn Notifier> = Arc::new(ThrottledNotifier::new(
        raw_notifier,
        cfg.send_min_interval,
    ));

    let cancel = CancellationToken::new();
    let poller = LivePoller::new(api.clone(), notifier.clone(), settings.subscribe())
        .spawn(cancel.clone());

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        settings,
        query: Arc::new(GameQuery::new(api, notifier, cfg.query_min_length)),
        control: Arc::new(BotControl::new(cancel.clone())),
        bot_username,
    });

    {
        let control = state.control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                control.request(Exit::Die);
            }
        });
    }

    loop {
        if state.control.is_stopping() {
            break;
        }

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handlers::handle_message));
        let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
            .dependencies(dptree::deps![state.clone()])
            .build();
        state.control.attach(dispatcher.shutdown_token());

        info!("Listening for chat updates");
        if state
            .control
            .run_until_stopped(dispatcher.dispatch())
            .await
            .is_none()
        {
            info!("Dispatcher stopped by shutdown request");
            break;
        }

        match state.control.take_exit() {
            Some(Exit::Disconnect) => {
                info!(
                    "Disconnected; reconnecting in {}s",
                    cfg.reconnect_delay.as_secs()
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(cfg.reconnect_delay) => {}
                }
            }
            Some(Exit::Die) | None => break,
        }
    }

    cancel.cancel();
    if let Err(e) = poller.await {
        warn!("Live poller task failed: {e}");
    }
    info!("lichessmate stopped");

    Ok(())
}
