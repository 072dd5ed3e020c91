//! Live-game poller.
//!
//! Every tick the poller asks Lichess which monitored players are in a game,
//! picks one that has not been announced recently, and posts a `LIVE:` line
//! with the game summary and the player's TV link.
//!
//! The poller task owns all of its state (last check time and cooldowns); the
//! chat side only ever sees the shared notifier and the settings store.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::{self, ApiGateway},
    config::Settings,
    cooldown::CooldownTracker,
    domain::PlayerId,
    gameref::parse_game_id,
    messaging::port::Notifier,
    summary::{format_live, format_summary},
};

/// Picks the player to announce among the current candidates.
pub trait Chooser: Send + Sync {
    fn choose<'a>(&self, candidates: &'a [PlayerId]) -> Option<&'a PlayerId>;
}

/// Uniform random pick.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomChooser;

impl Chooser for RandomChooser {
    fn choose<'a>(&self, candidates: &'a [PlayerId]) -> Option<&'a PlayerId> {
        candidates.choose(&mut rand::rng())
    }
}

/// Mutable state of the poller. Lives only inside the poller task.
#[derive(Debug, Default)]
pub struct PollState {
    /// `None` until the first report; a poller that never reported is always due.
    pub last_check: Option<Instant>,
    pub cooldowns: CooldownTracker,
}

/// How a poll cycle ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Less than one poll interval since the last report.
    Throttled,
    /// Status request failed or was rate limited.
    NoData,
    /// Nobody is playing, or everyone playing is on cooldown.
    NoCandidates,
    /// The chosen player's profile had no current game.
    NoCurrentGame,
    /// Profile or game could not be fetched.
    GameUnavailable,
    Reported { player: PlayerId, delivered: bool },
}

pub struct LivePoller {
    api: Arc<dyn ApiGateway>,
    notifier: Arc<dyn Notifier>,
    chooser: Box<dyn Chooser>,
    settings: watch::Receiver<Arc<Settings>>,
    state: PollState,
}

impl LivePoller {
    pub fn new(
        api: Arc<dyn ApiGateway>,
        notifier: Arc<dyn Notifier>,
        settings: watch::Receiver<Arc<Settings>>,
    ) -> Self {
        Self::with_chooser(api, notifier, settings, Box::new(RandomChooser))
    }

    pub fn with_chooser(
        api: Arc<dyn ApiGateway>,
        notifier: Arc<dyn Notifier>,
        settings: watch::Receiver<Arc<Settings>>,
        chooser: Box<dyn Chooser>,
    ) -> Self {
        Self {
            api,
            notifier,
            chooser,
            settings,
            state: PollState::default(),
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Move the poller into its own task. It ticks every `poll_interval`
    /// (re-read from settings on each tick) until `cancel` fires.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Live poller started");
            loop {
                let interval = self.settings.borrow().poll_interval();
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(interval) => {
                        let outcome = self.run_cycle().await;
                        debug!("Poll cycle finished: {outcome:?}");
                    }
                }
            }
            info!("Live poller stopped");
        })
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.run_cycle_at(Instant::now()).await
    }

    /// One check-and-announce pass, using `now` for all cooldown bookkeeping.
    pub async fn run_cycle_at(&mut self, now: Instant) -> CycleOutcome {
        let settings = self.settings.borrow().clone();

        let evicted = self
            .state
            .cooldowns
            .evict_expired(now, settings.report_cooldown());
        if evicted > 0 {
            debug!("{evicted} player(s) left cooldown");
        }

        // This guard, not the tick timer, decides whether a cycle may run.
        if let Some(last) = self.state.last_check {
            let elapsed = now.saturating_duration_since(last);
            if elapsed <= settings.poll_interval() {
                debug!(
                    "Skipping check: {}s since last report (interval {}s)",
                    elapsed.as_secs(),
                    settings.poll_interval_secs
                );
                return CycleOutcome::Throttled;
            }
        }

        if settings.players.is_empty() {
            debug!("No players configured");
            return CycleOutcome::NoCandidates;
        }

        info!(
            "Checking {} player(s) (interval {}s)",
            settings.players.len(),
            settings.poll_interval_secs
        );
        let statuses = match api::fetch_statuses(self.api.as_ref(), &settings.players).await {
            Ok(Some(s)) => s,
            Ok(None) => return CycleOutcome::NoData,
            Err(e) => {
                warn!("Status check failed: {e}");
                return CycleOutcome::NoData;
            }
        };

        let candidates: Vec<PlayerId> = statuses
            .into_iter()
            .filter(|s| s.is_playing() && !self.state.cooldowns.is_on_cooldown(&s.id))
            .map(|s| s.id)
            .collect();

        let Some(player) = self.chooser.choose(&candidates).cloned() else {
            debug!("No live candidates");
            return CycleOutcome::NoCandidates;
        };

        let line = match self.live_line(&player).await {
            Ok(line) => line,
            Err(outcome) => return outcome,
        };

        let delivered = match self.notifier.send_text(&line).await {
            Ok(()) => {
                info!("{line}");
                true
            }
            Err(e) => {
                warn!("Failed to announce {player}: {e}");
                false
            }
        };

        self.state.last_check = Some(now);
        self.state.cooldowns.mark_reported(player.clone(), now);
        info!(
            "{player} on cooldown for {}s",
            settings.report_cooldown_secs
        );

        CycleOutcome::Reported { player, delivered }
    }

    /// Build the announcement for `player`; `Err` carries the outcome that
    /// ends the cycle early.
    async fn live_line(&self, player: &PlayerId) -> std::result::Result<String, CycleOutcome> {
        let user = match api::fetch_user(self.api.as_ref(), player).await {
            Ok(Some(u)) => u,
            Ok(None) => return Err(CycleOutcome::GameUnavailable),
            Err(e) => {
                warn!("Failed to fetch profile of {player}: {e}");
                return Err(CycleOutcome::GameUnavailable);
            }
        };
        let tv_url = user.tv_url();

        let Some(game_id) = user.playing.as_deref().and_then(parse_game_id) else {
            debug!("{player} has no current game");
            return Err(CycleOutcome::NoCurrentGame);
        };

        let game = match api::fetch_game(self.api.as_ref(), &game_id, false).await {
            Ok(Some(g)) => g,
            Ok(None) => return Err(CycleOutcome::GameUnavailable),
            Err(e) => {
                warn!("Failed to fetch game {game_id}: {e}");
                return Err(CycleOutcome::GameUnavailable);
            }
        };

        Ok(format_live(&format_summary(&game, false), &tv_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsStore;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Reply {
        Data(serde_json::Value),
        Backoff,
        Fail,
    }

    #[derive(Default)]
    struct FakeApi {
        replies: Mutex<HashMap<String, Reply>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn reply(self, path: &str, reply: Reply) -> Self {
            self.replies.lock().unwrap().insert(path.to_string(), reply);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApiGateway for FakeApi {
        async fn send(&self, path: &str) -> Result<Option<serde_json::Value>> {
            self.calls.lock().unwrap().push(path.to_string());
            match self.replies.lock().unwrap().get(path) {
                Some(Reply::Data(v)) => Ok(Some(v.clone())),
                Some(Reply::Backoff) => Ok(None),
                Some(Reply::Fail) | None => Err(Error::Transport(format!("no route {path}"))),
            }
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send_text(&self, text: &str) -> Result<()> {
            if self.fail {
                return Err(Error::Delivery("channel unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct FirstChooser;

    impl Chooser for FirstChooser {
        fn choose<'a>(&self, candidates: &'a [PlayerId]) -> Option<&'a PlayerId> {
            candidates.first()
        }
    }

    const INTERVAL: Duration = Duration::from_secs(300);
    const COOLDOWN: Duration = Duration::from_secs(3600);

    fn settings(players: &[&str]) -> Settings {
        Settings {
            players: players.iter().map(|p| PlayerId::from(*p)).collect(),
            poll_interval_secs: INTERVAL.as_secs(),
            report_cooldown_secs: COOLDOWN.as_secs(),
        }
    }

    fn game_json() -> serde_json::Value {
        json!({
            "id": "mpTZiTC9",
            "clock": {"initial": 180, "increment": 2, "totalTime": 260},
            "players": {
                "white": {"userId": "piscean64", "rating": 2461},
                "black": {"userId": "off_white", "rating": 2529}
            },
            "opening": {"eco": "A13", "name": "English Opening: Agincourt Defense"}
        })
    }

    fn live_api() -> FakeApi {
        FakeApi::default()
            .reply(
                "users/status?ids=alice,bob",
                Reply::Data(json!([
                    {"id": "alice", "name": "Alice", "online": true, "playing": true},
                    {"id": "bob", "name": "Bob", "online": true}
                ])),
            )
            .reply(
                "user/alice",
                Reply::Data(json!({
                    "id": "alice",
                    "url": "https://lichess.org/@/alice",
                    "playing": "https://lichess.org/mpTZiTC9/white"
                })),
            )
            .reply("game/mpTZiTC9?with_opening=0", Reply::Data(game_json()))
    }

    struct Harness {
        poller: LivePoller,
        api: Arc<FakeApi>,
        notifier: Arc<FakeNotifier>,
        store: SettingsStore,
    }

    fn harness(api: FakeApi, notifier: FakeNotifier) -> Harness {
        let api = Arc::new(api);
        let notifier = Arc::new(notifier);
        let store = SettingsStore::with_settings("settings.toml", settings(&["alice", "bob"]));
        let poller = LivePoller::with_chooser(
            api.clone(),
            notifier.clone(),
            store.subscribe(),
            Box::new(FirstChooser),
        );
        Harness {
            poller,
            api,
            notifier,
            store,
        }
    }

    #[tokio::test]
    async fn reports_single_live_player_once() {
        let mut h = harness(live_api(), FakeNotifier::default());
        let t = Instant::now();

        let outcome = h.poller.run_cycle_at(t).await;

        assert_eq!(
            outcome,
            CycleOutcome::Reported {
                player: PlayerId::from("alice"),
                delivered: true
            }
        );
        assert_eq!(
            h.api.calls(),
            [
                "users/status?ids=alice,bob",
                "user/alice",
                "game/mpTZiTC9?with_opening=0"
            ]
        );
        assert_eq!(
            h.notifier.sent.lock().unwrap().as_slice(),
            ["LIVE: piscean64(2461) vs. off_white(2529) [3+2]  @ https://lichess.org/@/alice/tv"]
        );
        assert!(h.poller.state().cooldowns.is_on_cooldown(&PlayerId::from("alice")));
        assert_eq!(h.poller.state().last_check, Some(t));
    }

    #[tokio::test]
    async fn second_cycle_within_interval_makes_no_calls() {
        let mut h = harness(live_api(), FakeNotifier::default());
        let t = Instant::now();

        h.poller.run_cycle_at(t).await;
        let calls = h.api.calls().len();

        let outcome = h.poller.run_cycle_at(t + Duration::from_secs(10)).await;
        assert_eq!(outcome, CycleOutcome::Throttled);
        let outcome = h.poller.run_cycle_at(t + INTERVAL).await;
        assert_eq!(outcome, CycleOutcome::Throttled);
        assert_eq!(h.api.calls().len(), calls);
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reported_player_stays_quiet_until_cooldown_expires() {
        let mut h = harness(live_api(), FakeNotifier::default());
        let t = Instant::now();

        h.poller.run_cycle_at(t).await;

        let next = t + INTERVAL + Duration::from_secs(1);
        assert_eq!(h.poller.run_cycle_at(next).await, CycleOutcome::NoCandidates);
        // The status call happened, but nothing after it.
        assert_eq!(h.api.calls().len(), 4);

        let later = t + COOLDOWN + Duration::from_secs(1);
        assert!(matches!(
            h.poller.run_cycle_at(later).await,
            CycleOutcome::Reported { .. }
        ));
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rate_limited_status_skips_cycle() {
        let api = FakeApi::default().reply("users/status?ids=alice,bob", Reply::Backoff);
        let mut h = harness(api, FakeNotifier::default());

        assert_eq!(h.poller.run_cycle_at(Instant::now()).await, CycleOutcome::NoData);
        assert_eq!(h.api.calls().len(), 1);
        assert!(h.poller.state().last_check.is_none());
    }

    #[tokio::test]
    async fn failed_status_skips_cycle() {
        let api = FakeApi::default().reply("users/status?ids=alice,bob", Reply::Fail);
        let mut h = harness(api, FakeNotifier::default());

        assert_eq!(h.poller.run_cycle_at(Instant::now()).await, CycleOutcome::NoData);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn nobody_playing_means_no_candidates() {
        let api = FakeApi::default().reply(
            "users/status?ids=alice,bob",
            Reply::Data(json!([{"id": "alice"}, {"id": "bob", "playing": false}])),
        );
        let mut h = harness(api, FakeNotifier::default());

        assert_eq!(
            h.poller.run_cycle_at(Instant::now()).await,
            CycleOutcome::NoCandidates
        );
        assert_eq!(h.api.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_current_game_does_not_advance_last_check() {
        let api = live_api().reply(
            "user/alice",
            Reply::Data(json!({"id": "alice", "url": "https://lichess.org/@/alice"})),
        );
        let mut h = harness(api, FakeNotifier::default());
        let t = Instant::now();

        assert_eq!(h.poller.run_cycle_at(t).await, CycleOutcome::NoCurrentGame);
        assert!(h.poller.state().last_check.is_none());
        assert!(h.poller.state().cooldowns.is_empty());

        // Next tick retries straight away.
        assert_eq!(
            h.poller.run_cycle_at(t + Duration::from_secs(1)).await,
            CycleOutcome::NoCurrentGame
        );
        assert_eq!(h.api.calls().len(), 4);
    }

    #[tokio::test]
    async fn failed_game_fetch_leaves_state_untouched() {
        let api = live_api().reply("game/mpTZiTC9?with_opening=0", Reply::Fail);
        let mut h = harness(api, FakeNotifier::default());

        assert_eq!(
            h.poller.run_cycle_at(Instant::now()).await,
            CycleOutcome::GameUnavailable
        );
        assert!(h.poller.state().last_check.is_none());
        assert!(h.poller.state().cooldowns.is_empty());
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_still_records_report() {
        let notifier = FakeNotifier {
            fail: true,
            ..Default::default()
        };
        let mut h = harness(live_api(), notifier);
        let t = Instant::now();

        assert_eq!(
            h.poller.run_cycle_at(t).await,
            CycleOutcome::Reported {
                player: PlayerId::from("alice"),
                delivered: false
            }
        );
        assert_eq!(h.poller.state().last_check, Some(t));
        assert!(h.poller.state().cooldowns.is_on_cooldown(&PlayerId::from("alice")));
    }

    #[tokio::test]
    async fn reloaded_settings_apply_on_next_cycle() {
        let api = FakeApi::default().reply(
            "users/status?ids=carol",
            Reply::Data(json!([{"id": "carol"}])),
        );
        let mut h = harness(api, FakeNotifier::default());
        h.store.replace(settings(&["carol"]));

        assert_eq!(
            h.poller.run_cycle_at(Instant::now()).await,
            CycleOutcome::NoCandidates
        );
        assert_eq!(h.api.calls(), ["users/status?ids=carol"]);
    }

    #[tokio::test]
    async fn empty_player_list_skips_api() {
        let mut h = harness(FakeApi::default(), FakeNotifier::default());
        h.store.replace(settings(&[]));

        assert_eq!(
            h.poller.run_cycle_at(Instant::now()).await,
            CycleOutcome::NoCandidates
        );
        assert!(h.api.calls().is_empty());
    }

    #[test]
    fn random_chooser_picks_a_candidate() {
        let candidates = vec![PlayerId::from("a"), PlayerId::from("b")];
        let picked = RandomChooser.choose(&candidates).unwrap();
        assert!(candidates.contains(picked));
        assert!(RandomChooser.choose(&[]).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_poller_ticks_and_stops_on_cancel() {
        let api = FakeApi::default().reply("users/status?ids=alice,bob", Reply::Backoff);
        let h = harness(api, FakeNotifier::default());
        let api = h.api.clone();
        let cancel = CancellationToken::new();

        let handle = h.poller.spawn(cancel.clone());
        assert!(api.calls().is_empty());

        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(api.calls().len(), 1);

        cancel.cancel();
        handle.await.unwrap();
        drop(h.store);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_poller_throttles_then_reports_again_after_cooldown() {
        let h = harness(live_api(), FakeNotifier::default());
        h.store.replace(Settings {
            report_cooldown_secs: INTERVAL.as_secs(),
            ..settings(&["alice", "bob"])
        });
        let api = h.api.clone();
        let notifier = h.notifier.clone();
        let cancel = CancellationToken::new();

        let handle = h.poller.spawn(cancel.clone());

        // Tick 1 reports, tick 2 hits the interval guard.
        tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(5)).await;
        assert_eq!(api.calls().len(), 3);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);

        // Tick 3: cooldown has lapsed, alice is announced again.
        tokio::time::sleep(INTERVAL).await;
        assert_eq!(
            api.calls(),
            [
                "users/status?ids=alice,bob",
                "user/alice",
                "game/mpTZiTC9?with_opening=0",
                "users/status?ids=alice,bob",
                "user/alice",
                "game/mpTZiTC9?with_opening=0"
            ]
        );
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);

        cancel.cancel();
        handle.await.unwrap();
        drop(h.store);
    }
}
