//! Per-subscriber polling loop.
//!
//! ```text
//!  Starting ──open + load──▶ Polling ──clinch──▶ Ended
//!     │                        │  ▲
//!     │ not found / parse      │  └── tick: fetch → diff → edit message
//!     ▼                        │
//!   Failed ◀── too many bad ticks / page gone
//!                              │
//!                  cancel ───▶ Cancelled
//! ```
//!
//! The feed is always closed before the session reports its outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::SessionControl;
use super::render;
use super::{SessionOutcome, SessionState, SubscriberKey};
use crate::error::WatchError;
use crate::hltv::{MatchFeed, MatchSource};
use crate::scoring::{active_map, classify_change, has_changed, MapScore, MatchState, ScoringRule};
use crate::telegram::{MessageId, Notifier};

/// Knobs shared by every session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    /// Consecutive failed polls tolerated before giving up
    pub max_consecutive_failures: u32,
    pub rule: ScoringRule,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            poll_interval: Duration::from_secs(1),
            max_consecutive_failures: 30,
            rule: ScoringRule::STANDARD,
        }
    }
}

/// One subscriber following one match.
pub struct WatchSession {
    key: SubscriberKey,
    match_id: String,
    source: Arc<dyn MatchSource>,
    notifier: Arc<dyn Notifier>,
    settings: SessionSettings,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
}

impl WatchSession {
    pub fn new(
        key: SubscriberKey,
        match_id: &str,
        source: Arc<dyn MatchSource>,
        notifier: Arc<dyn Notifier>,
        settings: SessionSettings,
        control: SessionControl,
    ) -> Self {
        WatchSession {
            key,
            match_id: match_id.to_string(),
            source,
            notifier,
            settings,
            cancel: control.cancel,
            state: control.state,
        }
    }

    /// Drive the session to completion.
    pub async fn run(self) -> SessionOutcome {
        info!("Watch session starting (source: {})", self.source.name());
        self.set_state(SessionState::Starting);
        self.notify(render::LOADING).await;

        let opened = self
            .until_cancelled(self.source.open(&self.match_id))
            .await
            .and_then(|r| r);

        let outcome = match opened {
            Ok(mut feed) => {
                let outcome = self.watch(feed.as_mut()).await;
                feed.close().await;
                outcome
            }
            Err(WatchError::Terminated) => SessionOutcome::Cancelled,
            Err(e) => self.fail_start(e).await,
        };

        match &outcome {
            SessionOutcome::Ended => info!("Watch session ended: match is over"),
            SessionOutcome::Cancelled => info!("Watch session cancelled"),
            SessionOutcome::Failed(e) => warn!("Watch session failed: {}", e),
        }
        self.set_state(outcome.state());
        outcome
    }

    async fn watch(&self, feed: &mut dyn MatchFeed) -> SessionOutcome {
        let loaded = self.until_cancelled(feed.load_match()).await.and_then(|r| r);
        let mut state = match loaded {
            Ok(state) => state,
            Err(WatchError::Terminated) => return SessionOutcome::Cancelled,
            Err(e) => return self.fail_start(e).await,
        };

        info!(
            "Tracking {} vs {} (BO{}, {} map(s) listed)",
            state.left_team,
            state.right_team,
            state.best_of,
            state.maps.len()
        );

        let score = self.settings.rule.series_score(&state);
        let message_id = self.send(&render::render_match(&state, &score)).await;

        self.set_state(SessionState::Polling);
        match self.poll(feed, &mut state, message_id).await {
            Ok(()) => SessionOutcome::Ended,
            Err(WatchError::Terminated) => SessionOutcome::Cancelled,
            Err(e) => {
                self.notify(render::LOST_TRACK).await;
                SessionOutcome::Failed(e)
            }
        }
    }

    /// Poll until the series is clinched. Returns `Err(Terminated)` on
    /// cancellation and any other error once the session can't go on.
    async fn poll(
        &self,
        feed: &mut dyn MatchFeed,
        state: &mut MatchState,
        mut message_id: Option<MessageId>,
    ) -> Result<(), WatchError> {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut previous: Vec<MapScore> = Vec::new();
        let mut failures = 0u32;

        loop {
            self.until_cancelled(ticker.tick()).await?;

            let maps = match self.until_cancelled(feed.map_scores()).await? {
                Ok(maps) => {
                    failures = 0;
                    maps
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    warn!(
                        "Poll failed ({}/{}), skipping tick: {}",
                        failures, self.settings.max_consecutive_failures, e
                    );
                    if failures >= self.settings.max_consecutive_failures {
                        return Err(e);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            state.set_maps(maps);

            if has_changed(&previous, &state.maps) {
                if let Some(change) = classify_change(&previous, &state.maps) {
                    debug!("Scoreboard changed: {:?}", change);
                }
                previous = state.maps.clone();
                self.publish(state, &mut message_id).await;
            }

            if self.settings.rule.is_match_end(state) {
                let score = self.settings.rule.series_score(state);
                self.notify(&render::render_ended(state, &score)).await;
                return Ok(());
            }
        }
    }

    /// Edit the tracked message with the live map, if any map has started.
    async fn publish(&self, state: &MatchState, message_id: &mut Option<MessageId>) {
        let Some(map) = active_map(&state.maps) else {
            return;
        };
        let score = self.settings.rule.series_score(state);
        let text = render::render_update(state, &score, map);

        match *message_id {
            Some(id) => {
                if let Err(e) = self.notifier.edit(self.key, id, &text).await {
                    warn!("Failed to edit message {}: {:#}", id, e);
                }
            }
            // The first message never made it out; try posting a fresh one.
            None => *message_id = self.send(&text).await,
        }
    }

    async fn fail_start(&self, err: WatchError) -> SessionOutcome {
        warn!("Could not start watching: {}", err);
        self.notify(render::NOT_FOUND).await;
        SessionOutcome::Failed(err)
    }

    async fn send(&self, text: &str) -> Option<MessageId> {
        match self.notifier.send(self.key, text).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to send message: {:#}", e);
                None
            }
        }
    }

    async fn notify(&self, text: &str) {
        self.send(text).await;
    }

    /// Race `fut` against cancellation.
    async fn until_cancelled<F: Future>(&self, fut: F) -> Result<F::Output, WatchError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WatchError::Terminated),
            out = fut => Ok(out),
        }
    }

    fn set_state(&self, state: SessionState) {
        debug!("Session state -> {:?}", state);
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{wait_until, FakeNotifier, FakeSource, Step};
    use std::sync::atomic::Ordering;

    const CHAT: SubscriberKey = SubscriberKey(7);

    fn settings() -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_millis(5),
            max_consecutive_failures: 3,
            rule: ScoringRule::STANDARD,
        }
    }

    fn bo3(maps: Vec<MapScore>) -> MatchState {
        MatchState::new(3, "NAVI", "Vitality", maps)
    }

    fn upcoming() -> Vec<MapScore> {
        vec![
            MapScore::not_started("Mirage"),
            MapScore::not_started("Nuke"),
            MapScore::not_started("Ancient"),
        ]
    }

    fn maps(scores: &[(u32, u32)]) -> Vec<MapScore> {
        let mut out = upcoming();
        for (i, (l, r)) in scores.iter().enumerate() {
            out[i].left_score = Some(*l);
            out[i].right_score = Some(*r);
        }
        out
    }

    fn session(
        source: &Arc<FakeSource>,
        notifier: &Arc<FakeNotifier>,
        settings: SessionSettings,
    ) -> (WatchSession, CancellationToken, watch::Receiver<SessionState>) {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(SessionState::Starting);
        let s = WatchSession::new(
            CHAT,
            "2370727",
            Arc::new(source.clone()),
            Arc::new(notifier.clone()),
            settings,
            SessionControl {
                cancel: cancel.clone(),
                state: tx,
            },
        );
        (s, cancel, rx)
    }

    #[tokio::test]
    async fn test_publishes_changes_and_ends_on_clinch() {
        let source = FakeSource::new(
            bo3(upcoming()),
            vec![
                Step::Maps(upcoming()),
                Step::Maps(maps(&[(1, 0)])),
                Step::Maps(maps(&[(1, 0)])),
                Step::Maps(maps(&[(13, 10)])),
                Step::Maps(maps(&[(13, 10), (22, 20)])),
            ],
        );
        let notifier = FakeNotifier::new();
        let (s, _cancel, rx) = session(&source, &notifier, settings());

        let outcome = s.run().await;

        assert!(matches!(outcome, SessionOutcome::Ended));
        assert_eq!(*rx.borrow(), SessionState::Ended);
        assert_eq!(
            notifier.sent_texts(),
            vec![
                "Loading a new game...".to_string(),
                "NAVI 0 : 0 Vitality (BO3)".to_string(),
                "Game ended. NAVI wins 2:0.".to_string(),
            ]
        );
        // No publish before a map starts, none for the repeated snapshot.
        assert_eq!(
            notifier.edit_texts(),
            vec![
                "NAVI 0 : 0 Vitality (BO3)\n------------------------------\nMirage: 1 : 0",
                "NAVI 1 : 0 Vitality (BO3)\n------------------------------\nMirage: 13 : 10",
                "NAVI 2 : 0 Vitality (BO3)\n------------------------------\nNuke: 22 : 20",
            ]
        );
        assert_eq!(source.events(), vec!["open 2370727", "close 2370727"]);
    }

    #[tokio::test]
    async fn test_edits_the_initial_message() {
        let source = FakeSource::new(bo3(upcoming()), vec![Step::Maps(maps(&[(13, 0), (13, 0)]))]);
        let notifier = FakeNotifier::new();
        let (s, _cancel, _rx) = session(&source, &notifier, settings());
        s.run().await;

        let initial_id = 2; // after the loading notice
        let edits = notifier.edits.lock().unwrap().clone();
        assert!(edits.iter().all(|(k, id, _)| *k == CHAT && *id == initial_id));
    }

    #[tokio::test]
    async fn test_match_not_found_on_load() {
        let source = FakeSource::missing();
        let notifier = FakeNotifier::new();
        let (s, _cancel, rx) = session(&source, &notifier, settings());

        let outcome = s.run().await;

        assert!(matches!(outcome, SessionOutcome::Failed(WatchError::NotFound(_))));
        assert_eq!(*rx.borrow(), SessionState::Failed);
        assert_eq!(notifier.sent_texts(), vec!["Loading a new game...", "Match not found."]);
        assert_eq!(source.events(), vec!["open 2370727", "close 2370727"]);
    }

    #[tokio::test]
    async fn test_match_not_found_on_open() {
        let source = FakeSource::failing_open();
        let notifier = FakeNotifier::new();
        let (s, _cancel, _rx) = session(&source, &notifier, settings());

        assert!(matches!(s.run().await, SessionOutcome::Failed(_)));
        assert_eq!(notifier.sent_texts().last().unwrap(), "Match not found.");
        assert!(source.events().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_is_skipped() {
        let source = FakeSource::new(
            bo3(upcoming()),
            vec![
                Step::Maps(maps(&[(5, 5)])),
                Step::ParseError,
                Step::ParseError,
                Step::Maps(maps(&[(13, 5), (13, 2)])),
            ],
        );
        let notifier = FakeNotifier::new();
        let (s, _cancel, _rx) = session(&source, &notifier, settings());

        assert!(matches!(s.run().await, SessionOutcome::Ended));
        assert_eq!(notifier.edit_texts().len(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_repeated_failures() {
        let source = FakeSource::new(
            bo3(upcoming()),
            vec![Step::ParseError, Step::ParseError, Step::ParseError],
        );
        let notifier = FakeNotifier::new();
        let (s, _cancel, rx) = session(&source, &notifier, settings());

        let outcome = s.run().await;

        assert!(matches!(outcome, SessionOutcome::Failed(WatchError::ParseFailure(_))));
        assert_eq!(*rx.borrow(), SessionState::Failed);
        assert_eq!(source.polls.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.sent_texts().last().unwrap(), render::LOST_TRACK);
        assert_eq!(source.live(), 0);
    }

    #[tokio::test]
    async fn test_page_gone_fails_immediately() {
        let source = FakeSource::new(bo3(upcoming()), vec![Step::Gone]);
        let notifier = FakeNotifier::new();
        let (s, _cancel, _rx) = session(&source, &notifier, settings());

        assert!(matches!(s.run().await, SessionOutcome::Failed(WatchError::NotFound(_))));
        assert_eq!(source.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_without_more_publishes() {
        let source = FakeSource::new(bo3(upcoming()), vec![Step::Maps(maps(&[(3, 2)]))]);
        let notifier = FakeNotifier::new();
        let (s, cancel, rx) = session(&source, &notifier, settings());

        let task = tokio::spawn(s.run());
        assert!(wait_until(|| source.polls.load(Ordering::SeqCst) >= 3).await);
        cancel.cancel();
        let outcome = task.await.unwrap();

        assert!(matches!(outcome, SessionOutcome::Cancelled));
        assert_eq!(*rx.borrow(), SessionState::Cancelled);
        assert_eq!(notifier.edit_texts().len(), 1);
        assert!(!notifier.sent_texts().iter().any(|t| t.starts_with("Game ended")));
        assert_eq!(source.live(), 0);
    }

    #[tokio::test]
    async fn test_notifier_failures_do_not_stop_the_session() {
        let source = FakeSource::new(bo3(upcoming()), vec![Step::Maps(maps(&[(13, 1), (13, 1)]))]);
        let notifier = FakeNotifier::new();
        notifier.fail_all.store(true, Ordering::SeqCst);
        let (s, _cancel, _rx) = session(&source, &notifier, settings());

        assert!(matches!(s.run().await, SessionOutcome::Ended));
        assert!(notifier.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_already_finished_match_ends_on_first_poll() {
        let done = maps(&[(13, 4), (16, 14)]);
        let source = FakeSource::new(bo3(done), vec![]);
        let notifier = FakeNotifier::new();
        let (s, _cancel, _rx) = session(&source, &notifier, settings());

        assert!(matches!(s.run().await, SessionOutcome::Ended));
        assert_eq!(source.polls.load(Ordering::SeqCst), 1);
    }
}
