//! In-memory `MatchSource` and `Notifier` doubles for session tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::SubscriberKey;
use crate::error::WatchError;
use crate::hltv::{MatchFeed, MatchSource};
use crate::scoring::{MapScore, MatchState};
use crate::telegram::{MessageId, Notifier};

/// One scripted poll result.
#[derive(Debug, Clone)]
pub enum Step {
    Maps(Vec<MapScore>),
    ParseError,
    Gone,
}

#[derive(Default)]
pub struct FakeSource {
    /// `None` makes `load_match` fail with `NotFound`
    pub initial: Option<MatchState>,
    pub open_fails: bool,
    steps: Mutex<VecDeque<Step>>,
    last_maps: Mutex<Vec<MapScore>>,
    pub polls: AtomicUsize,
    live: AtomicUsize,
    pub max_live: AtomicUsize,
    /// "open <id>" / "close <id>" in call order
    pub events: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(initial: MatchState, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(FakeSource {
            initial: Some(initial),
            steps: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(FakeSource::default())
    }

    pub fn failing_open() -> Arc<Self> {
        Arc::new(FakeSource {
            open_fails: true,
            ..Default::default()
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct FakeFeed {
    source: Arc<FakeSource>,
    match_id: String,
}

#[async_trait]
impl MatchSource for Arc<FakeSource> {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open(&self, match_id: &str) -> Result<Box<dyn MatchFeed>, WatchError> {
        if self.open_fails {
            return Err(WatchError::NotFound("no such page".into()));
        }
        self.events.lock().unwrap().push(format!("open {}", match_id));
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(FakeFeed {
            source: Arc::clone(self),
            match_id: match_id.to_string(),
        }))
    }
}

#[async_trait]
impl MatchFeed for FakeFeed {
    async fn load_match(&mut self) -> Result<MatchState, WatchError> {
        let state = self
            .source
            .initial
            .clone()
            .ok_or_else(|| WatchError::NotFound("match container".into()))?;
        *self.source.last_maps.lock().unwrap() = state.maps.clone();
        Ok(state)
    }

    async fn map_scores(&mut self) -> Result<Vec<MapScore>, WatchError> {
        self.source.polls.fetch_add(1, Ordering::SeqCst);
        let step = self.source.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Maps(maps)) => {
                *self.source.last_maps.lock().unwrap() = maps.clone();
                Ok(maps)
            }
            Some(Step::ParseError) => Err(WatchError::ParseFailure("garbled".into())),
            Some(Step::Gone) => Err(WatchError::NotFound("page gone".into())),
            None => Ok(self.source.last_maps.lock().unwrap().clone()),
        }
    }

    async fn close(self: Box<Self>) {
        self.source
            .events
            .lock()
            .unwrap()
            .push(format!("close {}", self.match_id));
        self.source.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<(SubscriberKey, String)>>,
    pub edits: Mutex<Vec<(SubscriberKey, MessageId, String)>>,
    pub fail_all: AtomicBool,
    next_id: AtomicI64,
}

impl FakeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeNotifier::default())
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn edit_texts(&self) -> Vec<String> {
        self.edits.lock().unwrap().iter().map(|(_, _, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Notifier for Arc<FakeNotifier> {
    async fn send(&self, key: SubscriberKey, text: &str) -> Result<MessageId> {
        if self.fail_all.load(Ordering::SeqCst) {
            anyhow::bail!("chat unavailable");
        }
        self.sent.lock().unwrap().push((key, text.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn edit(&self, key: SubscriberKey, message_id: MessageId, text: &str) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            anyhow::bail!("chat unavailable");
        }
        self.edits
            .lock()
            .unwrap()
            .push((key, message_id, text.to_string()));
        Ok(())
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
