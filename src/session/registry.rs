//! Tracks at most one watch session per subscriber.
//!
//! Each key owns a slot guarded by an async mutex. `start` and `stop` hold
//! the slot lock while the outgoing session tears down, so a replacement
//! never runs next to its predecessor. Unrelated keys only share the map's
//! shard locks, which are never held across an await.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use super::{SessionOutcome, SessionState, SubscriberKey};

/// Handed to a new session: how it learns it should stop and how it reports
/// its state.
pub struct SessionControl {
    pub cancel: CancellationToken,
    pub state: watch::Sender<SessionState>,
}

/// Public view of a running session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub subscriber: SubscriberKey,
    pub match_id: String,
    pub started_at: DateTime<Utc>,
    pub state: SessionState,
}

struct SessionHandle {
    generation: u64,
    match_id: String,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    /// Request cancellation and wait for the task to finish.
    async fn shutdown(self, key: SubscriberKey) {
        info!("Terminating session in chat {}", key);
        self.cancel.cancel();
        match self.task.await {
            Ok(outcome) => info!("Session in chat {} terminated ({:?})", key, outcome.state()),
            Err(e) => error!("Session task in chat {} panicked: {}", key, e),
        }
    }
}

type Slot = Arc<Mutex<Option<SessionHandle>>>;

struct RegistryInner {
    slots: DashMap<SubscriberKey, Slot>,
    next_generation: AtomicU64,
}

/// Cheaply cloneable handle on the session table.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            inner: Arc::new(RegistryInner {
                slots: DashMap::new(),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    fn slot(&self, key: SubscriberKey) -> Slot {
        self.inner.slots.entry(key).or_default().clone()
    }

    /// Start a session for `key`, first tearing down any session it already
    /// has. `factory` builds the session future from its control handles.
    pub async fn start<F, Fut>(&self, key: SubscriberKey, match_id: &str, factory: F)
    where
        F: FnOnce(SessionControl) -> Fut,
        Fut: Future<Output = SessionOutcome> + Send + 'static,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock().await;

        if let Some(old) = guard.take() {
            old.shutdown(key).await;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Starting);
        let session = factory(SessionControl {
            cancel: cancel.clone(),
            state: state_tx,
        });

        let registry = Arc::downgrade(&self.inner);
        let span = info_span!("session", subscriber = %key, match_id = %match_id);
        let task = tokio::spawn(
            async move {
                let outcome = session.await;
                release(registry, key, generation);
                outcome
            }
            .instrument(span),
        );

        info!("Started session for match {} in chat {}", match_id, key);
        *guard = Some(SessionHandle {
            generation,
            match_id: match_id.to_string(),
            started_at: Utc::now(),
            cancel,
            state: state_rx,
            task,
        });
    }

    /// Stop the session for `key`. Returns whether there was one; calling it
    /// again is a no-op.
    pub async fn stop(&self, key: SubscriberKey) -> bool {
        let Some(slot) = self.inner.slots.get(&key).map(|s| Arc::clone(s.value())) else {
            return false;
        };

        let stopped = {
            let mut guard = slot.lock().await;
            match guard.take() {
                Some(handle) => {
                    handle.shutdown(key).await;
                    true
                }
                None => false,
            }
        };

        drop(slot);
        prune(&self.inner, key);
        stopped
    }

    /// Stop every session.
    pub async fn shutdown(&self) {
        let keys: Vec<SubscriberKey> = self.inner.slots.iter().map(|e| *e.key()).collect();
        info!("Shutting down {} session(s)", keys.len());
        futures_util::future::join_all(keys.into_iter().map(|k| self.stop(k))).await;
    }

    /// Snapshot of sessions that are still running. Slots in the middle of a
    /// start or stop are skipped.
    pub fn active(&self) -> Vec<SessionInfo> {
        let mut out: Vec<SessionInfo> = self
            .inner
            .slots
            .iter()
            .filter_map(|entry| {
                let guard = entry.value().try_lock().ok()?;
                let handle = guard.as_ref()?;
                let state = *handle.state.borrow();
                if handle.task.is_finished() || state.is_terminal() {
                    return None;
                }
                let info = SessionInfo {
                    subscriber: *entry.key(),
                    match_id: handle.match_id.clone(),
                    started_at: handle.started_at,
                    state,
                };
                Some(info)
            })
            .collect();
        out.sort_by_key(|s| s.started_at);
        out
    }

    pub fn is_active(&self, key: SubscriberKey) -> bool {
        self.active().iter().any(|s| s.subscriber == key)
    }

    /// Number of keys with a slot, live or not.
    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.inner.slots.len()
    }
}

/// Called by a session task once it finishes on its own. The handle is only
/// cleared if it still belongs to this session's generation.
fn release(registry: Weak<RegistryInner>, key: SubscriberKey, generation: u64) {
    let Some(inner) = registry.upgrade() else {
        return;
    };
    let Some(slot) = inner.slots.get(&key).map(|s| Arc::clone(s.value())) else {
        return;
    };

    let released = match slot.try_lock() {
        Ok(mut guard) => Some(take_if_current(&mut guard, generation)),
        Err(_) => None,
    };

    match released {
        Some(released) => {
            drop(slot);
            if released {
                prune(&inner, key);
            }
        }
        // Slot is busy (a snapshot, or a start/stop awaiting this very task).
        // Must not block here, so finish the release once the lock frees up.
        None => {
            tokio::spawn(async move {
                let released = {
                    let mut guard = slot.lock().await;
                    take_if_current(&mut guard, generation)
                };
                drop(slot);
                if released {
                    prune(&inner, key);
                }
            });
        }
    }
}

fn take_if_current(slot: &mut Option<SessionHandle>, generation: u64) -> bool {
    if slot.as_ref().map(|h| h.generation) == Some(generation) {
        slot.take();
        true
    } else {
        false
    }
}

/// Drop the map entry for `key` if its slot is empty and nobody else holds it.
fn prune(inner: &RegistryInner, key: SubscriberKey) {
    inner.slots.remove_if(&key, |_, slot| {
        Arc::strong_count(slot) == 1 && slot.try_lock().map(|g| g.is_none()).unwrap_or(false)
    });
}
