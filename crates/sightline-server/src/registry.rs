//! Connection registry: every live stream session, keyed by id.
//!
//! Mutated only by [`SessionRegistry::register`] after a session activates
//! and [`SessionRegistry::deregister`] during teardown. Iteration is for
//! observability; nothing routes work to a session through the registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use sightline_core::SessionId;
use tracing::debug;

use crate::session::{SessionKind, SessionState};

/// Observable state of one session, shared between its task and the registry.
pub struct SessionHandle {
    id: SessionId,
    kind: SessionKind,
    state: Mutex<SessionState>,
    started_at: Instant,
    last_activity: Mutex<Instant>,
    frames_processed: AtomicU64,
    frames_skipped: AtomicU64,
}

impl SessionHandle {
    /// Create a handle in `CONNECTING`.
    pub fn new(id: SessionId, kind: SessionKind) -> Self {
        let now = Instant::now();
        Self {
            id,
            kind,
            state: Mutex::new(SessionState::Connecting),
            started_at: now,
            last_activity: Mutex::new(now),
            frames_processed: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
        }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Push or pull.
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    pub fn transition(&self, next: SessionState) -> bool {
        let mut state = self.state.lock();
        if state.can_transition_to(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    /// Record client or capture activity.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Seconds since the last activity.
    pub fn idle_secs(&self) -> u64 {
        self.last_activity.lock().elapsed().as_secs()
    }

    /// Seconds since the session was created.
    pub fn age_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Count a frame that produced a response.
    pub fn record_processed(&self) {
        let _ = self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame dropped without a response.
    pub fn record_skipped(&self) {
        let _ = self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames that produced a response.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    /// Frames dropped without a response.
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped.load(Ordering::Relaxed)
    }

    /// Point-in-time view for `/sessions`.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            mode: self.kind,
            state: self.state(),
            frames_processed: self.frames_processed(),
            frames_skipped: self.frames_skipped(),
            age_secs: self.age_secs(),
            idle_secs: self.idle_secs(),
        }
    }
}

/// Serializable snapshot of one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Session id.
    pub id: SessionId,
    /// Push or pull.
    pub mode: SessionKind,
    /// Lifecycle state.
    pub state: SessionState,
    /// Frames answered.
    pub frames_processed: u64,
    /// Frames dropped.
    pub frames_skipped: u64,
    /// Seconds since creation.
    pub age_secs: u64,
    /// Seconds since last activity.
    pub idle_secs: u64,
}

/// Thread-safe map of live sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Re-registering the same id replaces the entry.
    pub fn register(&self, handle: Arc<SessionHandle>) {
        let id = handle.id().clone();
        if self.sessions.insert(id.clone(), handle).is_some() {
            debug!(session_id = %id, "session re-registered");
        }
    }

    /// Remove a session. Returns `false` if it was not registered.
    pub fn deregister(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Live session count.
    pub fn size(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Visit every session.
    ///
    /// Holds shard read locks while iterating: `f` must not register or
    /// deregister.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<SessionHandle>)) {
        for entry in self.sessions.iter() {
            f(entry.value());
        }
    }

    /// Summaries of every live session, oldest first.
    pub fn snapshot(&self) -> Vec<SessionSummary> {
        let mut out = Vec::with_capacity(self.size());
        self.for_each(|handle| out.push(handle.summary()));
        out.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        out
    }
}
