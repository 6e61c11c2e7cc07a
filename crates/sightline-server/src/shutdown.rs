//! Session drain on shutdown.
//!
//! One root `CancellationToken` stops the listener; every session gets a
//! child token so it can be cancelled with the server but never cancels the
//! server itself. Session tasks are tracked so `drain` can wait for each
//! one to walk `CLOSING -> CLOSED` before the process exits.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// Fans cancellation out to the listener and every session, then waits for
/// the sessions to finish.
#[derive(Default)]
pub struct ShutdownCoordinator {
    root: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Coordinator with no sessions and shutdown not started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token the listener waits on.
    pub fn listener_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Token for one session: cancelled with the server, never the reverse.
    pub fn session_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Wrap a session task so [`ShutdownCoordinator::drain`] waits for it.
    pub fn track<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Session tasks still running.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Whether a drain has started. New sessions are refused from then on.
    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Cancel every session and wait up to `timeout` for all of them to close.
    ///
    /// Returns `false` if the timeout elapsed first. Calling it again waits on
    /// whatever is still running.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.root.cancel();
        let _ = self.sessions.close();
        info!(
            sessions = self.sessions.len(),
            timeout_secs = timeout.as_secs(),
            "draining sessions"
        );

        if tokio::time::timeout(timeout, self.sessions.wait()).await.is_err() {
            warn!(
                sessions = self.sessions.len(),
                "drain timed out after {timeout:?}"
            );
            return false;
        }
        true
    }
}
