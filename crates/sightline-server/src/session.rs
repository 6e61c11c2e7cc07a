//! Stream session: one client connection's full lifecycle.
//!
//! ```text
//! CONNECTING ──activate──▶ ACTIVE ──end-of-stream | write failure | shutdown──▶ CLOSING ──▶ CLOSED
//!      └────────────────── setup failure ─────────────────────────────────────▶┘
//! ```
//!
//! Each loop iteration produces one [`FrameEvent`] and dispatches on it.
//! Response N is sent before message N+1 is read, so responses keep frame
//! order without sequence numbers. In push mode the client drives arrival;
//! in pull mode the session owns a capture source and paces itself.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use sightline_core::{CaptureError, ErrorClass, Frame, FrameError, Pacing, SessionId};
use sightline_settings::CaptureSettings;
use sightline_vision::{FrameSource, open_source};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::{FRAMES_PROCESSED_TOTAL, FRAMES_RECEIVED_TOTAL, FRAMES_SKIPPED_TOTAL};
use crate::pipeline::FramePipeline;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::response::FrameResponse;
use crate::transport::{FrameTransport, Inbound};

/// Lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created; not yet registered.
    Connecting,
    /// Registered and processing frames.
    Active,
    /// Releasing resources.
    Closing,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Active)
                | (Self::Connecting | Self::Active, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

/// Who drives frame arrival.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// The client sends frames.
    Push,
    /// The session captures frames itself.
    Pull,
}

impl SessionKind {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

/// Capture parameters for pull-mode sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Source spec passed to [`open_source`].
    pub source: String,
    /// Inter-frame interval.
    pub interval: Duration,
    /// How the interval is applied.
    pub pacing: Pacing,
}

impl CaptureConfig {
    /// Build from the `capture` settings section; `None` when disabled.
    pub fn from_settings(settings: &CaptureSettings) -> Option<Self> {
        settings.enabled.then(|| Self {
            source: settings.source.clone(),
            interval: Duration::from_millis(settings.frame_interval_ms),
            pacing: settings.pacing,
        })
    }
}

/// Construction-time operating mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionMode {
    /// Process each client message on receipt.
    Push,
    /// Capture frames from an owned source on a cadence.
    Pull(CaptureConfig),
}

impl SessionMode {
    /// Push or pull.
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Push => SessionKind::Push,
            Self::Pull(_) => SessionKind::Pull,
        }
    }
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed the channel.
    EndOfStream,
    /// Reading or writing the channel failed.
    TransportFailed,
    /// The server is shutting down.
    Shutdown,
    /// The capture source could not be opened.
    SetupFailed,
    /// The capture source stopped producing frames.
    SourceFailed,
    /// The detector reported itself unusable.
    CapabilityLost,
}

impl CloseReason {
    /// Metrics label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndOfStream => "end_of_stream",
            Self::TransportFailed => "transport_failed",
            Self::Shutdown => "shutdown",
            Self::SetupFailed => "setup_failed",
            Self::SourceFailed => "source_failed",
            Self::CapabilityLost => "capability_lost",
        }
    }
}

/// Outcome of one loop iteration.
#[derive(Debug)]
pub enum FrameEvent {
    /// A response is ready to send.
    Ready(FrameResponse),
    /// The frame failed; its error class decides whether the session survives.
    Failed(FrameError),
    /// The channel ended or broke.
    TransportClosed(CloseReason),
    /// Explicit shutdown request.
    Shutdown,
}

/// Spacing of pull-mode captures.
#[derive(Clone, Copy, Debug)]
pub struct Pacer {
    interval: Duration,
    pacing: Pacing,
    next: Instant,
}

impl Pacer {
    /// First capture is due at `now`.
    pub fn new(interval: Duration, pacing: Pacing, now: Instant) -> Self {
        Self {
            interval,
            pacing,
            next: now,
        }
    }

    /// When the next capture is due.
    pub fn deadline(&self) -> Instant {
        self.next
    }

    /// Schedule the next capture after one finished at `now`.
    ///
    /// Returns how many fixed-rate ticks were skipped because processing
    /// overran them; always 0 for fixed-delay pacing.
    pub fn schedule(&mut self, now: Instant) -> u64 {
        match self.pacing {
            Pacing::FixedDelay => {
                self.next = now + self.interval;
                0
            }
            Pacing::FixedRate if self.interval.is_zero() => {
                self.next = now;
                0
            }
            Pacing::FixedRate => {
                let due = self.next + self.interval;
                if due >= now {
                    self.next = due;
                    return 0;
                }
                let behind = (now - due).as_nanos() / self.interval.as_nanos();
                let missed = u32::try_from(behind).unwrap_or(u32::MAX).saturating_add(1);
                self.next = due
                    .checked_add(self.interval.saturating_mul(missed))
                    .unwrap_or(now + self.interval);
                u64::from(missed)
            }
        }
    }
}

type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

/// One client connection driven through the frame pipeline.
///
/// Resources are released on every exit path: [`StreamSession::close`] on
/// the normal path and `Drop` if the task is aborted mid-frame.
pub struct StreamSession<T: FrameTransport> {
    transport: T,
    mode: SessionMode,
    pipeline: Arc<FramePipeline>,
    registry: Arc<SessionRegistry>,
    handle: Arc<SessionHandle>,
    cancel: CancellationToken,
    source: Option<SharedSource>,
    registered: bool,
    frame_seq: u64,
}

impl<T: FrameTransport> StreamSession<T> {
    /// Create a session in `CONNECTING` over an accepted transport.
    pub fn new(
        transport: T,
        mode: SessionMode,
        pipeline: Arc<FramePipeline>,
        registry: Arc<SessionRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        let handle = Arc::new(SessionHandle::new(SessionId::new(), mode.kind()));
        Self {
            transport,
            mode,
            pipeline,
            registry,
            handle,
            cancel,
            source: None,
            registered: false,
            frame_seq: 0,
        }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        self.handle.id()
    }

    /// Shared observable state.
    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.handle
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Drive the session to completion.
    #[instrument(skip_all, fields(session_id = %self.handle.id(), mode = self.mode.kind().as_str()))]
    pub async fn run(mut self) -> CloseReason {
        let reason = match self.activate().await {
            Ok(()) => {
                info!("session active");
                self.serve().await
            }
            Err(e) => {
                warn!(error = %e, "session setup failed");
                CloseReason::SetupFailed
            }
        };
        self.close().await;
        info!(
            reason = reason.as_str(),
            frames_processed = self.handle.frames_processed(),
            frames_skipped = self.handle.frames_skipped(),
            "session closed"
        );
        reason
    }

    /// `CONNECTING -> ACTIVE`: open the capture source (pull mode) and register.
    async fn activate(&mut self) -> Result<(), CaptureError> {
        if let SessionMode::Pull(capture) = &self.mode {
            let spec = capture.source.clone();
            let source = tokio::task::spawn_blocking(move || open_source(&spec))
                .await
                .map_err(|e| CaptureError::Unavailable(format!("open task failed: {e}")))??;
            info!(source = %source.describe(), "capture source opened");
            self.source = Some(Arc::new(Mutex::new(source)));
        }
        let _ = self.handle.transition(SessionState::Active);
        self.registry.register(Arc::clone(&self.handle));
        self.registered = true;
        Ok(())
    }

    async fn serve(&mut self) -> CloseReason {
        let mut pacer = match &self.mode {
            SessionMode::Push => None,
            SessionMode::Pull(capture) => {
                Some(Pacer::new(capture.interval, capture.pacing, Instant::now()))
            }
        };

        loop {
            let event = match pacer.as_ref() {
                None => self.next_push().await,
                Some(p) => self.next_pull(p.deadline()).await,
            };
            if let Some(reason) = self.dispatch(event).await {
                return reason;
            }
            if let Some(p) = pacer.as_mut() {
                let missed = p.schedule(Instant::now());
                if missed > 0 {
                    counter!(FRAMES_SKIPPED_TOTAL, "reason" => "missed_tick").increment(missed);
                    debug!(missed, "capture fell behind its cadence");
                }
            }
        }
    }

    async fn next_push(&mut self) -> FrameEvent {
        let inbound = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return FrameEvent::Shutdown,
            inbound = self.transport.receive() => inbound,
        };
        match inbound {
            Ok(Inbound::Message(payload)) => {
                self.begin_frame("client");
                debug!(frame = self.frame_seq, bytes = payload.len(), "frame received");
                match self.pipeline.process_payload(payload).await {
                    Ok(response) => FrameEvent::Ready(response),
                    Err(e) => FrameEvent::Failed(e),
                }
            }
            Ok(Inbound::EndOfStream) => FrameEvent::TransportClosed(CloseReason::EndOfStream),
            Err(e) => {
                warn!(error = %e, "transport receive failed");
                FrameEvent::TransportClosed(CloseReason::TransportFailed)
            }
        }
    }

    /// Wait for `deadline` while watching the client and the shutdown token,
    /// then capture and process one frame.
    async fn next_pull(&mut self, deadline: Instant) -> FrameEvent {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return FrameEvent::Shutdown,
                inbound = self.transport.receive() => match inbound {
                    Ok(Inbound::Message(_)) => debug!("ignoring client message on pull session"),
                    Ok(Inbound::EndOfStream) => {
                        return FrameEvent::TransportClosed(CloseReason::EndOfStream);
                    }
                    Err(e) => {
                        warn!(error = %e, "transport receive failed");
                        return FrameEvent::TransportClosed(CloseReason::TransportFailed);
                    }
                },
                () = tokio::time::sleep_until(deadline) => break,
            }
        }

        let frame = match capture(self.source.clone()).await {
            Ok(frame) => frame,
            Err(e) => return FrameEvent::Failed(e.into()),
        };
        self.begin_frame("capture");
        match self.pipeline.process_frame(frame).await {
            Ok(response) => FrameEvent::Ready(response),
            Err(e) => FrameEvent::Failed(e),
        }
    }

    fn begin_frame(&mut self, origin: &'static str) {
        self.frame_seq += 1;
        self.handle.touch();
        counter!(FRAMES_RECEIVED_TOTAL, "source" => origin).increment(1);
    }

    /// Act on one event. `Some` ends the session.
    async fn dispatch(&mut self, event: FrameEvent) -> Option<CloseReason> {
        match event {
            FrameEvent::Ready(response) => {
                let json = match response.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        self.skip(&FrameError::from(e));
                        return None;
                    }
                };
                if let Err(e) = self.transport.send(json).await {
                    warn!(error = %e, frame = self.frame_seq, "send failed");
                    return Some(CloseReason::TransportFailed);
                }
                self.handle.record_processed();
                counter!(FRAMES_PROCESSED_TOTAL).increment(1);
                None
            }
            FrameEvent::Failed(e) => match e.classify() {
                ErrorClass::FrameRecoverable => {
                    self.skip(&e);
                    None
                }
                ErrorClass::TransportFatal => {
                    warn!(error = %e, "capture source failed");
                    Some(CloseReason::SourceFailed)
                }
                ErrorClass::CapabilityFatal => {
                    error!(error = %e, "detector unavailable");
                    Some(CloseReason::CapabilityLost)
                }
            },
            FrameEvent::TransportClosed(reason) => Some(reason),
            FrameEvent::Shutdown => Some(CloseReason::Shutdown),
        }
    }

    fn skip(&self, error: &FrameError) {
        self.handle.record_skipped();
        counter!(FRAMES_SKIPPED_TOTAL, "reason" => error.kind()).increment(1);
        warn!(frame = self.frame_seq, reason = error.kind(), error = %error, "frame dropped");
    }

    /// `-> CLOSING -> CLOSED`: release the source, deregister, close the
    /// transport. Idempotent.
    pub async fn close(&mut self) {
        if !self.handle.transition(SessionState::Closing) {
            return;
        }
        self.release();
        self.transport.close().await;
        let _ = self.handle.transition(SessionState::Closed);
    }

    fn release(&mut self) {
        if let Some(source) = self.source.take() {
            // An in-flight capture holds the lock; its clone of the Arc
            // drops the source once the read returns.
            if let Some(mut source) = source.try_lock() {
                source.release();
                debug!(frames = source.frames_captured(), "capture source released");
            } else {
                debug!("capture in flight, source dropped by its reader");
            }
        }
        if std::mem::take(&mut self.registered) {
            let _ = self.registry.deregister(self.handle.id());
        }
    }
}

/// Read one frame off the runtime. Takes the source by value so no borrow of
/// the session is held across the blocking call.
async fn capture(source: Option<SharedSource>) -> Result<Frame, CaptureError> {
    let Some(source) = source else {
        return Err(CaptureError::Unavailable("no capture source open".into()));
    };
    tokio::task::spawn_blocking(move || source.lock().next_frame())
        .await
        .map_err(|e| CaptureError::Read(format!("capture task failed: {e}")))?
}

impl<T: FrameTransport> Drop for StreamSession<T> {
    fn drop(&mut self) {
        self.release();
    }
}
