//! # sightline-server
//!
//! Streaming side of Sightline: an axum server that runs one
//! [`session::StreamSession`] per WebSocket connection.
//!
//! - [`transport`]: the message-channel seam (WebSocket, in-memory)
//! - [`session`]: the per-connection state machine, push and pull modes
//! - [`pipeline`]: decode, detect, filter, annotate, encode
//! - [`registry`]: concurrent map of live sessions
//! - [`server`]: routes, connection limit, listener
//! - [`health`], [`metrics`], [`shutdown`]: operational plumbing

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod response;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod transport;

pub use config::ServerConfig;
pub use pipeline::{FramePipeline, PipelineConfig};
pub use registry::{SessionHandle, SessionRegistry, SessionSummary};
pub use response::{DetectionRecord, FrameResponse};
pub use server::SightlineServer;
pub use session::{CaptureConfig, CloseReason, SessionMode, SessionState, StreamSession};
pub use shutdown::ShutdownCoordinator;
pub use transport::{FrameTransport, Inbound, Payload, WsTransport};
