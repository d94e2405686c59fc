//! Broadcast session controller and event bridge.
//!
//! This crate owns the lifecycle of a broadcast session: it validates
//! commands against the session state, drives the device registry and an
//! external [`MediaEngine`], and forwards the engine's asynchronous
//! callbacks to a single listener through the [`EventBridge`].

mod bridge;
mod error;
mod media;
mod metrics;
mod options;
mod session;
#[cfg(test)]
mod testing;

pub use bridge::{channel_listener, BridgeStats, EventBridge, EventListener};
pub use error::{MediaError, SessionError};
pub use media::{MediaCallback, MediaEngine, MediaEvents};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use options::SessionOptions;
pub use session::{BroadcastSession, CameraSwitch};

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for media engine commands.
pub type MediaResult<T> = Result<T, MediaError>;
