//! Session state machine types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one broadcast session.
///
/// `Stopped`, `Error` and `Disposed` are terminal for a session instance; a
/// new session object is required to broadcast again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Session created, nothing attached yet.
    #[default]
    Idle,

    /// Encoder configuration finalized and devices attached.
    PreviewReady,

    /// Transmission confirmed by the media engine.
    Broadcasting,

    /// Stopped by the caller.
    Stopped,

    /// A fatal fault was reported. Only `dispose` is accepted.
    Error,

    /// Devices released and the session invalidated.
    Disposed,
}

impl SessionState {
    /// Returns true if the session is idle.
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if the preview is ready but transmission has not started.
    pub fn is_preview_ready(self) -> bool {
        matches!(self, Self::PreviewReady)
    }

    /// Returns true if the session is broadcasting.
    pub fn is_broadcasting(self) -> bool {
        matches!(self, Self::Broadcasting)
    }

    /// Returns true if the session is in an error state.
    pub fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns true if no further transition except disposal is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error | Self::Disposed)
    }

    /// Returns true if mute and camera commands are accepted.
    pub fn accepts_device_commands(self) -> bool {
        matches!(self, Self::PreviewReady | Self::Broadcasting)
    }

    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::PreviewReady => "PreviewReady",
            Self::Broadcasting => "Broadcasting",
            Self::Stopped => "Stopped",
            Self::Error => "Error",
            Self::Disposed => "Disposed",
        }
    }

    /// Returns the tag used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::PreviewReady => "PREVIEW_READY",
            Self::Broadcasting => "BROADCASTING",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
            Self::Disposed => "DISPOSED",
        }
    }
}

/// Connection state reported by the media engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// The engine session is not usable.
    Invalid,

    /// Not connected to the ingest endpoint.
    Disconnected,

    /// Handshake with the ingest endpoint in progress.
    Connecting,

    /// Connected and transmitting.
    Connected,

    /// The connection failed.
    Error,
}

impl ConnectionState {
    /// Get status message for logs.
    pub fn message(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Error => "Connection error",
        }
    }
}

/// Progress of the media engine's automatic reconnect loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetryState {
    NotRetrying,
    WaitingForInternet,
    WaitingForBackoffTimer,
    Retrying,
    Success,
    Failure,
}

impl RetryState {
    /// Returns the tag used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::NotRetrying => "NOT_RETRYING",
            Self::WaitingForInternet => "WAITING_FOR_INTERNET",
            Self::WaitingForBackoffTimer => "WAITING_FOR_BACKOFF_TIMER",
            Self::Retrying => "RETRYING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    /// Returns true once the engine has given up reconnecting.
    pub fn is_exhausted(self) -> bool {
        matches!(self, Self::Failure)
    }
}
