//! Events sent from the session to the host.

use serde::{Deserialize, Serialize};

use crate::state::{RetryState, SessionState};
use crate::types::{BroadcastQuality, ErrorTag, NetworkHealth};

/// Events that a broadcast session publishes to its listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Session state has changed.
    StateChanged(SessionState),

    /// The media engine's reconnect loop changed state.
    RetryStateChanged(RetryState),

    /// Periodic transmission health report.
    TransmissionStats {
        /// Quality relative to the configured bitrate bounds.
        quality: BroadcastQuality,

        /// Health of the network path.
        network: NetworkHealth,
    },

    /// Error occurred.
    ErrorOccurred {
        /// Classification of the failure.
        tag: ErrorTag,

        /// Error message.
        message: String,
    },

    /// Media duration in seconds, as reported by the engine.
    Duration(f64),

    /// The engine finished seeking to this position, in seconds.
    SeekedToTime(f64),
}

impl SessionEvent {
    /// Returns a simple string representation of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StateChanged(_) => "StateChanged",
            Self::RetryStateChanged(_) => "RetryStateChanged",
            Self::TransmissionStats { .. } => "TransmissionStats",
            Self::ErrorOccurred { .. } => "ErrorOccurred",
            Self::Duration(_) => "Duration",
            Self::SeekedToTime(_) => "SeekedToTime",
        }
    }

    /// Shorthand for an error event.
    pub fn error(tag: ErrorTag, message: impl Into<String>) -> Self {
        Self::ErrorOccurred {
            tag,
            message: message.into(),
        }
    }
}
