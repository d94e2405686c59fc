//! Error types for the session controller.

use livecast_devices::DeviceError;
use livecast_encoder::EncoderError;
use livecast_ipc::{ErrorTag, SessionState};
use thiserror::Error;

/// Errors returned by session commands.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The encoder configuration or endpoint is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The command is not valid in the current state.
    #[error("Session not ready: {command} is not valid while {}", .state.name())]
    SessionNotReady {
        command: &'static str,
        state: SessionState,
    },

    /// Device registry failure.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Broadcast started without an endpoint or stream key.
    #[error("Missing credentials: no {0}")]
    MissingCredentials(&'static str),

    /// The media engine failed to transmit.
    #[error("Transmission error: {0}")]
    Transmission(String),

    /// The platform lacks this capability.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

impl SessionError {
    pub(crate) fn not_ready(command: &'static str, state: SessionState) -> Self {
        Self::SessionNotReady { command, state }
    }

    /// Serializable classification of this error.
    pub fn tag(&self) -> ErrorTag {
        match self {
            Self::InvalidConfig(_) => ErrorTag::InvalidConfig,
            Self::SessionNotReady { .. } => ErrorTag::SessionNotReady,
            Self::Device(err) => match err {
                DeviceError::DeviceUnavailable { .. }
                | DeviceError::AlreadyAttached(_)
                | DeviceError::NotAttached(_) => ErrorTag::DeviceUnavailable,
                DeviceError::PermissionDenied(_) => ErrorTag::PermissionDenied,
                DeviceError::NoMatchingDevice(_) => ErrorTag::NoMatchingDevice,
                DeviceError::ExchangeFailed(_) | DeviceError::ExchangeInProgress => {
                    ErrorTag::ExchangeFailed
                }
            },
            Self::MissingCredentials(_) => ErrorTag::MissingCredentials,
            Self::Transmission(_) => ErrorTag::TransmissionError,
            Self::Unsupported(_) => ErrorTag::Unsupported,
        }
    }
}

impl From<EncoderError> for SessionError {
    fn from(err: EncoderError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<MediaError> for SessionError {
    fn from(err: MediaError) -> Self {
        Self::Transmission(err.to_string())
    }
}

/// Errors reported synchronously by a media engine command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The engine refused the command.
    #[error("Media engine rejected the command: {0}")]
    Rejected(String),

    /// The engine has no prepared session.
    #[error("Media engine not prepared")]
    NotPrepared,
}
