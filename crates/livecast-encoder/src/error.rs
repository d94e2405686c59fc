//! Error types for the encoder module.

use thiserror::Error;

/// Errors that can occur while assembling an encoder configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncoderError {
    /// A parameter is outside the range the media engine accepts.
    #[error("Invalid encoder configuration: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },
}

impl EncoderError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
