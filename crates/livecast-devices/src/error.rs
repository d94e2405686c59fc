//! Error types for the device module.

use livecast_ipc::{DeviceType, Facing};
use thiserror::Error;

/// Errors that can occur during device operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The platform capability for this device type is not available.
    #[error("No {} available: {reason}", .device_type.name())]
    DeviceUnavailable {
        device_type: DeviceType,
        reason: String,
    },

    /// Hardware access is not authorized.
    #[error("Permission denied for {}", .0.name())]
    PermissionDenied(DeviceType),

    /// A device of this type is already bound to the session.
    #[error("A {} is already attached", .0.name())]
    AlreadyAttached(DeviceType),

    /// No device of this type is bound to the session.
    #[error("No {} is attached", .0.name())]
    NotAttached(DeviceType),

    /// No camera faces the requested way.
    #[error("No {} camera found", .0.name())]
    NoMatchingDevice(Facing),

    /// The exchange could not be carried out; the previous device stays attached.
    #[error("Device exchange failed: {0}")]
    ExchangeFailed(String),

    /// Another exchange has not completed yet.
    #[error("A device exchange is already in progress")]
    ExchangeInProgress,
}
