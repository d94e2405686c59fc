//! Common types used across session messages.

use serde::{Deserialize, Serialize};

/// A capture device as enumerated by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Unique identifier for this device.
    pub id: String,

    /// Kind of device.
    pub device_type: DeviceType,

    /// Which way a camera points. `NotApplicable` for microphones and for
    /// cameras whose platform does not report a position.
    pub facing: Facing,

    /// Display name for the UI.
    pub friendly_name: String,
}

impl DeviceDescriptor {
    /// Describe a camera.
    pub fn camera(id: impl Into<String>, facing: Facing, friendly_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            device_type: DeviceType::Camera,
            facing,
            friendly_name: friendly_name.into(),
        }
    }

    /// Describe a microphone.
    pub fn microphone(id: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            device_type: DeviceType::Microphone,
            facing: Facing::NotApplicable,
            friendly_name: friendly_name.into(),
        }
    }
}

/// Type of capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Camera,
    Microphone,
    Unknown,
}

impl DeviceType {
    /// Returns the display name for this device type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Microphone => "microphone",
            Self::Unknown => "unknown",
        }
    }
}

/// Camera position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    Front,
    Back,
    NotApplicable,
}

impl Facing {
    /// Decode the host's camera request: `"0"` is the front camera, anything
    /// else the back camera.
    pub fn from_request(value: &str) -> Self {
        if value.trim() == "0" {
            Self::Front
        } else {
            Self::Back
        }
    }

    /// Returns the display name for this position.
    pub fn name(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
            Self::NotApplicable => "n/a",
        }
    }
}

/// Broadcast quality relative to the configured bitrate bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastQuality {
    NearMaximum,
    High,
    Medium,
    Low,
    NearMinimum,
}

impl BroadcastQuality {
    /// Returns the tag used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::NearMaximum => "NEAR_MAXIMUM",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::NearMinimum => "NEAR_MINIMUM",
        }
    }
}

/// Health of the network path to the ingest endpoint, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkHealth {
    Excellent,
    High,
    Medium,
    Low,
    Bad,
}

impl NetworkHealth {
    /// Returns the tag used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Bad => "BAD",
        }
    }
}

/// Serializable classification of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorTag {
    InvalidConfig,
    SessionNotReady,
    DeviceUnavailable,
    PermissionDenied,
    NoMatchingDevice,
    ExchangeFailed,
    MissingCredentials,
    TransmissionError,
    Unsupported,
}

impl ErrorTag {
    /// Returns the tag used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::SessionNotReady => "SESSION_NOT_READY",
            Self::DeviceUnavailable => "DEVICE_UNAVAILABLE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NoMatchingDevice => "NO_MATCHING_DEVICE",
            Self::ExchangeFailed => "EXCHANGE_FAILED",
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::TransmissionError => "TRANSMISSION_ERROR",
            Self::Unsupported => "UNSUPPORTED",
        }
    }
}
