//! Capture device enumeration, attachment and exchange.
//!
//! This crate tracks which camera and microphone are bound to a broadcast
//! session and coordinates swapping them while a broadcast is running.
//! Enumeration and permission checks are delegated to a platform
//! [`DeviceDiscovery`] implementation.

mod discovery;
mod error;
mod registry;
mod select;

pub use discovery::{Authorization, DeviceDiscovery, StaticDiscovery};
pub use error::DeviceError;
pub use registry::{AttachedDevice, DeviceRegistry, ExchangeOutcome, ExchangeTicket, PendingExchange};
pub use select::{select_camera, select_default};

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Gain applied to a live microphone.
pub const UNITY_GAIN: f32 = 1.0;

/// Gain applied to a muted microphone.
pub const MUTED_GAIN: f32 = 0.0;
