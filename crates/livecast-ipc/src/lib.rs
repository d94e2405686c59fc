//! Typed host<->session messages for the live broadcast client.
//!
//! This crate defines the data model shared by the device registry, the
//! session controller and the host command surface, plus the flat wire
//! encoding used when events cross into the host application.

mod commands;
mod error;
mod events;
mod state;
mod types;
mod wire;

pub use commands::{CommandReply, PreviewRequest, SessionCommand};
pub use error::IpcError;
pub use events::SessionEvent;
pub use state::{ConnectionState, RetryState, SessionState};
pub use types::{BroadcastQuality, DeviceDescriptor, DeviceType, ErrorTag, Facing, NetworkHealth};
pub use wire::WireEvent;

/// Result type for decoding host messages.
pub type IpcResult<T> = Result<T, IpcError>;

/// Method names understood by the host command surface.
pub mod methods {
    pub const START_PREVIEW: &str = "startPreview";
    pub const START_BROADCAST: &str = "startBroadcast";
    pub const STOP_BROADCAST: &str = "stopBroadcast";
    pub const CHANGE_CAMERA: &str = "changeCamera";
    pub const MUTE: &str = "mute";
    pub const IS_MUTED: &str = "isMuted";
    pub const SEND_TIME_METADATA: &str = "sendTimeMetaData";
    pub const GET_CAMERA_ZOOM_FACTOR: &str = "getCameraZoomFactor";
    pub const ZOOM_CAMERA: &str = "zoomCamera";
    pub const DISPOSE: &str = "dispose";
}
