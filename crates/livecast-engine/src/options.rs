//! Session tuning options.

use serde::{Deserialize, Serialize};

use livecast_ipc::{Facing, NetworkHealth};

/// Defaults applied when a preview request leaves a field unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Preset used when the request names none.
    pub default_quality: String,

    /// Auto-reconnect when the request does not say.
    pub auto_reconnect: bool,

    /// Camera position attached at preview.
    pub preferred_camera: Facing,

    /// Fail preview when no microphone can be attached.
    pub require_microphone: bool,

    /// Name of the event delivery thread.
    pub delivery_thread_name: String,

    /// Network health at or below which stats reports are logged as
    /// warnings.
    pub network_warning_threshold: NetworkHealth,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_quality: "default".to_string(),
            auto_reconnect: false,
            preferred_camera: Facing::Back,
            require_microphone: false,
            delivery_thread_name: "livecast-events".to_string(),
            network_warning_threshold: NetworkHealth::Low,
        }
    }
}
