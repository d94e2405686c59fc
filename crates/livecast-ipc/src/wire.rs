//! Flat key/value encoding of session events.
//!
//! Hosts consume events as string-keyed maps with one semantic key per
//! event kind (`state`, `retrystate`, `error`, `quality` + `network`,
//! `duration`, `seekedtotime`). The keys are shared with existing callers
//! and must not change.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::SessionEvent;

pub const KEY_STATE: &str = "state";
pub const KEY_RETRY_STATE: &str = "retrystate";
pub const KEY_ERROR: &str = "error";
pub const KEY_MESSAGE: &str = "message";
pub const KEY_QUALITY: &str = "quality";
pub const KEY_NETWORK: &str = "network";
pub const KEY_DURATION: &str = "duration";
pub const KEY_SEEKED_TO_TIME: &str = "seekedtotime";

/// A session event in its flat host representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireEvent(Map<String, Value>);

impl WireEvent {
    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a key holding a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the map has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Encode as a JSON object string.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

impl From<WireEvent> for Value {
    fn from(event: WireEvent) -> Self {
        Value::Object(event.0)
    }
}

impl SessionEvent {
    /// Flatten this event into its host representation.
    pub fn to_wire(&self) -> WireEvent {
        let mut map = Map::new();

        match self {
            Self::StateChanged(state) => {
                map.insert(KEY_STATE.into(), state.wire_name().into());
            }
            Self::RetryStateChanged(retry) => {
                map.insert(KEY_RETRY_STATE.into(), retry.wire_name().into());
            }
            Self::TransmissionStats { quality, network } => {
                map.insert(KEY_QUALITY.into(), quality.wire_name().into());
                map.insert(KEY_NETWORK.into(), network.wire_name().into());
            }
            Self::ErrorOccurred { tag, message } => {
                map.insert(KEY_ERROR.into(), tag.wire_name().into());
                map.insert(KEY_MESSAGE.into(), message.clone().into());
            }
            Self::Duration(seconds) => {
                map.insert(KEY_DURATION.into(), number(*seconds));
            }
            Self::SeekedToTime(seconds) => {
                map.insert(KEY_SEEKED_TO_TIME.into(), number(*seconds));
            }
        }

        WireEvent(map)
    }

    /// Encode this event as a JSON object string.
    pub fn to_json(&self) -> String {
        self.to_wire().to_json()
    }
}

// NaN and infinities have no JSON form.
fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
