//! Commands sent from the host to the session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IpcError;
use crate::methods;
use crate::types::Facing;
use crate::IpcResult;

/// Arguments of `startPreview`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewRequest {
    /// Ingest endpoint (e.g., "rtmps://example.global-contribute.live-video.net:443/app/").
    #[serde(rename = "imgset", alias = "url", default)]
    pub endpoint: String,

    /// Stream key for authentication.
    #[serde(rename = "streamKey", default)]
    pub stream_key: String,

    /// Quality preset name ("360", "720", "1080"); anything else selects the default preset.
    #[serde(default)]
    pub quality: String,

    /// Let the media engine reconnect on its own. `None` uses the session default.
    #[serde(rename = "autoReconnect", default)]
    pub auto_reconnect: Option<bool>,
}

/// Commands that the host can send to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionCommand {
    /// Build the encoder configuration, attach devices and show the preview.
    StartPreview(PreviewRequest),

    /// Start transmitting with the credentials given at preview.
    StartBroadcast,

    /// Stop the current broadcast.
    StopBroadcast,

    /// Swap to the camera facing this way.
    ChangeCamera(Facing),

    /// Toggle the microphone mute state.
    ToggleMute,

    /// Query the microphone mute state.
    IsMuted,

    /// Send timed metadata alongside the stream.
    SendTimedMetadata(String),

    /// Query the camera zoom range.
    GetCameraZoomFactor,

    /// Zoom the camera.
    ZoomCamera(f64),

    /// Release everything held by the session.
    Dispose,
}

impl SessionCommand {
    /// Decode a host method call.
    pub fn from_method_call(method: &str, args: &Value) -> IpcResult<Self> {
        match method {
            methods::START_PREVIEW => {
                let request = serde_json::from_value(args.clone()).map_err(|source| {
                    IpcError::MalformedArguments {
                        method: methods::START_PREVIEW,
                        source,
                    }
                })?;
                Ok(Self::StartPreview(request))
            }
            methods::START_BROADCAST => Ok(Self::StartBroadcast),
            methods::STOP_BROADCAST => Ok(Self::StopBroadcast),
            methods::CHANGE_CAMERA => {
                let facing = string_arg(args, &["type", "facing"]).ok_or(
                    IpcError::MissingArgument {
                        method: methods::CHANGE_CAMERA,
                        argument: "type",
                    },
                )?;
                Ok(Self::ChangeCamera(Facing::from_request(facing)))
            }
            methods::MUTE => Ok(Self::ToggleMute),
            methods::IS_MUTED => Ok(Self::IsMuted),
            methods::SEND_TIME_METADATA => {
                // Some hosts pass the payload as the bare argument.
                let metadata = args
                    .as_str()
                    .or_else(|| string_arg(args, &["metadata"]))
                    .ok_or(IpcError::MissingArgument {
                        method: methods::SEND_TIME_METADATA,
                        argument: "metadata",
                    })?;
                Ok(Self::SendTimedMetadata(metadata.to_string()))
            }
            methods::GET_CAMERA_ZOOM_FACTOR => Ok(Self::GetCameraZoomFactor),
            methods::ZOOM_CAMERA => {
                let zoom = args.get("zoom").and_then(Value::as_f64).unwrap_or(0.0);
                Ok(Self::ZoomCamera(zoom))
            }
            methods::DISPOSE => Ok(Self::Dispose),
            other => Err(IpcError::UnknownMethod(other.to_string())),
        }
    }

    /// Returns the method name this command is invoked by.
    pub fn method(&self) -> &'static str {
        match self {
            Self::StartPreview(_) => methods::START_PREVIEW,
            Self::StartBroadcast => methods::START_BROADCAST,
            Self::StopBroadcast => methods::STOP_BROADCAST,
            Self::ChangeCamera(_) => methods::CHANGE_CAMERA,
            Self::ToggleMute => methods::MUTE,
            Self::IsMuted => methods::IS_MUTED,
            Self::SendTimedMetadata(_) => methods::SEND_TIME_METADATA,
            Self::GetCameraZoomFactor => methods::GET_CAMERA_ZOOM_FACTOR,
            Self::ZoomCamera(_) => methods::ZOOM_CAMERA,
            Self::Dispose => methods::DISPOSE,
        }
    }
}

fn string_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| args.get(*key).and_then(Value::as_str))
}

/// Successful result of a host command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// Boolean result.
    Bool(bool),

    /// Human-readable status string.
    Status(String),

    /// Numeric result.
    Number(f64),

    /// The capability does not exist on this platform.
    Unsupported,
}

impl CommandReply {
    /// Shorthand for a status reply.
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status(message.into())
    }

    /// Encode the reply for the host.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(*value),
            Self::Status(message) => Value::String(message.clone()),
            Self::Number(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Unsupported => serde_json::json!({ "supported": false }),
        }
    }
}
