//! Host method-call handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument};

use livecast_engine::{SessionError, SessionResult};
use livecast_ipc::{CommandReply, IpcError, SessionCommand};

use crate::BroadcasterHost;

/// Error code for methods the broadcaster does not implement.
pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";

/// Error code for arguments that could not be decoded.
pub const INVALID_ARGUMENTS: &str = "INVALID_ARGUMENTS";

const BROADCAST_STARTED: &str = "Broadcasting Started";
const BROADCAST_STOPPED: &str = "Broadcast Stopped";
const CAMERA_CHANGED: &str = "Camera Changed";
const MUTED: &str = "Muted";
const UNMUTED: &str = "Unmuted";

/// Error returned to the host for a failed method call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CommandError {
    /// Error tag, e.g. `SESSION_NOT_READY`.
    pub code: String,
    pub message: String,
}

impl From<SessionError> for CommandError {
    fn from(err: SessionError) -> Self {
        Self {
            code: err.tag().wire_name().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<IpcError> for CommandError {
    fn from(err: IpcError) -> Self {
        let code = match err {
            IpcError::UnknownMethod(_) => NOT_IMPLEMENTED,
            _ => INVALID_ARGUMENTS,
        };
        Self {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

impl BroadcasterHost {
    /// Handle one method call from the host.
    #[instrument(skip(self, args))]
    pub fn handle_method_call(&self, method: &str, args: &Value) -> CommandResult<Value> {
        debug!("method call");
        let command = SessionCommand::from_method_call(method, args)?;
        Ok(self.execute(command)?.to_value())
    }

    /// Run a decoded command against the current session.
    pub fn execute(&self, command: SessionCommand) -> CommandResult<CommandReply> {
        let method = command.method();
        let mut session = self.session.lock();

        let reply = match command {
            SessionCommand::StartPreview(request) => {
                if session.state().is_terminal() {
                    debug!(state = session.state().name(), "Replacing ended session");
                    *session = self.new_session();
                }
                session.start_preview(request)?;
                CommandReply::Bool(true)
            }
            SessionCommand::StartBroadcast => {
                session.start_broadcast()?;
                CommandReply::status(BROADCAST_STARTED)
            }
            SessionCommand::StopBroadcast => {
                session.stop();
                CommandReply::status(BROADCAST_STOPPED)
            }
            SessionCommand::ChangeCamera(facing) => {
                session.switch_camera(facing)?;
                CommandReply::status(CAMERA_CHANGED)
            }
            SessionCommand::ToggleMute => {
                let muted = session.toggle_mute()?;
                CommandReply::status(if muted { MUTED } else { UNMUTED })
            }
            SessionCommand::IsMuted => CommandReply::Bool(session.is_muted()),
            SessionCommand::SendTimedMetadata(payload) => {
                session.send_metadata(&payload)?;
                CommandReply::Bool(true)
            }
            SessionCommand::GetCameraZoomFactor => {
                unsupported_or(session.camera_zoom_range(), |(_, max)| {
                    CommandReply::Number(max)
                })?
            }
            SessionCommand::ZoomCamera(factor) => {
                unsupported_or(session.zoom_camera(factor), |()| CommandReply::Bool(true))?
            }
            SessionCommand::Dispose => {
                session.dispose();
                CommandReply::Bool(true)
            }
        };

        info!(method, "Command handled");
        Ok(reply)
    }
}

/// Map a missing platform capability to [`CommandReply::Unsupported`].
fn unsupported_or<T>(
    result: SessionResult<T>,
    reply: impl FnOnce(T) -> CommandReply,
) -> CommandResult<CommandReply> {
    match result {
        Ok(value) => Ok(reply(value)),
        Err(SessionError::Unsupported(capability)) => {
            debug!("{} is not supported", capability);
            Ok(CommandReply::Unsupported)
        }
        Err(e) => Err(e.into()),
    }
}
