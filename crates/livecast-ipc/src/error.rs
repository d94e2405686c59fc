//! Error types for decoding host messages.

use thiserror::Error;

/// Errors raised while turning a host method call into a command.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The method name is not part of the command surface.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// A required argument is absent.
    #[error("Missing argument `{argument}` for {method}")]
    MissingArgument {
        method: &'static str,
        argument: &'static str,
    },

    /// Arguments could not be decoded.
    #[error("Malformed arguments for {method}: {source}")]
    MalformedArguments {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
