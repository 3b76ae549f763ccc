//! Bridge error taxonomy

use thiserror::Error;

use crate::wire::TypeMismatch;

/// Failure of a bridged call.
///
/// Argument errors are raised before anything is submitted. Every other
/// variant means the call was attempted and produced no value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("{function}: expected {expected} argument(s), got {got}")]
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("{function}: invalid argument: {mismatch}")]
    InvalidArgument {
        function: String,
        mismatch: TypeMismatch,
    },
    #[error("{function}: argument '{argument}' must be a callback")]
    CallbackExpected { function: String, argument: String },
    #[error("Peer is not connected")]
    NotConnected,
    #[error("{function}: remote error: {message}")]
    RemoteError { function: String, message: String },
    #[error("{function}: timed out after {ttl_ms} ms")]
    Timeout { function: String, ttl_ms: u64 },
    #[error("{function}: malformed response: {reason}")]
    MalformedResponse { function: String, reason: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BridgeError {
    /// True for failures detected before submission.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Self::ArityMismatch { .. }
                | Self::InvalidArgument { .. }
                | Self::CallbackExpected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
