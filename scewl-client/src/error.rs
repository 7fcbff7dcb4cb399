//! Client error types.

use scewl_protocol::{DeviceId, ProtocolError, RegistrationCode, TransportError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("target {0} cannot be addressed directly")]
    ReservedTarget(DeviceId),

    #[error("no reply from controller")]
    NoReply,

    #[error("already in requested state")]
    Already,

    #[error("controller could not complete {0}")]
    Rejected(RegistrationCode),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Transport(e) => ClientError::Transport(e),
            other => ClientError::Protocol(other),
        }
    }
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::NoReply | ClientError::Rejected(_))
    }
}
