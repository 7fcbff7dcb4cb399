//! Gateway error types.

use scewl_protocol::{DeviceId, ProtocolError, TransportError};
use thiserror::Error;

/// Reasons a handler refuses a request without touching any link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("device is not registered")]
    NotRegistered,

    #[error("bus access denied for this run")]
    BusDenied,

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("target {0} cannot be addressed directly")]
    ReservedTarget(DeviceId),

    #[error("request names device {claimed}, this device is {actual}")]
    IdentityMismatch { claimed: DeviceId, actual: DeviceId },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors from the routing core and the registration manager.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("no message")]
    NoMessage,

    #[error("already in requested state")]
    Already,

    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("refused: {0}")]
    Refused(#[from] Refusal),
}

impl From<ProtocolError> for GatewayError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Transport(e) => GatewayError::Transport(e),
            other => GatewayError::Protocol(other),
        }
    }
}

impl GatewayError {
    /// Returns a stable name for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "TRANSPORT",
            GatewayError::NoMessage => "NO_MESSAGE",
            GatewayError::Already => "ALREADY",
            GatewayError::Protocol(_) => "PROTOCOL",
            GatewayError::Refused(Refusal::NotRegistered) => "NOT_REGISTERED",
            GatewayError::Refused(Refusal::BusDenied) => "BUS_DENIED",
            GatewayError::Refused(Refusal::PayloadTooLarge { .. }) => "PAYLOAD_TOO_LARGE",
            GatewayError::Refused(Refusal::ReservedTarget(_)) => "RESERVED_TARGET",
            GatewayError::Refused(Refusal::IdentityMismatch { .. }) => "IDENTITY_MISMATCH",
            GatewayError::Refused(Refusal::InvalidRequest(_)) => "BAD_REQUEST",
        }
    }

    /// Returns true when the error is a policy refusal rather than a fault.
    pub fn is_refusal(&self) -> bool {
        matches!(self, GatewayError::Refused(_))
    }
}
