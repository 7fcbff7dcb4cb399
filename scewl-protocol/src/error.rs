//! Protocol and transport error types.

use thiserror::Error;

/// Failures of the underlying byte transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel closed")]
    Closed,

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Protocol-level errors that can occur during framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("truncated frame: declared {declared} bytes, captured {captured}")]
    Truncated { declared: usize, captured: usize },

    #[error("invalid registration message size: {0} bytes")]
    InvalidRegistrationSize(usize),

    #[error("unknown registration code: {0:#06x}")]
    UnknownRegistrationCode(u16),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
