//! # scewl-protocol
//!
//! Wire protocol implementation for the SCEWL bus.
//!
//! This crate provides:
//! - The fixed `SC` frame format (little-endian header, bounded payload)
//! - A resynchronizing frame reader that survives line noise
//! - Registration messages exchanged with the SSS
//! - The byte channel contract the controller is built on, plus in-memory
//!   and stream-backed implementations

pub mod channel;
pub mod codec;
pub mod error;
pub mod frame;
pub mod link;
pub mod message;

pub use channel::{Channel, MemoryChannel, ReadMode};
pub use codec::{decode, send_frame, FrameReader, MarkerScanner, ScanState};
pub use error::{ProtocolError, TransportError};
pub use frame::{encode, DeviceId, Frame, FRAME_HEADER_SIZE, MAGIC};
pub use link::{ModeSwitch, StreamLink};
pub use message::{RegistrationCode, RegistrationMessage, REGISTRATION_MESSAGE_SIZE};

/// Maximum payload carried by a bus frame (16 KiB).
pub const MAX_DATA_SIZE: usize = 0x4000;
