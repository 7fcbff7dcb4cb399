//! Binary frame format for the SCEWL bus.
//!
//! Frame layout (8 bytes header + payload), all multi-byte fields little-endian:
//!
//! ```text
//! +--------+--------+--------+--------+--------+-----------------+
//! | magic0 | magic1 | tgt_id | src_id |  len   | payload         |
//! |  'S'   |  'C'   | 2 bytes| 2 bytes| 2 bytes| len bytes       |
//! +--------+--------+--------+--------+--------+-----------------+
//! ```

use crate::error::ProtocolError;
use crate::MAX_DATA_SIZE;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Magic bytes opening every frame: "SC".
pub const MAGIC: [u8; 2] = *b"SC";

/// Size of the fixed frame header in bytes (2+2+2+2 = 8).
pub const FRAME_HEADER_SIZE: usize = 8;

/// Header bytes following the magic.
pub const HEADER_TAIL_SIZE: usize = FRAME_HEADER_SIZE - 2;

/// A 16-bit SCEWL device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u16);

impl DeviceId {
    /// Broadcast target.
    pub const BROADCAST: DeviceId = DeviceId(0);
    /// The registrar (SSS).
    pub const SSS: DeviceId = DeviceId(1);
    /// The FAA override transceiver.
    pub const FAA: DeviceId = DeviceId(2);

    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns true for the broadcast, SSS and FAA identifiers.
    pub fn is_reserved(self) -> bool {
        self.0 <= Self::FAA.0
    }

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

impl From<u16> for DeviceId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl From<DeviceId> for u16 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BROADCAST => write!(f, "BROADCAST"),
            Self::SSS => write!(f, "SSS"),
            Self::FAA => write!(f, "FAA"),
            DeviceId(id) => write!(f, "{}", id),
        }
    }
}

/// Decoded fixed header fields following the magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub target: DeviceId,
    pub source: DeviceId,
    pub len: u16,
}

impl FrameHeader {
    /// Parses the six header bytes that follow the magic.
    pub fn from_bytes(raw: &[u8; HEADER_TAIL_SIZE]) -> Self {
        Self {
            target: DeviceId(u16::from_le_bytes([raw[0], raw[1]])),
            source: DeviceId(u16::from_le_bytes([raw[2], raw[3]])),
            len: u16::from_le_bytes([raw[4], raw[5]]),
        }
    }
}

/// A SCEWL frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Destination device.
    pub target: DeviceId,
    /// Sending device.
    pub source: DeviceId,
    /// Payload bytes actually captured.
    pub payload: Bytes,
    /// Length announced in the header. Larger than `payload.len()` when the
    /// reader's capacity cut the body short.
    declared_len: usize,
}

impl Frame {
    /// Creates a frame carrying the whole payload.
    pub fn new(source: DeviceId, target: DeviceId, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            target,
            source,
            declared_len: payload.len(),
            payload,
        }
    }

    pub(crate) fn truncated(header: FrameHeader, payload: Bytes) -> Self {
        Self {
            target: header.target,
            source: header.source,
            declared_len: header.len as usize,
            payload,
        }
    }

    /// Length announced in the header.
    pub fn declared_len(&self) -> usize {
        self.declared_len
    }

    /// Returns true when fewer payload bytes were captured than declared.
    pub fn is_truncated(&self) -> bool {
        self.payload.len() < self.declared_len
    }

    /// Checks the frame may travel on the bus: complete and within
    /// [`MAX_DATA_SIZE`].
    pub fn check_bus_len(&self) -> Result<(), ProtocolError> {
        if self.declared_len > MAX_DATA_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.declared_len,
                max: MAX_DATA_SIZE,
            });
        }
        if self.is_truncated() {
            return Err(ProtocolError::Truncated {
                declared: self.declared_len,
                captured: self.payload.len(),
            });
        }
        Ok(())
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        encode(self.source, self.target, &self.payload)
    }
}

/// Encodes a frame header and payload into a single buffer.
///
/// Identifiers are written as given. The only failure is a payload that does
/// not fit the 16-bit length field; the bus limit is the caller's business.
pub fn encode(source: DeviceId, target: DeviceId, payload: &[u8]) -> Result<BytesMut, ProtocolError> {
    let len = u16::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
        size: payload.len(),
        max: u16::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_slice(&MAGIC);
    buf.put_u16_le(target.0);
    buf.put_u16_le(source.0);
    buf.put_u16_le(len);
    buf.put_slice(payload);
    Ok(buf)
}
