//! Registration messages exchanged with the SSS.
//!
//! A registration message is the 4-byte payload of a frame addressed to the
//! SSS: the device id followed by an operation code, both little-endian. The
//! SSS answers with the same shape.

use crate::error::ProtocolError;
use crate::frame::DeviceId;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Size of an encoded registration message.
pub const REGISTRATION_MESSAGE_SIZE: usize = 4;

/// Operation / outcome code carried in a registration message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationCode {
    /// Join the bus. Echoed by the SSS on success.
    Register,
    /// Leave the bus. Echoed by the SSS on success.
    Deregister,
    /// The device was already in the requested state.
    Already,
    /// The controller could not complete the request (controller to CPU only).
    Failed,
}

impl RegistrationCode {
    const REGISTER: u16 = 0;
    const DEREGISTER: u16 = 1;
    const ALREADY: u16 = 0xFFFF;
    const FAILED: u16 = 0xFFFE;

    pub fn to_wire(self) -> u16 {
        match self {
            RegistrationCode::Register => Self::REGISTER,
            RegistrationCode::Deregister => Self::DEREGISTER,
            RegistrationCode::Already => Self::ALREADY,
            RegistrationCode::Failed => Self::FAILED,
        }
    }

    pub fn from_wire(code: u16) -> Result<Self, ProtocolError> {
        match code {
            Self::REGISTER => Ok(RegistrationCode::Register),
            Self::DEREGISTER => Ok(RegistrationCode::Deregister),
            Self::ALREADY => Ok(RegistrationCode::Already),
            Self::FAILED => Ok(RegistrationCode::Failed),
            other => Err(ProtocolError::UnknownRegistrationCode(other)),
        }
    }

    /// Returns true for the two request operations.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            RegistrationCode::Register | RegistrationCode::Deregister
        )
    }
}

impl fmt::Display for RegistrationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationCode::Register => write!(f, "REGISTER"),
            RegistrationCode::Deregister => write!(f, "DEREGISTER"),
            RegistrationCode::Already => write!(f, "ALREADY"),
            RegistrationCode::Failed => write!(f, "FAILED"),
        }
    }
}

/// A registration request or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationMessage {
    pub device_id: DeviceId,
    pub code: RegistrationCode,
}

impl RegistrationMessage {
    pub fn new(device_id: DeviceId, code: RegistrationCode) -> Self {
        Self { device_id, code }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REGISTRATION_MESSAGE_SIZE);
        buf.put_u16_le(self.device_id.get());
        buf.put_u16_le(self.code.to_wire());
        buf.freeze()
    }

    /// Decodes a message; the payload must be exactly
    /// [`REGISTRATION_MESSAGE_SIZE`] bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let raw: [u8; REGISTRATION_MESSAGE_SIZE] = payload
            .try_into()
            .map_err(|_| ProtocolError::InvalidRegistrationSize(payload.len()))?;
        Ok(Self {
            device_id: DeviceId::new(u16::from_le_bytes([raw[0], raw[1]])),
            code: RegistrationCode::from_wire(u16::from_le_bytes([raw[2], raw[3]]))?,
        })
    }
}
