//! Registration with the SSS.
//!
//! The manager owns this device's identity and its bus registration state.
//! [`register`](RegistrationManager::register) and
//! [`deregister`](RegistrationManager::deregister) are blocking handshakes
//! used at boot; the router drives the same exchange in two halves
//! ([`send_request`](RegistrationManager::send_request) then
//! [`complete`](RegistrationManager::complete)) so the dispatch loop never
//! waits on the radio.

use crate::error::{GatewayError, Refusal};
use scewl_protocol::{
    decode, send_frame, Channel, DeviceId, Frame, ProtocolError, ReadMode, RegistrationCode,
    RegistrationMessage, REGISTRATION_MESSAGE_SIZE,
};

/// Bus registration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationState {
    #[default]
    Unregistered,
    Registered,
}

/// Result of the boot handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    Registered,
    /// Recovery failed; the bus stays closed until reset.
    Denied,
}

/// Tracks registration state for one device.
#[derive(Debug)]
pub struct RegistrationManager {
    device_id: DeviceId,
    state: RegistrationState,
    denied: bool,
}

impl RegistrationManager {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            state: RegistrationState::Unregistered,
            denied: false,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn is_registered(&self) -> bool {
        self.state == RegistrationState::Registered
    }

    /// Returns true once boot recovery has been exhausted.
    pub fn is_denied(&self) -> bool {
        self.denied
    }

    /// Checks that bus traffic may flow.
    pub fn check_bus_access(&self) -> Result<(), Refusal> {
        if self.denied {
            Err(Refusal::BusDenied)
        } else if !self.is_registered() {
            Err(Refusal::NotRegistered)
        } else {
            Ok(())
        }
    }

    /// Registers with the SSS, waiting for its reply.
    pub fn register<C: Channel + ?Sized>(&mut self, radio: &mut C) -> Result<(), GatewayError> {
        self.exchange(radio, RegistrationCode::Register)
    }

    /// Deregisters with the SSS, waiting for its reply.
    pub fn deregister<C: Channel + ?Sized>(&mut self, radio: &mut C) -> Result<(), GatewayError> {
        self.exchange(radio, RegistrationCode::Deregister)
    }

    /// Runs the boot handshake.
    ///
    /// A failed registration is retried exactly once after a deregistration
    /// that resets the SSS's view of this device. If the retry fails too the
    /// bus is denied for the rest of the run.
    pub fn boot<C: Channel + ?Sized>(&mut self, radio: &mut C) -> BootOutcome {
        match self.register(radio) {
            Ok(()) => {
                tracing::info!("Device {} registered", self.device_id);
                return BootOutcome::Registered;
            }
            Err(e) => tracing::warn!(
                "Device {} registration failed ({}), resetting with SSS",
                self.device_id,
                e.kind()
            ),
        }

        if let Err(e) = self.deregister(radio) {
            tracing::debug!("Reset deregistration returned {}", e.kind());
        }

        match self.register(radio) {
            Ok(()) => {
                tracing::info!("Device {} registered after reset", self.device_id);
                BootOutcome::Registered
            }
            Err(e) => {
                tracing::error!(
                    "Device {} registration retry failed ({}), bus denied",
                    self.device_id,
                    e.kind()
                );
                self.denied = true;
                BootOutcome::Denied
            }
        }
    }

    /// Sends a registration request to the SSS without waiting for the reply.
    pub fn send_request<C: Channel + ?Sized>(
        &self,
        radio: &mut C,
        op: RegistrationCode,
    ) -> Result<(), GatewayError> {
        if !op.is_request() {
            return Err(Refusal::InvalidRequest(format!("{} is not a request", op)).into());
        }
        let msg = RegistrationMessage::new(self.device_id, op);
        let frame = Frame::new(self.device_id, DeviceId::SSS, msg.encode());
        send_frame(radio, &frame)?;
        tracing::debug!("Sent {} for device {} to SSS", op, self.device_id);
        Ok(())
    }

    /// Applies the SSS reply to a request sent with
    /// [`send_request`](Self::send_request).
    ///
    /// Only a well-formed reply from the SSS, addressed to this device and
    /// echoing `op`, changes state.
    pub fn complete(&mut self, op: RegistrationCode, reply: &Frame) -> Result<(), GatewayError> {
        if reply.source != DeviceId::SSS {
            return Err(unexpected(format!("reply from {}", reply.source)));
        }
        if reply.target != self.device_id {
            return Err(unexpected(format!("reply addressed to {}", reply.target)));
        }
        reply.check_bus_len()?;

        let msg = RegistrationMessage::decode(&reply.payload)?;
        if msg.device_id != self.device_id {
            return Err(unexpected(format!("reply names device {}", msg.device_id)));
        }

        match msg.code {
            code if code == op => {
                self.state = match op {
                    RegistrationCode::Register => RegistrationState::Registered,
                    _ => RegistrationState::Unregistered,
                };
                tracing::info!("Device {} {} acknowledged", self.device_id, op);
                Ok(())
            }
            RegistrationCode::Already => Err(GatewayError::Already),
            code => Err(unexpected(format!("{} in reply to {}", code, op))),
        }
    }

    fn exchange<C: Channel + ?Sized>(
        &mut self,
        radio: &mut C,
        op: RegistrationCode,
    ) -> Result<(), GatewayError> {
        self.send_request(radio, op)?;
        let reply = decode(radio, REGISTRATION_MESSAGE_SIZE, ReadMode::Blocking)
            .ok_or(GatewayError::NoMessage)?;
        self.complete(op, &reply)
    }
}

fn unexpected(detail: String) -> GatewayError {
    GatewayError::Protocol(ProtocolError::UnexpectedReply(detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scewl_protocol::{encode, MemoryChannel};

    const ME: DeviceId = DeviceId::new(5);

    fn reply(src: DeviceId, tgt: DeviceId, dev: DeviceId, code: RegistrationCode) -> Vec<u8> {
        let msg = RegistrationMessage::new(dev, code).encode();
        encode(src, tgt, &msg).unwrap().to_vec()
    }

    fn sss_reply(code: RegistrationCode) -> Vec<u8> {
        reply(DeviceId::SSS, ME, ME, code)
    }

    /// Decodes every frame written to a channel.
    fn written_frames(channel: &MemoryChannel) -> Vec<Frame> {
        let mut out = MemoryChannel::with_input(channel.output());
        std::iter::from_fn(|| decode(&mut out, 64, ReadMode::NonBlocking)).collect()
    }

    fn request_codes(channel: &MemoryChannel) -> Vec<RegistrationCode> {
        written_frames(channel)
            .iter()
            .map(|f| RegistrationMessage::decode(&f.payload).unwrap().code)
            .collect()
    }

    #[test]
    fn test_register_ok() {
        let mut radio = MemoryChannel::with_input(&sss_reply(RegistrationCode::Register));
        let mut mgr = RegistrationManager::new(ME);

        mgr.register(&mut radio).unwrap();
        assert!(mgr.is_registered());
        assert!(mgr.check_bus_access().is_ok());

        let sent = written_frames(&radio);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].source, ME);
        assert_eq!(sent[0].target, DeviceId::SSS);
        assert_eq!(sent[0].payload.as_ref(), &[0x05, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_register_already_keeps_state() {
        let mut radio = MemoryChannel::with_input(&sss_reply(RegistrationCode::Already));
        let mut mgr = RegistrationManager::new(ME);

        assert!(matches!(mgr.register(&mut radio), Err(GatewayError::Already)));
        assert_eq!(mgr.state(), RegistrationState::Unregistered);
    }

    #[test]
    fn test_register_no_reply() {
        let mut radio = MemoryChannel::new();
        let mut mgr = RegistrationManager::new(ME);
        assert!(matches!(mgr.register(&mut radio), Err(GatewayError::NoMessage)));
        assert!(!mgr.is_registered());
    }

    #[test]
    fn test_register_transport_failure() {
        let mut radio = MemoryChannel::new();
        radio.close();
        let mut mgr = RegistrationManager::new(ME);
        assert!(matches!(mgr.register(&mut radio), Err(GatewayError::Transport(_))));
    }

    #[test]
    fn test_malformed_replies_rejected() {
        let bad = [
            reply(DeviceId::new(9), ME, ME, RegistrationCode::Register),
            reply(DeviceId::SSS, DeviceId::new(6), ME, RegistrationCode::Register),
            reply(DeviceId::SSS, ME, DeviceId::new(6), RegistrationCode::Register),
            reply(DeviceId::SSS, ME, ME, RegistrationCode::Deregister),
            encode(DeviceId::SSS, ME, &[5, 0, 0]).unwrap().to_vec(),
            encode(DeviceId::SSS, ME, &[5, 0, 0, 0, 0]).unwrap().to_vec(),
            encode(DeviceId::SSS, ME, &[5, 0, 9, 9]).unwrap().to_vec(),
        ];

        for bytes in bad {
            let mut radio = MemoryChannel::with_input(&bytes);
            let mut mgr = RegistrationManager::new(ME);
            let result = mgr.register(&mut radio);
            assert!(matches!(result, Err(GatewayError::Protocol(_))), "{:?}", result);
            assert!(!mgr.is_registered());
        }
    }

    #[test]
    fn test_deregister_ok() {
        let mut input = sss_reply(RegistrationCode::Register);
        input.extend(sss_reply(RegistrationCode::Deregister));
        let mut radio = MemoryChannel::with_input(&input);
        let mut mgr = RegistrationManager::new(ME);

        mgr.register(&mut radio).unwrap();
        mgr.deregister(&mut radio).unwrap();
        assert_eq!(mgr.state(), RegistrationState::Unregistered);
        assert_eq!(mgr.check_bus_access(), Err(Refusal::NotRegistered));
    }

    #[test]
    fn test_boot_first_try() {
        let mut radio = MemoryChannel::with_input(&sss_reply(RegistrationCode::Register));
        let mut mgr = RegistrationManager::new(ME);

        assert_eq!(mgr.boot(&mut radio), BootOutcome::Registered);
        assert_eq!(request_codes(&radio), vec![RegistrationCode::Register]);
    }

    #[test]
    fn test_boot_already_recovers() {
        let mut input = sss_reply(RegistrationCode::Already);
        input.extend(sss_reply(RegistrationCode::Deregister));
        input.extend(sss_reply(RegistrationCode::Register));
        let mut radio = MemoryChannel::with_input(&input);
        let mut mgr = RegistrationManager::new(ME);

        assert_eq!(mgr.boot(&mut radio), BootOutcome::Registered);
        assert!(mgr.is_registered());
        assert_eq!(
            request_codes(&radio),
            vec![
                RegistrationCode::Register,
                RegistrationCode::Deregister,
                RegistrationCode::Register
            ]
        );
    }

    #[test]
    fn test_boot_already_twice_denies() {
        let mut input = sss_reply(RegistrationCode::Already);
        input.extend(sss_reply(RegistrationCode::Already));
        input.extend(sss_reply(RegistrationCode::Already));
        let mut radio = MemoryChannel::with_input(&input);
        let mut mgr = RegistrationManager::new(ME);

        assert_eq!(mgr.boot(&mut radio), BootOutcome::Denied);
        assert!(mgr.is_denied());
        assert_eq!(request_codes(&radio).len(), 3);
        assert_eq!(mgr.check_bus_access(), Err(Refusal::BusDenied));
    }

    #[test]
    fn test_boot_lost_replies_denies() {
        let mut radio = MemoryChannel::new();
        let mut mgr = RegistrationManager::new(ME);
        assert_eq!(mgr.boot(&mut radio), BootOutcome::Denied);
        assert_eq!(
            request_codes(&radio),
            vec![
                RegistrationCode::Register,
                RegistrationCode::Deregister,
                RegistrationCode::Register
            ]
        );
    }

    #[test]
    fn test_send_request_rejects_outcome_codes() {
        let mut radio = MemoryChannel::new();
        let mgr = RegistrationManager::new(ME);
        let result = mgr.send_request(&mut radio, RegistrationCode::Already);
        assert!(matches!(
            result,
            Err(GatewayError::Refused(Refusal::InvalidRequest(_)))
        ));
        assert!(radio.output().is_empty());
    }

    #[test]
    fn test_complete_truncated_reply() {
        let mut radio = MemoryChannel::with_input(
            &encode(DeviceId::SSS, ME, &[5, 0, 0, 0, 0, 0]).unwrap(),
        );
        let reply = decode(&mut radio, REGISTRATION_MESSAGE_SIZE, ReadMode::Blocking).unwrap();
        assert!(reply.is_truncated());

        let mut mgr = RegistrationManager::new(ME);
        let result = mgr.complete(RegistrationCode::Register, &reply);
        assert!(matches!(
            result,
            Err(GatewayError::Protocol(ProtocolError::Truncated { .. }))
        ));
    }
}
