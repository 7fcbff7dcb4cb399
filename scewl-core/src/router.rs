//! Routing and security core.
//!
//! The router sits between the CPU and the three outside links. Every frame
//! is read with a resumable [`FrameReader`], classified by the link it came
//! from, and handed to exactly one handler. Bus traffic (radio unicast and
//! broadcast, both directions) flows only while the device is registered;
//! FAA traffic always flows.

use crate::error::{GatewayError, Refusal};
use crate::registration::{BootOutcome, RegistrationManager};
use bytes::Bytes;
use scewl_protocol::{
    send_frame, Channel, DeviceId, Frame, FrameReader, ReadMode, RegistrationCode,
    RegistrationMessage, MAX_DATA_SIZE,
};
use std::fmt;
use std::time::Duration;

/// Identifies one of the controller's links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    Cpu,
    Radio,
    Faa,
}

impl LinkKind {
    /// Poll order of the dispatch loop.
    pub const POLL_ORDER: [LinkKind; 3] = [LinkKind::Faa, LinkKind::Radio, LinkKind::Cpu];
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Cpu => write!(f, "cpu"),
            LinkKind::Radio => write!(f, "radio"),
            LinkKind::Faa => write!(f, "faa"),
        }
    }
}

/// One value per link.
#[derive(Debug, Clone, Default)]
pub struct Links<T> {
    pub cpu: T,
    pub radio: T,
    pub faa: T,
}

impl<T> Links<T> {
    pub fn new(cpu: T, radio: T, faa: T) -> Self {
        Self { cpu, radio, faa }
    }

    pub fn get(&self, kind: LinkKind) -> &T {
        match kind {
            LinkKind::Cpu => &self.cpu,
            LinkKind::Radio => &self.radio,
            LinkKind::Faa => &self.faa,
        }
    }

    pub fn get_mut(&mut self, kind: LinkKind) -> &mut T {
        match kind {
            LinkKind::Cpu => &mut self.cpu,
            LinkKind::Radio => &mut self.radio,
            LinkKind::Faa => &mut self.faa,
        }
    }
}

/// Traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Frames delivered to the CPU.
    pub to_cpu: u64,
    /// Frames written to the radio.
    pub to_radio: u64,
    /// Frames written to the FAA link.
    pub to_faa: u64,
    /// Frames dropped by routing rules.
    pub dropped: u64,
    /// Requests refused by a handler.
    pub refused: u64,
    /// Handler failures other than refusals.
    pub errors: u64,
    /// Registration outcomes reported to the CPU.
    pub registrations: u64,
}

/// The gateway: registration state, links and routing rules.
pub struct Router<C: Channel> {
    links: Links<C>,
    readers: Links<FrameReader>,
    registration: RegistrationManager,
    pending: Option<RegistrationCode>,
    capacity: usize,
    stats: RouterStats,
}

impl<C: Channel> Router<C> {
    /// Creates a router for `device_id`, starting unregistered.
    pub fn new(device_id: DeviceId, links: Links<C>) -> Self {
        Self::with_capacity(device_id, links, MAX_DATA_SIZE)
    }

    /// Creates a router whose readers keep at most `capacity` payload bytes.
    pub fn with_capacity(device_id: DeviceId, links: Links<C>, capacity: usize) -> Self {
        let capacity = capacity.min(MAX_DATA_SIZE);
        Self {
            links,
            readers: Links::new(
                FrameReader::new(capacity),
                FrameReader::new(capacity),
                FrameReader::new(capacity),
            ),
            registration: RegistrationManager::new(device_id),
            pending: None,
            capacity,
            stats: RouterStats::default(),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.registration.device_id()
    }

    pub fn registration(&self) -> &RegistrationManager {
        &self.registration
    }

    /// The registration request awaiting an SSS reply, if any.
    pub fn pending_registration(&self) -> Option<RegistrationCode> {
        self.pending
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn links(&self) -> &Links<C> {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut Links<C> {
        &mut self.links
    }

    pub fn into_links(self) -> Links<C> {
        self.links
    }

    /// Runs the blocking boot handshake on the radio link.
    pub fn boot(&mut self) -> BootOutcome {
        self.registration.boot(&mut self.links.radio)
    }

    /// Radio unicast for this device, delivered to the CPU.
    pub fn handle_scewl_recv(&mut self, src: DeviceId, payload: Bytes) -> Result<(), GatewayError> {
        self.registration.check_bus_access()?;
        let frame = Frame::new(src, self.device_id(), payload);
        self.deliver(LinkKind::Cpu, &frame)
    }

    /// CPU unicast to another device over the radio.
    pub fn handle_scewl_send(&mut self, tgt: DeviceId, payload: Bytes) -> Result<(), GatewayError> {
        self.registration.check_bus_access()?;
        check_len(payload.len(), MAX_DATA_SIZE)?;
        if tgt.is_reserved() || tgt == self.device_id() {
            return Err(Refusal::ReservedTarget(tgt).into());
        }
        let frame = Frame::new(self.device_id(), tgt, payload);
        self.deliver(LinkKind::Radio, &frame)
    }

    /// Radio broadcast, delivered to the CPU.
    pub fn handle_brdcst_recv(&mut self, src: DeviceId, payload: Bytes) -> Result<(), GatewayError> {
        self.registration.check_bus_access()?;
        let frame = Frame::new(src, DeviceId::BROADCAST, payload);
        self.deliver(LinkKind::Cpu, &frame)
    }

    /// CPU broadcast over the radio.
    pub fn handle_brdcst_send(&mut self, payload: Bytes) -> Result<(), GatewayError> {
        self.registration.check_bus_access()?;
        check_len(payload.len(), MAX_DATA_SIZE)?;
        let frame = Frame::new(self.device_id(), DeviceId::BROADCAST, payload);
        self.deliver(LinkKind::Radio, &frame)
    }

    /// FAA message, delivered to the CPU regardless of registration.
    pub fn handle_faa_recv(&mut self, payload: Bytes) -> Result<(), GatewayError> {
        check_len(payload.len(), self.capacity)?;
        let frame = Frame::new(DeviceId::FAA, self.device_id(), payload);
        self.deliver(LinkKind::Cpu, &frame)
    }

    /// CPU message to the FAA regardless of registration.
    pub fn handle_faa_send(&mut self, payload: Bytes) -> Result<(), GatewayError> {
        check_len(payload.len(), self.capacity)?;
        let frame = Frame::new(self.device_id(), DeviceId::FAA, payload);
        self.deliver(LinkKind::Faa, &frame)
    }

    /// CPU request to register or deregister.
    ///
    /// The request goes out to the SSS and stays pending until the reply
    /// arrives on the radio. A request that cannot be sent is answered with
    /// `FAILED` right away.
    pub fn handle_registration(&mut self, request: &[u8]) -> Result<(), GatewayError> {
        let result = self.start_registration(request);
        if let Err(ref e) = result {
            tracing::warn!("Registration request refused: {}", e);
            if let Err(report) = self.report_registration(RegistrationCode::Failed) {
                tracing::warn!("Could not report registration failure: {}", report);
            }
        }
        result
    }

    /// Polls every link once, handling at most one frame per link.
    ///
    /// Returns the number of frames handled.
    pub fn poll_once(&mut self) -> usize {
        let mut handled = 0;
        for kind in LinkKind::POLL_ORDER {
            let reader = self.readers.get_mut(kind);
            let Some(frame) = reader.poll(self.links.get_mut(kind), ReadMode::NonBlocking) else {
                continue;
            };
            handled += 1;

            let result = match kind {
                LinkKind::Faa => self.dispatch_faa(frame),
                LinkKind::Radio => self.dispatch_radio(frame),
                LinkKind::Cpu => self.dispatch_cpu(frame),
            };
            if let Err(e) = result {
                self.record_error(kind, &e);
            }
        }
        handled
    }

    /// Runs the dispatch loop until `stop` returns true.
    ///
    /// When an iteration handles nothing the loop sleeps for `idle_sleep`.
    pub fn run_until<F>(&mut self, idle_sleep: Option<Duration>, mut stop: F)
    where
        F: FnMut(&Self) -> bool,
    {
        while !stop(self) {
            if self.poll_once() == 0 {
                if let Some(pause) = idle_sleep.filter(|d| !d.is_zero()) {
                    std::thread::sleep(pause);
                }
            }
        }
    }

    /// Runs the dispatch loop forever.
    pub fn run(&mut self, idle_sleep: Option<Duration>) -> ! {
        loop {
            self.run_until(idle_sleep, |_| false);
        }
    }

    fn dispatch_faa(&mut self, frame: Frame) -> Result<(), GatewayError> {
        let me = self.device_id();
        if frame.target != me && !frame.target.is_broadcast() {
            self.drop_frame(LinkKind::Faa, &frame, "foreign target");
            return Ok(());
        }
        if frame.is_truncated() {
            tracing::debug!(
                "FAA frame cut from {} to {} bytes",
                frame.declared_len(),
                frame.payload.len()
            );
        }
        self.handle_faa_recv(frame.payload)
    }

    fn dispatch_radio(&mut self, frame: Frame) -> Result<(), GatewayError> {
        let me = self.device_id();
        if frame.source == me || frame.source == DeviceId::FAA {
            self.drop_frame(LinkKind::Radio, &frame, "spoofed source");
            return Ok(());
        }
        if frame.source == DeviceId::SSS {
            if frame.target != me {
                self.drop_frame(LinkKind::Radio, &frame, "registrar reply for another device");
                return Ok(());
            }
            self.complete_registration(&frame);
            return Ok(());
        }
        if let Err(e) = frame.check_bus_len() {
            self.drop_frame(LinkKind::Radio, &frame, &e.to_string());
            return Ok(());
        }

        match frame.target {
            DeviceId::BROADCAST => self.handle_brdcst_recv(frame.source, frame.payload),
            tgt if tgt == me => self.handle_scewl_recv(frame.source, frame.payload),
            _ => {
                self.drop_frame(LinkKind::Radio, &frame, "foreign target");
                Ok(())
            }
        }
    }

    fn dispatch_cpu(&mut self, frame: Frame) -> Result<(), GatewayError> {
        if frame.is_truncated() {
            return Err(Refusal::PayloadTooLarge {
                size: frame.declared_len(),
                max: self.capacity,
            }
            .into());
        }
        match frame.target {
            DeviceId::BROADCAST => self.handle_brdcst_send(frame.payload),
            DeviceId::SSS => self.handle_registration(&frame.payload),
            DeviceId::FAA => self.handle_faa_send(frame.payload),
            tgt => self.handle_scewl_send(tgt, frame.payload),
        }
    }

    fn start_registration(&mut self, request: &[u8]) -> Result<(), GatewayError> {
        if self.registration.is_denied() {
            return Err(Refusal::BusDenied.into());
        }
        let msg = RegistrationMessage::decode(request)
            .map_err(|e| Refusal::InvalidRequest(e.to_string()))?;
        let me = self.device_id();
        if msg.device_id != me {
            return Err(Refusal::IdentityMismatch {
                claimed: msg.device_id,
                actual: me,
            }
            .into());
        }
        if !msg.code.is_request() {
            return Err(Refusal::InvalidRequest(format!("{} is not a request", msg.code)).into());
        }

        if let Some(previous) = self.pending.take() {
            tracing::debug!("{} request superseded by {}", previous, msg.code);
        }
        self.registration
            .send_request(&mut self.links.radio, msg.code)?;
        self.pending = Some(msg.code);
        Ok(())
    }

    fn complete_registration(&mut self, reply: &Frame) {
        let Some(op) = self.pending.take() else {
            self.drop_frame(LinkKind::Radio, reply, "no registration pending");
            return;
        };

        let outcome = match self.registration.complete(op, reply) {
            Ok(()) => op,
            Err(GatewayError::Already) => RegistrationCode::Already,
            Err(e) => {
                tracing::warn!("{} failed: {}", op, e);
                RegistrationCode::Failed
            }
        };
        if let Err(e) = self.report_registration(outcome) {
            self.record_error(LinkKind::Cpu, &e);
        }
    }

    fn report_registration(&mut self, code: RegistrationCode) -> Result<(), GatewayError> {
        let me = self.device_id();
        let msg = RegistrationMessage::new(me, code);
        let frame = Frame::new(DeviceId::SSS, me, msg.encode());
        self.deliver(LinkKind::Cpu, &frame)?;
        self.stats.registrations += 1;
        Ok(())
    }

    fn deliver(&mut self, kind: LinkKind, frame: &Frame) -> Result<(), GatewayError> {
        send_frame(self.links.get_mut(kind), frame)?;
        match kind {
            LinkKind::Cpu => self.stats.to_cpu += 1,
            LinkKind::Radio => self.stats.to_radio += 1,
            LinkKind::Faa => self.stats.to_faa += 1,
        }
        tracing::trace!(
            "{} -> {} ({} bytes) on {}",
            frame.source,
            frame.target,
            frame.payload.len(),
            kind
        );
        Ok(())
    }

    fn drop_frame(&mut self, kind: LinkKind, frame: &Frame, reason: &str) {
        self.stats.dropped += 1;
        tracing::debug!(
            "Dropped {} frame {} -> {}: {}",
            kind,
            frame.source,
            frame.target,
            reason
        );
    }

    fn record_error(&mut self, kind: LinkKind, err: &GatewayError) {
        if err.is_refusal() {
            self.stats.refused += 1;
            tracing::debug!("Refused {} frame: {}", kind, err);
        } else {
            self.stats.errors += 1;
            tracing::warn!("Handling {} frame failed ({}): {}", kind, err.kind(), err);
        }
    }
}

fn check_len(size: usize, max: usize) -> Result<(), Refusal> {
    if size > max {
        Err(Refusal::PayloadTooLarge { size, max })
    } else {
        Ok(())
    }
}
