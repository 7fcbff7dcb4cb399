//! CPU-side bus driver.

use crate::error::ClientError;
use scewl_protocol::{
    send_frame, Channel, DeviceId, Frame, FrameReader, ReadMode, RegistrationCode,
    RegistrationMessage, StreamLink, MAX_DATA_SIZE,
};
use std::collections::VecDeque;
use std::net::{TcpStream, ToSocketAddrs};
use std::os::unix::net::UnixStream;
use std::path::Path;

/// Talks to a bus controller over one link.
///
/// Every frame is stamped with this client's id as the source. Frames that
/// arrive while waiting for a registration reply are kept and handed out by
/// later [`recv`](BusClient::recv) calls.
pub struct BusClient<C: Channel> {
    channel: C,
    id: DeviceId,
    reader: FrameReader,
    backlog: VecDeque<Frame>,
}

impl BusClient<StreamLink<UnixStream>> {
    /// Connects to a controller listening on a Unix-domain socket.
    pub fn connect_unix(path: impl AsRef<Path>, id: DeviceId) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path)?;
        Ok(Self::new(StreamLink::new(stream), id))
    }
}

impl BusClient<StreamLink<TcpStream>> {
    /// Connects to a controller listening on TCP.
    pub fn connect_tcp(addr: impl ToSocketAddrs, id: DeviceId) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self::new(StreamLink::new(stream), id))
    }
}

impl<C: Channel> BusClient<C> {
    pub fn new(channel: C, id: DeviceId) -> Self {
        Self {
            channel,
            id,
            reader: FrameReader::default(),
            backlog: VecDeque::new(),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Asks the controller to register this device with the SSS.
    pub fn register(&mut self) -> Result<(), ClientError> {
        self.registration(RegistrationCode::Register)
    }

    /// Asks the controller to deregister this device.
    pub fn deregister(&mut self) -> Result<(), ClientError> {
        self.registration(RegistrationCode::Deregister)
    }

    /// Sends a message to another device, the FAA or (with
    /// [`DeviceId::BROADCAST`]) every device.
    pub fn send(&mut self, tgt: DeviceId, data: &[u8]) -> Result<(), ClientError> {
        if tgt == DeviceId::SSS {
            return Err(ClientError::ReservedTarget(tgt));
        }
        self.write(tgt, data)
    }

    /// Broadcasts a message on the bus.
    pub fn broadcast(&mut self, data: &[u8]) -> Result<(), ClientError> {
        self.write(DeviceId::BROADCAST, data)
    }

    /// Receives the next frame, or `None` if nothing arrived.
    pub fn recv(&mut self, mode: ReadMode) -> Option<Frame> {
        if let Some(frame) = self.backlog.pop_front() {
            return Some(frame);
        }
        self.reader.poll(&mut self.channel, mode)
    }

    fn write(&mut self, tgt: DeviceId, data: &[u8]) -> Result<(), ClientError> {
        if data.len() > MAX_DATA_SIZE {
            return Err(ClientError::PayloadTooLarge {
                size: data.len(),
                max: MAX_DATA_SIZE,
            });
        }
        let frame = Frame::new(self.id, tgt, data.to_vec());
        send_frame(&mut self.channel, &frame)?;
        Ok(())
    }

    fn registration(&mut self, op: RegistrationCode) -> Result<(), ClientError> {
        let msg = RegistrationMessage::new(self.id, op);
        self.write(DeviceId::SSS, &msg.encode())?;

        loop {
            let frame = self
                .reader
                .poll(&mut self.channel, ReadMode::Blocking)
                .ok_or(ClientError::NoReply)?;
            if frame.source != DeviceId::SSS {
                tracing::debug!("Queued frame from {} while waiting for {}", frame.source, op);
                self.backlog.push_back(frame);
                continue;
            }

            let reply = RegistrationMessage::decode(&frame.payload)?;
            return match reply.code {
                code if code == op => Ok(()),
                RegistrationCode::Already => Err(ClientError::Already),
                RegistrationCode::Failed => Err(ClientError::Rejected(op)),
                code => Err(ClientError::UnexpectedReply(format!(
                    "{} in reply to {}",
                    code, op
                ))),
            };
        }
    }
}
