//! Channel implementation over host byte streams.
//!
//! Hosted builds stand in for the UARTs with Unix-domain or TCP sockets.
//! [`StreamLink`] switches the socket between blocking and non-blocking mode
//! per read and buffers whatever a single `read` syscall returns.

use crate::channel::{Channel, ReadMode};
use crate::error::TransportError;
use bytes::{Buf, BytesMut};
use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Size of a single socket read.
const READ_CHUNK: usize = 4096;

/// Streams whose blocking behaviour can be switched at runtime.
pub trait ModeSwitch: Read + Write {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl ModeSwitch for TcpStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

#[cfg(unix)]
impl ModeSwitch for std::os::unix::net::UnixStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        std::os::unix::net::UnixStream::set_nonblocking(self, nonblocking)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }
}

/// A [`Channel`] backed by a socket.
#[derive(Debug)]
pub struct StreamLink<S> {
    stream: S,
    nonblocking: Option<bool>,
    buffer: BytesMut,
    closed: bool,
}

impl<S: ModeSwitch> StreamLink<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            nonblocking: None,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            closed: false,
        }
    }

    /// Bounds blocking reads; a read that times out reports end-of-data.
    pub fn with_read_timeout(self, timeout: Option<Duration>) -> io::Result<Self> {
        self.stream.set_read_timeout(timeout)?;
        Ok(self)
    }

    /// Returns true once the peer closed its side.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn set_mode(&mut self, nonblocking: bool) -> io::Result<()> {
        if self.nonblocking != Some(nonblocking) {
            self.stream.set_nonblocking(nonblocking)?;
            self.nonblocking = Some(nonblocking);
        }
        Ok(())
    }

    fn fill(&mut self, mode: ReadMode) -> io::Result<usize> {
        self.set_mode(!mode.is_blocking())?;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: ModeSwitch> Channel for StreamLink<S> {
    fn read_byte(&mut self, mode: ReadMode) -> Option<u8> {
        if self.buffer.has_remaining() {
            return Some(self.buffer.get_u8());
        }
        if self.closed {
            return None;
        }

        match self.fill(mode) {
            Ok(0) => {
                tracing::debug!("Link closed by peer");
                self.closed = true;
                None
            }
            Ok(_) => Some(self.buffer.get_u8()),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => None,
            Err(e) => {
                tracing::warn!("Link read error, closing: {}", e);
                self.closed = true;
                None
            }
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.set_mode(false)?;
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(bytes.len())
    }
}
