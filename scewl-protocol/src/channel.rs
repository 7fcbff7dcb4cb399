//! Byte channel contract.
//!
//! A channel is pure byte transport for one physical link (CPU, radio or
//! FAA). It carries no framing, and the only guarantee is that bytes written
//! on a channel are read in the order they were written.

use crate::error::TransportError;
use std::collections::VecDeque;

/// Whether a read may wait for data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Wait until a byte arrives or the channel reaches end-of-data.
    Blocking,
    /// Return immediately when nothing is buffered.
    NonBlocking,
}

impl ReadMode {
    pub fn is_blocking(self) -> bool {
        self == ReadMode::Blocking
    }
}

/// Byte-level access to one physical link.
pub trait Channel {
    /// Reads one byte. `None` means no data: nothing buffered in
    /// non-blocking mode, or end-of-data in blocking mode.
    fn read_byte(&mut self, mode: ReadMode) -> Option<u8>;

    /// Fills `buf` from repeated [`read_byte`](Channel::read_byte) calls.
    ///
    /// Returns the number of bytes read before the channel ran dry, or `None`
    /// if not a single byte was available.
    fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> Option<usize> {
        let mut read = 0;
        while read < buf.len() {
            match self.read_byte(mode) {
                Some(byte) => {
                    buf[read] = byte;
                    read += 1;
                }
                None => break,
            }
        }
        if read == 0 && !buf.is_empty() {
            None
        } else {
            Some(read)
        }
    }

    /// Writes bytes, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn read_byte(&mut self, mode: ReadMode) -> Option<u8> {
        (**self).read_byte(mode)
    }

    fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> Option<usize> {
        (**self).read(buf, mode)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        (**self).write(bytes)
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn read_byte(&mut self, mode: ReadMode) -> Option<u8> {
        (**self).read_byte(mode)
    }

    fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> Option<usize> {
        (**self).read(buf, mode)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        (**self).write(bytes)
    }
}

/// In-memory channel with a scripted input queue and captured output.
///
/// Blocking reads on an empty queue report end-of-data instead of waiting,
/// so a test can script "the reply never came" by leaving the queue empty.
#[derive(Debug, Default, Clone)]
pub struct MemoryChannel {
    input: VecDeque<u8>,
    output: Vec<u8>,
    write_limit: Option<usize>,
    closed: bool,
    bytes_read: usize,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel with bytes already queued for reading.
    pub fn with_input(bytes: &[u8]) -> Self {
        let mut channel = Self::new();
        channel.push_input(bytes);
        channel
    }

    /// Queues bytes for reading.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Bytes queued but not yet read.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Total bytes read so far.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Drains and returns everything written so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Caps how many bytes a single write accepts.
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }

    /// Makes every later write fail.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Channel for MemoryChannel {
    fn read_byte(&mut self, _mode: ReadMode) -> Option<u8> {
        let byte = self.input.pop_front()?;
        self.bytes_read += 1;
        Some(byte)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let accepted = self.write_limit.map_or(bytes.len(), |l| l.min(bytes.len()));
        self.output.extend_from_slice(&bytes[..accepted]);
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_byte_in_order() {
        let mut channel = MemoryChannel::with_input(b"ab");
        assert_eq!(channel.read_byte(ReadMode::NonBlocking), Some(b'a'));
        assert_eq!(channel.read_byte(ReadMode::Blocking), Some(b'b'));
        assert_eq!(channel.read_byte(ReadMode::NonBlocking), None);
        assert_eq!(channel.read_byte(ReadMode::Blocking), None);
        assert_eq!(channel.bytes_read(), 2);
    }

    #[test]
    fn test_read_partial() {
        let mut channel = MemoryChannel::with_input(b"xyz");
        let mut buf = [0u8; 8];
        assert_eq!(channel.read(&mut buf, ReadMode::NonBlocking), Some(3));
        assert_eq!(&buf[..3], b"xyz");
        assert_eq!(channel.read(&mut buf, ReadMode::NonBlocking), None);
    }

    #[test]
    fn test_read_into_empty_buffer() {
        let mut channel = MemoryChannel::new();
        let mut buf = [0u8; 0];
        assert_eq!(channel.read(&mut buf, ReadMode::NonBlocking), Some(0));
    }

    #[test]
    fn test_write_captured() {
        let mut channel = MemoryChannel::new();
        assert_eq!(channel.write(b"hello").unwrap(), 5);
        assert_eq!(channel.output(), b"hello");
        assert_eq!(channel.take_output(), b"hello".to_vec());
        assert!(channel.output().is_empty());
    }

    #[test]
    fn test_write_limit_and_close() {
        let mut channel = MemoryChannel::new();
        channel.set_write_limit(Some(2));
        assert_eq!(channel.write(b"hello").unwrap(), 2);
        assert_eq!(channel.output(), b"he");

        channel.close();
        assert!(matches!(channel.write(b"x"), Err(TransportError::Closed)));
    }

    #[test]
    fn test_boxed_and_borrowed_channels() {
        let mut boxed: Box<dyn Channel> = Box::new(MemoryChannel::with_input(b"q"));
        assert_eq!(boxed.read_byte(ReadMode::NonBlocking), Some(b'q'));

        fn write_through<C: Channel>(mut channel: C) {
            channel.write(b"z").unwrap();
        }

        let mut inner = MemoryChannel::new();
        write_through(&mut inner);
        assert_eq!(inner.output(), b"z");
    }
}
