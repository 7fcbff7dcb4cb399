//! Frame reader and writer on top of a byte [`Channel`].
//!
//! Reading is byte-driven: a [`MarkerScanner`] hunts for the `SC` magic, the
//! six remaining header bytes are collected, then the body. Oversized bodies
//! are cut at the reader's capacity and the excess is drained from the same
//! channel so the next frame starts on a marker.

use crate::channel::{Channel, ReadMode};
use crate::error::{ProtocolError, TransportError};
use crate::frame::{Frame, FrameHeader, HEADER_TAIL_SIZE, MAGIC};
use crate::MAX_DATA_SIZE;
use bytes::BytesMut;

/// Marker scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Waiting for `'S'`.
    #[default]
    SeekFirstMarker,
    /// Saw `'S'`, waiting for `'C'`.
    SeekSecondMarker,
}

/// Two-state scanner for the frame magic.
///
/// Only `'S'` immediately followed by `'C'` completes the marker. A run of
/// `'S'` bytes keeps the scanner waiting for `'C'`, any other byte sends it
/// back to looking for `'S'`.
#[derive(Debug, Clone, Default)]
pub struct MarkerScanner {
    state: ScanState,
    skipped: usize,
}

impl MarkerScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Feeds one byte; returns true when it completed the marker.
    pub fn feed(&mut self, byte: u8) -> bool {
        match self.state {
            ScanState::SeekFirstMarker => {
                if byte == MAGIC[0] {
                    self.state = ScanState::SeekSecondMarker;
                } else {
                    self.skipped += 1;
                }
                false
            }
            ScanState::SeekSecondMarker => {
                if byte == MAGIC[1] {
                    self.state = ScanState::SeekFirstMarker;
                    true
                } else if byte == MAGIC[0] {
                    // repeated first marker: the newest 'S' may start the frame
                    self.skipped += 1;
                    false
                } else {
                    self.skipped += 2;
                    self.state = ScanState::SeekFirstMarker;
                    false
                }
            }
        }
    }

    /// Returns and resets the count of bytes discarded as noise.
    pub fn take_skipped(&mut self) -> usize {
        std::mem::take(&mut self.skipped)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Marker,
    Header,
    Body(FrameHeader),
}

/// Resumable frame reader for one channel.
///
/// Partial progress (marker, header, body, pending drain) survives a poll
/// that runs the channel dry, so a frame trickling in over several polls is
/// still assembled. The reader never consumes a byte past the end of the
/// frame it is building.
#[derive(Debug)]
pub struct FrameReader {
    capacity: usize,
    scanner: MarkerScanner,
    stage: Stage,
    header: [u8; HEADER_TAIL_SIZE],
    header_filled: usize,
    body: BytesMut,
    body_filled: usize,
    discard: usize,
}

impl FrameReader {
    /// Creates a reader keeping at most `capacity` payload bytes per frame.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            scanner: MarkerScanner::new(),
            stage: Stage::Marker,
            header: [0; HEADER_TAIL_SIZE],
            header_filled: 0,
            body: BytesMut::new(),
            body_filled: 0,
            discard: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true while part of a frame (or an undrained tail) is held.
    pub fn in_progress(&self) -> bool {
        !matches!(self.stage, Stage::Marker)
            || self.scanner.state() == ScanState::SeekSecondMarker
            || self.discard > 0
    }

    /// Attempts to read the next complete frame.
    ///
    /// Returns `None` when the channel ran dry first (no marker, short header
    /// or short body); whatever was read is kept for the next call.
    pub fn poll<C: Channel + ?Sized>(&mut self, channel: &mut C, mode: ReadMode) -> Option<Frame> {
        if !self.drain(channel, mode) {
            return None;
        }

        loop {
            match self.stage {
                Stage::Marker => {
                    let byte = channel.read_byte(mode)?;
                    if self.scanner.feed(byte) {
                        let skipped = self.scanner.take_skipped();
                        if skipped > 0 {
                            tracing::debug!("Resynchronized after skipping {} bytes", skipped);
                        }
                        self.header_filled = 0;
                        self.stage = Stage::Header;
                    }
                }
                Stage::Header => {
                    let n = channel.read(&mut self.header[self.header_filled..], mode)?;
                    self.header_filled += n;
                    if self.header_filled < HEADER_TAIL_SIZE {
                        return None;
                    }
                    let header = FrameHeader::from_bytes(&self.header);
                    let keep = (header.len as usize).min(self.capacity);
                    self.body = BytesMut::zeroed(keep);
                    self.body_filled = 0;
                    self.stage = Stage::Body(header);
                }
                Stage::Body(header) => {
                    let n = channel.read(&mut self.body[self.body_filled..], mode)?;
                    self.body_filled += n;
                    if self.body_filled < self.body.len() {
                        return None;
                    }

                    self.stage = Stage::Marker;
                    let payload = self.body.split().freeze();
                    self.discard = header.len as usize - payload.len();
                    if self.discard > 0 {
                        tracing::debug!(
                            "Frame {} -> {} declares {} bytes, keeping {}",
                            header.source,
                            header.target,
                            header.len,
                            payload.len()
                        );
                        self.drain(channel, mode);
                    }
                    return Some(Frame::truncated(header, payload));
                }
            }
        }
    }

    /// Discards the unread tail of an oversized frame one byte at a time.
    /// Returns true once nothing is left to discard.
    fn drain<C: Channel + ?Sized>(&mut self, channel: &mut C, mode: ReadMode) -> bool {
        while self.discard > 0 {
            if channel.read_byte(mode).is_none() {
                return false;
            }
            self.discard -= 1;
        }
        true
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(MAX_DATA_SIZE)
    }
}

/// Reads one frame with a fresh reader.
///
/// Partial progress is dropped when the channel runs dry; long-lived loops
/// should keep a [`FrameReader`] per channel instead.
pub fn decode<C: Channel + ?Sized>(channel: &mut C, capacity: usize, mode: ReadMode) -> Option<Frame> {
    FrameReader::new(capacity).poll(channel, mode)
}

/// Encodes a frame and writes it to the channel in one write.
pub fn send_frame<C: Channel + ?Sized>(channel: &mut C, frame: &Frame) -> Result<(), ProtocolError> {
    let bytes = frame.encode()?;
    let written = channel.write(&bytes)?;
    if written < bytes.len() {
        return Err(TransportError::ShortWrite {
            written,
            expected: bytes.len(),
        }
        .into());
    }
    Ok(())
}
