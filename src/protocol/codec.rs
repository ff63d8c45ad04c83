//! Host link frame codec (encode/decode) and resynchronizing reader
//!
//! The link has no start-of-frame delimiter. A receiver finds frame
//! boundaries purely by checksum: whenever a candidate frame fails
//! verification, the oldest buffered byte is discarded and the remaining
//! bytes are re-evaluated.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use super::{CHECKSUM_SIZE, Error, Frame, FrameHeader, HEADER_SIZE, MAX_FRAME_SIZE, Result};

/// XOR checksum over command, length and payload bytes.
#[must_use]
pub fn checksum(command: u8, length: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(command ^ length, |acc, byte| acc ^ byte)
}

/// Encode a frame to bytes
///
/// # Format
///
/// ```text
/// [COMMAND (1)] [LENGTH (1)] [PAYLOAD (LENGTH)] [CHECKSUM (1)]
/// ```
#[must_use]
pub fn encode(frame: &Frame) -> Bytes {
    let header = frame.header();
    let payload = frame.payload();

    let mut bytes = BytesMut::with_capacity(header.frame_size());
    bytes.put_slice(&header.to_bytes());
    bytes.put_slice(payload);
    bytes.put_u8(checksum(header.command(), header.length(), payload));

    bytes.freeze()
}

/// Decode exactly one frame from the start of `bytes`
///
/// Trailing bytes beyond the declared frame size are ignored.
///
/// # Errors
///
/// Returns an error if:
/// - Buffer is shorter than the declared frame
/// - Checksum doesn't match
pub fn decode(bytes: Bytes) -> Result<Frame> {
    let header = verify(&bytes)?;
    let payload = bytes.slice(HEADER_SIZE..HEADER_SIZE + header.length() as usize);
    Ok(Frame::from_parts(header, payload))
}

/// Check size and checksum of the frame at the start of `bytes`.
fn verify(bytes: &[u8]) -> Result<FrameHeader> {
    let header = FrameHeader::from_bytes(bytes)?;
    let total_size = header.frame_size();

    if bytes.len() < total_size {
        return Err(Error::BufferTooSmall {
            needed: total_size,
            got: bytes.len(),
        });
    }

    let checksum_offset = total_size - CHECKSUM_SIZE;
    let payload = &bytes[HEADER_SIZE..checksum_offset];
    let expected = checksum(header.command(), header.length(), payload);
    let found = bytes[checksum_offset];

    if expected != found {
        return Err(Error::ChecksumMismatch { expected, found });
    }

    Ok(header)
}

/// Receive-side frame assembler with checksum resynchronization
#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
    capacity: usize,
    dropped: u64,
}

impl FrameReader {
    /// Create a reader buffering at most `capacity` bytes.
    ///
    /// The capacity is raised to [`MAX_FRAME_SIZE`] if smaller.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MAX_FRAME_SIZE);
        Self {
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append one received byte.
    ///
    /// When the buffer is full the oldest byte is discarded first.
    pub fn push(&mut self, byte: u8) {
        if self.buffer.len() >= self.capacity {
            self.buffer.advance(1);
            self.dropped += 1;
            debug!(capacity = self.capacity, "receive buffer full, dropping oldest byte");
        }
        self.buffer.put_u8(byte);
    }

    /// Append a block of received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Extract the next checksum-valid frame, if one is complete.
    ///
    /// Invalid candidates are resolved by dropping one byte at a time, so a
    /// single call may discard several bytes but returns at most one frame.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let header = FrameHeader::from_bytes(&self.buffer).ok()?;
            let size = header.frame_size();
            if self.buffer.len() < size {
                return None;
            }

            match verify(&self.buffer[..size]) {
                Ok(header) => {
                    let mut raw = self.buffer.split_to(size).freeze();
                    raw.advance(HEADER_SIZE);
                    raw.truncate(header.length() as usize);
                    trace!(command = header.command(), len = header.length(), "frame complete");
                    return Some(Frame::from_parts(header, raw));
                }
                Err(err) => {
                    trace!(error = %err, byte = self.buffer[0], "resync: dropping oldest byte");
                    self.buffer.advance(1);
                    self.dropped += 1;
                }
            }
        }
    }

    /// Number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes discarded while resynchronizing.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}
