//! Host link frame header
//!
//! The header is two bytes: command code followed by payload length.

use super::{CHECKSUM_SIZE, HEADER_SIZE};

/// Host link frame header (2 bytes)
///
/// # Wire Format
///
/// ```text
/// +---------+--------+------------------+----------+
/// | Command | Length | Payload (Length) | Checksum |
/// +---------+--------+------------------+----------+
///     1         1          0..=255           1
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    command: u8,
    length: u8,
}

impl FrameHeader {
    /// Create a new frame header
    #[must_use]
    pub const fn new(command: u8, length: u8) -> Self {
        Self { command, length }
    }

    /// Get command byte
    #[must_use]
    pub const fn command(&self) -> u8 {
        self.command
    }

    /// Get payload length
    #[must_use]
    pub const fn length(&self) -> u8 {
        self.length
    }

    /// Total encoded frame size: header, payload and checksum.
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        HEADER_SIZE + self.length as usize + CHECKSUM_SIZE
    }

    /// Convert to bytes
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        [self.command, self.length]
    }

    /// Parse from the first two bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> super::Result<Self> {
        match bytes {
            [command, length, ..] => Ok(Self::new(*command, *length)),
            _ => Err(super::Error::BufferTooSmall {
                needed: HEADER_SIZE,
                got: bytes.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size() {
        assert_eq!(FrameHeader::new(0x01, 0).frame_size(), 3);
        assert_eq!(FrameHeader::new(0xB0, 8).frame_size(), 11);
        assert_eq!(FrameHeader::new(0xB1, 255).frame_size(), 258);
    }

    #[test]
    fn test_header_too_short() {
        let result = FrameHeader::from_bytes(&[0x01]);
        assert!(matches!(
            result,
            Err(super::super::Error::BufferTooSmall { needed: 2, got: 1 })
        ));
    }
}
