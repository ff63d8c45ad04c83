//! Raw host link frame

use bytes::Bytes;

use super::{Command, Error, FrameHeader, MAX_PAYLOAD_SIZE, Result};

/// Host link frame: command byte plus untyped payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    header: FrameHeader,
    /// Frame payload
    payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(command: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let length = u8::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        })?;

        Ok(Self {
            header: FrameHeader::new(command, length),
            payload,
        })
    }

    /// Assemble from already validated parts
    pub(crate) fn from_parts(header: FrameHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get raw command byte
    #[must_use]
    pub const fn command_byte(&self) -> u8 {
        self.header.command()
    }

    /// Get command
    #[must_use]
    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.header.command())
    }

    /// Get payload
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Get header
    #[must_use]
    pub const fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Encoded size in bytes
    #[must_use]
    pub const fn size(&self) -> usize {
        self.header.frame_size()
    }

    /// Encode frame to bytes
    #[must_use]
    pub fn encode(&self) -> Bytes {
        super::encode(self)
    }

    /// Decode frame from bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        super::decode(Bytes::copy_from_slice(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(Command::Info.as_u8(), vec![1, 0, 1, 0]).unwrap();

        assert_eq!(frame.command(), Some(Command::Info));
        assert_eq!(frame.payload().as_ref(), &[1, 0, 1, 0]);
        assert_eq!(frame.header().length(), 4);
        assert_eq!(frame.size(), 7);
    }

    #[test]
    fn test_frame_rejects_oversized_payload() {
        let result = Frame::new(Command::ThrottleSetFunctions.as_u8(), vec![0u8; 256]);
        assert!(matches!(result, Err(Error::PayloadTooLarge { size: 256, .. })));
    }

    #[test]
    fn test_unknown_command_byte_is_kept() {
        let frame = Frame::new(0x42, Bytes::new()).unwrap();
        assert_eq!(frame.command(), None);
        assert_eq!(frame.command_byte(), 0x42);
    }
}
