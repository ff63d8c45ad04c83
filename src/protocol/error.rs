//! Host link error types

use thiserror::Error;

use super::ErrorCode;

/// Host link framing and payload errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Checksum mismatch
    #[error("checksum mismatch: expected {expected:#04x}, got {found:#04x}")]
    ChecksumMismatch {
        /// Checksum computed over the frame
        expected: u8,
        /// Checksum carried by the frame
        found: u8,
    },

    /// Unknown command code
    #[error("unknown command: {command:#04x}")]
    UnknownCommand {
        /// Command byte
        command: u8,
    },

    /// Payload length does not match the command
    #[error("invalid payload for command {command:#04x}: expected {expected} bytes, got {got}")]
    InvalidPayload {
        /// Command byte
        command: u8,
        /// Expected (minimum) payload length
        expected: usize,
        /// Actual payload length
        got: usize,
    },

    /// Payload field carries an out-of-range value
    #[error("invalid value {value:#04x} for field {field}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Raw value
        value: u16,
    },

    /// Payload too large
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Buffer too small
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// Byte transport failure
    #[error("IO error: {0}")]
    Io(String),
}

impl From<&Error> for ErrorCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::UnknownCommand { .. } => ErrorCode::InvalidCommand,
            Error::InvalidPayload { .. } | Error::InvalidField { .. } => {
                ErrorCode::InvalidCommandPayload
            }
            _ => ErrorCode::Unknown,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
