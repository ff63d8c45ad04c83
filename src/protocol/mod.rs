//! Host link wire protocol
//!
//! This module provides the frame format, command codes and typed messages
//! exchanged with the host.

mod codec;
mod error;
mod frame;
mod header;
mod message;
mod types;

pub use codec::{FrameReader, checksum, decode, encode};
pub use error::{Error, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use message::{Message, speed_flags};
pub use types::{
    Board, Command, Direction, ErrorCode, FROM_GATEWAY, FirmwareVersion, InputChannel, InputState,
    PayloadShape, ThrottleChannel,
};

/// Header size in bytes (command + length)
pub const HEADER_SIZE: usize = 2;

/// Checksum size in bytes
pub const CHECKSUM_SIZE: usize = 1;

/// Maximum payload size (length is a single byte)
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Maximum encoded frame size
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE + CHECKSUM_SIZE;
