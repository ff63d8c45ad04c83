//! Host link command codes and shared value types

use std::fmt;

/// Bit set on every code the gateway sends back to the host.
pub const FROM_GATEWAY: u8 = 0x80;

/// Host link command codes
///
/// Requests have bit 7 clear. The matching response carries the same code
/// with [`FROM_GATEWAY`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Disable all bus engines
    Reset = 0x00,
    /// Liveness check
    Ping = 0x01,
    /// Board and firmware version query
    GetInfo = 0x02,
    /// Enable the XpressNet master
    InitXpressNet = 0x03,
    /// Enable the S88 scanner
    InitS88 = 0x04,
    /// Query a single input state
    GetInputState = 0x05,

    /// Reply to [`Command::Reset`]
    ResetOk = FROM_GATEWAY | 0x00,
    /// Reply to [`Command::Ping`]
    Pong = FROM_GATEWAY | 0x01,
    /// Reply to [`Command::GetInfo`]
    Info = FROM_GATEWAY | 0x02,
    /// Reply to [`Command::InitXpressNet`]
    InitXpressNetOk = FROM_GATEWAY | 0x03,
    /// Reply to [`Command::InitS88`]
    InitS88Ok = FROM_GATEWAY | 0x04,
    /// Reply to [`Command::GetInputState`]
    InputState = FROM_GATEWAY | 0x05,

    /// Unsolicited input change notification
    InputStateChanged = FROM_GATEWAY | 0x10,
    /// Unsolicited throttle speed/direction event
    ThrottleSetSpeedDirection = FROM_GATEWAY | 0x30,
    /// Unsolicited throttle function event
    ThrottleSetFunctions = FROM_GATEWAY | 0x31,

    /// Error reply to any request
    Error = 0xFF,
}

impl Command {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Reset),
            0x01 => Some(Self::Ping),
            0x02 => Some(Self::GetInfo),
            0x03 => Some(Self::InitXpressNet),
            0x04 => Some(Self::InitS88),
            0x05 => Some(Self::GetInputState),
            0x80 => Some(Self::ResetOk),
            0x81 => Some(Self::Pong),
            0x82 => Some(Self::Info),
            0x83 => Some(Self::InitXpressNetOk),
            0x84 => Some(Self::InitS88Ok),
            0x85 => Some(Self::InputState),
            0x90 => Some(Self::InputStateChanged),
            0xB0 => Some(Self::ThrottleSetSpeedDirection),
            0xB1 => Some(Self::ThrottleSetFunctions),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this code travels from the host to the gateway
    #[must_use]
    pub const fn is_request(self) -> bool {
        (self as u8) & FROM_GATEWAY == 0
    }

    /// Response code paired with this request, if any.
    #[must_use]
    pub fn response(self) -> Option<Self> {
        if self.is_request() {
            Self::from_u8(self.as_u8() | FROM_GATEWAY)
        } else {
            None
        }
    }

    /// Payload shape this command must carry.
    #[must_use]
    pub const fn payload_shape(self) -> PayloadShape {
        match self {
            Self::Reset
            | Self::Ping
            | Self::GetInfo
            | Self::InitXpressNet
            | Self::ResetOk
            | Self::Pong
            | Self::InitXpressNetOk
            | Self::InitS88Ok => PayloadShape::Fixed(0),
            Self::InitS88 | Self::Error => PayloadShape::Fixed(2),
            Self::GetInputState => PayloadShape::Fixed(3),
            Self::Info | Self::InputState | Self::InputStateChanged => PayloadShape::Fixed(4),
            Self::ThrottleSetSpeedDirection => PayloadShape::Fixed(8),
            Self::ThrottleSetFunctions => PayloadShape::AtLeast(5),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reset => "Reset",
            Self::Ping => "Ping",
            Self::GetInfo => "GetInfo",
            Self::InitXpressNet => "InitXpressNet",
            Self::InitS88 => "InitS88",
            Self::GetInputState => "GetInputState",
            Self::ResetOk => "ResetOk",
            Self::Pong => "Pong",
            Self::Info => "Info",
            Self::InitXpressNetOk => "InitXpressNetOk",
            Self::InitS88Ok => "InitS88Ok",
            Self::InputState => "InputState",
            Self::InputStateChanged => "InputStateChanged",
            Self::ThrottleSetSpeedDirection => "ThrottleSetSpeedDirection",
            Self::ThrottleSetFunctions => "ThrottleSetFunctions",
            Self::Error => "Error",
        };
        write!(f, "{name}")
    }
}

/// Expected payload length of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Exactly this many bytes
    Fixed(u8),
    /// This many bytes or more (variable tail)
    AtLeast(u8),
}

impl PayloadShape {
    /// Check whether a payload of `len` bytes fits this shape.
    #[must_use]
    pub const fn accepts(self, len: usize) -> bool {
        match self {
            Self::Fixed(n) => len == n as usize,
            Self::AtLeast(n) => len >= n as usize,
        }
    }

    /// Minimum payload length.
    #[must_use]
    pub const fn min_len(self) -> usize {
        match self {
            Self::Fixed(n) | Self::AtLeast(n) => n as usize,
        }
    }
}

/// Error codes reported to the host inside an `Error` reply
///
/// Code 0 means "no error" and is never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    /// Unclassified failure
    Unknown = 1,
    /// Command code not recognised
    InvalidCommand = 2,
    /// Payload length or content invalid for the command
    InvalidCommandPayload = 3,
    /// Subsystem already enabled
    AlreadyInitialized = 4,
}

impl ErrorCode {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Unknown),
            2 => Some(Self::InvalidCommand),
            3 => Some(Self::InvalidCommandPayload),
            4 => Some(Self::AlreadyInitialized),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "Unknown",
            Self::InvalidCommand => "InvalidCommand",
            Self::InvalidCommandPayload => "InvalidCommandPayload",
            Self::AlreadyInitialized => "AlreadyInitialized",
        };
        write!(f, "{name}")
    }
}

/// Feedback bus an input belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum InputChannel {
    /// Reserved, no inputs are tracked
    LocoNet = 1,
    /// Reserved, no inputs are tracked
    XpressNet = 2,
    /// S88 shift-register bus
    S88 = 3,
}

impl InputChannel {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::LocoNet),
            2 => Some(Self::XpressNet),
            3 => Some(Self::S88),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for InputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocoNet => "LocoNet",
            Self::XpressNet => "XpressNet",
            Self::S88 => "S88",
        };
        write!(f, "{name}")
    }
}

/// Last known level of a feedback input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum InputState {
    /// Not scanned since the channel was enabled
    #[default]
    Unknown = 0,
    /// Input inactive
    Low = 1,
    /// Input active
    High = 2,
}

impl InputState {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unknown),
            1 => Some(Self::Low),
            2 => Some(Self::High),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<bool> for InputState {
    fn from(level: bool) -> Self {
        if level { Self::High } else { Self::Low }
    }
}

/// Bus a throttle event originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ThrottleChannel {
    /// LocoNet throttles (reserved)
    LocoNet = 1,
    /// XpressNet handhelds
    XpressNet = 2,
}

impl ThrottleChannel {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::LocoNet),
            2 => Some(Self::XpressNet),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Locomotive travel direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Reverse
    #[default]
    Reverse,
    /// Forward
    Forward,
}

/// Board identifier reported by `Info`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Board {
    /// This gateway
    #[default]
    Gateway = 1,
}

impl Board {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Gateway),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Firmware version triple reported by `Info`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareVersion {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Patch version
    pub patch: u8,
}

impl FirmwareVersion {
    /// Version of this build.
    pub const CURRENT: Self = Self {
        major: 0,
        minor: 1,
        patch: 0,
    };
}

impl Default for FirmwareVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_roundtrip() {
        let commands = [
            Command::Reset,
            Command::InitS88,
            Command::InputStateChanged,
            Command::ThrottleSetFunctions,
            Command::Error,
        ];

        for command in commands {
            let decoded = Command::from_u8(command.as_u8()).unwrap();
            assert_eq!(command, decoded);
        }
    }

    #[test]
    fn test_response_pairs_with_request() {
        assert_eq!(Command::Ping.response(), Some(Command::Pong));
        assert_eq!(Command::GetInfo.response(), Some(Command::Info));
        assert_eq!(Command::InitS88.response(), Some(Command::InitS88Ok));
        assert_eq!(Command::GetInputState.response(), Some(Command::InputState));
        assert_eq!(Command::Pong.response(), None);
        assert!(!Command::Error.is_request());
    }

    #[test]
    fn test_payload_shape() {
        assert!(Command::Ping.payload_shape().accepts(0));
        assert!(!Command::Ping.payload_shape().accepts(1));
        assert!(Command::ThrottleSetFunctions.payload_shape().accepts(9));
        assert!(!Command::ThrottleSetFunctions.payload_shape().accepts(4));
    }

    #[test]
    fn test_error_code_zero_is_reserved() {
        assert_eq!(ErrorCode::from_u8(0), None);
        assert_eq!(ErrorCode::AlreadyInitialized.as_u8(), 4);
    }
}
