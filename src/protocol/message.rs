//! Typed host link messages
//!
//! Every message is converted to and from a raw [`Frame`] through explicit
//! field-by-field encoding. Multi-byte fields are big-endian.

use bytes::{BufMut, Bytes, BytesMut};

use super::{
    Board, Command, Direction, Error, ErrorCode, FirmwareVersion, Frame, InputChannel,
    InputState, Result, ThrottleChannel,
};
use crate::throttle::{FunctionValue, SpeedDirection, ThrottleAction, ThrottleCommand};

/// Bit layout of the `flags` byte in `ThrottleSetSpeedDirection`.
pub mod speed_flags {
    /// Direction is forward
    pub const DIRECTION_FORWARD: u8 = 1 << 0;
    /// Emergency stop
    pub const ESTOP: u8 = 1 << 1;
    /// Speed step fields are valid
    pub const SET_SPEED_STEP: u8 = 1 << 2;
    /// Direction bit is valid
    pub const SET_DIRECTION: u8 = 1 << 3;
    /// Bits that may be set
    pub const VALID_MASK: u8 = DIRECTION_FORWARD | ESTOP | SET_SPEED_STEP | SET_DIRECTION;
}

const FUNCTION_VALUE_BIT: u8 = 0x80;
const FUNCTION_NUMBER_MASK: u8 = 0x7F;

/// Host link message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Disable all engines
    Reset,
    /// Liveness check
    Ping,
    /// Board/version query
    GetInfo,
    /// Enable the XpressNet master
    InitXpressNet,
    /// Enable the S88 scanner
    InitS88 {
        /// Number of 8-input modules on the bus
        module_count: u8,
        /// Shift clock in kHz
        clock_khz: u8,
    },
    /// Query one input
    GetInputState {
        /// Input channel
        channel: InputChannel,
        /// 1-based input address
        address: u16,
    },
    /// Reset done
    ResetOk,
    /// Ping reply
    Pong,
    /// Board/version reply
    Info {
        /// Board identifier
        board: Board,
        /// Firmware version
        version: FirmwareVersion,
    },
    /// XpressNet enabled
    InitXpressNetOk,
    /// S88 enabled
    InitS88Ok,
    /// Input query reply
    InputState {
        /// Input channel
        channel: InputChannel,
        /// 1-based input address
        address: u16,
        /// Current state
        state: InputState,
    },
    /// Unsolicited input change
    InputStateChanged {
        /// Input channel
        channel: InputChannel,
        /// 1-based input address
        address: u16,
        /// New state
        state: InputState,
    },
    /// Unsolicited throttle event
    Throttle(ThrottleCommand),
    /// Request failed
    Error {
        /// Command byte of the failed request
        request: u8,
        /// Failure reason
        code: ErrorCode,
    },
}

impl Message {
    /// Command code of this message
    #[must_use]
    pub fn command(&self) -> Command {
        match self {
            Self::Reset => Command::Reset,
            Self::Ping => Command::Ping,
            Self::GetInfo => Command::GetInfo,
            Self::InitXpressNet => Command::InitXpressNet,
            Self::InitS88 { .. } => Command::InitS88,
            Self::GetInputState { .. } => Command::GetInputState,
            Self::ResetOk => Command::ResetOk,
            Self::Pong => Command::Pong,
            Self::Info { .. } => Command::Info,
            Self::InitXpressNetOk => Command::InitXpressNetOk,
            Self::InitS88Ok => Command::InitS88Ok,
            Self::InputState { .. } => Command::InputState,
            Self::InputStateChanged { .. } => Command::InputStateChanged,
            Self::Throttle(throttle) => match throttle.action {
                ThrottleAction::SetSpeedDirection(_) => Command::ThrottleSetSpeedDirection,
                ThrottleAction::SetFunctions(_) => Command::ThrottleSetFunctions,
            },
            Self::Error { .. } => Command::Error,
        }
    }

    /// Serialize into a raw frame
    pub fn to_frame(&self) -> Result<Frame> {
        let mut payload = BytesMut::new();

        match self {
            Self::Reset
            | Self::Ping
            | Self::GetInfo
            | Self::InitXpressNet
            | Self::ResetOk
            | Self::Pong
            | Self::InitXpressNetOk
            | Self::InitS88Ok => {}
            Self::InitS88 {
                module_count,
                clock_khz,
            } => {
                payload.put_u8(*module_count);
                payload.put_u8(*clock_khz);
            }
            Self::GetInputState { channel, address } => {
                payload.put_u8(channel.as_u8());
                payload.put_u16(*address);
            }
            Self::Info { board, version } => {
                payload.put_u8(board.as_u8());
                payload.put_u8(version.major);
                payload.put_u8(version.minor);
                payload.put_u8(version.patch);
            }
            Self::InputState {
                channel,
                address,
                state,
            }
            | Self::InputStateChanged {
                channel,
                address,
                state,
            } => {
                payload.put_u8(channel.as_u8());
                payload.put_u16(*address);
                payload.put_u8(state.as_u8());
            }
            Self::Throttle(throttle) => {
                payload.put_u8(throttle.channel.as_u8());
                payload.put_u16(throttle.throttle_id);
                payload.put_u16(throttle.address);
                match &throttle.action {
                    ThrottleAction::SetSpeedDirection(speed) => {
                        payload.put_u8(pack_speed_flags(speed));
                        payload.put_u8(speed.speed_step);
                        payload.put_u8(speed.speed_steps);
                    }
                    ThrottleAction::SetFunctions(functions) => {
                        for function in functions {
                            let value = if function.value { FUNCTION_VALUE_BIT } else { 0 };
                            payload.put_u8((function.number & FUNCTION_NUMBER_MASK) | value);
                        }
                    }
                }
            }
            Self::Error { request, code } => {
                payload.put_u8(*request);
                payload.put_u8(code.as_u8());
            }
        }

        Frame::new(self.command().as_u8(), payload.freeze())
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Result<Bytes> {
        Ok(self.to_frame()?.encode())
    }

    /// Parse a raw frame
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownCommand`] for an unrecognised command byte
    /// - [`Error::InvalidPayload`] when the length does not fit the command
    /// - [`Error::InvalidField`] when a field carries an undefined value
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let command_byte = frame.command_byte();
        let command = frame.command().ok_or(Error::UnknownCommand {
            command: command_byte,
        })?;
        let payload = frame.payload().as_ref();

        let shape = command.payload_shape();
        if !shape.accepts(payload.len()) {
            return Err(Error::InvalidPayload {
                command: command_byte,
                expected: shape.min_len(),
                got: payload.len(),
            });
        }

        let message = match command {
            Command::Reset => Self::Reset,
            Command::Ping => Self::Ping,
            Command::GetInfo => Self::GetInfo,
            Command::InitXpressNet => Self::InitXpressNet,
            Command::InitS88 => Self::InitS88 {
                module_count: payload[0],
                clock_khz: payload[1],
            },
            Command::GetInputState => Self::GetInputState {
                channel: input_channel(payload[0])?,
                address: be16(payload[1], payload[2]),
            },
            Command::ResetOk => Self::ResetOk,
            Command::Pong => Self::Pong,
            Command::Info => Self::Info {
                board: Board::from_u8(payload[0]).ok_or(Error::InvalidField {
                    field: "board",
                    value: u16::from(payload[0]),
                })?,
                version: FirmwareVersion {
                    major: payload[1],
                    minor: payload[2],
                    patch: payload[3],
                },
            },
            Command::InitXpressNetOk => Self::InitXpressNetOk,
            Command::InitS88Ok => Self::InitS88Ok,
            Command::InputState => Self::InputState {
                channel: input_channel(payload[0])?,
                address: be16(payload[1], payload[2]),
                state: input_state(payload[3])?,
            },
            Command::InputStateChanged => Self::InputStateChanged {
                channel: input_channel(payload[0])?,
                address: be16(payload[1], payload[2]),
                state: input_state(payload[3])?,
            },
            Command::ThrottleSetSpeedDirection => Self::Throttle(ThrottleCommand {
                channel: throttle_channel(payload[0])?,
                throttle_id: be16(payload[1], payload[2]),
                address: be16(payload[3], payload[4]),
                action: ThrottleAction::SetSpeedDirection(unpack_speed(
                    payload[5], payload[6], payload[7],
                )?),
            }),
            Command::ThrottleSetFunctions => Self::Throttle(ThrottleCommand {
                channel: throttle_channel(payload[0])?,
                throttle_id: be16(payload[1], payload[2]),
                address: be16(payload[3], payload[4]),
                action: ThrottleAction::SetFunctions(
                    payload[5..]
                        .iter()
                        .map(|&byte| {
                            FunctionValue::new(
                                byte & FUNCTION_NUMBER_MASK,
                                byte & FUNCTION_VALUE_BIT != 0,
                            )
                        })
                        .collect(),
                ),
            }),
            Command::Error => Self::Error {
                request: payload[0],
                code: ErrorCode::from_u8(payload[1]).ok_or(Error::InvalidField {
                    field: "error_code",
                    value: u16::from(payload[1]),
                })?,
            },
        };

        Ok(message)
    }

    /// Decode from wire bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let frame = super::decode(Bytes::copy_from_slice(bytes))?;
        Self::from_frame(&frame)
    }
}

fn be16(high: u8, low: u8) -> u16 {
    u16::from_be_bytes([high, low])
}

fn input_channel(value: u8) -> Result<InputChannel> {
    InputChannel::from_u8(value).ok_or(Error::InvalidField {
        field: "channel",
        value: u16::from(value),
    })
}

fn input_state(value: u8) -> Result<InputState> {
    InputState::from_u8(value).ok_or(Error::InvalidField {
        field: "state",
        value: u16::from(value),
    })
}

fn throttle_channel(value: u8) -> Result<ThrottleChannel> {
    ThrottleChannel::from_u8(value).ok_or(Error::InvalidField {
        field: "channel",
        value: u16::from(value),
    })
}

fn pack_speed_flags(speed: &SpeedDirection) -> u8 {
    let mut flags = 0;
    if speed.direction == Direction::Forward {
        flags |= speed_flags::DIRECTION_FORWARD;
    }
    if speed.estop {
        flags |= speed_flags::ESTOP;
    }
    if speed.set_speed_step {
        flags |= speed_flags::SET_SPEED_STEP;
    }
    if speed.set_direction {
        flags |= speed_flags::SET_DIRECTION;
    }
    flags
}

fn unpack_speed(flags: u8, speed_step: u8, speed_steps: u8) -> Result<SpeedDirection> {
    if flags & !speed_flags::VALID_MASK != 0 {
        return Err(Error::InvalidField {
            field: "flags",
            value: u16::from(flags),
        });
    }

    Ok(SpeedDirection {
        estop: flags & speed_flags::ESTOP != 0,
        speed_step,
        speed_steps,
        direction: if flags & speed_flags::DIRECTION_FORWARD != 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        },
        set_speed_step: flags & speed_flags::SET_SPEED_STEP != 0,
        set_direction: flags & speed_flags::SET_DIRECTION != 0,
    })
}
