//! Decoded throttle commands forwarded to the host

use crate::protocol::{Direction, ThrottleChannel};

/// A throttle instruction decoded from a field bus
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleCommand {
    /// Bus the throttle is attached to
    pub channel: ThrottleChannel,
    /// Bus-local throttle identifier (XpressNet: the polled device address)
    pub throttle_id: u16,
    /// Locomotive address
    pub address: u16,
    /// What the throttle asked for
    pub action: ThrottleAction,
}

/// Throttle instruction variants
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThrottleAction {
    /// Speed, direction and/or emergency stop
    SetSpeedDirection(SpeedDirection),
    /// Function outputs, in the order the bus listed them
    SetFunctions(Vec<FunctionValue>),
}

/// Speed and direction request
///
/// `set_speed_step` and `set_direction` tell the receiver which of the
/// remaining fields carry a value; a bare emergency stop asserts neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedDirection {
    /// Emergency stop requested
    pub estop: bool,
    /// Speed step, 0 = stop
    pub speed_step: u8,
    /// Speed step range of the encoding (14, 27, 28 or 126)
    pub speed_steps: u8,
    /// Travel direction
    pub direction: Direction,
    /// `speed_step`/`speed_steps` are meaningful
    pub set_speed_step: bool,
    /// `direction` is meaningful
    pub set_direction: bool,
}

impl SpeedDirection {
    /// Full speed and direction update.
    #[must_use]
    pub const fn new(estop: bool, speed_step: u8, speed_steps: u8, direction: Direction) -> Self {
        Self {
            estop,
            speed_step,
            speed_steps,
            direction,
            set_speed_step: true,
            set_direction: true,
        }
    }

    /// Emergency stop without speed or direction information.
    #[must_use]
    pub const fn emergency_stop() -> Self {
        Self {
            estop: true,
            speed_step: 0,
            speed_steps: 0,
            direction: Direction::Reverse,
            set_speed_step: false,
            set_direction: false,
        }
    }
}

/// One function output state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionValue {
    /// Function number (F0 = 0), 0..=127
    pub number: u8,
    /// Output on
    pub value: bool,
}

impl FunctionValue {
    /// Create a function value
    #[must_use]
    pub const fn new(number: u8, value: bool) -> Self {
        Self { number, value }
    }
}

impl From<(u8, bool)> for FunctionValue {
    fn from((number, value): (u8, bool)) -> Self {
        Self::new(number, value)
    }
}
