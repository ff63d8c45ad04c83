//! Device-to-command-station instruction decoding

use crate::protocol::Direction;
use crate::throttle::{FunctionValue, SpeedDirection, ThrottleAction};

const HEADER_STATION: u8 = 0x21;
const HEADER_ESTOP_ALL: u8 = 0x80;
const HEADER_LOCO_ESTOP: u8 = 0x92;
const HEADER_LOCO: u8 = 0xE4;

const STATION_STOP: u8 = 0x80;
const STATION_RESUME: u8 = 0x81;
const STATION_STATUS: u8 = 0x24;
const STATION_VERSION: u8 = 0x21;

const SPEED_14: u8 = 0x10;
const SPEED_27: u8 = 0x11;
const SPEED_28: u8 = 0x12;
const SPEED_126: u8 = 0x13;

const FUNCTIONS_GROUP_1: u8 = 0x20;
const FUNCTIONS_GROUP_2: u8 = 0x21;
const FUNCTIONS_GROUP_3: u8 = 0x22;
const FUNCTIONS_F13_F20: u8 = 0x23;
const FUNCTIONS_F21_F28: u8 = 0x28;
const FUNCTIONS_F13_F20_VENDOR: u8 = 0xF3;

const DIRECTION_BIT: u8 = 0x80;
const LONG_ADDRESS_MARK: u8 = 0xC0;

/// A checksum-valid instruction received from a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Switch track power off
    StopOperations,
    /// Switch track power on
    ResumeOperations,
    /// Stop every locomotive
    EmergencyStopAll,
    /// Command station status query
    StatusQuery,
    /// Command station software version query
    VersionQuery,
    /// Locomotive instruction
    Throttle {
        /// Locomotive address
        address: u16,
        /// Decoded action
        action: ThrottleAction,
    },
    /// Anything the command station does not handle
    Unsupported,
}

/// Decode a complete frame (header through checksum).
#[must_use]
pub fn decode_request(frame: &[u8]) -> Request {
    match *frame {
        [HEADER_STATION, STATION_STOP, _] => Request::StopOperations,
        [HEADER_STATION, STATION_RESUME, _] => Request::ResumeOperations,
        [HEADER_STATION, STATION_STATUS, _] => Request::StatusQuery,
        [HEADER_STATION, STATION_VERSION, _] => Request::VersionQuery,
        [HEADER_ESTOP_ALL, _] => Request::EmergencyStopAll,
        [HEADER_LOCO_ESTOP, high, low, _] => Request::Throttle {
            address: loco_address(high, low),
            action: ThrottleAction::SetSpeedDirection(SpeedDirection::emergency_stop()),
        },
        [HEADER_LOCO, instruction, high, low, data, _] => {
            let action = decode_speed(instruction, data)
                .map(ThrottleAction::SetSpeedDirection)
                .or_else(|| decode_functions(instruction, data).map(ThrottleAction::SetFunctions));
            match action {
                Some(action) => Request::Throttle {
                    address: loco_address(high, low),
                    action,
                },
                None => Request::Unsupported,
            }
        }
        _ => Request::Unsupported,
    }
}

/// Locomotive address from the AH/AL pair; long addresses carry `11` in the top bits of AH.
#[must_use]
pub const fn loco_address(high: u8, low: u8) -> u16 {
    if high & LONG_ADDRESS_MARK == LONG_ADDRESS_MARK {
        u16::from_be_bytes([high & !LONG_ADDRESS_MARK, low])
    } else {
        u16::from_be_bytes([high, low])
    }
}

/// Decode a speed byte for the given speed instruction.
///
/// Returns `None` when `instruction` is not a speed instruction.
#[must_use]
pub fn decode_speed(instruction: u8, data: u8) -> Option<SpeedDirection> {
    let direction = if data & DIRECTION_BIT != 0 {
        Direction::Forward
    } else {
        Direction::Reverse
    };

    let (steps, step) = match instruction {
        SPEED_14 => (14, stop_or_step(data & 0x0F, 1)),
        SPEED_27 => {
            let raw = interleaved_raw(data);
            let step = match raw {
                0 => Some(0),
                4..=30 => Some(raw - 3),
                _ => None,
            };
            (27, step)
        }
        SPEED_28 => {
            let raw = interleaved_raw(data);
            let step = match raw {
                0 => Some(0),
                1..=3 => None,
                _ => Some(raw - 3),
            };
            (28, step)
        }
        SPEED_126 => (126, stop_or_step(data & 0x7F, 1)),
        _ => return None,
    };

    Some(match step {
        Some(step) => SpeedDirection::new(false, step, steps, direction),
        None => SpeedDirection::new(true, 0, steps, direction),
    })
}

/// Raw 0 is stop, `estop` is the emergency sentinel, anything above maps to `raw - 1`.
fn stop_or_step(raw: u8, estop: u8) -> Option<u8> {
    match raw {
        0 => Some(0),
        raw if raw == estop => None,
        raw => Some(raw - 1),
    }
}

/// 27/28-step encoding keeps the intermediate step bit in bit 4.
fn interleaved_raw(data: u8) -> u8 {
    ((data & 0x0F) << 1) | ((data & 0x10) >> 4)
}

/// Decode one function group byte.
///
/// Returns `None` when `instruction` is not a function group instruction.
#[must_use]
pub fn decode_functions(instruction: u8, data: u8) -> Option<Vec<FunctionValue>> {
    let bit = |index: u8| data & (1 << index) != 0;
    let range = |first: u8, count: u8| {
        (0..count)
            .map(|index| FunctionValue::new(first + index, bit(index)))
            .collect::<Vec<_>>()
    };

    match instruction {
        FUNCTIONS_GROUP_1 => {
            let mut functions = vec![FunctionValue::new(0, bit(4))];
            functions.extend(range(1, 4));
            Some(functions)
        }
        FUNCTIONS_GROUP_2 => Some(range(5, 4)),
        FUNCTIONS_GROUP_3 => Some(range(9, 4)),
        FUNCTIONS_F13_F20 | FUNCTIONS_F13_F20_VENDOR => Some(range(13, 8)),
        FUNCTIONS_F21_F28 => Some(range(21, 8)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed(instruction: u8, data: u8) -> SpeedDirection {
        decode_speed(instruction, data).unwrap()
    }

    #[test]
    fn fourteen_step_table() {
        let estop = speed(SPEED_14, 0x01);
        assert!(estop.estop);
        assert_eq!(estop.speed_step, 0);

        let first = speed(SPEED_14, 0x02);
        assert!(!first.estop);
        assert_eq!(first.speed_step, 1);
        assert_eq!(first.speed_steps, 14);

        assert_eq!(speed(SPEED_14, 0x0F).speed_step, 14);
        assert_eq!(speed(SPEED_14, 0x00).speed_step, 0);
        assert!(!speed(SPEED_14, 0x00).estop);
    }

    #[test]
    fn twenty_seven_step_table() {
        // raw 3 = nibble 1 with the intermediate bit set
        let estop = speed(SPEED_27, 0x11);
        assert!(estop.estop);
        assert_eq!(estop.speed_step, 0);

        // raw 5 = nibble 2 with the intermediate bit set
        let second = speed(SPEED_27, 0x12);
        assert!(!second.estop);
        assert_eq!(second.speed_step, 2);
        assert_eq!(second.speed_steps, 27);

        // raw 31 is outside 4..=30
        assert!(speed(SPEED_27, 0x1F).estop);
        assert_eq!(speed(SPEED_27, 0x0F).speed_step, 27);
    }

    #[test]
    fn twenty_eight_step_table() {
        for data in [0x10, 0x01, 0x11] {
            assert!(speed(SPEED_28, data).estop, "data {data:#04x}");
        }
        assert_eq!(speed(SPEED_28, 0x02).speed_step, 1);
        assert_eq!(speed(SPEED_28, 0x1F).speed_step, 28);
        assert!(!speed(SPEED_28, 0x00).estop);
    }

    #[test]
    fn one_twenty_six_step_table() {
        assert!(speed(SPEED_126, 0x81).estop);
        assert_eq!(speed(SPEED_126, 0x02).speed_step, 1);
        assert_eq!(speed(SPEED_126, 0xFF).speed_step, 126);
    }

    #[test]
    fn direction_is_top_bit() {
        assert_eq!(speed(SPEED_126, 0x85).direction, Direction::Forward);
        assert_eq!(speed(SPEED_126, 0x05).direction, Direction::Reverse);
        assert_eq!(speed(SPEED_14, 0x80).direction, Direction::Forward);
    }

    #[test]
    fn function_group_one_lists_f0_first() {
        let functions = decode_functions(FUNCTIONS_GROUP_1, 0b0001_0010).unwrap();
        let expected: Vec<FunctionValue> = [(0, true), (1, false), (2, true), (3, false), (4, false)]
            .into_iter()
            .map(FunctionValue::from)
            .collect();
        assert_eq!(functions, expected);
    }

    #[test]
    fn extension_groups_map_every_bit() {
        let vendor = decode_functions(FUNCTIONS_F13_F20_VENDOR, 0b1000_0001).unwrap();
        assert_eq!(vendor.len(), 8);
        assert_eq!(vendor[0], FunctionValue::new(13, true));
        assert_eq!(vendor[7], FunctionValue::new(20, true));
        assert!(vendor[1..7].iter().all(|function| !function.value));

        assert_eq!(decode_functions(FUNCTIONS_GROUP_3, 0x0F).unwrap().len(), 4);
        assert_eq!(decode_functions(0x7F, 0xFF), None);
    }

    #[test]
    fn requests() {
        assert_eq!(decode_request(&[0x21, 0x80, 0xA1]), Request::StopOperations);
        assert_eq!(decode_request(&[0x21, 0x81, 0xA0]), Request::ResumeOperations);
        assert_eq!(decode_request(&[0x21, 0x24, 0x05]), Request::StatusQuery);
        assert_eq!(decode_request(&[0x21, 0x21, 0x00]), Request::VersionQuery);
        assert_eq!(decode_request(&[0x80, 0x80]), Request::EmergencyStopAll);
        assert_eq!(decode_request(&[0x21, 0x10, 0x31]), Request::Unsupported);
        assert_eq!(decode_request(&[0xE4, 0x7F, 0, 3, 0, 0x98]), Request::Unsupported);
    }

    #[test]
    fn loco_requests_carry_address() {
        assert_eq!(
            decode_request(&[0x92, 0x00, 0x03, 0x91]),
            Request::Throttle {
                address: 3,
                action: ThrottleAction::SetSpeedDirection(SpeedDirection::emergency_stop()),
            }
        );

        let Request::Throttle { address, action } =
            decode_request(&[0xE4, 0x13, 0xC4, 0xD2, 0x85, 0x00])
        else {
            panic!("expected throttle request");
        };
        assert_eq!(address, 1234);
        assert_eq!(
            action,
            ThrottleAction::SetSpeedDirection(SpeedDirection::new(false, 4, 126, Direction::Forward))
        );
    }
}
