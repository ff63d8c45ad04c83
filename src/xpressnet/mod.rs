//! XpressNet bus master
//!
//! The gateway masters the half-duplex throttle bus: it polls device
//! addresses 1..=31 with normal-inquiry call bytes, assembles the replies
//! into frames, answers command-station requests and turns throttle
//! instructions into [`ThrottleCommand`](crate::throttle::ThrottleCommand)
//! events for the host.

mod decoder;
mod master;

pub use decoder::{Request, decode_functions, decode_request, decode_speed, loco_address};
pub use master::XpressNetMaster;

/// Lowest polled device address
pub const POLL_ADDRESS_MIN: u8 = 1;

/// Highest polled device address
pub const POLL_ADDRESS_MAX: u8 = 31;

/// Call byte prefix for a normal inquiry
pub const CALL_NORMAL_INQUIRY: u8 = 0x40;

/// Call byte prefix for a message; with address 0 it is the broadcast call
pub const CALL_MESSAGE: u8 = 0x60;

/// Call byte addressing every device
pub const CALL_BROADCAST: u8 = CALL_MESSAGE;

/// Longest frame a device can send (header nibble 15 + header + checksum)
pub const MAX_FRAME_LEN: usize = 17;

const DEVICE_ADDRESS_MASK: u8 = 0x1F;
const PARITY_BIT: u8 = 0x80;

/// Set bit 7 so that bits 0..=7 carry an even number of ones.
#[must_use]
pub const fn with_parity(call: u8) -> u8 {
    let data = call & !PARITY_BIT;
    if data.count_ones() % 2 == 1 {
        data | PARITY_BIT
    } else {
        data
    }
}

/// Call byte for `prefix` addressed to `address`, parity included.
#[must_use]
pub const fn call_byte(prefix: u8, address: u8) -> u8 {
    with_parity(prefix | (address & DEVICE_ADDRESS_MASK))
}

/// 9-bit bus symbol: 8 data bits plus the call marker in bit 8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u16);

impl Symbol {
    /// Marker bit distinguishing call bytes from data bytes
    pub const CALL_BIT: u16 = 0x100;

    const MASK: u16 = 0x1FF;

    /// Call (address) symbol
    #[must_use]
    pub const fn call(byte: u8) -> Self {
        Self(Self::CALL_BIT | byte as u16)
    }

    /// Data symbol
    #[must_use]
    pub const fn data(byte: u8) -> Self {
        Self(byte as u16)
    }

    /// From a raw 9-bit receiver word; bits above 8 are ignored.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw & Self::MASK)
    }

    /// Raw 9-bit value
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Whether the call marker is set
    #[must_use]
    pub const fn is_call(self) -> bool {
        self.0 & Self::CALL_BIT != 0
    }

    /// Low 8 bits
    #[must_use]
    pub const fn byte(self) -> u8 {
        self.0.to_le_bytes()[0]
    }
}

/// XpressNet master settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XpressNetConfig {
    /// Bus time per symbol in microseconds (62.5 kbit/s, 11 bits + gap)
    pub byte_time_us: u32,
    /// Received symbols processed per step
    pub max_symbols_per_step: usize,
    /// Command station software version, BCD (0x30 = 3.0)
    pub software_version: u8,
    /// Command station identifier reported with the version
    pub command_station_id: u8,
}

impl Default for XpressNetConfig {
    fn default() -> Self {
        Self {
            byte_time_us: 190,
            max_symbols_per_step: 64,
            software_version: 0x30,
            command_station_id: 0x10,
        }
    }
}

/// Next address of the round-robin poll, skipping 0.
#[must_use]
pub const fn next_poll_address(address: u8) -> u8 {
    if address >= POLL_ADDRESS_MAX || address < POLL_ADDRESS_MIN {
        POLL_ADDRESS_MIN
    } else {
        address + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_makes_ones_even() {
        assert_eq!(with_parity(0x41), 0x41);
        assert_eq!(with_parity(0x43), 0xC3);
        assert_eq!(with_parity(0x60), 0x60);
        assert_eq!(with_parity(0x5F), 0x5F);
        assert_eq!(with_parity(0x40 | 7), 0x47);
        assert_eq!(with_parity(0x40 | 5), 0xC5);

        for byte in 0..=u8::MAX {
            let call = with_parity(byte);
            assert_eq!(call.count_ones() % 2, 0, "byte {byte:#04x}");
            assert_eq!(call & 0x7F, byte & 0x7F);
        }
    }

    #[test]
    fn call_byte_masks_address() {
        assert_eq!(call_byte(CALL_NORMAL_INQUIRY, 3), 0xC3);
        assert_eq!(call_byte(CALL_MESSAGE, 0), 0x60);
        assert_eq!(call_byte(CALL_MESSAGE, 5), 0x65);
    }

    #[test]
    fn poll_sequence_wraps_without_zero() {
        let mut address = 0;
        let mut seen = Vec::new();
        for _ in 0..62 {
            address = next_poll_address(address);
            seen.push(address);
        }
        let expected: Vec<u8> = (1..=31).chain(1..=31).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn symbol_marker() {
        let call = Symbol::call(0xC3);
        assert!(call.is_call());
        assert_eq!(call.byte(), 0xC3);
        assert_eq!(call.raw(), 0x1C3);

        let data = Symbol::from_raw(0xE21);
        assert!(!data.is_call());
        assert_eq!(data.byte(), 0x21);
    }
}
