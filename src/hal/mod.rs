//! Hardware capability interfaces
//!
//! The protocol engines only touch hardware through these traits. Each has a
//! backend built on the `embedded-hal` / `embedded-io` traits and an
//! in-memory implementation in [`mock`] for tests.

mod gpio;
pub mod mock;
mod serial;

use std::time::Instant;

use thiserror::Error;

pub use gpio::{GpioS88Lines, PinTransmitEnable};
pub use serial::SerialTransceiver;

use crate::xpressnet::Symbol;

/// Capability faults reported by hardware backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    /// A GPIO line could not be driven or sampled
    #[error("pin fault on {pin}: {kind}")]
    Pin {
        /// Role of the pin
        pin: &'static str,
        /// Backend error kind
        kind: String,
    },

    /// The byte transport failed
    #[error("serial fault: {0}")]
    Serial(String),

    /// A bus transmitter rejected data
    #[error("bus fault: {0}")]
    Bus(String),
}

/// Ordered byte stream to the host (UART or similar)
pub trait ByteTransceiver {
    /// Read one byte if one is available, without blocking.
    fn read_byte(&mut self) -> Result<Option<u8>, HalError>;

    /// Write all bytes, blocking until they are queued.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), HalError>;
}

/// Half-duplex driver enable line
pub trait TransmitEnable {
    /// Assert (`true`) or release (`false`) the bus driver.
    fn set_transmit_enable(&mut self, enabled: bool) -> Result<(), HalError>;
}

/// 9-bit symbol transceiver for the XpressNet bus
pub trait XpressNetPort {
    /// Queue symbols for transmission.
    fn transmit(&mut self, symbols: &[Symbol]) -> Result<(), HalError>;

    /// Whether every queued symbol has left the transmitter.
    fn is_transmit_idle(&self) -> bool;

    /// Next received symbol, if any.
    fn receive(&mut self) -> Option<Symbol>;

    /// Drop anything queued in either direction.
    fn clear(&mut self);
}

/// One batch shifted in by a hardware shift engine
///
/// Bits enter from the most significant side, so a full batch holds the
/// first input in bit 0 while a partial batch holds its `valid_bits` inputs
/// in the top bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// Raw shifted value
    pub value: u32,
    /// Number of significant bits, 0..=32
    pub valid_bits: u8,
}

/// Batched S88 shift-in engine (PIO, SPI or similar)
pub trait ShiftRegisterSource {
    /// Program the shift clock in kHz.
    fn set_clock_khz(&mut self, clock_khz: u8) -> Result<(), HalError>;

    /// Trigger a load-and-shift of `bit_count` inputs.
    fn start_scan(&mut self, bit_count: u16) -> Result<(), HalError>;

    /// Next completed batch, if one is ready.
    fn read_batch(&mut self) -> Option<Batch>;
}

/// Individually driven S88 control lines
pub trait S88Lines {
    /// Drive the CLOCK line.
    fn set_clock(&mut self, high: bool) -> Result<(), HalError>;

    /// Drive the LOAD (PS) line.
    fn set_load(&mut self, high: bool) -> Result<(), HalError>;

    /// Drive the RESET line.
    fn set_reset(&mut self, high: bool) -> Result<(), HalError>;

    /// Sample the DATA line.
    fn data(&mut self) -> Result<bool, HalError>;
}

/// Monotonic time source
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
