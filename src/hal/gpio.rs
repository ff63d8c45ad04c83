//! `embedded-hal` digital pin backends

use embedded_hal::digital::{InputPin, OutputPin, PinState};

use super::{HalError, S88Lines, TransmitEnable};

fn pin_fault(pin: &'static str, err: &impl embedded_hal::digital::Error) -> HalError {
    HalError::Pin {
        pin,
        kind: format!("{:?}", err.kind()),
    }
}

fn drive<P: OutputPin>(pin: &mut P, name: &'static str, high: bool) -> Result<(), HalError> {
    pin.set_state(PinState::from(high))
        .map_err(|err| pin_fault(name, &err))
}

/// RS-485 driver enable on an output pin
#[derive(Debug)]
pub struct PinTransmitEnable<P> {
    pin: P,
}

impl<P: OutputPin> PinTransmitEnable<P> {
    /// Wrap an output pin; the driver starts released.
    pub fn new(mut pin: P) -> Result<Self, HalError> {
        drive(&mut pin, "tx_enable", false)?;
        Ok(Self { pin })
    }

    /// Give the pin back.
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> TransmitEnable for PinTransmitEnable<P> {
    fn set_transmit_enable(&mut self, enabled: bool) -> Result<(), HalError> {
        drive(&mut self.pin, "tx_enable", enabled)
    }
}

/// S88 bus driven from four GPIO lines
#[derive(Debug)]
pub struct GpioS88Lines<CLK, LOAD, RST, DATA> {
    clock: CLK,
    load: LOAD,
    reset: RST,
    data: DATA,
}

impl<CLK, LOAD, RST, DATA> GpioS88Lines<CLK, LOAD, RST, DATA>
where
    CLK: OutputPin,
    LOAD: OutputPin,
    RST: OutputPin,
    DATA: InputPin,
{
    /// Take the pins and drive every output low.
    pub fn new(clock: CLK, load: LOAD, reset: RST, data: DATA) -> Result<Self, HalError> {
        let mut lines = Self {
            clock,
            load,
            reset,
            data,
        };
        lines.set_clock(false)?;
        lines.set_load(false)?;
        lines.set_reset(false)?;
        Ok(lines)
    }
}

impl<CLK, LOAD, RST, DATA> S88Lines for GpioS88Lines<CLK, LOAD, RST, DATA>
where
    CLK: OutputPin,
    LOAD: OutputPin,
    RST: OutputPin,
    DATA: InputPin,
{
    fn set_clock(&mut self, high: bool) -> Result<(), HalError> {
        drive(&mut self.clock, "s88_clock", high)
    }

    fn set_load(&mut self, high: bool) -> Result<(), HalError> {
        drive(&mut self.load, "s88_load", high)
    }

    fn set_reset(&mut self, high: bool) -> Result<(), HalError> {
        drive(&mut self.reset, "s88_reset", high)
    }

    fn data(&mut self) -> Result<bool, HalError> {
        self.data
            .is_high()
            .map_err(|err| pin_fault("s88_data", &err))
    }
}
