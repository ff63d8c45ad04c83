//! `embedded-io` byte stream backend

use embedded_io::{Read, ReadReady, Write};

use super::{ByteTransceiver, HalError};

fn serial_fault(err: &impl embedded_io::Error) -> HalError {
    HalError::Serial(format!("{:?}", err.kind()))
}

/// Host link over any non-blocking-readable `embedded-io` stream
#[derive(Debug)]
pub struct SerialTransceiver<T> {
    inner: T,
}

impl<T> SerialTransceiver<T>
where
    T: Read + ReadReady + Write,
{
    /// Wrap a UART (or any byte stream).
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped stream.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the wrapped stream.
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> ByteTransceiver for SerialTransceiver<T>
where
    T: Read + ReadReady + Write,
{
    fn read_byte(&mut self) -> Result<Option<u8>, HalError> {
        if !self.inner.read_ready().map_err(|err| serial_fault(&err))? {
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        match self.inner.read(&mut byte).map_err(|err| serial_fault(&err))? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        self.inner
            .write_all(bytes)
            .map_err(|err| serial_fault(&err))?;
        self.inner.flush().map_err(|err| serial_fault(&err))
    }
}
