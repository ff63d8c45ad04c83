//! Bus engine errors

use thiserror::Error;

use crate::hal::HalError;
use crate::protocol::ErrorCode;

/// Why an engine refused to start
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A session is already running
    #[error("already initialized")]
    AlreadyInitialized,

    /// Module count outside the supported range
    #[error("module count {count} outside {min}..={max}")]
    ModuleCount {
        /// Requested count
        count: u8,
        /// Lowest accepted count
        min: u8,
        /// Highest accepted count
        max: u8,
    },

    /// Shift clock of 0 kHz
    #[error("clock frequency must be non-zero")]
    ClockFrequency,

    /// Hardware refused the configuration
    #[error(transparent)]
    Hal(#[from] HalError),
}

impl From<&EngineError> for ErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::AlreadyInitialized => ErrorCode::AlreadyInitialized,
            EngineError::ModuleCount { .. } | EngineError::ClockFrequency => {
                ErrorCode::InvalidCommandPayload
            }
            EngineError::Hal(_) => ErrorCode::Unknown,
        }
    }
}

impl From<HalError> for crate::protocol::Error {
    fn from(err: HalError) -> Self {
        Self::Io(err.to_string())
    }
}
