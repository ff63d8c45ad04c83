//! S88 feedback bus scanner
//!
//! The bus is a cascade of 8-bit shift registers. A scan latches every
//! input, then shifts the levels out one by one; input 1 comes first.
//! [`S88Scanner`] owns the session and scheduling, a [`ScanStrategy`] owns
//! the physical access.

mod scanner;
mod strategy;

use std::time::Duration;

pub use scanner::S88Scanner;
pub use strategy::{
    BatchedScan, CycleState, DEFAULT_BLOCK_BUDGET_US, Pacing, ScanStrategy, SteppedScan,
};

/// Fewest modules a session may scan
pub const MODULE_COUNT_MIN: u8 = 1;

/// Most modules a session may scan
pub const MODULE_COUNT_MAX: u8 = 32;

/// Inputs contributed by one module
pub const INPUTS_PER_MODULE: usize = 8;

/// Width of one shift-engine batch
pub const BATCH_BITS: u8 = 32;

/// S88 scheduling settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct S88Config {
    /// Quiet time between enable and the first scan
    pub warm_up: Duration,
    /// Time between cycles for interval-paced strategies
    pub scan_interval: Duration,
    /// How long a cycle may go without receiving a bit before it is
    /// abandoned as truncated
    pub stall_timeout: Duration,
}

impl Default for S88Config {
    fn default() -> Self {
        Self {
            warm_up: Duration::from_secs(1),
            scan_interval: Duration::from_millis(20),
            stall_timeout: Duration::from_millis(250),
        }
    }
}
