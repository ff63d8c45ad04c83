use std::time::Instant;

use tracing::{debug, instrument, warn};

use super::{
    CycleState, INPUTS_PER_MODULE, MODULE_COUNT_MAX, MODULE_COUNT_MIN, Pacing, S88Config,
    ScanStrategy,
};
use crate::error::EngineError;
use crate::hal::HalError;
use crate::metrics::S88Stats;
use crate::protocol::{InputChannel, InputState};
use crate::registry::InputRegistry;

#[derive(Debug)]
struct Session {
    input_count: u16,
    next_scan: Instant,
    cursor: u16,
    scanning: bool,
    /// Last time the strategy delivered anything in the running cycle
    last_progress: Instant,
}

/// Periodic S88 scanner
///
/// Writes each scanned level to the [`InputRegistry`] as input
/// `cursor + 1` of [`InputChannel::S88`].
#[derive(Debug)]
pub struct S88Scanner<S> {
    strategy: S,
    config: S88Config,
    session: Option<Session>,
    stats: S88Stats,
}

impl<S: ScanStrategy> S88Scanner<S> {
    /// Create a disabled scanner.
    pub fn new(strategy: S, config: S88Config) -> Self {
        Self {
            strategy,
            config,
            session: None,
            stats: S88Stats::default(),
        }
    }

    /// Whether a session is running
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.session.is_some()
    }

    /// Inputs scanned per cycle in the running session.
    #[must_use]
    pub fn input_count(&self) -> Option<u16> {
        self.session.as_ref().map(|session| session.input_count)
    }

    /// Start a session over `module_count` modules clocked at `clock_khz`.
    ///
    /// Every S88 input is reset to `Unknown`; the first scan starts after
    /// the warm-up.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ModuleCount`] / [`EngineError::ClockFrequency`] for
    ///   unusable parameters
    /// - [`EngineError::AlreadyInitialized`] when a session is running; it is
    ///   left untouched
    #[instrument(level = "debug", skip(self, now, inputs))]
    pub fn enable(
        &mut self,
        module_count: u8,
        clock_khz: u8,
        now: Instant,
        inputs: &mut InputRegistry,
    ) -> Result<(), EngineError> {
        if !(MODULE_COUNT_MIN..=MODULE_COUNT_MAX).contains(&module_count) {
            return Err(EngineError::ModuleCount {
                count: module_count,
                min: MODULE_COUNT_MIN,
                max: MODULE_COUNT_MAX,
            });
        }
        if clock_khz == 0 {
            return Err(EngineError::ClockFrequency);
        }
        if self.session.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }

        if let Err(err) = self.strategy.configure(clock_khz) {
            self.stats.hal_faults += 1;
            return Err(err.into());
        }
        inputs.reset(InputChannel::S88);
        self.session = Some(Session {
            input_count: u16::from(module_count) * INPUTS_PER_MODULE as u16,
            next_scan: now + self.config.warm_up,
            cursor: 0,
            scanning: false,
            last_progress: now,
        });
        debug!(module_count, clock_khz, "s88 enabled");
        Ok(())
    }

    /// End the session. Safe to call at any time.
    pub fn disable(&mut self) {
        if self.session.take().is_some() {
            debug!("s88 disabled");
        }
    }

    /// Advance the scan if its deadline has passed.
    #[instrument(level = "trace", skip(self, now, inputs))]
    pub fn step(&mut self, now: Instant, inputs: &mut InputRegistry) -> Result<(), HalError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if now < session.next_scan {
            return Ok(());
        }

        if !session.scanning {
            if let Err(err) = self.strategy.begin(session.input_count) {
                self.stats.hal_faults += 1;
                session.next_scan = now + self.config.scan_interval;
                return Err(err);
            }
            session.cursor = 0;
            session.scanning = true;
            session.last_progress = now;
        }

        let input_count = session.input_count;
        let cursor = &mut session.cursor;
        let mut read = 0u64;
        let drained = self.strategy.drain(&mut |level| {
            if *cursor < input_count {
                *cursor += 1;
                read += 1;
                inputs.update_state(InputChannel::S88, *cursor, InputState::from(level));
            }
        });
        self.stats.bits_read += read;

        let state = match drained {
            Ok(state) => state,
            Err(err) => {
                self.stats.hal_faults += 1;
                self.strategy.abort();
                session.scanning = false;
                session.next_scan = now + self.config.scan_interval;
                return Err(err);
            }
        };

        let state = match state {
            CycleState::Waiting
                if now.saturating_duration_since(session.last_progress)
                    >= self.config.stall_timeout =>
            {
                self.strategy.abort();
                debug!(read = session.cursor, expected = input_count, "s88 cycle stalled");
                CycleState::Truncated
            }
            CycleState::Waiting => return Ok(()),
            other => {
                session.last_progress = now;
                other
            }
        };

        match state {
            CycleState::Waiting | CycleState::Pending => {}
            CycleState::Complete | CycleState::Truncated => {
                if state == CycleState::Truncated {
                    self.stats.truncated_cycles += 1;
                    warn!(read = session.cursor, expected = input_count, "s88 cycle truncated");
                }
                self.stats.scan_cycles += 1;
                session.scanning = false;
                session.next_scan = match self.strategy.pacing() {
                    Pacing::SelfPaced => now,
                    Pacing::Interval => now + self.config.scan_interval,
                };
            }
        }
        Ok(())
    }

    /// Counters
    #[must_use]
    pub fn stats(&self) -> S88Stats {
        self.stats
    }

    /// Settings
    #[must_use]
    pub fn config(&self) -> &S88Config {
        &self.config
    }

    /// Borrow the scan strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Mutably borrow the scan strategy.
    pub fn strategy_mut(&mut self) -> &mut S {
        &mut self.strategy
    }
}
