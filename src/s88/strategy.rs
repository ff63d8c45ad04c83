//! Physical scan strategies

use embedded_hal::delay::DelayNs;
use tracing::trace;

use super::BATCH_BITS;
use crate::hal::{HalError, S88Lines, ShiftRegisterSource};

/// Progress of a scan cycle after a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Nothing was ready; the hardware has not delivered since the last drain
    Waiting,
    /// Bits were delivered and more will follow
    Pending,
    /// Every input was delivered
    Complete,
    /// The hardware ended the cycle early
    Truncated,
}

/// When the next cycle may start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Immediately after the previous cycle completes
    SelfPaced,
    /// After the configured scan interval
    Interval,
}

/// Physical access to the S88 chain
///
/// Both implementations deliver the same bit sequence for the same inputs.
pub trait ScanStrategy {
    /// Apply the shift clock for a new session.
    fn configure(&mut self, clock_khz: u8) -> Result<(), HalError>;

    /// Start a cycle over `bit_count` inputs.
    fn begin(&mut self, bit_count: u16) -> Result<(), HalError>;

    /// Hand the bits that are ready to `sink`, input 1 first.
    ///
    /// Each call does a bounded amount of work.
    fn drain(&mut self, sink: &mut dyn FnMut(bool)) -> Result<CycleState, HalError>;

    /// Drop the cycle in progress; the next `begin` starts from scratch.
    fn abort(&mut self);

    /// Scheduling of consecutive cycles
    fn pacing(&self) -> Pacing;
}

#[derive(Debug, Clone, Copy)]
struct BatchCycle {
    bit_count: u16,
    delivered: u16,
    batches_left: u16,
}

/// Scan through a batched shift engine (PIO, SPI)
///
/// The engine shifts 32 inputs per batch and pushes once more when the
/// count ends on a batch boundary, so a cycle always reads
/// `bit_count / 32 + 1` batches.
#[derive(Debug)]
pub struct BatchedScan<S> {
    source: S,
    cycle: Option<BatchCycle>,
}

impl<S: ShiftRegisterSource> BatchedScan<S> {
    /// Wrap a shift engine.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cycle: None,
        }
    }

    /// Borrow the shift engine.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutably borrow the shift engine.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: ShiftRegisterSource> ScanStrategy for BatchedScan<S> {
    fn configure(&mut self, clock_khz: u8) -> Result<(), HalError> {
        self.cycle = None;
        self.source.set_clock_khz(clock_khz)
    }

    fn begin(&mut self, bit_count: u16) -> Result<(), HalError> {
        self.source.start_scan(bit_count)?;
        self.cycle = Some(BatchCycle {
            bit_count,
            delivered: 0,
            batches_left: bit_count / u16::from(BATCH_BITS) + 1,
        });
        Ok(())
    }

    fn drain(&mut self, sink: &mut dyn FnMut(bool)) -> Result<CycleState, HalError> {
        let Some(cycle) = self.cycle.as_mut() else {
            return Ok(CycleState::Complete);
        };

        let mut progressed = false;
        while cycle.batches_left > 0 {
            let Some(batch) = self.source.read_batch() else {
                return Ok(if progressed {
                    CycleState::Pending
                } else {
                    CycleState::Waiting
                });
            };
            cycle.batches_left -= 1;
            progressed = true;

            let valid = batch.valid_bits.min(BATCH_BITS);
            if valid == 0 {
                continue;
            }
            let value = if valid < BATCH_BITS {
                batch.value >> (BATCH_BITS - valid)
            } else {
                batch.value
            };

            let take = (cycle.bit_count - cycle.delivered).min(u16::from(valid));
            trace!(value, valid, take, "s88 batch");
            for bit in 0..take {
                sink((value >> bit) & 1 != 0);
            }
            cycle.delivered += take;
        }

        let complete = cycle.delivered == cycle.bit_count;
        self.cycle = None;
        Ok(if complete {
            CycleState::Complete
        } else {
            CycleState::Truncated
        })
    }

    fn abort(&mut self) {
        self.cycle = None;
    }

    fn pacing(&self) -> Pacing {
        Pacing::SelfPaced
    }
}

/// Longest a [`SteppedScan`] drain blocks while shifting bits
pub const DEFAULT_BLOCK_BUDGET_US: u32 = 1_000;

/// Holds spent latching: LOAD, clock high, clock low, RESET high, RESET low,
/// LOAD low.
const LATCH_HOLDS: u32 = 6;

#[derive(Debug, Clone, Copy)]
struct PulseCycle {
    bit_count: u16,
    cursor: u16,
    latched: bool,
}

/// Scan by pulsing the S88 lines directly
///
/// The first drain of a cycle latches the inputs; later drains shift out as
/// many bits as fit in the block budget, at least one per drain. Each line
/// level is held for half a clock period.
#[derive(Debug)]
pub struct SteppedScan<L, D> {
    lines: L,
    delay: D,
    hold_us: u32,
    block_budget_us: u32,
    cycle: Option<PulseCycle>,
}

impl<L: S88Lines, D: DelayNs> SteppedScan<L, D> {
    /// Drive `lines`, timing pulses with `delay`.
    pub fn new(lines: L, delay: D) -> Self {
        Self {
            lines,
            delay,
            hold_us: 50,
            block_budget_us: DEFAULT_BLOCK_BUDGET_US,
            cycle: None,
        }
    }

    /// Change how long one drain may spend shifting.
    #[must_use]
    pub fn with_block_budget_us(mut self, budget_us: u32) -> Self {
        self.block_budget_us = budget_us;
        self
    }

    /// Borrow the bus lines.
    pub fn lines(&self) -> &L {
        &self.lines
    }

    /// Borrow the delay.
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Half clock period in microseconds
    #[must_use]
    pub fn hold_us(&self) -> u32 {
        self.hold_us
    }

    fn hold(&mut self) {
        self.delay.delay_us(self.hold_us);
    }

    fn pulse_clock(&mut self) -> Result<(), HalError> {
        self.lines.set_clock(true)?;
        self.hold();
        self.lines.set_clock(false)?;
        self.hold();
        Ok(())
    }

    /// Latch the inputs and clear the module flip-flops.
    fn latch(&mut self) -> Result<(), HalError> {
        self.lines.set_load(true)?;
        self.hold();
        self.pulse_clock()?;
        self.lines.set_reset(true)?;
        self.hold();
        self.lines.set_reset(false)?;
        self.hold();
        self.lines.set_load(false)?;
        self.hold();
        Ok(())
    }
}

impl<L: S88Lines, D: DelayNs> ScanStrategy for SteppedScan<L, D> {
    fn configure(&mut self, clock_khz: u8) -> Result<(), HalError> {
        self.cycle = None;
        self.hold_us = (500 / u32::from(clock_khz.max(1))).max(1);
        self.lines.set_clock(false)?;
        self.lines.set_load(false)?;
        self.lines.set_reset(false)
    }

    fn begin(&mut self, bit_count: u16) -> Result<(), HalError> {
        self.cycle = Some(PulseCycle {
            bit_count,
            cursor: 0,
            latched: false,
        });
        Ok(())
    }

    fn drain(&mut self, sink: &mut dyn FnMut(bool)) -> Result<CycleState, HalError> {
        let Some(mut cycle) = self.cycle else {
            return Ok(CycleState::Complete);
        };

        let mut spent = 0u32;
        if !cycle.latched {
            self.latch()?;
            cycle.latched = true;
            spent = self.hold_us.saturating_mul(LATCH_HOLDS);
        }

        let bit_cost = self.hold_us.saturating_mul(2);
        while cycle.cursor < cycle.bit_count
            && (spent == 0 || spent.saturating_add(bit_cost) <= self.block_budget_us)
        {
            sink(self.lines.data()?);
            self.pulse_clock()?;
            cycle.cursor += 1;
            spent = spent.saturating_add(bit_cost);
        }
        trace!(cursor = cycle.cursor, spent_us = spent, "s88 shift");

        if cycle.cursor == cycle.bit_count {
            self.cycle = None;
            Ok(CycleState::Complete)
        } else {
            self.cycle = Some(cycle);
            Ok(CycleState::Pending)
        }
    }

    fn abort(&mut self) {
        self.cycle = None;
    }

    fn pacing(&self) -> Pacing {
        Pacing::Interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{MockDelay, MockInputs, MockS88Chain, MockShiftRegister};

    fn collect(strategy: &mut dyn ScanStrategy, bit_count: u16) -> (Vec<bool>, CycleState) {
        let mut bits = Vec::new();
        strategy.begin(bit_count).unwrap();
        for _ in 0..=bit_count {
            let state = strategy.drain(&mut |bit| bits.push(bit)).unwrap();
            if state != CycleState::Pending {
                return (bits, state);
            }
        }
        panic!("cycle over {bit_count} inputs never finished");
    }

    fn pattern(count: usize) -> MockInputs {
        let inputs = MockInputs::low(count);
        for index in (0..count).filter(|index| index % 3 == 0 || index % 7 == 0) {
            inputs.set(index, true);
        }
        inputs
    }

    #[test]
    fn partial_batch_is_right_justified() {
        let inputs = MockInputs::low(16);
        inputs.set(0, true);
        inputs.set(9, true);
        let mut scan = BatchedScan::new(MockShiftRegister::new(inputs));

        let (bits, state) = collect(&mut scan, 16);
        assert_eq!(state, CycleState::Complete);
        let high: Vec<usize> = bits
            .iter()
            .enumerate()
            .filter_map(|(index, &bit)| bit.then_some(index))
            .collect();
        assert_eq!(bits.len(), 16);
        assert_eq!(high, vec![0, 9]);
    }

    #[test]
    fn batch_boundary_consumes_trailing_push() {
        let inputs = pattern(64);
        let mut scan = BatchedScan::new(MockShiftRegister::new(inputs.clone()));

        let (bits, state) = collect(&mut scan, 64);
        assert_eq!(state, CycleState::Complete);
        assert_eq!(bits, inputs.snapshot(64));

        // The next cycle starts clean.
        let (bits, _) = collect(&mut scan, 64);
        assert_eq!(bits, inputs.snapshot(64));
    }

    #[test]
    fn waits_for_batches() {
        let inputs = pattern(40);
        let mut scan = BatchedScan::new(MockShiftRegister::new(inputs.clone()));
        scan.source_mut().set_ready_limit(Some(1));

        let mut bits = Vec::new();
        scan.begin(40).unwrap();
        let state = scan.drain(&mut |bit| bits.push(bit)).unwrap();
        assert_eq!(state, CycleState::Pending);
        assert_eq!(bits.len(), 32);

        scan.source_mut().set_ready_limit(None);
        let state = scan.drain(&mut |bit| bits.push(bit)).unwrap();
        assert_eq!(state, CycleState::Complete);
        assert_eq!(bits, inputs.snapshot(40));
    }

    #[test]
    fn empty_source_reports_waiting_until_aborted() {
        let inputs = pattern(16);
        let mut scan = BatchedScan::new(MockShiftRegister::new(inputs.clone()));
        scan.source_mut().set_ready_limit(Some(0));

        scan.begin(16).unwrap();
        let mut bits = Vec::new();
        assert_eq!(
            scan.drain(&mut |bit| bits.push(bit)).unwrap(),
            CycleState::Waiting
        );
        assert!(bits.is_empty());

        scan.abort();
        assert_eq!(scan.drain(&mut |bit| bits.push(bit)).unwrap(), CycleState::Complete);
        assert!(bits.is_empty());

        scan.source_mut().set_ready_limit(None);
        let (bits, state) = collect(&mut scan, 16);
        assert_eq!(state, CycleState::Complete);
        assert_eq!(bits, inputs.snapshot(16));
    }

    #[test]
    fn short_batches_end_the_cycle() {
        struct Short;

        impl ShiftRegisterSource for Short {
            fn set_clock_khz(&mut self, _: u8) -> Result<(), HalError> {
                Ok(())
            }

            fn start_scan(&mut self, _: u16) -> Result<(), HalError> {
                Ok(())
            }

            fn read_batch(&mut self) -> Option<crate::hal::Batch> {
                Some(crate::hal::Batch {
                    value: u32::MAX,
                    valid_bits: 4,
                })
            }
        }

        let mut scan = BatchedScan::new(Short);
        let (bits, state) = collect(&mut scan, 16);
        assert_eq!(state, CycleState::Truncated);
        assert_eq!(bits, vec![true; 4]);
    }

    #[test]
    fn strategies_agree() {
        for count in [8, 16, 32, 40, 256] {
            let inputs = pattern(count);
            let bit_count = u16::try_from(count).unwrap();

            let mut batched = BatchedScan::new(MockShiftRegister::new(inputs.clone()));
            let mut stepped =
                SteppedScan::new(MockS88Chain::new(inputs.clone()), MockDelay::new());
            stepped.configure(10).unwrap();

            let (from_batches, _) = collect(&mut batched, bit_count);
            let (from_pulses, _) = collect(&mut stepped, bit_count);
            assert_eq!(from_batches, from_pulses, "count {count}");
            assert_eq!(from_batches, inputs.snapshot(count));
        }
    }

    #[test]
    fn stepped_hold_follows_clock() {
        let mut stepped = SteppedScan::new(MockS88Chain::new(MockInputs::low(8)), MockDelay::new());
        stepped.configure(10).unwrap();
        assert_eq!(stepped.hold_us(), 50);

        collect(&mut stepped, 8);
        // 6 holds for load/reset, 2 per clocked bit
        assert_eq!(stepped.delay().total_us(), 50 * (6 + 2 * 8));
        assert_eq!(stepped.lines().resets(), 1);

        stepped.configure(255).unwrap();
        assert_eq!(stepped.hold_us(), 1);
    }

    #[test]
    fn stepped_drains_stay_within_block_budget() {
        let inputs = pattern(256);
        let mut stepped = SteppedScan::new(MockS88Chain::new(inputs.clone()), MockDelay::new());
        stepped.configure(10).unwrap();
        stepped.begin(256).unwrap();

        let mut bits = Vec::new();
        let mut drains = 0;
        loop {
            let before = stepped.delay().total_us();
            let state = stepped.drain(&mut |bit| bits.push(bit)).unwrap();
            drains += 1;
            assert!(stepped.delay().total_us() - before <= u64::from(DEFAULT_BLOCK_BUDGET_US));
            if state == CycleState::Complete {
                break;
            }
            assert_eq!(state, CycleState::Pending);
        }

        assert_eq!(bits, inputs.snapshot(256));
        // 7 bits after the latch, then 10 per drain
        assert_eq!(drains, 1 + (256 - 7 + 9) / 10);
    }

    #[test]
    fn slow_clock_shifts_one_bit_per_drain() {
        let inputs = pattern(8);
        let mut stepped = SteppedScan::new(MockS88Chain::new(inputs.clone()), MockDelay::new());
        stepped.configure(1).unwrap();
        assert_eq!(stepped.hold_us(), 500);
        stepped.begin(8).unwrap();

        let mut bits = Vec::new();
        assert_eq!(
            stepped.drain(&mut |bit| bits.push(bit)).unwrap(),
            CycleState::Pending
        );
        assert!(bits.is_empty());
        assert_eq!(stepped.delay().total_us(), 3_000);

        for expected in 1..=8 {
            let state = stepped.drain(&mut |bit| bits.push(bit)).unwrap();
            assert_eq!(bits.len(), expected);
            let done = if expected == 8 {
                CycleState::Complete
            } else {
                CycleState::Pending
            };
            assert_eq!(state, done);
        }
        assert_eq!(bits, inputs.snapshot(8));
    }

    #[test]
    fn stepped_abort_relatches_on_next_cycle() {
        let inputs = pattern(16);
        let mut stepped = SteppedScan::new(MockS88Chain::new(inputs.clone()), MockDelay::new())
            .with_block_budget_us(200);
        stepped.configure(10).unwrap();
        stepped.begin(16).unwrap();
        stepped.drain(&mut |_| {}).unwrap();
        stepped.abort();

        let (bits, state) = collect(&mut stepped, 16);
        assert_eq!(state, CycleState::Complete);
        assert_eq!(bits, inputs.snapshot(16));
        assert_eq!(stepped.lines().resets(), 2);
    }
}
