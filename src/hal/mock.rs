//! In-memory hardware for tests and benchmarks

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;

use super::{
    Batch, ByteTransceiver, Clock, HalError, S88Lines, ShiftRegisterSource, TransmitEnable,
    XpressNetPort,
};
use crate::xpressnet::Symbol;

const BATCH_BITS: usize = 32;

/// Host byte stream backed by two queues
#[derive(Debug, Default)]
pub struct MockTransceiver {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    fail_writes: bool,
}

impl MockTransceiver {
    /// Empty transceiver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the host sent them.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Bytes not yet read
    #[must_use]
    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }

    /// Everything written so far
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.tx
    }

    /// Take and clear everything written so far.
    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }

    /// Make subsequent writes fail.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl ByteTransceiver for MockTransceiver {
    fn read_byte(&mut self) -> Result<Option<u8>, HalError> {
        Ok(self.rx.pop_front())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        if self.fail_writes {
            return Err(HalError::Serial("write rejected".into()));
        }
        self.tx.extend_from_slice(bytes);
        Ok(())
    }
}

/// Driver enable line that records every level it is driven to
#[derive(Debug, Default)]
pub struct MockTransmitEnable {
    levels: Vec<bool>,
}

impl MockTransmitEnable {
    /// Line with no history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Levels in the order they were driven
    #[must_use]
    pub fn levels(&self) -> &[bool] {
        &self.levels
    }

    /// Current level
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.levels.last().copied().unwrap_or(false)
    }
}

impl TransmitEnable for MockTransmitEnable {
    fn set_transmit_enable(&mut self, enabled: bool) -> Result<(), HalError> {
        self.levels.push(enabled);
        Ok(())
    }
}

/// XpressNet symbol port with a scripted receive queue
#[derive(Debug)]
pub struct MockXpressNetPort {
    rx: VecDeque<Symbol>,
    transmissions: Vec<Vec<Symbol>>,
    idle: bool,
    fail_transmit: bool,
}

impl MockXpressNetPort {
    /// Idle port with nothing queued
    #[must_use]
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            transmissions: Vec::new(),
            idle: true,
            fail_transmit: false,
        }
    }

    /// Queue device bytes as data symbols.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied().map(Symbol::data));
    }

    /// Queue one raw symbol.
    pub fn push_symbol(&mut self, symbol: Symbol) {
        self.rx.push_back(symbol);
    }

    /// Control what `is_transmit_idle` reports.
    pub fn set_idle(&mut self, idle: bool) {
        self.idle = idle;
    }

    /// Make subsequent transmissions fail.
    pub fn set_fail_transmit(&mut self, fail: bool) {
        self.fail_transmit = fail;
    }

    /// Every transmission so far
    #[must_use]
    pub fn transmissions(&self) -> &[Vec<Symbol>] {
        &self.transmissions
    }

    /// Take and clear the transmission log.
    pub fn take_transmissions(&mut self) -> Vec<Vec<Symbol>> {
        std::mem::take(&mut self.transmissions)
    }
}

impl Default for MockXpressNetPort {
    fn default() -> Self {
        Self::new()
    }
}

impl XpressNetPort for MockXpressNetPort {
    fn transmit(&mut self, symbols: &[Symbol]) -> Result<(), HalError> {
        if self.fail_transmit {
            return Err(HalError::Bus("uart overrun".into()));
        }
        self.transmissions.push(symbols.to_vec());
        Ok(())
    }

    fn is_transmit_idle(&self) -> bool {
        self.idle
    }

    fn receive(&mut self) -> Option<Symbol> {
        self.rx.pop_front()
    }

    fn clear(&mut self) {
        self.rx.clear();
    }
}

/// Delay that only adds up the requested time
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    /// Zeroed delay
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in nanoseconds
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }

    /// Total requested delay in microseconds
    #[must_use]
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Inputs of an S88 chain, shared between a test and the bus model
#[derive(Debug, Clone, Default)]
pub struct MockInputs(Rc<std::cell::RefCell<Vec<bool>>>);

impl MockInputs {
    /// Chain with the given input levels, input 1 first
    #[must_use]
    pub fn new(levels: Vec<bool>) -> Self {
        Self(Rc::new(std::cell::RefCell::new(levels)))
    }

    /// Chain of `count` inputs, all low
    #[must_use]
    pub fn low(count: usize) -> Self {
        Self::new(vec![false; count])
    }

    /// Set the level of 0-based input `index`, growing the chain if needed.
    pub fn set(&self, index: usize, level: bool) {
        let mut levels = self.0.borrow_mut();
        if levels.len() <= index {
            levels.resize(index + 1, false);
        }
        levels[index] = level;
    }

    /// Copy of the first `count` levels, padded low.
    #[must_use]
    pub fn snapshot(&self, count: usize) -> Vec<bool> {
        let levels = self.0.borrow();
        (0..count)
            .map(|index| levels.get(index).copied().unwrap_or(false))
            .collect()
    }
}

/// Batched shift engine modelled on a right-shifting 32-bit shift register
///
/// Full batches come out with input `n` in bit `n`; the final partial batch
/// is left-justified. A count that is a multiple of 32 is followed by an
/// empty batch, as the hardware pushes once more on completion.
#[derive(Debug)]
pub struct MockShiftRegister {
    inputs: MockInputs,
    pending: VecDeque<Batch>,
    clock_khz: u8,
    scans: usize,
    ready_limit: Option<usize>,
    lost: usize,
    fail_start: bool,
}

impl MockShiftRegister {
    /// Shift engine reading from `inputs`
    #[must_use]
    pub fn new(inputs: MockInputs) -> Self {
        Self {
            inputs,
            pending: VecDeque::new(),
            clock_khz: 0,
            scans: 0,
            ready_limit: None,
            lost: 0,
            fail_start: false,
        }
    }

    /// Release at most `count` batches until called again; `None` releases all.
    pub fn set_ready_limit(&mut self, count: Option<usize>) {
        self.ready_limit = count;
    }

    /// Drop the first `count` batches of the next scan.
    pub fn lose_batches(&mut self, count: usize) {
        self.lost = count;
    }

    /// Make subsequent `start_scan` calls fail.
    pub fn set_fail_start(&mut self, fail: bool) {
        self.fail_start = fail;
    }

    /// Scans started
    #[must_use]
    pub fn scans(&self) -> usize {
        self.scans
    }

    /// Clock programmed last
    #[must_use]
    pub fn clock_khz(&self) -> u8 {
        self.clock_khz
    }
}

impl ShiftRegisterSource for MockShiftRegister {
    fn set_clock_khz(&mut self, clock_khz: u8) -> Result<(), HalError> {
        self.clock_khz = clock_khz;
        Ok(())
    }

    fn start_scan(&mut self, bit_count: u16) -> Result<(), HalError> {
        if self.fail_start {
            return Err(HalError::Bus("shift engine stalled".into()));
        }
        self.scans += 1;
        self.pending.clear();
        let levels = self.inputs.snapshot(usize::from(bit_count));

        for chunk in levels.chunks(BATCH_BITS) {
            let packed = chunk
                .iter()
                .enumerate()
                .fold(0u32, |acc, (bit, &level)| acc | (u32::from(level) << bit));
            let valid_bits = chunk.len();
            let value = if valid_bits == BATCH_BITS {
                packed
            } else {
                packed << (BATCH_BITS - valid_bits)
            };
            self.pending.push_back(Batch {
                value,
                valid_bits: u8::try_from(valid_bits).unwrap_or(u8::MAX),
            });
        }
        if levels.len() % BATCH_BITS == 0 {
            self.pending.push_back(Batch {
                value: 0,
                valid_bits: 0,
            });
        }
        let lost = std::mem::take(&mut self.lost).min(self.pending.len());
        self.pending.drain(..lost);
        Ok(())
    }

    fn read_batch(&mut self) -> Option<Batch> {
        match self.ready_limit {
            Some(0) => None,
            Some(ref mut remaining) => {
                *remaining -= 1;
                self.pending.pop_front()
            }
            None => self.pending.pop_front(),
        }
    }
}

/// S88 chain behind four lines: clocking with LOAD high latches the inputs,
/// clocking with LOAD low shifts the next input onto DATA.
#[derive(Debug)]
pub struct MockS88Chain {
    inputs: MockInputs,
    latched: Vec<bool>,
    position: usize,
    clock: bool,
    load: bool,
    resets: usize,
}

impl MockS88Chain {
    /// Chain reading from `inputs`
    #[must_use]
    pub fn new(inputs: MockInputs) -> Self {
        Self {
            inputs,
            latched: Vec::new(),
            position: 0,
            clock: false,
            load: false,
            resets: 0,
        }
    }

    /// RESET pulses seen
    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl S88Lines for MockS88Chain {
    fn set_clock(&mut self, high: bool) -> Result<(), HalError> {
        if high && !self.clock {
            if self.load {
                self.latched = self.inputs.snapshot(self.inputs.0.borrow().len());
                self.position = 0;
            } else {
                self.position += 1;
            }
        }
        self.clock = high;
        Ok(())
    }

    fn set_load(&mut self, high: bool) -> Result<(), HalError> {
        self.load = high;
        Ok(())
    }

    fn set_reset(&mut self, high: bool) -> Result<(), HalError> {
        if high {
            self.resets += 1;
        }
        Ok(())
    }

    fn data(&mut self) -> Result<bool, HalError> {
        Ok(self.latched.get(self.position).copied().unwrap_or(false))
    }
}

/// Clock advanced by hand; clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    /// Clock frozen at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
