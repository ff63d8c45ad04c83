use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use tracing::{debug, instrument, trace, warn};

use super::{
    CALL_BROADCAST, CALL_MESSAGE, CALL_NORMAL_INQUIRY, MAX_FRAME_LEN, Request, Symbol,
    XpressNetConfig, call_byte, decode_request, next_poll_address,
};
use crate::error::EngineError;
use crate::hal::{HalError, TransmitEnable, XpressNetPort};
use crate::metrics::XpressNetStats;
use crate::protocol::ThrottleChannel;
use crate::throttle::ThrottleCommand;

/// Broadcasts are repeated instead of acknowledged.
const BROADCAST_REPEAT: usize = 3;

const STATUS_EMERGENCY_OFF: u8 = 0x01;
const STATUS_EMERGENCY_STOP: u8 = 0x02;

const REPLY_TRACK_POWER_OFF: [u8; 2] = [0x61, 0x00];
const REPLY_NORMAL_OPERATION: [u8; 2] = [0x61, 0x01];
const REPLY_EMERGENCY_STOP: [u8; 2] = [0x81, 0x00];
const REPLY_UNSUPPORTED: [u8; 2] = [0x61, 0x82];
const HEADER_STATUS: [u8; 2] = [0x62, 0x22];
const HEADER_VERSION: [u8; 2] = [0x63, 0x21];

/// Queued command station message
#[derive(Debug, Clone)]
struct Outbound {
    call: u8,
    message: Vec<u8>,
}

/// State that lives from `enable` to `disable`
#[derive(Debug)]
struct Session {
    /// Last polled address, 0 before the first call
    poll_address: u8,
    rx: Vec<u8>,
    outbound: VecDeque<Outbound>,
    events: VecDeque<ThrottleCommand>,
    track_status: u8,
}

impl Session {
    fn new() -> Self {
        Self {
            poll_address: 0,
            rx: Vec::with_capacity(MAX_FRAME_LEN),
            outbound: VecDeque::new(),
            events: VecDeque::new(),
            track_status: 0,
        }
    }

    fn broadcast(&mut self, message: &[u8]) {
        for _ in 0..BROADCAST_REPEAT {
            self.outbound.push_back(Outbound {
                call: call_byte(CALL_BROADCAST, 0),
                message: message.to_vec(),
            });
        }
    }

    fn reply(&mut self, message: Vec<u8>) {
        self.outbound.push_back(Outbound {
            call: call_byte(CALL_MESSAGE, self.poll_address),
            message,
        });
    }

    fn receive(&mut self, symbol: Symbol, config: &XpressNetConfig, stats: &mut XpressNetStats) {
        if symbol.is_call() {
            self.rx.clear();
            return;
        }

        self.rx.push(symbol.byte());
        let expected = 2 + usize::from(self.rx[0] & 0x0F);
        if self.rx.len() < expected {
            return;
        }

        let frame = std::mem::take(&mut self.rx);
        let (body, check) = frame.split_at(expected - 1);
        let checksum = body.iter().fold(0, |acc, byte| acc ^ byte);
        if checksum == check[0] {
            stats.frames_received += 1;
            self.handle(&frame, config, stats);
        } else {
            stats.checksum_errors += 1;
            debug!(
                address = self.poll_address,
                expected = checksum,
                found = check[0],
                "xpressnet checksum mismatch"
            );
        }

        self.rx = frame;
        self.rx.clear();
    }

    fn handle(&mut self, frame: &[u8], config: &XpressNetConfig, stats: &mut XpressNetStats) {
        let request = decode_request(frame);
        trace!(address = self.poll_address, ?request, "xpressnet request");

        match request {
            Request::StopOperations => {
                self.track_status |= STATUS_EMERGENCY_OFF;
                self.broadcast(&REPLY_TRACK_POWER_OFF);
            }
            Request::ResumeOperations => {
                self.track_status = 0;
                self.broadcast(&REPLY_NORMAL_OPERATION);
            }
            Request::EmergencyStopAll => {
                self.track_status |= STATUS_EMERGENCY_STOP;
                self.broadcast(&REPLY_EMERGENCY_STOP);
            }
            Request::StatusQuery => {
                let mut message = HEADER_STATUS.to_vec();
                message.push(self.track_status);
                self.reply(message);
            }
            Request::VersionQuery => {
                let mut message = HEADER_VERSION.to_vec();
                message.extend([config.software_version, config.command_station_id]);
                self.reply(message);
            }
            Request::Throttle { address, action } => {
                stats.throttle_events += 1;
                self.events.push_back(ThrottleCommand {
                    channel: ThrottleChannel::XpressNet,
                    throttle_id: u16::from(self.poll_address),
                    address,
                    action,
                });
            }
            Request::Unsupported => {
                stats.unsupported_requests += 1;
                debug!(address = self.poll_address, ?frame, "unsupported xpressnet request");
                self.reply(REPLY_UNSUPPORTED.to_vec());
            }
        }
    }
}

/// XpressNet bus master
///
/// Each [`step`](Self::step) drains the receive path, then, once the
/// transmitter is idle, sends either the oldest queued reply or a normal
/// inquiry for the next poll address.
#[derive(Debug)]
pub struct XpressNetMaster<P, E, D> {
    port: P,
    tx_enable: E,
    delay: D,
    config: XpressNetConfig,
    session: Option<Session>,
    stats: XpressNetStats,
}

impl<P, E, D> XpressNetMaster<P, E, D>
where
    P: XpressNetPort,
    E: TransmitEnable,
    D: DelayNs,
{
    /// Create a disabled master.
    pub fn new(port: P, tx_enable: E, delay: D, config: XpressNetConfig) -> Self {
        Self {
            port,
            tx_enable,
            delay,
            config,
            session: None,
            stats: XpressNetStats::default(),
        }
    }

    /// Whether a session is running
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.session.is_some()
    }

    /// Address of the device polled last.
    #[must_use]
    pub fn poll_address(&self) -> Option<u8> {
        self.session
            .as_ref()
            .map(|session| session.poll_address)
            .filter(|&address| address != 0)
    }

    /// Start polling.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyInitialized`] when a session is running; the
    /// running session is left untouched.
    #[instrument(level = "debug", skip(self))]
    pub fn enable(&mut self) -> Result<(), EngineError> {
        if self.session.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }

        self.port.clear();
        self.tx_enable.set_transmit_enable(false)?;
        self.session = Some(Session::new());
        debug!("xpressnet enabled");
        Ok(())
    }

    /// Stop polling and drop undelivered replies and events.
    pub fn disable(&mut self) {
        if self.session.take().is_none() {
            return;
        }
        if let Err(err) = self.tx_enable.set_transmit_enable(false) {
            warn!(error = %err, "failed to release xpressnet driver");
        }
        debug!("xpressnet disabled");
    }

    /// Run one bounded bus cycle.
    #[instrument(level = "trace", skip(self))]
    pub fn step(&mut self) -> Result<(), HalError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        for _ in 0..self.config.max_symbols_per_step {
            let Some(symbol) = self.port.receive() else {
                break;
            };
            session.receive(symbol, &self.config, &mut self.stats);
        }

        if !self.port.is_transmit_idle() {
            return Ok(());
        }

        let symbols = match session.outbound.pop_front() {
            Some(outbound) => {
                self.stats.messages_sent += 1;
                message_symbols(outbound.call, &outbound.message)
            }
            None => {
                session.poll_address = next_poll_address(session.poll_address);
                self.stats.inquiries_sent += 1;
                vec![Symbol::call(call_byte(
                    CALL_NORMAL_INQUIRY,
                    session.poll_address,
                ))]
            }
        };

        let sent = self.transmit(&symbols);
        if sent.is_err() {
            self.stats.hal_faults += 1;
        }
        sent
    }

    /// Hold the driver for the whole transmission, then release it.
    fn transmit(&mut self, symbols: &[Symbol]) -> Result<(), HalError> {
        self.tx_enable.set_transmit_enable(true)?;
        let sent = self.port.transmit(symbols);
        let count = u32::try_from(symbols.len()).unwrap_or(u32::MAX);
        self.delay
            .delay_us(self.config.byte_time_us.saturating_mul(count));
        self.tx_enable.set_transmit_enable(false)?;
        sent
    }

    /// Pop the oldest decoded throttle command.
    pub fn take_event(&mut self) -> Option<ThrottleCommand> {
        self.session.as_mut()?.events.pop_front()
    }

    /// Counters
    #[must_use]
    pub fn stats(&self) -> XpressNetStats {
        self.stats
    }

    /// Settings
    #[must_use]
    pub fn config(&self) -> &XpressNetConfig {
        &self.config
    }

    /// Borrow the symbol port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutably borrow the symbol port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Borrow the driver enable line.
    pub fn transmit_enable(&self) -> &E {
        &self.tx_enable
    }

    /// Borrow the hold-time delay.
    pub fn delay(&self) -> &D {
        &self.delay
    }
}

/// Call symbol, message bytes, XOR of the message bytes.
fn message_symbols(call: u8, message: &[u8]) -> Vec<Symbol> {
    let mut symbols = Vec::with_capacity(message.len() + 2);
    symbols.push(Symbol::call(call));
    symbols.extend(message.iter().copied().map(Symbol::data));
    let checksum = message.iter().fold(0, |acc, byte| acc ^ byte);
    symbols.push(Symbol::data(checksum));
    symbols
}
