//! Top-level engine composition
//!
//! [`Gateway::step`] runs one cooperative cycle: host link dispatch,
//! XpressNet, S88, then publication of everything the bus engines produced.

use std::time::Instant;

use embedded_hal::delay::DelayNs;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::hal::{ByteTransceiver, Clock, TransmitEnable, XpressNetPort};
use crate::host_link::{CommandHandler, HostLink, HostLinkConfig};
use crate::metrics::MetricsSnapshot;
use crate::protocol::{InputChannel, InputState};
use crate::registry::InputRegistry;
use crate::s88::{S88Config, S88Scanner, ScanStrategy};
use crate::xpressnet::{XpressNetConfig, XpressNetMaster};

/// Settings for every engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GatewayConfig {
    /// Host link
    pub host: HostLinkConfig,
    /// XpressNet master
    pub xpressnet: XpressNetConfig,
    /// S88 scanner
    pub s88: S88Config,
}

/// The bus engines as seen by the host link during one dispatch
struct Engines<'a, P, E, D, S> {
    xpressnet: &'a mut XpressNetMaster<P, E, D>,
    s88: &'a mut S88Scanner<S>,
    inputs: &'a mut InputRegistry,
    now: Instant,
}

impl<P, E, D, S> CommandHandler for Engines<'_, P, E, D, S>
where
    P: XpressNetPort,
    E: TransmitEnable,
    D: DelayNs,
    S: ScanStrategy,
{
    fn reset(&mut self) {
        self.xpressnet.disable();
        self.s88.disable();
        self.inputs.reset(InputChannel::S88);
        debug!("gateway reset");
    }

    fn init_xpressnet(&mut self) -> Result<(), EngineError> {
        self.xpressnet.enable()
    }

    fn init_s88(&mut self, module_count: u8, clock_khz: u8) -> Result<(), EngineError> {
        self.s88
            .enable(module_count, clock_khz, self.now, self.inputs)
    }

    fn input_state(&self, channel: InputChannel, address: u16) -> Option<InputState> {
        self.inputs.get_state(channel, address)
    }
}

/// Host link plus both bus engines and the shared input table
pub struct Gateway<T, P, E, D, S, C> {
    host: HostLink<T>,
    xpressnet: XpressNetMaster<P, E, D>,
    s88: S88Scanner<S>,
    inputs: InputRegistry,
    clock: C,
}

impl<T, P, E, D, S, C> Gateway<T, P, E, D, S, C>
where
    T: ByteTransceiver,
    P: XpressNetPort,
    E: TransmitEnable,
    D: DelayNs,
    S: ScanStrategy,
    C: Clock,
{
    /// Assemble the engines; both buses start disabled.
    pub fn new(
        config: GatewayConfig,
        host_port: T,
        xpressnet: (P, E, D),
        s88: S,
        clock: C,
    ) -> Self {
        let (port, tx_enable, delay) = xpressnet;
        Self {
            host: HostLink::new(host_port, config.host),
            xpressnet: XpressNetMaster::new(port, tx_enable, delay, config.xpressnet),
            s88: S88Scanner::new(s88, config.s88),
            inputs: InputRegistry::new(),
            clock,
        }
    }

    /// Run one cycle. Faults are logged; nothing here stops the loop.
    pub fn step(&mut self) {
        let now = self.clock.now();

        let mut engines = Engines {
            xpressnet: &mut self.xpressnet,
            s88: &mut self.s88,
            inputs: &mut self.inputs,
            now,
        };
        if let Err(err) = self.host.step(&mut engines) {
            warn!(error = %err, "host link step failed");
        }

        if let Err(err) = self.xpressnet.step() {
            warn!(error = %err, "xpressnet step failed");
        }
        if let Err(err) = self.s88.step(now, &mut self.inputs) {
            warn!(error = %err, "s88 step failed");
        }

        self.publish();
    }

    fn publish(&mut self) {
        while let Some(change) = self.inputs.take_change() {
            if let Err(err) = self.host.publish_input_change(change) {
                warn!(error = %err, address = change.address, "dropping input change");
            }
        }
        while let Some(command) = self.xpressnet.take_event() {
            if let Err(err) = self.host.publish_throttle(command) {
                warn!(error = %err, "dropping throttle event");
            }
        }
    }

    /// Counters of every engine.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            host: self.host.stats(),
            xpressnet: self.xpressnet.stats(),
            s88: self.s88.stats(),
        }
    }

    /// Host link engine
    pub fn host(&self) -> &HostLink<T> {
        &self.host
    }

    /// Mutable host link engine
    pub fn host_mut(&mut self) -> &mut HostLink<T> {
        &mut self.host
    }

    /// XpressNet master
    pub fn xpressnet(&self) -> &XpressNetMaster<P, E, D> {
        &self.xpressnet
    }

    /// Mutable XpressNet master
    pub fn xpressnet_mut(&mut self) -> &mut XpressNetMaster<P, E, D> {
        &mut self.xpressnet
    }

    /// S88 scanner
    pub fn s88(&self) -> &S88Scanner<S> {
        &self.s88
    }

    /// Mutable S88 scanner
    pub fn s88_mut(&mut self) -> &mut S88Scanner<S> {
        &mut self.s88
    }

    /// Shared input table
    pub fn inputs(&self) -> &InputRegistry {
        &self.inputs
    }
}

impl<T, P, E, D, S, C> std::fmt::Debug for Gateway<T, P, E, D, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("host", &self.host)
            .field("pending_changes", &self.inputs.pending_changes())
            .finish_non_exhaustive()
    }
}
