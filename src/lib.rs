//! Railgate - model railway protocol gateway
//!
//! This library bridges a host command-station link to two field buses:
//! XpressNet, a half-duplex throttle bus the gateway masters, and S88, a
//! shift-register feedback bus it scans.
//!
//! # Quick Start
//!
//! ```rust
//! use railgate::hal::mock::{
//!     ManualClock, MockDelay, MockInputs, MockShiftRegister, MockTransceiver,
//!     MockTransmitEnable, MockXpressNetPort,
//! };
//! use railgate::s88::BatchedScan;
//! use railgate::{Gateway, GatewayConfig, Message};
//!
//! let mut gateway = Gateway::new(
//!     GatewayConfig::default(),
//!     MockTransceiver::new(),
//!     (MockXpressNetPort::new(), MockTransmitEnable::new(), MockDelay::new()),
//!     BatchedScan::new(MockShiftRegister::new(MockInputs::low(16))),
//!     ManualClock::new(),
//! );
//!
//! gateway.host_mut().port_mut().push_rx(&Message::Ping.encode()?);
//! gateway.step();
//!
//! let reply = gateway.host_mut().port_mut().take_tx();
//! assert_eq!(Message::decode(&reply)?, Message::Pong);
//! # Ok::<(), railgate::Error>(())
//! ```
//!
//! # Layout
//!
//! - [`protocol`] - host link frames, checksums and typed messages
//! - [`host_link`] - host framing engine and command dispatch
//! - [`xpressnet`] - XpressNet bus master
//! - [`s88`] - S88 scanner with batched and stepped strategies
//! - [`registry`] - input table shared by the engines
//! - [`hal`] - hardware capability traits and their backends

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[cfg(feature = "debug-tools")]
pub mod capture;
pub mod error;
pub mod gateway;
pub mod hal;
pub mod host_link;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod s88;
pub mod throttle;
pub mod xpressnet;

pub use error::EngineError;
pub use gateway::{Gateway, GatewayConfig};
pub use host_link::{CommandHandler, HostLink, HostLinkConfig};
pub use metrics::MetricsSnapshot;
pub use protocol::{Command, Error, ErrorCode, Frame, FrameReader, Message, Result};
pub use registry::{InputChange, InputRegistry};
pub use throttle::{FunctionValue, SpeedDirection, ThrottleAction, ThrottleCommand};
