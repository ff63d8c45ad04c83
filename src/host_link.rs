//! Framed command link to the host
//!
//! Inbound bytes are assembled by a [`FrameReader`], which resynchronizes
//! on checksum failures by sliding one byte at a time. Every checksum-valid
//! frame gets exactly one reply. Input changes and throttle events go out
//! unsolicited.

use tracing::{debug, instrument, trace};

use crate::error::EngineError;
use crate::hal::ByteTransceiver;
use crate::metrics::HostLinkStats;
use crate::protocol::{
    Board, ErrorCode, FirmwareVersion, Frame, FrameReader, InputChannel, InputState, Message,
    Result,
};
use crate::registry::InputChange;
use crate::throttle::ThrottleCommand;

#[cfg(feature = "debug-tools")]
use crate::capture::{CaptureDirection, FrameCapture};

/// Host link settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostLinkConfig {
    /// Receive buffer size in bytes
    pub rx_capacity: usize,
    /// Bytes pulled from the transport per step while no frame is complete
    pub max_bytes_per_step: usize,
    /// Board reported by `Info`
    pub board: Board,
    /// Firmware version reported by `Info`
    pub version: FirmwareVersion,
}

impl Default for HostLinkConfig {
    fn default() -> Self {
        Self {
            rx_capacity: 1024,
            max_bytes_per_step: 512,
            board: Board::Gateway,
            version: FirmwareVersion::CURRENT,
        }
    }
}

/// Actions the host can trigger on the bus engines
pub trait CommandHandler {
    /// Disable every engine and forget scanned inputs.
    fn reset(&mut self);

    /// Enable the XpressNet master.
    fn init_xpressnet(&mut self) -> std::result::Result<(), EngineError>;

    /// Enable the S88 scanner.
    fn init_s88(&mut self, module_count: u8, clock_khz: u8)
    -> std::result::Result<(), EngineError>;

    /// Current state of one input, `None` when out of range.
    fn input_state(&self, channel: InputChannel, address: u16) -> Option<InputState>;
}

/// Host link engine
pub struct HostLink<T> {
    port: T,
    reader: FrameReader,
    config: HostLinkConfig,
    stats: HostLinkStats,
    #[cfg(feature = "debug-tools")]
    capture: Option<FrameCapture>,
}

impl<T: ByteTransceiver> HostLink<T> {
    /// Create a link over `port`.
    pub fn new(port: T, config: HostLinkConfig) -> Self {
        Self {
            port,
            reader: FrameReader::new(config.rx_capacity),
            config,
            stats: HostLinkStats::default(),
            #[cfg(feature = "debug-tools")]
            capture: None,
        }
    }

    /// Record every frame to `capture`.
    #[cfg(feature = "debug-tools")]
    pub fn set_capture(&mut self, capture: FrameCapture) {
        self.capture = Some(capture);
    }

    /// Append one received byte.
    pub fn feed(&mut self, byte: u8) {
        self.reader.push(byte);
    }

    /// Dispatch at most one frame.
    ///
    /// Bytes are pulled from the transport only until a frame completes.
    /// Returns the reply that was sent.
    #[instrument(level = "trace", skip(self, handler))]
    pub fn step(&mut self, handler: &mut impl CommandHandler) -> Result<Option<Message>> {
        let mut budget = self.config.max_bytes_per_step;
        let frame = loop {
            if let Some(frame) = self.reader.next_frame() {
                break frame;
            }
            if budget == 0 {
                return Ok(None);
            }
            match self.port.read_byte()? {
                Some(byte) => {
                    self.reader.push(byte);
                    budget -= 1;
                }
                None => return Ok(None),
            }
        };

        self.stats.frames_received += 1;
        #[cfg(feature = "debug-tools")]
        self.capture_frame(CaptureDirection::Inbound, &frame.encode());

        let reply = self.dispatch(&frame, handler);
        if matches!(reply, Message::Error { .. }) {
            self.stats.error_replies += 1;
        }
        self.send(&reply)?;
        Ok(Some(reply))
    }

    /// Decide the reply to one frame, running the requested action.
    pub fn dispatch(&self, frame: &Frame, handler: &mut impl CommandHandler) -> Message {
        let request = frame.command_byte();
        if frame.command().is_some_and(|command| !command.is_request()) {
            debug!(request, "gateway-side code from host");
            return Message::Error {
                request,
                code: ErrorCode::InvalidCommand,
            };
        }

        let message = match Message::from_frame(frame) {
            Ok(message) => message,
            Err(err) => {
                debug!(request, error = %err, "rejecting host frame");
                return Message::Error {
                    request,
                    code: ErrorCode::from(&err),
                };
            }
        };
        trace!(command = %message.command(), "host request");

        let enabled = |result: std::result::Result<(), EngineError>, ok: Message| match result {
            Ok(()) => ok,
            Err(err) => {
                debug!(request, error = %err, "host request refused");
                Message::Error {
                    request,
                    code: ErrorCode::from(&err),
                }
            }
        };

        match message {
            Message::Reset => {
                handler.reset();
                Message::ResetOk
            }
            Message::Ping => Message::Pong,
            Message::GetInfo => Message::Info {
                board: self.config.board,
                version: self.config.version,
            },
            Message::InitXpressNet => enabled(handler.init_xpressnet(), Message::InitXpressNetOk),
            Message::InitS88 {
                module_count,
                clock_khz,
            } => enabled(
                handler.init_s88(module_count, clock_khz),
                Message::InitS88Ok,
            ),
            Message::GetInputState { channel, address } => {
                match handler.input_state(channel, address) {
                    Some(state) => Message::InputState {
                        channel,
                        address,
                        state,
                    },
                    None => Message::Error {
                        request,
                        code: ErrorCode::InvalidCommandPayload,
                    },
                }
            }
            _ => Message::Error {
                request,
                code: ErrorCode::InvalidCommand,
            },
        }
    }

    /// Encode and write one message.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        let bytes = message.encode()?;
        if let Err(err) = self.port.write_all(&bytes) {
            self.stats.send_failures += 1;
            return Err(err.into());
        }
        self.stats.frames_sent += 1;
        trace!(command = %message.command(), len = bytes.len(), "frame sent");
        #[cfg(feature = "debug-tools")]
        self.capture_frame(CaptureDirection::Outbound, &bytes);
        Ok(())
    }

    /// Send an `InputStateChanged` notification.
    pub fn publish_input_change(&mut self, change: InputChange) -> Result<()> {
        self.send_unsolicited(&Message::InputStateChanged {
            channel: change.channel,
            address: change.address,
            state: change.state,
        })
    }

    /// Send a throttle event.
    pub fn publish_throttle(&mut self, command: ThrottleCommand) -> Result<()> {
        self.send_unsolicited(&Message::Throttle(command))
    }

    fn send_unsolicited(&mut self, message: &Message) -> Result<()> {
        self.send(message)?;
        self.stats.unsolicited_sent += 1;
        Ok(())
    }

    #[cfg(feature = "debug-tools")]
    fn capture_frame(&mut self, direction: CaptureDirection, bytes: &[u8]) {
        if let Some(capture) = self.capture.as_mut() {
            if let Err(err) = capture.record(direction, bytes) {
                debug!(error = ?err, "failed to record host frame");
            }
        }
    }

    /// Counters
    #[must_use]
    pub fn stats(&self) -> HostLinkStats {
        HostLinkStats {
            bytes_dropped: self.reader.dropped(),
            ..self.stats
        }
    }

    /// Settings
    #[must_use]
    pub fn config(&self) -> &HostLinkConfig {
        &self.config
    }

    /// Bytes waiting for a frame to complete
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.reader.buffered()
    }

    /// Borrow the transport.
    pub fn port(&self) -> &T {
        &self.port
    }

    /// Mutably borrow the transport.
    pub fn port_mut(&mut self) -> &mut T {
        &mut self.port
    }
}

impl<T> std::fmt::Debug for HostLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLink")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockTransceiver;
    use crate::protocol::Command;

    /// Records calls, refuses a second enable.
    #[derive(Default)]
    struct Recorder {
        resets: usize,
        xpressnet: bool,
        s88: Option<(u8, u8)>,
    }

    impl CommandHandler for Recorder {
        fn reset(&mut self) {
            self.resets += 1;
            self.xpressnet = false;
            self.s88 = None;
        }

        fn init_xpressnet(&mut self) -> std::result::Result<(), EngineError> {
            if self.xpressnet {
                return Err(EngineError::AlreadyInitialized);
            }
            self.xpressnet = true;
            Ok(())
        }

        fn init_s88(
            &mut self,
            module_count: u8,
            clock_khz: u8,
        ) -> std::result::Result<(), EngineError> {
            if self.s88.is_some() {
                return Err(EngineError::AlreadyInitialized);
            }
            self.s88 = Some((module_count, clock_khz));
            Ok(())
        }

        fn input_state(&self, channel: InputChannel, address: u16) -> Option<InputState> {
            (channel == InputChannel::S88 && (1..=16).contains(&address)).then_some(InputState::Low)
        }
    }

    fn link() -> HostLink<MockTransceiver> {
        HostLink::new(MockTransceiver::new(), HostLinkConfig::default())
    }

    fn frame(command: u8, payload: &[u8]) -> Vec<u8> {
        Frame::new(command, payload.to_vec()).unwrap().encode().to_vec()
    }

    fn replies(link: &mut HostLink<MockTransceiver>, handler: &mut Recorder) -> Vec<Message> {
        std::iter::from_fn(|| link.step(handler).unwrap()).collect()
    }

    #[test]
    fn ping_gets_pong_on_the_wire() {
        let mut link = link();
        let mut handler = Recorder::default();
        link.port_mut().push_rx(&[0x01, 0x00, 0x01]);

        assert_eq!(link.step(&mut handler).unwrap(), Some(Message::Pong));
        assert_eq!(link.port_mut().take_tx(), vec![0x81, 0x00, 0x81]);
        assert_eq!(link.step(&mut handler).unwrap(), None);
    }

    #[test]
    fn one_dispatch_per_step() {
        let mut link = link();
        let mut handler = Recorder::default();
        let mut bytes = frame(Command::Ping.as_u8(), &[]);
        bytes.extend(frame(Command::GetInfo.as_u8(), &[]));
        link.port_mut().push_rx(&bytes);

        assert_eq!(link.step(&mut handler).unwrap(), Some(Message::Pong));
        assert_eq!(link.port().pending_rx(), 3);
        assert!(matches!(
            link.step(&mut handler).unwrap(),
            Some(Message::Info { .. })
        ));
    }

    #[test]
    fn byte_feed_matches_block_feed() {
        let mut stream = vec![0x55];
        stream.extend(frame(Command::Ping.as_u8(), &[]));
        stream.extend([0x01, 0x00, 0x00]);
        stream.extend(frame(Command::GetInputState.as_u8(), &[3, 0, 2]));
        stream.extend(frame(Command::GetInfo.as_u8(), &[]));

        let mut block = link();
        let mut handler = Recorder::default();
        for &byte in &stream {
            block.feed(byte);
        }
        let from_block = replies(&mut block, &mut handler);

        let mut single = link();
        let mut from_bytes = Vec::new();
        for &byte in &stream {
            single.feed(byte);
            from_bytes.extend(single.step(&mut handler).unwrap());
        }

        assert_eq!(from_block, from_bytes);
        assert_eq!(from_block.len(), 3);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut link = link();
        let mut handler = Recorder::default();
        link.port_mut().push_rx(&frame(0x42, &[]));

        assert_eq!(
            link.step(&mut handler).unwrap(),
            Some(Message::Error {
                request: 0x42,
                code: ErrorCode::InvalidCommand,
            })
        );
        assert_eq!(link.stats().error_replies, 1);
    }

    #[test]
    fn gateway_codes_from_host_are_rejected() {
        let mut link = link();
        let mut handler = Recorder::default();
        link.port_mut().push_rx(&frame(Command::Pong.as_u8(), &[]));

        assert_eq!(
            link.step(&mut handler).unwrap(),
            Some(Message::Error {
                request: Command::Pong.as_u8(),
                code: ErrorCode::InvalidCommand,
            })
        );
    }

    #[test]
    fn gateway_codes_are_rejected_whatever_the_payload() {
        let mut link = link();
        let mut handler = Recorder::default();
        let mut bytes = frame(Command::Pong.as_u8(), &[0]);
        bytes.extend(frame(Command::InputStateChanged.as_u8(), &[3, 0, 1, 9]));
        bytes.extend(frame(Command::Error.as_u8(), &[0x01]));
        link.port_mut().push_rx(&bytes);

        let codes: Vec<(u8, ErrorCode)> = replies(&mut link, &mut handler)
            .into_iter()
            .map(|reply| match reply {
                Message::Error { request, code } => (request, code),
                other => panic!("unexpected reply {other:?}"),
            })
            .collect();
        assert_eq!(
            codes,
            vec![
                (Command::Pong.as_u8(), ErrorCode::InvalidCommand),
                (Command::InputStateChanged.as_u8(), ErrorCode::InvalidCommand),
                (Command::Error.as_u8(), ErrorCode::InvalidCommand),
            ]
        );
        assert_eq!(handler.resets, 0);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut link = link();
        let mut handler = Recorder::default();
        link.port_mut()
            .push_rx(&frame(Command::InitS88.as_u8(), &[2]));

        assert_eq!(
            link.step(&mut handler).unwrap(),
            Some(Message::Error {
                request: Command::InitS88.as_u8(),
                code: ErrorCode::InvalidCommandPayload,
            })
        );
        assert_eq!(handler.s88, None);
    }

    #[test]
    fn second_enable_reports_already_initialized() {
        let mut link = link();
        let mut handler = Recorder::default();
        let init = frame(Command::InitXpressNet.as_u8(), &[]);
        link.port_mut().push_rx(&init);
        link.port_mut().push_rx(&init);

        assert_eq!(
            replies(&mut link, &mut handler),
            vec![
                Message::InitXpressNetOk,
                Message::Error {
                    request: Command::InitXpressNet.as_u8(),
                    code: ErrorCode::AlreadyInitialized,
                },
            ]
        );
    }

    #[test]
    fn init_s88_passes_parameters() {
        let mut link = link();
        let mut handler = Recorder::default();
        link.port_mut()
            .push_rx(&frame(Command::InitS88.as_u8(), &[4, 10]));

        assert_eq!(link.step(&mut handler).unwrap(), Some(Message::InitS88Ok));
        assert_eq!(handler.s88, Some((4, 10)));
    }

    #[test]
    fn input_query_is_bounds_checked() {
        let mut link = link();
        let mut handler = Recorder::default();
        link.port_mut()
            .push_rx(&frame(Command::GetInputState.as_u8(), &[3, 0, 16]));
        link.port_mut()
            .push_rx(&frame(Command::GetInputState.as_u8(), &[3, 0, 17]));

        assert_eq!(
            replies(&mut link, &mut handler),
            vec![
                Message::InputState {
                    channel: InputChannel::S88,
                    address: 16,
                    state: InputState::Low,
                },
                Message::Error {
                    request: Command::GetInputState.as_u8(),
                    code: ErrorCode::InvalidCommandPayload,
                },
            ]
        );
    }

    #[test]
    fn reset_reaches_handler() {
        let mut link = link();
        let mut handler = Recorder::default();
        link.port_mut().push_rx(&frame(Command::Reset.as_u8(), &[]));

        assert_eq!(link.step(&mut handler).unwrap(), Some(Message::ResetOk));
        assert_eq!(handler.resets, 1);
    }

    #[test]
    fn corrupted_prefix_resynchronizes() {
        let mut link = link();
        let mut handler = Recorder::default();
        link.port_mut().push_rx(&[0x01, 0x00, 0x03]);
        for _ in 0..3 {
            link.port_mut().push_rx(&frame(Command::Ping.as_u8(), &[]));
        }

        assert_eq!(link.step(&mut handler).unwrap(), Some(Message::Pong));
        assert_eq!(link.stats().bytes_dropped, 3);
        assert_eq!(replies(&mut link, &mut handler).len(), 2);
    }

    #[test]
    fn unsolicited_messages_are_counted() {
        let mut link = link();
        link.publish_input_change(InputChange {
            channel: InputChannel::S88,
            address: 2,
            state: InputState::High,
        })
        .unwrap();

        assert_eq!(
            Message::decode(&link.port_mut().take_tx()).unwrap(),
            Message::InputStateChanged {
                channel: InputChannel::S88,
                address: 2,
                state: InputState::High,
            }
        );
        assert_eq!(link.stats().unsolicited_sent, 1);
        assert_eq!(link.stats().frames_sent, 1);
    }

    #[test]
    fn write_failure_is_reported() {
        let mut link = link();
        link.port_mut().set_fail_writes(true);

        assert!(link.send(&Message::Pong).is_err());
        assert_eq!(link.stats().send_failures, 1);
        assert_eq!(link.stats().frames_sent, 0);
    }
}
