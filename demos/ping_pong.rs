//! Drive a gateway over in-memory hardware
//!
//! Run with `cargo run --example ping_pong`.

use std::time::Duration;

use railgate::hal::mock::{
    ManualClock, MockDelay, MockInputs, MockShiftRegister, MockTransceiver, MockTransmitEnable,
    MockXpressNetPort,
};
use railgate::s88::BatchedScan;
use railgate::{FrameReader, Gateway, GatewayConfig, Message};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Railgate Ping-Pong Example");
    println!("==========================\n");

    let inputs = MockInputs::low(16);
    inputs.set(4, true);
    let clock = ManualClock::new();
    let mut gateway = Gateway::new(
        GatewayConfig::default(),
        MockTransceiver::new(),
        (
            MockXpressNetPort::new(),
            MockTransmitEnable::new(),
            MockDelay::new(),
        ),
        BatchedScan::new(MockShiftRegister::new(inputs)),
        clock.clone(),
    );

    let requests = [
        Message::Ping,
        Message::GetInfo,
        Message::InitS88 {
            module_count: 2,
            clock_khz: 10,
        },
    ];
    for request in &requests {
        let bytes = request.encode()?;
        println!("host -> gateway: {request:?} ({} bytes)", bytes.len());
        gateway.host_mut().port_mut().push_rx(&bytes);
        gateway.step();
    }

    // Let the S88 warm-up pass so the first scan is published.
    clock.advance(Duration::from_secs(1));
    gateway.step();

    let mut reader = FrameReader::default();
    reader.extend(&gateway.host_mut().port_mut().take_tx());
    while let Some(frame) = reader.next_frame() {
        println!("gateway -> host: {:?}", Message::from_frame(&frame)?);
    }

    let metrics = gateway.metrics();
    println!(
        "\n{} frames sent, {} scan cycles, {} errors",
        metrics.host.frames_sent,
        metrics.s88.scan_cycles,
        metrics.total_errors()
    );

    Ok(())
}
