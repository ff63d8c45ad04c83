//! Bus engine benchmarks
//!
//! Measures XpressNet decoding and polling plus S88 scan cycles.

use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use railgate::hal::mock::{
    MockDelay, MockInputs, MockS88Chain, MockShiftRegister, MockTransmitEnable, MockXpressNetPort,
};
use railgate::registry::InputRegistry;
use railgate::s88::{BatchedScan, S88Config, S88Scanner, ScanStrategy, SteppedScan};
use railgate::xpressnet::{XpressNetConfig, XpressNetMaster, decode_request, decode_speed};

fn bench_xpressnet_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("xpressnet");

    group.bench_function("decode_speed_28", |b| {
        b.iter(|| {
            for data in 0..=u8::MAX {
                black_box(decode_speed(0x12, black_box(data)));
            }
        });
    });

    let frame = [0xE4, 0xF3, 0xC4, 0xD2, 0xA5, 0xE4 ^ 0xF3 ^ 0xC4 ^ 0xD2 ^ 0xA5];
    group.bench_function("decode_functions_request", |b| {
        b.iter(|| {
            black_box(decode_request(black_box(&frame)));
        });
    });

    group.finish();
}

fn bench_xpressnet_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("xpressnet");

    group.bench_function("poll_cycle", |b| {
        let mut master = XpressNetMaster::new(
            MockXpressNetPort::new(),
            MockTransmitEnable::new(),
            MockDelay::new(),
            XpressNetConfig::default(),
        );
        master.enable().unwrap();

        b.iter(|| {
            for _ in 0..31 {
                master.step().unwrap();
            }
            black_box(master.port_mut().take_transmissions());
        });
    });

    group.bench_function("receive_and_publish", |b| {
        let mut master = XpressNetMaster::new(
            MockXpressNetPort::new(),
            MockTransmitEnable::new(),
            MockDelay::new(),
            XpressNetConfig::default(),
        );
        master.enable().unwrap();
        let frame = [0xE4, 0x13, 0x00, 0x03, 0x85, 0xE4 ^ 0x13 ^ 0x03 ^ 0x85];

        b.iter(|| {
            master.port_mut().push_bytes(&frame);
            master.step().unwrap();
            black_box(master.take_event());
            master.port_mut().take_transmissions();
        });
    });

    group.finish();
}

fn scan_cycle<S: ScanStrategy>(
    scanner: &mut S88Scanner<S>,
    registry: &mut InputRegistry,
    now: Instant,
) {
    let cycles = scanner.stats().scan_cycles;
    while scanner.stats().scan_cycles == cycles {
        scanner.step(now, registry).unwrap();
    }
    while registry.take_change().is_some() {}
}

fn bench_s88(c: &mut Criterion) {
    let mut group = c.benchmark_group("s88");
    let config = S88Config {
        warm_up: Duration::ZERO,
        scan_interval: Duration::ZERO,
        ..S88Config::default()
    };

    for modules in [2u8, 8, 32] {
        let count = usize::from(modules) * 8;
        let inputs = MockInputs::low(count);

        group.bench_with_input(BenchmarkId::new("batched", count), &modules, |b, &modules| {
            let mut scanner = S88Scanner::new(
                BatchedScan::new(MockShiftRegister::new(inputs.clone())),
                config.clone(),
            );
            let mut registry = InputRegistry::new();
            let now = Instant::now();
            scanner.enable(modules, 10, now, &mut registry).unwrap();

            let mut flip = false;
            b.iter(|| {
                flip = !flip;
                inputs.set(0, flip);
                scan_cycle(&mut scanner, &mut registry, now);
            });
        });

        group.bench_with_input(BenchmarkId::new("stepped", count), &modules, |b, &modules| {
            let mut scanner = S88Scanner::new(
                SteppedScan::new(MockS88Chain::new(inputs.clone()), MockDelay::new()),
                config.clone(),
            );
            let mut registry = InputRegistry::new();
            let now = Instant::now();
            scanner.enable(modules, 10, now, &mut registry).unwrap();

            b.iter(|| scan_cycle(&mut scanner, &mut registry, now));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_xpressnet_decode,
    bench_xpressnet_step,
    bench_s88
);
criterion_main!(benches);
