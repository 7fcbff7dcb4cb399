//! Dispatch loop benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use scewl_core::{BootOutcome, Links, Router};
use scewl_protocol::{encode, DeviceId, MemoryChannel, RegistrationCode, RegistrationMessage};

const ME: DeviceId = DeviceId::new(10);
const PEER: DeviceId = DeviceId::new(11);

fn registered_router() -> Router<MemoryChannel> {
    let msg = RegistrationMessage::new(ME, RegistrationCode::Register).encode();
    let reply = encode(DeviceId::SSS, ME, &msg).unwrap();
    let links = Links::new(
        MemoryChannel::new(),
        MemoryChannel::with_input(&reply),
        MemoryChannel::new(),
    );
    let mut router = Router::new(ME, links);
    assert_eq!(router.boot(), BootOutcome::Registered);
    router.links_mut().radio.take_output();
    router
}

fn bench_radio_to_cpu(c: &mut Criterion) {
    let mut group = c.benchmark_group("radio_to_cpu");
    let frame = encode(PEER, ME, &[0x5A; 256]).unwrap();
    let mut router = registered_router();

    group.throughput(Throughput::Elements(1));
    group.bench_function("unicast_256", |b| {
        b.iter(|| {
            router.links_mut().radio.push_input(&frame);
            black_box(router.poll_once());
            router.links_mut().cpu.take_output();
        });
    });

    group.finish();
}

fn bench_cpu_to_radio(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_to_radio");
    let unicast = encode(ME, PEER, &[0x5A; 256]).unwrap();
    let broadcast = encode(ME, DeviceId::BROADCAST, &[0x5A; 256]).unwrap();
    let mut router = registered_router();

    group.throughput(Throughput::Elements(1));
    group.bench_function("unicast_256", |b| {
        b.iter(|| {
            router.links_mut().cpu.push_input(&unicast);
            black_box(router.poll_once());
            router.links_mut().radio.take_output();
        });
    });
    group.bench_function("broadcast_256", |b| {
        b.iter(|| {
            router.links_mut().cpu.push_input(&broadcast);
            black_box(router.poll_once());
            router.links_mut().radio.take_output();
        });
    });

    group.finish();
}

fn bench_idle_poll(c: &mut Criterion) {
    let mut router = registered_router();
    c.bench_function("idle_poll", |b| b.iter(|| black_box(router.poll_once())));
}

criterion_group!(benches, bench_radio_to_cpu, bench_cpu_to_radio, bench_idle_poll);
criterion_main!(benches);
