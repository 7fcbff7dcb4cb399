//! Frame encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scewl_protocol::{
    decode, encode, DeviceId, Frame, FrameReader, MemoryChannel, ReadMode, MAX_DATA_SIZE,
};

const SRC: DeviceId = DeviceId::new(10);
const TGT: DeviceId = DeviceId::new(11);

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [16, 1024, MAX_DATA_SIZE] {
        let frame = Frame::new(SRC, TGT, Bytes::from(vec![0x5A; size]));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [16, 1024, MAX_DATA_SIZE] {
        let encoded = encode(SRC, TGT, &vec![0x5A; size]).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut channel = MemoryChannel::with_input(encoded);
                black_box(decode(&mut channel, MAX_DATA_SIZE, ReadMode::Blocking).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_noisy_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("noisy_decode");

    // line noise in front of every frame, including lone 'S' bytes
    for noise in [0, 64, 1024] {
        let mut input: Vec<u8> = (0..noise)
            .map(|i| if i % 7 == 0 { b'S' } else { 0xA5 })
            .collect();
        input.extend(encode(SRC, TGT, b"payload after noise").unwrap());

        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(noise), &input, |b, input| {
            b.iter(|| {
                let mut channel = MemoryChannel::with_input(input);
                black_box(decode(&mut channel, MAX_DATA_SIZE, ReadMode::Blocking).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_truncating_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncating_reader");

    // a small reader draining full-size bodies
    for capacity in [64, 1024] {
        let mut input = encode(SRC, TGT, &vec![0x5A; MAX_DATA_SIZE]).unwrap().to_vec();
        input.extend(encode(SRC, TGT, b"next").unwrap());

        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &input, |b, input| {
            b.iter(|| {
                let mut channel = MemoryChannel::with_input(input);
                let mut reader = FrameReader::new(capacity);
                let first = reader.poll(&mut channel, ReadMode::Blocking).unwrap();
                let second = reader.poll(&mut channel, ReadMode::Blocking).unwrap();
                black_box((first, second))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_noisy_decode,
    bench_truncating_reader,
);
criterion_main!(benches);
