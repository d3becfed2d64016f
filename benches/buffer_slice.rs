//! Benchmarks for zero-copy buffer slicing and packet fan-out.
//!
//! Run with:
//!   cargo bench -- buffer_slice

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mediaflow::buffer::BufferSlice;
use mediaflow::elements::{PacketCollector, Passthrough};
use mediaflow::format::mime;
use mediaflow::metadata::BufferProperties;
use mediaflow::packet::Packet;
use mediaflow::pipeline::Pipeline;
use std::sync::Arc;

const BUFFER_SIZES: &[(usize, &str)] = &[(188 * 7, "1316B"), (64 * 1024, "64KB"), (1 << 20, "1MB")];

fn bench_slicing(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_slice");

    for &(size, name) in BUFFER_SIZES {
        let slice = BufferSlice::from_bytes(
            vec![0x47u8; size],
            Arc::new(BufferProperties::new(mime::VIDEO_MP2T)),
        );
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("ts_packets", name), &slice, |b, slice| {
            b.iter(|| {
                let mut count = 0;
                for offset in (0..slice.len() - 187).step_by(188) {
                    count += slice.slice(offset, 188).unwrap().len();
                }
                std::hint::black_box(count);
            });
        });
    }

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_fan_out");

    for consumers in [1usize, 4, 16] {
        let mut pipeline = Pipeline::new();
        let src = pipeline.add_processor("src", Passthrough::new()).unwrap();
        let mut handles = Vec::new();
        for i in 0..consumers {
            let sink = PacketCollector::new();
            handles.push(sink.handle());
            let sink = pipeline.add_processor(format!("sink{}", i), sink).unwrap();
            let (output, input) = (pipeline.outputs(src)[0], pipeline.inputs(sink)[0]);
            pipeline.connect(output, input).unwrap();
        }
        let input = pipeline.inputs(src)[0];
        let packet = Packet::from_bytes(vec![0u8; 64 * 1024], BufferProperties::new(mime::VIDEO_MP2T));

        group.bench_function(BenchmarkId::new("consumers", consumers), |b| {
            b.iter(|| {
                pipeline.push(input, packet.clone());
                for handle in &handles {
                    handle.borrow_mut().clear();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_slicing, bench_fan_out);
criterion_main!(benches);
