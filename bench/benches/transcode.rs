// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use criterion::BatchSize;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use std::hint::black_box;
use tcp2udp::engine::PortArray;
use tcp2udp::engine::Transcoder;
use tcp2udp::engine::hook::parse_to_tcp;
use tcp2udp_bench::BENCH_PORT;
use tcp2udp_bench::BenchPacket;
use tcp2udp_bench::MeasurementInfo;
use tcp2udp_bench::Passed;
use tcp2udp_bench::Transcoded;

fn transcoder() -> Transcoder<PortArray> {
    let ports = PortArray::new();
    ports.enable(BENCH_PORT);
    Transcoder::new(ports)
}

// Each iteration gets a fresh copy of the frame, since the hook
// rewrites it in place and a second pass would see UDP.
pub fn process<M: MeasurementInfo + 'static>(c: &mut Criterion<M>) {
    let xcoder = transcoder();
    let families: [&dyn BenchPacket; 2] = [&Transcoded, &Passed];

    for family in families {
        let mut group =
            c.benchmark_group(format!("process/{}", family.packet_label()));

        for case in family.test_cases() {
            let frame = case.generate();
            group.bench_with_input(
                BenchmarkId::new(M::label(), case.instance_name()),
                &frame,
                |b, frame| {
                    b.iter_batched_ref(
                        || frame.clone(),
                        |pkt| xcoder.process(black_box(pkt)),
                        BatchSize::SmallInput,
                    )
                },
            );
        }

        group.finish();
    }
}

pub fn parse<M: MeasurementInfo + 'static>(c: &mut Criterion<M>) {
    let mut group = c.benchmark_group("parse");

    for case in Transcoded.test_cases() {
        let frame = case.generate();
        group.bench_with_input(
            BenchmarkId::new(M::label(), case.instance_name()),
            &frame,
            |b, frame| b.iter(|| parse_to_tcp(black_box(frame))),
        );
    }

    group.finish();
}

criterion_group!(wallclock, process, parse);
criterion_main!(wallclock);
