//! # Axis Control Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::eqpt::MarkerObservation;
use uuv_lib::axis_ctrl::{AxisCtrlParams, AxisCtrls};

fn axis_ctrl_benchmark(c: &mut Criterion) {
    let mut ctrls = AxisCtrls::new(&AxisCtrlParams::default()).unwrap();

    // Marker off centre on every axis, so no controller sits in its deadband
    let obs = MarkerObservation {
        present: true,
        area: 14_500.0,
        left_edge_length: 118.0,
        right_edge_length: 126.0,
        center_x: 402.0,
        center_y: 188.0,
        frame_width: 640,
        frame_height: 480,
    };

    c.bench_function("AxisCtrls::compute_frame", |b| {
        b.iter(|| ctrls.compute_frame(black_box(&obs), black_box(0.05)))
    });

    c.bench_function("AxisCtrls::compute_frame::absent", |b| {
        b.iter(|| ctrls.compute_frame(black_box(&MarkerObservation::absent()), 0.05))
    });
}

criterion_group!(benches, axis_ctrl_benchmark);
criterion_main!(benches);
