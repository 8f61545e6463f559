//! # Drivetrain Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use drive_lib::{
    drive_ctrl::{CheesyDriveHelper, DriveHelper},
    eqpt::sim::{SimGyro, SimMotor},
    mp_mgr::{MpManager, Params, Trajectory},
};

fn load_stream_benchmark(c: &mut Criterion) {
    // ---- Build the parameters and a long trajectory ----

    let params: Params =
        util::params::load_from_str(include_str!("../../params/mp_mgr.toml")).unwrap();

    // 15 s of 10 ms points along a gentle curve
    let rows: Vec<[f64; 4]> = (0..1500)
        .map(|i| {
            let t = i as f64 * 0.01;
            [t * 1.5, 0.15, 10.0, 20.0 * (t * 0.5).sin()]
        })
        .collect();
    let trajectory = Trajectory::from_rows(&rows, true, false).unwrap();

    c.bench_function("MpManager::load_stream", |b| {
        b.iter(|| {
            MpManager::<SimMotor, SimGyro>::load_stream(
                black_box(&trajectory),
                black_box(true),
                black_box(false),
                &params,
            )
        })
    });
}

fn cheesy_drive_benchmark(c: &mut Criterion) {
    let mut helper = CheesyDriveHelper::new();

    // Sweep the whole stick range so the accumulators are exercised
    let inputs: Vec<(f64, f64)> = (-20..=20)
        .flat_map(|t| (-20..=20).map(move |w| (t as f64 / 20.0, w as f64 / 20.0)))
        .collect();

    c.bench_function("CheesyDriveHelper::drive", |b| {
        b.iter(|| {
            for &(throttle, wheel) in inputs.iter() {
                black_box(helper.drive(throttle, wheel, false, true));
            }
        })
    });
}

criterion_group!(benches, load_stream_benchmark, cheesy_drive_benchmark);
criterion_main!(benches);
