// Benchmark for the per-tick decision and history bucketing
// Run with: cargo bench

use chrono::{Duration, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use heatbox_rs::control::{decide, ControlState, ControlTiming, ControllerContext};
use heatbox_rs::events::history::bucket_average;
use heatbox_rs::events::Sample;
use heatbox_rs::tuning::Tuning;
use std::hint::black_box;

fn bench_decide(c: &mut Criterion) {
    let tuning = Tuning::new(Some(22.0), 0.5, 100.0, 600.0).unwrap();
    let timing = ControlTiming::default();
    let mut ctx = ControllerContext::new(&tuning);
    ctx.state = ControlState::Control;
    let readings: Vec<f64> = (0..10_000).map(|i| 20.0 + (i % 40) as f64 * 0.1).collect();
    c.bench_function("decide 10k Control readings", |b| {
        b.iter(|| {
            let mut bursts = 0;
            for &t in &readings {
                let d = decide(black_box(&ctx), black_box(t), 30.0, &timing);
                if d.next_state.is_burst() { bursts += 1; }
            }
            assert!(bursts > 0);
        });
    });
}

fn bench_history(c: &mut Criterion) {
    let end = Utc::now();
    let start = end - Duration::hours(24);
    // One sample every 30 s for a day
    let samples: Vec<Sample> = (0..2880)
        .map(|i| Sample { timestamp: start + Duration::seconds(i * 30), temperature: 21.0 + (i % 7) as f64 * 0.1 })
        .collect();
    c.bench_function("bucket 24h of samples into 300 points", |b| {
        b.iter(|| {
            let points = bucket_average(black_box(&samples), start, end, 300);
            assert_eq!(points.len(), 300);
        });
    });
}

criterion_group!(benches, bench_decide, bench_history);
criterion_main!(benches);
