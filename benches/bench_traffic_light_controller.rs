// benches/bench_traffic_light_controller.rs
use criterion::{black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration};
use std::time::Duration;
use tokio::time::Instant;
use traffic_monitor::config::SignalTiming;
use traffic_monitor::control_system::traffic_light_controller::{
    PhaseChange, TrafficLightController,
};

// Timing that evaluates congestion on every update but never forces a switch.
fn steady_timing() -> SignalTiming {
    SignalTiming {
        min_green: Duration::ZERO,
        max_green: Duration::from_secs(3600),
        yellow: Duration::from_secs(3),
        congestion_ratio: 1.5,
    }
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller_update");

    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &size in [4, 16, 64].iter() {
        // The active lane stays busiest, so every call scans all lanes and holds.
        group.bench_function(format!("hold_lanes_{}", size), |b| {
            let start = Instant::now();
            let mut controller = TrafficLightController::new(size, steady_timing(), start);
            let mut counts = vec![5; size];
            counts[0] = 50;
            let now = start + Duration::from_secs(1);
            b.iter(|| {
                black_box(controller.update(black_box(&counts), now));
            });
        });

        // Full YELLOW -> GREEN hand-over on every iteration.
        group.bench_function(format!("switch_lanes_{}", size), |b| {
            let mut now = Instant::now();
            let mut controller = TrafficLightController::new(size, steady_timing(), now);
            let counts: Vec<u32> = (0..size as u32).collect();
            let rotated: Vec<u32> = (0..size as u32).rev().collect();
            let mut flip = false;
            b.iter(|| {
                flip = !flip;
                let counts = if flip { &counts } else { &rotated };
                now += Duration::from_secs(1);
                if let Some(PhaseChange::YellowStarted { until, .. }) = controller.update(counts, now) {
                    now = until;
                    black_box(controller.complete_transition(counts, now));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_update);
criterion_main!(benches);
