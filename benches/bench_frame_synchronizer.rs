// benches/bench_frame_synchronizer.rs
use criterion::{black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration};
use image::{Rgb, RgbImage};
use std::time::Duration;
use traffic_monitor::monitoring::frame_synchronizer::FrameSynchronizer;
use traffic_monitor::render::compose::compose_view;
use traffic_monitor::control_system::traffic_light_controller::TrafficLightController;
use traffic_monitor::config::SignalTiming;
use traffic_monitor::shared_data::LaneFrame;

fn filled_synchronizer(lanes: usize, side: u32) -> FrameSynchronizer {
    let sync = FrameSynchronizer::new(lanes);
    for lane in 0..lanes {
        let shade = (lane * 40) as u8;
        sync.publish(LaneFrame::new(
            lane,
            RgbImage::from_pixel(side, side, Rgb([shade, shade, shade])),
            lane as u32,
        ));
    }
    sync
}

fn bench_publish_and_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_synchronizer");

    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &lanes in [2, 4, 9].iter() {
        group.bench_function(format!("publish_lanes_{}", lanes), |b| {
            let sync = filled_synchronizer(lanes, 8);
            let image = RgbImage::new(8, 8);
            let mut lane = 0;
            b.iter(|| {
                lane = (lane + 1) % lanes;
                sync.publish(LaneFrame::new(lane, image.clone(), 1));
            });
        });

        group.bench_function(format!("snapshot_lanes_{}", lanes), |b| {
            let sync = filled_synchronizer(lanes, 8);
            b.iter(|| black_box(sync.snapshot()));
        });
    }
    group.finish();
}

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose_view");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));

    for &lanes in [2, 4].iter() {
        group.bench_function(format!("compose_lanes_{}", lanes), |b| {
            let sync = filled_synchronizer(lanes, 320);
            let controller =
                TrafficLightController::new(lanes, SignalTiming::default(), tokio::time::Instant::now());
            let counts: Vec<u32> = (0..lanes as u32).collect();
            b.iter(|| {
                if let Some(frames) = sync.snapshot() {
                    black_box(compose_view(&frames, controller.state(), counts.clone()));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_publish_and_snapshot, bench_compose);
criterion_main!(benches);
