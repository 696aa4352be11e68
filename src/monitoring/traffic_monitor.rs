use crate::config::MonitorConfig;
use crate::control_system::signal_control::SignalControl;
use crate::control_system::traffic_light_controller::{
    ControllerState, PhaseChange, TrafficLightController,
};
use crate::detection::lane_counter::LaneCounter;
use crate::detection::vehicle_detector::Detector;
use crate::error::StartupError;
use crate::global_variables::EXIT_KEY;
use crate::monitoring::frame_synchronizer::FrameSynchronizer;
use crate::monitoring::lane_worker::{LaneStats, LaneWorker};
use crate::render::compose::compose_view;
use crate::render::display::DisplaySink;
use crate::shared_data::LaneCounts;
use crate::video::frame_source::VideoSource;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

/// The two collaborators a lane needs.
pub struct LaneInput {
    pub source: Box<dyn VideoSource>,
    pub detector: Box<dyn Detector>,
}

/// Why the render loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The stop token was cancelled from outside (Ctrl-C).
    Stopped,
    /// The user pressed the exit key.
    ExitKey,
}

/// Summary returned after a clean shutdown.
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub reason: ExitReason,
    /// Per-lane stats; `None` for a worker that missed the grace period.
    pub lanes: Vec<Option<LaneStats>>,
    pub final_signal: ControllerState,
    pub views_shown: u64,
}

/// Runs N lane workers and one render/control loop until stopped.
pub struct TrafficMonitor {
    config: MonitorConfig,
    lanes: Vec<LaneInput>,
}

struct Shared {
    counts: Arc<LaneCounts>,
    control: SignalControl,
    synchronizer: Arc<FrameSynchronizer>,
}

impl TrafficMonitor {
    pub fn new(config: MonitorConfig, lanes: Vec<LaneInput>) -> Result<Self, StartupError> {
        config.validate(lanes.len())?;
        Ok(Self { config, lanes })
    }

    pub fn lanes(&self) -> usize {
        self.lanes.len()
    }

    /// Runs until `stop` is cancelled or the exit key is pressed.
    ///
    /// On the way out the stop token is cancelled, the YELLOW timer is
    /// settled, lane workers get `shutdown_grace` to exit and the display is
    /// closed. A startup synchronization timeout is returned as an error
    /// after the same teardown.
    pub async fn run(
        self,
        display: &mut dyn DisplaySink,
        stop: CancellationToken,
    ) -> Result<MonitorReport, StartupError> {
        let TrafficMonitor { config, lanes } = self;
        let lane_count = lanes.len();
        let counts = LaneCounts::new(lane_count);
        let controller = TrafficLightController::new(lane_count, config.timing, Instant::now());
        let shared = Shared {
            control: SignalControl::new(controller, Arc::clone(&counts)),
            synchronizer: Arc::new(FrameSynchronizer::new(lane_count)),
            counts,
        };

        let workers = spawn_workers(lanes, &config, &shared, &stop);
        info!("Started {} lane workers", lane_count);

        let outcome = render_loop(&config, &shared, display, &stop).await;

        stop.cancel();
        shared.control.shutdown();
        let lanes = join_workers(workers, &config).await;
        if let Err(e) = display.close() {
            warn!("Display did not close cleanly: {}", e);
        }

        let (reason, views_shown) = outcome?;
        Ok(MonitorReport {
            reason,
            lanes,
            final_signal: shared.control.state(),
            views_shown,
        })
    }
}

// Each worker gets its own blocking thread, its lane's count slot and a
// read-only view of the signal.
fn spawn_workers(
    lanes: Vec<LaneInput>,
    config: &MonitorConfig,
    shared: &Shared,
    stop: &CancellationToken,
) -> Vec<JoinHandle<LaneStats>> {
    let slots = shared.counts.slots();
    lanes
        .into_iter()
        .zip(slots)
        .map(|(input, slot)| {
            let worker = LaneWorker::new(
                input.source,
                LaneCounter::new(input.detector),
                slot,
                shared.control.view(),
                Arc::clone(&shared.synchronizer),
                config.frame_skip,
                config.frame_interval,
            );
            let token = stop.clone();
            tokio::task::spawn_blocking(move || worker.run(token))
        })
        .collect()
}

async fn render_loop(
    config: &MonitorConfig,
    shared: &Shared,
    display: &mut dyn DisplaySink,
    stop: &CancellationToken,
) -> Result<(ExitReason, u64), StartupError> {
    let sync = &shared.synchronizer;

    tokio::select! {
        _ = stop.cancelled() => return Ok((ExitReason::Stopped, 0)),
        ready = sync.wait_ready(config.startup_timeout) => {
            ready?;
        }
    }
    info!("All {} lanes delivering frames", sync.lanes());

    let mut shown = 0u64;
    loop {
        tokio::select! {
            _ = stop.cancelled() => return Ok((ExitReason::Stopped, shown)),
            _ = sync.wait_for_update(config.refresh_interval) => {}
        }

        if let Some(PhaseChange::GreenRestarted { lane }) = shared.control.tick() {
            debug!("Lane {} keeps GREEN", lane + 1);
        }

        let Some(frames) = sync.snapshot() else {
            continue;
        };
        let view = compose_view(&frames, shared.control.state(), shared.counts.snapshot());
        match display.show(&view) {
            Ok(()) => shown += 1,
            Err(e) => debug!("View skipped this tick: {}", e),
        }

        if display.poll_key() == Some(EXIT_KEY) {
            info!("Exit key pressed");
            return Ok((ExitReason::ExitKey, shown));
        }
    }
}

// Waits for every worker, sharing one grace deadline. Workers that miss it
// are left to finish their current call; their output is discarded.
async fn join_workers(
    workers: Vec<JoinHandle<LaneStats>>,
    config: &MonitorConfig,
) -> Vec<Option<LaneStats>> {
    let deadline = Instant::now() + config.shutdown_grace;
    let mut stats = Vec::with_capacity(workers.len());
    for (lane, handle) in workers.into_iter().enumerate() {
        match timeout_at(deadline, handle).await {
            Ok(Ok(lane_stats)) => stats.push(Some(lane_stats)),
            Ok(Err(e)) => {
                warn!("Lane {} worker failed: {}", lane + 1, e);
                stats.push(None);
            }
            Err(_) => {
                warn!(
                    "Lane {} worker did not stop within {:?}",
                    lane + 1,
                    config.shutdown_grace
                );
                stats.push(None);
            }
        }
    }
    stats
}
