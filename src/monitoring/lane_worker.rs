use crate::control_system::signal_control::SignalView;
use crate::detection::lane_counter::LaneCounter;
use crate::error::FrameError;
use crate::monitoring::frame_synchronizer::FrameSynchronizer;
use crate::render::compose::{draw_lane_caption, draw_signal_widget};
use crate::shared_data::{CountSlot, LaneFrame, LaneId};
use crate::video::frame_source::VideoSource;
use image::RgbImage;
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

// Pause applied when a source hits end of stream twice in a row.
const EMPTY_STREAM_BACKOFF: Duration = Duration::from_millis(50);
// Longest stretch a worker sleeps without looking at the stop token.
const STOP_POLL: Duration = Duration::from_millis(20);

/// What a lane worker did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneStats {
    pub decoded: u64,
    pub published: u64,
    pub skipped: u64,
    pub rewinds: u64,
}

/// Producer loop for one lane: decode, count every Nth frame, publish.
///
/// Runs on a blocking thread. It only ever blocks on its own source and
/// detector; publishing is a non-blocking upsert.
pub struct LaneWorker {
    lane: LaneId,
    source: Box<dyn VideoSource>,
    counter: LaneCounter,
    slot: CountSlot,
    signal: SignalView,
    synchronizer: Arc<FrameSynchronizer>,
    frame_skip: u32,
    frame_interval: Option<Duration>,
}

impl LaneWorker {
    pub fn new(
        source: Box<dyn VideoSource>,
        counter: LaneCounter,
        slot: CountSlot,
        signal: SignalView,
        synchronizer: Arc<FrameSynchronizer>,
        frame_skip: u32,
        frame_interval: Option<Duration>,
    ) -> Self {
        Self {
            lane: slot.lane(),
            source,
            counter,
            slot,
            signal,
            synchronizer,
            frame_skip: frame_skip.max(1),
            frame_interval,
        }
    }

    /// Loops until `stop` is cancelled. The token is checked between frames,
    /// never in the middle of a detection call.
    pub fn run(mut self, stop: CancellationToken) -> LaneStats {
        info!("Lane {} worker started", self.lane + 1);
        let mut stats = LaneStats::default();
        let mut frame_index: u64 = 0;
        let mut at_end = false;

        while !stop.is_cancelled() {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => {
                    at_end = false;
                    frame
                }
                Ok(None) => {
                    if at_end {
                        sleep_unless_stopped(EMPTY_STREAM_BACKOFF, &stop);
                    }
                    at_end = true;
                    stats.rewinds += 1;
                    if let Err(e) = self.source.rewind() {
                        warn!("Lane {} could not rewind: {}", self.lane + 1, e);
                        sleep_unless_stopped(EMPTY_STREAM_BACKOFF, &stop);
                    }
                    continue;
                }
                Err(e) => {
                    debug!("Lane {} skipped a frame: {}", self.lane + 1, e);
                    stats.skipped += 1;
                    self.pace(&stop);
                    continue;
                }
            };
            stats.decoded += 1;
            frame_index += 1;

            if frame_index % self.frame_skip as u64 == 0 {
                match self.process(frame) {
                    Ok(lane_frame) => {
                        self.synchronizer.publish(lane_frame);
                        stats.published += 1;
                    }
                    Err(e) => {
                        debug!("Lane {} skipped a frame: {}", self.lane + 1, e);
                        stats.skipped += 1;
                    }
                }
            }
            self.pace(&stop);
        }

        info!(
            "Lane {} worker stopped ({} frames published)",
            self.lane + 1,
            stats.published
        );
        stats
    }

    fn process(&mut self, frame: RgbImage) -> Result<LaneFrame, FrameError> {
        let (mut annotated, count) = self.counter.count(frame)?;
        self.slot.store(count);

        if let Err(e) = draw_signal_widget(&mut annotated, self.signal.phase_of(self.lane)) {
            debug!("Lane {} signal widget skipped: {}", self.lane + 1, e);
        }
        if let Err(e) = draw_lane_caption(&mut annotated, self.lane, count) {
            debug!("Lane {} caption skipped: {}", self.lane + 1, e);
        }
        Ok(LaneFrame::new(self.lane, annotated, count))
    }

    fn pace(&self, stop: &CancellationToken) {
        if let Some(interval) = self.frame_interval {
            sleep_unless_stopped(interval, stop);
        }
    }
}

/// Sleeps for `duration` in short slices, returning early once `stop` is
/// cancelled.
fn sleep_unless_stopped(duration: Duration, stop: &CancellationToken) {
    let deadline = Instant::now() + duration;
    while !stop.is_cancelled() {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        thread::sleep(left.min(STOP_POLL));
    }
}
