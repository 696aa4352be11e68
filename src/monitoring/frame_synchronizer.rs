use crate::error::StartupError;
use crate::shared_data::{LaneFrame, LaneId};
use log::warn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tokio::time::{timeout, timeout_at, Duration, Instant};

/// Latest-wins store of each lane's most recent frame.
///
/// Publishing replaces the lane's previous frame, so a slow consumer never
/// makes memory grow. Readers get `Arc`s, so the lock is only held for a swap
/// or a handful of pointer clones.
#[derive(Debug)]
pub struct FrameSynchronizer {
    latest: Mutex<Vec<Option<Arc<LaneFrame>>>>,
    published: AtomicU64,
    notify: Notify,
}

impl FrameSynchronizer {
    pub fn new(lanes: usize) -> Self {
        Self {
            latest: Mutex::new(vec![None; lanes]),
            published: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    pub fn lanes(&self) -> usize {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Upserts the frame for its lane and wakes the consumer. Never blocks
    /// beyond the swap.
    pub fn publish(&self, frame: LaneFrame) {
        {
            let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(slot) = latest.get_mut(frame.lane) else {
                warn!("Dropping frame for unknown lane {}", frame.lane);
                return;
            };
            *slot = Some(Arc::new(frame));
        }
        self.published.fetch_add(1, Ordering::Release);
        self.notify.notify_one();
    }

    /// Every lane's latest frame in lane order, or `None` until each lane has
    /// published at least once.
    pub fn snapshot(&self) -> Option<Vec<Arc<LaneFrame>>> {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.iter().cloned().collect()
    }

    pub fn latest(&self, lane: LaneId) -> Option<Arc<LaneFrame>> {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.get(lane).cloned().flatten()
    }

    /// Total frames published so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    /// Waits up to `limit` for any lane to publish. Returns whether one did.
    pub async fn wait_for_update(&self, limit: Duration) -> bool {
        timeout(limit, self.notify.notified()).await.is_ok()
    }

    /// Waits until every lane has published, failing after `limit`.
    pub async fn wait_ready(&self, limit: Duration) -> Result<Vec<Arc<LaneFrame>>, StartupError> {
        let deadline = Instant::now() + limit;
        loop {
            if let Some(frames) = self.snapshot() {
                return Ok(frames);
            }
            if timeout_at(deadline, self.notify.notified()).await.is_err() {
                return self
                    .snapshot()
                    .ok_or(StartupError::SynchronizationTimeout(limit));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame(lane: LaneId, count: u32) -> LaneFrame {
        LaneFrame::new(lane, RgbImage::from_pixel(4, 4, Rgb([count as u8, 0, 0])), count)
    }

    #[test]
    fn not_ready_until_every_lane_publishes() {
        let sync = FrameSynchronizer::new(3);
        assert!(sync.snapshot().is_none());
        sync.publish(frame(0, 1));
        sync.publish(frame(2, 1));
        assert!(sync.snapshot().is_none());
        sync.publish(frame(1, 1));
        let frames = sync.snapshot().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames.iter().map(|f| f.lane).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn republish_replaces_only_that_lane() {
        let sync = FrameSynchronizer::new(3);
        for lane in 0..3 {
            sync.publish(frame(lane, 1));
        }
        let before = sync.snapshot().unwrap();
        sync.publish(frame(0, 9));
        let after = sync.snapshot().unwrap();

        assert_eq!(after[0].vehicle_count, 9);
        assert!(Arc::ptr_eq(&before[1], &after[1]));
        assert!(Arc::ptr_eq(&before[2], &after[2]));
        assert_eq!(sync.published(), 4);
    }

    #[test]
    fn older_frames_are_dropped_not_queued() {
        let sync = FrameSynchronizer::new(1);
        for n in 0..100 {
            sync.publish(frame(0, n));
        }
        let frames = sync.snapshot().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].vehicle_count, 99);
        assert_eq!(Arc::strong_count(&frames[0]), 2);
    }

    #[test]
    fn unknown_lane_is_ignored() {
        let sync = FrameSynchronizer::new(1);
        sync.publish(frame(5, 1));
        assert!(sync.snapshot().is_none());
        assert_eq!(sync.published(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_ready_times_out_when_a_lane_never_publishes() {
        let sync = FrameSynchronizer::new(2);
        sync.publish(frame(0, 1));
        let result = sync.wait_ready(Duration::from_secs(10)).await;
        assert!(matches!(
            result,
            Err(StartupError::SynchronizationTimeout(d)) if d == Duration::from_secs(10)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_ready_returns_once_last_lane_arrives() {
        let sync = Arc::new(FrameSynchronizer::new(2));
        sync.publish(frame(0, 1));
        let late = Arc::clone(&sync);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            late.publish(frame(1, 2));
        });
        let frames = sync.wait_ready(Duration::from_secs(10)).await.unwrap();
        assert_eq!(frames[1].vehicle_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_update_is_bounded() {
        let sync = FrameSynchronizer::new(1);
        assert!(!sync.wait_for_update(Duration::from_millis(100)).await);
        sync.publish(frame(0, 1));
        assert!(sync.wait_for_update(Duration::from_millis(100)).await);
    }
}
