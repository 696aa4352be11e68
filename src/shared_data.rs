// src/shared_data.rs

use image::RgbImage;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Index of a lane, `0 <= id < lanes`.
pub type LaneId = usize;

/// Number of vehicles most recently seen in a lane.
pub type VehicleCount = u32;

/// Latest vehicle count per lane.
///
/// Every slot is an atomic, so a reader never observes a half-written count.
/// Each slot has exactly one writer: the [`CountSlot`] handed to that lane's
/// worker by [`LaneCounts::slots`].
#[derive(Debug)]
pub struct LaneCounts {
    slots: Vec<AtomicU32>,
}

impl LaneCounts {
    pub fn new(lanes: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: (0..lanes).map(|_| AtomicU32::new(0)).collect(),
        })
    }

    pub fn lanes(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, lane: LaneId) -> VehicleCount {
        self.slots[lane].load(Ordering::Acquire)
    }

    /// Copies every lane's current count.
    pub fn snapshot(&self) -> Vec<VehicleCount> {
        self.slots.iter().map(|s| s.load(Ordering::Acquire)).collect()
    }

    /// Hands out one writer per lane. Call once, at pipeline construction.
    pub fn slots(self: &Arc<Self>) -> Vec<CountSlot> {
        (0..self.lanes())
            .map(|lane| CountSlot {
                lane,
                counts: Arc::clone(self),
            })
            .collect()
    }
}

/// Write access to a single lane's count.
#[derive(Debug)]
pub struct CountSlot {
    lane: LaneId,
    counts: Arc<LaneCounts>,
}

impl CountSlot {
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn store(&self, count: VehicleCount) {
        self.counts.slots[self.lane].store(count, Ordering::Release);
    }
}

/// An annotated frame produced by a lane worker.
#[derive(Debug, Clone)]
pub struct LaneFrame {
    pub lane: LaneId,
    pub image: RgbImage,
    pub vehicle_count: VehicleCount,
}

impl LaneFrame {
    pub fn new(lane: LaneId, image: RgbImage, vehicle_count: VehicleCount) -> Self {
        Self {
            lane,
            image,
            vehicle_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn each_slot_writes_only_its_own_lane() {
        let counts = LaneCounts::new(4);
        let slots = counts.slots();
        slots[2].store(7);
        slots[0].store(3);
        assert_eq!(counts.snapshot(), vec![3, 0, 7, 0]);
        assert_eq!(counts.get(2), 7);
        assert_eq!(slots[2].lane(), 2);
    }

    #[test]
    fn concurrent_writers_do_not_interfere() {
        let counts = LaneCounts::new(3);
        let handles: Vec<_> = counts
            .slots()
            .into_iter()
            .map(|slot| {
                thread::spawn(move || {
                    for n in 0..=1000 {
                        slot.store(n * (slot.lane() as u32 + 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counts.snapshot(), vec![1000, 2000, 3000]);
    }
}
