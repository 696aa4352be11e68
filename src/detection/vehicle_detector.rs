use crate::error::{FrameError, StartupError};
use crate::global_variables::VEHICLE_CLASS_IDS;
use crate::shared_data::LaneId;
use image::RgbImage;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Axis-aligned box in pixel coordinates of the analysed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single object reported by the detection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// COCO class id.
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// The classes that count towards a lane's congestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
}

impl VehicleClass {
    pub fn from_class_id(class_id: u32) -> Option<Self> {
        match class_id {
            2 => Some(VehicleClass::Car),
            3 => Some(VehicleClass::Motorcycle),
            5 => Some(VehicleClass::Bus),
            7 => Some(VehicleClass::Truck),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "truck",
        }
    }
}

/// Frame -> detections. One instance is owned by each lane worker.
pub trait Detector: Send {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, FrameError>;
}

/// Pre-recorded detections, keyed by lane and frame position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionScript {
    /// `lanes[lane][frame]` lists the detections of that frame.
    pub lanes: Vec<Vec<Vec<Detection>>>,
}

impl DetectionScript {
    // Loading plays the role of loading model weights: any failure is fatal.
    pub fn load(path: &Path) -> Result<Arc<Self>, StartupError> {
        let model_error = |reason: String| StartupError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };
        let raw = fs::read_to_string(path).map_err(|e| model_error(e.to_string()))?;
        let script: DetectionScript =
            serde_json::from_str(&raw).map_err(|e| model_error(e.to_string()))?;
        if script.lanes.is_empty() || script.lanes.iter().any(|frames| frames.is_empty()) {
            return Err(model_error("script has a lane without frames".to_string()));
        }
        Ok(Arc::new(script))
    }
}

/// Replays a [`DetectionScript`] in a loop. Lanes beyond the script's lane
/// count reuse earlier lanes' tracks.
pub struct ReplayDetector {
    script: Arc<DetectionScript>,
    lane: usize,
    cursor: usize,
}

impl ReplayDetector {
    pub fn new(script: Arc<DetectionScript>, lane: LaneId) -> Self {
        let lane = lane % script.lanes.len();
        Self {
            script,
            lane,
            cursor: 0,
        }
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, FrameError> {
        let frames = &self.script.lanes[self.lane];
        let detections = frames[self.cursor % frames.len()].clone();
        self.cursor = (self.cursor + 1) % frames.len();
        Ok(detections)
    }
}

// Class mix of generated objects: mostly vehicles with some people and bicycles.
const RANDOM_CLASS_MIX: [(u32, f64); 6] = [
    (0, 0.10), // person
    (1, 0.05), // bicycle
    (2, 0.45), // car
    (3, 0.05), // motorcycle
    (5, 0.15), // bus
    (7, 0.20), // truck
];

/// Stand-in for a real model: produces plausible detections whose density
/// drifts over time, so lanes take turns being the most congested.
pub struct RandomDetector {
    rng: SmallRng,
    density: f64,
    max_objects: u32,
}

impl RandomDetector {
    pub fn new(seed: u64, max_objects: u32) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let density = rng.random_range(0.1..0.9);
        Self {
            rng,
            density,
            max_objects,
        }
    }

    fn pick_class(&mut self) -> u32 {
        let roll: f64 = self.rng.random_range(0.0..1.0);
        let mut acc = 0.0;
        for (class_id, share) in RANDOM_CLASS_MIX {
            acc += share;
            if roll < acc {
                return class_id;
            }
        }
        VEHICLE_CLASS_IDS[0]
    }
}

impl Detector for RandomDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, FrameError> {
        let (width, height) = frame.dimensions();
        if width < 8 || height < 8 {
            return Err(FrameError::Detection(format!(
                "frame too small for detection: {}x{}",
                width, height
            )));
        }

        self.density = (self.density + self.rng.random_range(-0.05..0.05)).clamp(0.0, 1.0);
        let expected = (self.density * self.max_objects as f64).round() as u32;
        let objects = self.rng.random_range(0..=expected);

        let mut detections = Vec::with_capacity(objects as usize);
        for _ in 0..objects {
            let class_id = self.pick_class();
            let box_w = self.rng.random_range(width as f32 * 0.05..width as f32 * 0.25);
            let box_h = self.rng.random_range(height as f32 * 0.05..height as f32 * 0.25);
            detections.push(Detection {
                class_id,
                confidence: self.rng.random_range(0.3..0.99),
                bbox: BoundingBox {
                    x: self.rng.random_range(0.0..width as f32 - box_w),
                    y: self.rng.random_range(0.0..height as f32 - box_h),
                    width: box_w,
                    height: box_h,
                },
            });
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn detection(class_id: u32) -> Detection {
        Detection {
            class_id,
            confidence: 0.9,
            bbox: BoundingBox {
                x: 1.0,
                y: 1.0,
                width: 4.0,
                height: 4.0,
            },
        }
    }

    #[test]
    fn vehicle_classes_map_from_coco_ids() {
        for id in VEHICLE_CLASS_IDS {
            assert!(VehicleClass::from_class_id(id).is_some());
        }
        assert_eq!(VehicleClass::from_class_id(0), None);
        assert_eq!(VehicleClass::from_class_id(7).map(|c| c.name()), Some("truck"));
    }

    #[test]
    fn replay_cycles_through_frames() {
        let script = Arc::new(DetectionScript {
            lanes: vec![vec![vec![detection(2)], vec![], vec![detection(5), detection(7)]]],
        });
        let mut detector = ReplayDetector::new(script, 0);
        let frame = RgbImage::new(16, 16);
        let lens: Vec<usize> = (0..4)
            .map(|_| detector.detect(&frame).unwrap().len())
            .collect();
        assert_eq!(lens, vec![1, 0, 2, 1]);
    }

    #[test]
    fn replay_wraps_lane_index() {
        let script = Arc::new(DetectionScript {
            lanes: vec![vec![vec![detection(2)]], vec![vec![]]],
        });
        let mut lane3 = ReplayDetector::new(script, 3);
        assert!(lane3.detect(&RgbImage::new(16, 16)).unwrap().is_empty());
    }

    #[test]
    fn script_load_failures_are_model_errors() {
        let missing = DetectionScript::load(Path::new("/nonexistent/script.json"));
        assert!(matches!(missing, Err(StartupError::ModelLoad { .. })));

        let mut empty = tempfile::NamedTempFile::new().unwrap();
        write!(empty, r#"{{ "lanes": [] }}"#).unwrap();
        assert!(matches!(
            DetectionScript::load(empty.path()),
            Err(StartupError::ModelLoad { .. })
        ));
    }

    #[test]
    fn script_loads_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "lanes": [[[{{ "class_id": 2, "confidence": 0.8,
                "bbox": {{ "x": 0, "y": 0, "width": 10, "height": 10 }} }}]]] }}"#
        )
        .unwrap();
        let script = DetectionScript::load(file.path()).unwrap();
        assert_eq!(script.lanes[0][0][0].class_id, 2);
    }

    #[test]
    fn random_detector_keeps_boxes_inside_frame() {
        let mut detector = RandomDetector::new(7, 12);
        let frame = RgbImage::new(320, 240);
        for _ in 0..50 {
            for d in detector.detect(&frame).unwrap() {
                assert!(d.bbox.x >= 0.0 && d.bbox.x + d.bbox.width <= 320.0);
                assert!(d.bbox.y >= 0.0 && d.bbox.y + d.bbox.height <= 240.0);
                assert!(d.confidence >= 0.3 && d.confidence < 0.99);
            }
        }
    }

    #[test]
    fn random_detector_rejects_tiny_frames() {
        let mut detector = RandomDetector::new(1, 5);
        assert!(detector.detect(&RgbImage::new(2, 2)).is_err());
    }
}
