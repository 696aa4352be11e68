pub mod lane_counter;
pub mod vehicle_detector;

pub use lane_counter::LaneCounter;
pub use vehicle_detector::{
    BoundingBox, Detection, DetectionScript, Detector, RandomDetector, ReplayDetector,
    VehicleClass,
};
