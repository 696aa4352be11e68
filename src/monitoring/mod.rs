pub mod frame_synchronizer;
pub mod lane_worker;
pub mod traffic_monitor;

pub use frame_synchronizer::FrameSynchronizer;
pub use traffic_monitor::{ExitReason, LaneInput, MonitorReport, TrafficMonitor};
