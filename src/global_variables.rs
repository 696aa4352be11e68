// Signal timing defaults (seconds)
pub const DEFAULT_MIN_GREEN_SECS: f64 = 15.0;
pub const DEFAULT_MAX_GREEN_SECS: f64 = 60.0;
pub const DEFAULT_YELLOW_SECS: f64 = 3.0;
pub const DEFAULT_CONGESTION_RATIO: f64 = 1.5;

// Pipeline defaults
pub const DEFAULT_FRAME_SKIP: u32 = 3;
pub const DEFAULT_STARTUP_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_REFRESH_INTERVAL_SECS: f64 = 0.1;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: f64 = 1.0;
pub const DEFAULT_PREVIEW_EVERY: u64 = 30;

// Default lane sources, one per lane
pub const DEFAULT_SOURCES: [&str; 4] = [
    "videos/lane1",
    "videos/lane2",
    "videos/lane3",
    "videos/lane4",
];

// COCO class ids counted as vehicles: car, motorcycle, bus, truck
pub const VEHICLE_CLASS_IDS: [u32; 4] = [2, 3, 5, 7];

// Display layout
pub const WINDOW_TITLE: &str = "Traffic Monitoring System";
pub const HEADER_HEIGHT: u32 = 60;
pub const LIGHT_WIDGET_SIZE: (u32, u32) = (80, 240);
pub const LIGHT_WIDGET_MARGIN: u32 = 10;
pub const EXIT_KEY: char = 'q';
