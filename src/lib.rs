pub mod config;
pub mod control_system;
pub mod detection;
pub mod error;
pub mod global_variables;
pub mod monitoring;
pub mod render;
pub mod shared_data;
pub mod video;
