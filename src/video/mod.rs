pub mod frame_source;

pub use frame_source::{open_sources, FrameSequence, VideoSource};
