use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures that stop the process before (or instead of) normal operation.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("video source '{}' not found", .0.display())]
    MissingSource(PathBuf),

    #[error("video source '{}' is unreadable: {reason}", .path.display())]
    UnreadableSource { path: PathBuf, reason: String },

    #[error("failed to load detection model from '{}': {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("timed out after {0:?} waiting for frames from all lanes")]
    SynchronizationTimeout(Duration),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// A single frame could not be decoded or analysed. The worker skips it.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to decode frame '{}': {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("video source error: {0}")]
    Source(#[from] std::io::Error),
}

/// Drawing or composition failure. Recovered locally by skipping the overlay.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("drawing failed: {0}")]
    Draw(String),

    #[error("overlay {overlay:?} does not fit in target {target:?}")]
    DoesNotFit {
        overlay: (u32, u32),
        target: (u32, u32),
    },

    #[error("failed to write preview: {0}")]
    Image(#[from] image::ImageError),
}
