use crate::error::{FrameError, StartupError};
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

/// A looping supply of frames for one lane.
pub trait VideoSource: Send {
    /// Next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, FrameError>;

    /// Seeks back to the first frame.
    fn rewind(&mut self) -> Result<(), FrameError>;
}

/// Frames stored as still images: either a directory of images played in
/// file-name order, or a single image repeated.
#[derive(Debug)]
pub struct FrameSequence {
    frames: Vec<PathBuf>,
    position: usize,
}

impl FrameSequence {
    pub fn open(path: &Path) -> Result<Self, StartupError> {
        if !path.exists() {
            return Err(StartupError::MissingSource(path.to_path_buf()));
        }
        let unreadable = |reason: String| StartupError::UnreadableSource {
            path: path.to_path_buf(),
            reason,
        };

        let frames = if path.is_dir() {
            let mut frames: Vec<PathBuf> = fs::read_dir(path)
                .map_err(|e| unreadable(e.to_string()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && ImageFormat::from_path(p).is_ok())
                .collect();
            frames.sort();
            frames
        } else {
            ImageFormat::from_path(path).map_err(|e| unreadable(e.to_string()))?;
            vec![path.to_path_buf()]
        };

        let first = frames
            .first()
            .ok_or_else(|| unreadable("no image frames found".to_string()))?;
        image::image_dimensions(first).map_err(|e| unreadable(e.to_string()))?;

        Ok(Self {
            frames,
            position: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl VideoSource for FrameSequence {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, FrameError> {
        let Some(path) = self.frames.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        let frame = image::open(path).map_err(|source| FrameError::Decode {
            path: path.clone(),
            source,
        })?;
        Ok(Some(frame.to_rgb8()))
    }

    fn rewind(&mut self) -> Result<(), FrameError> {
        self.position = 0;
        Ok(())
    }
}

/// Checks every lane's source before any worker starts.
pub fn open_sources(paths: &[PathBuf]) -> Result<Vec<FrameSequence>, StartupError> {
    if let Some(missing) = paths.iter().find(|p| !p.exists()) {
        return Err(StartupError::MissingSource(missing.clone()));
    }
    paths.iter().map(|p| FrameSequence::open(p)).collect()
}
