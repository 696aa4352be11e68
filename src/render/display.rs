use crate::error::RenderError;
use crate::global_variables::WINDOW_TITLE;
use crate::render::compose::CombinedView;
use image::RgbImage;
use log::{debug, info};
use std::io::{stdin, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

/// Where combined views end up, plus the interactive key query.
pub trait DisplaySink: Send {
    fn show(&mut self, view: &CombinedView) -> Result<(), RenderError>;

    /// Next pending key press, if any. Never blocks.
    fn poll_key(&mut self) -> Option<char>;

    /// Flushes anything still buffered and releases display resources.
    fn close(&mut self) -> Result<(), RenderError>;
}

/// Headless display: logs the signal status whenever it changes and, if
/// configured, periodically writes the combined view to a PNG preview.
/// Keys are read line by line from stdin.
pub struct TerminalDisplay {
    preview: Option<PathBuf>,
    preview_every: u64,
    shown: u64,
    last_status: String,
    unsaved: Option<Arc<RgbImage>>,
    keys: Receiver<char>,
}

impl TerminalDisplay {
    pub fn open(preview: Option<PathBuf>, preview_every: u64) -> Self {
        let (tx, keys) = mpsc::channel();
        // Detached: a blocked stdin read must not hold up shutdown.
        thread::spawn(move || {
            for line in stdin().lock().lines() {
                let Ok(line) = line else { break };
                if let Some(key) = line.trim().chars().next() {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
            }
        });
        Self::with_keys(preview, preview_every, keys)
    }

    /// Display fed from an arbitrary key channel instead of stdin.
    pub fn with_keys(preview: Option<PathBuf>, preview_every: u64, keys: Receiver<char>) -> Self {
        info!("{} started", WINDOW_TITLE);
        Self {
            preview,
            preview_every: preview_every.max(1),
            shown: 0,
            last_status: String::new(),
            unsaved: None,
            keys,
        }
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }

    fn write_preview(&mut self, image: &RgbImage) -> Result<(), RenderError> {
        if let Some(path) = &self.preview {
            image.save(path)?;
            debug!("Preview written to {}", path.display());
        }
        Ok(())
    }
}

impl DisplaySink for TerminalDisplay {
    fn show(&mut self, view: &CombinedView) -> Result<(), RenderError> {
        self.shown += 1;
        let status = view.status_line();
        if status != self.last_status {
            info!("{}", status);
            self.last_status = status;
        }

        if self.preview.is_none() {
            return Ok(());
        }
        if self.shown % self.preview_every == 0 {
            self.unsaved = None;
            self.write_preview(&view.image)
        } else {
            self.unsaved = Some(Arc::clone(&view.image));
            Ok(())
        }
    }

    fn poll_key(&mut self) -> Option<char> {
        match self.keys.try_recv() {
            Ok(key) => Some(key),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn close(&mut self) -> Result<(), RenderError> {
        if let Some(image) = self.unsaved.take() {
            self.write_preview(&image)?;
        }
        info!("{} closed after {} views", WINDOW_TITLE, self.shown);
        Ok(())
    }
}
