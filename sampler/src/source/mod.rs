//! Frame sources: the camera side of the pipeline.
//!
//! A [`FrameSource`] hands out one [`FrameStream`] per `start`; the stream is
//! polled for its newest frame on every sampling tick and released on `stop`.

pub mod images;
pub mod pattern;

pub use images::ImageSequenceSource;
pub use pattern::PatternSource;

use color_probe_common::frame::Frame;

/// Requested capture geometry. Sources may ignore it and return any size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

pub trait FrameSource: Send {
    /// Open a stream. Fails when the device is missing or access is refused.
    fn acquire(&mut self, constraints: &StreamConstraints) -> Result<Box<dyn FrameStream>, SourceError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

pub trait FrameStream: Send {
    /// The newest frame, or `None` if the stream has nothing to show yet.
    fn current_frame(&mut self) -> Option<Frame>;

    /// Stop the underlying device. Called exactly once per stream.
    fn release(&mut self);
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("no camera found: {0}")]
    NoDevice(String),
    #[error("failed to decode frame: {0}")]
    Decode(String),
}
