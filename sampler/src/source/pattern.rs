use chrono::Utc;
use color_probe_common::color::Color;
use color_probe_common::frame::Frame;
use tracing::debug;

use super::{FrameSource, FrameStream, SourceError, StreamConstraints};

/// Synthetic source producing solid frames that cycle through a color list,
/// one color per frame.
pub struct PatternSource {
    colors: Vec<Color>,
    size: Option<(u32, u32)>,
}

impl PatternSource {
    pub fn new(colors: Vec<Color>) -> Self {
        Self { colors, size: None }
    }

    pub fn solid(color: Color) -> Self {
        Self::new(vec![color])
    }

    /// Produce frames of this size instead of the requested one.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }
}

impl FrameSource for PatternSource {
    fn acquire(&mut self, constraints: &StreamConstraints) -> Result<Box<dyn FrameStream>, SourceError> {
        if self.colors.is_empty() {
            return Err(SourceError::NoDevice("pattern has no colors".into()));
        }
        let (width, height) = self
            .size
            .unwrap_or((constraints.ideal_width, constraints.ideal_height));
        debug!(width, height, colors = self.colors.len(), "pattern stream opened");
        Ok(Box::new(PatternStream {
            colors: self.colors.clone(),
            width,
            height,
            seq: 0,
            released: false,
        }))
    }

    fn name(&self) -> &str {
        "pattern"
    }
}

struct PatternStream {
    colors: Vec<Color>,
    width: u32,
    height: u32,
    seq: u64,
    released: bool,
}

impl FrameStream for PatternStream {
    fn current_frame(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        let color = self.colors[(self.seq % self.colors.len() as u64) as usize];
        let frame = Frame::filled(
            self.width,
            self.height,
            color,
            Utc::now().timestamp_millis(),
            self.seq,
        );
        self.seq += 1;
        Some(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }
}
