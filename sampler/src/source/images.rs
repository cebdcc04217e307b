use chrono::Utc;
use color_probe_common::frame::Frame;
use image::{ImageReader, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{FrameSource, FrameStream, SourceError, StreamConstraints};

/// Plays back still images as if they were camera frames.
///
/// `path` is either a single image or a directory; directory entries are
/// decoded in file-name order and played in a loop. Decoding happens once,
/// at acquire time, so a tick never touches the filesystem.
pub struct ImageSequenceSource {
    path: PathBuf,
}

impl ImageSequenceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn image_paths(&self) -> Result<Vec<PathBuf>, SourceError> {
        if !self.path.exists() {
            return Err(SourceError::NoDevice(format!(
                "{} does not exist",
                self.path.display()
            )));
        }
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }

        let entries = std::fs::read_dir(&self.path)
            .map_err(|e| SourceError::PermissionDenied(format!("{}: {e}", self.path.display())))?;
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

fn decode(path: &Path) -> Option<RgbaImage> {
    let img = ImageReader::open(path).ok()?.with_guessed_format().ok()?.decode().ok()?;
    Some(img.to_rgba8())
}

impl FrameSource for ImageSequenceSource {
    fn acquire(&mut self, constraints: &StreamConstraints) -> Result<Box<dyn FrameStream>, SourceError> {
        let mut images = Vec::new();
        for path in self.image_paths()? {
            match decode(&path) {
                Some(img) => {
                    debug!(path = %path.display(), width = img.width(), height = img.height(), "decoded image");
                    images.push(img);
                }
                None => warn!(path = %path.display(), "failed to decode image, skipping"),
            }
        }

        if images.is_empty() {
            return Err(SourceError::Decode(format!(
                "no decodable images under {}",
                self.path.display()
            )));
        }

        if let Some(first) = images.first() {
            if (first.width(), first.height()) != (constraints.ideal_width, constraints.ideal_height) {
                debug!(
                    width = first.width(),
                    height = first.height(),
                    ideal_width = constraints.ideal_width,
                    ideal_height = constraints.ideal_height,
                    "image size differs from requested resolution"
                );
            }
        }

        info!(path = %self.path.display(), frames = images.len(), "image sequence opened");
        Ok(Box::new(ImageSequenceStream {
            images,
            seq: 0,
            released: false,
        }))
    }

    fn name(&self) -> &str {
        "images"
    }
}

struct ImageSequenceStream {
    images: Vec<RgbaImage>,
    seq: u64,
    released: bool,
}

impl FrameStream for ImageSequenceStream {
    fn current_frame(&mut self) -> Option<Frame> {
        if self.released || self.images.is_empty() {
            return None;
        }
        let img = &self.images[(self.seq % self.images.len() as u64) as usize];
        let frame = Frame::from_rgba(
            img.width(),
            img.height(),
            img.as_raw().clone(),
            Utc::now().timestamp_millis(),
            self.seq,
        );
        self.seq += 1;
        match frame {
            Ok(f) => Some(f),
            Err(e) => {
                warn!(error = %e, "decoded image has inconsistent size");
                None
            }
        }
    }

    fn release(&mut self) {
        self.released = true;
        self.images.clear();
    }
}
