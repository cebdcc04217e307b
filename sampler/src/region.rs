use color_probe_common::color::Color;
use color_probe_common::frame::Frame;
use image::{imageops, RgbaImage};

/// Half the side of the sampled square; the box is 50x50.
pub const REGION_HALF_SIZE: u32 = 25;

/// A half-open pixel rectangle `[x0, x1) x [y0, y1)` already clamped to the
/// frame it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Region {
    /// Square of side `2 * half_size` around `center`, clamped to
    /// `[0, frame_width) x [0, frame_height)`.
    pub fn around(frame_width: u32, frame_height: u32, center: (u32, u32), half_size: u32) -> Self {
        let span = |c: u32, limit: u32| {
            (
                c.saturating_sub(half_size).min(limit),
                c.saturating_add(half_size).min(limit),
            )
        };
        let (x0, x1) = span(center.0, frame_width);
        let (y0, y1) = span(center.1, frame_height);
        Self { x0, y0, x1, y1 }
    }

    /// The fixed 50x50 box at the frame's center.
    pub fn centered(frame: &Frame) -> Self {
        Self::around(frame.width(), frame.height(), frame.center(), REGION_HALF_SIZE)
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn pixel_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("sample region is empty for {width}x{height} frame")]
    EmptyRegion { width: u32, height: u32 },
}

/// Running per-channel sums. Shared by both sampling paths so they round
/// identically.
#[derive(Debug, Default)]
struct ChannelSums {
    r: u64,
    g: u64,
    b: u64,
    count: u64,
}

impl ChannelSums {
    fn add(&mut self, rgba: &[u8]) {
        self.r += rgba[0] as u64;
        self.g += rgba[1] as u64;
        self.b += rgba[2] as u64;
        self.count += 1;
    }

    /// Mean of each channel, halves rounded up. `None` with no pixels.
    fn mean(&self) -> Option<Color> {
        if self.count == 0 {
            return None;
        }
        let round = |sum: u64| ((2 * sum + self.count) / (2 * self.count)) as u8;
        Some(Color::new(round(self.r), round(self.g), round(self.b)))
    }
}

/// Mean RGB over the square of side `2 * half_size` around `center`,
/// reading straight out of the full frame buffer.
pub fn sample_region(frame: &Frame, center: (u32, u32), half_size: u32) -> Result<Color, SampleError> {
    let region = Region::around(frame.width(), frame.height(), center, half_size);
    let empty = || SampleError::EmptyRegion {
        width: frame.width(),
        height: frame.height(),
    };
    if region.is_empty() {
        return Err(empty());
    }

    let start = region.x0 as usize * 4;
    let end = region.x1 as usize * 4;
    let mut sums = ChannelSums::default();
    for y in region.y0..region.y1 {
        for px in frame.row(y)[start..end].chunks_exact(4) {
            sums.add(px);
        }
    }
    sums.mean().ok_or_else(empty)
}

/// Mean RGB of the fixed center box.
pub fn sample_frame(frame: &Frame) -> Result<Color, SampleError> {
    sample_region(frame, frame.center(), REGION_HALF_SIZE)
}

/// Copy `region` out of `frame` into its own image buffer.
pub fn crop_region(frame: &Frame, region: Region) -> Option<RgbaImage> {
    let full = RgbaImage::from_raw(frame.width(), frame.height(), frame.as_rgba().to_vec())?;
    Some(imageops::crop_imm(&full, region.x0, region.y0, region.width(), region.height()).to_image())
}

/// Mean RGB of every pixel in an already-cropped buffer.
pub fn sample_cropped(cropped: &RgbaImage) -> Result<Color, SampleError> {
    let mut sums = ChannelSums::default();
    for px in cropped.pixels() {
        sums.add(&px.0);
    }
    sums.mean().ok_or(SampleError::EmptyRegion {
        width: cropped.width(),
        height: cropped.height(),
    })
}
