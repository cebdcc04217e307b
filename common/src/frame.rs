use crate::color::Color;

const CHANNELS: usize = 4;

/// A single captured camera frame.
///
/// Pixels are packed row-major RGBA, 4 bytes per pixel, no row padding:
///   [(y * width + x) * 4 + 0]  red
///   [(y * width + x) * 4 + 1]  green
///   [(y * width + x) * 4 + 2]  blue
///   [(y * width + x) * 4 + 3]  alpha (ignored by sampling)
///
/// Frames are immutable once built; the owner drops them after sampling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
    captured_at_ms: i64,
    seq: u64,
}

impl Frame {
    /// Wrap an RGBA buffer. Fails if the buffer does not hold exactly
    /// `width * height` pixels.
    pub fn from_rgba(
        width: u32,
        height: u32,
        data: Vec<u8>,
        captured_at_ms: i64,
        seq: u64,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            captured_at_ms,
            seq,
        })
    }

    /// A frame where every pixel is `color` with full opacity.
    pub fn filled(width: u32, height: u32, color: Color, captured_at_ms: i64, seq: u64) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        Self {
            width,
            height,
            data,
            captured_at_ms,
            seq,
        }
    }

    // -- Accessors --------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn captured_at_ms(&self) -> i64 {
        self.captured_at_ms
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The raw RGBA bytes.
    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    /// Returns true if the frame holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Geometric center, rounded down: `(width / 2, height / 2)`.
    pub fn center(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }

    /// RGBA bytes of one row.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * CHANNELS;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// RGBA of the pixel at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("{width}x{height} frame needs {expected} RGBA bytes, got {got}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
}
