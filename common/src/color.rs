use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// An sRGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb`, lowercase.
    pub fn to_hex(&self) -> String {
        to_hex(self.r, self.g, self.b)
    }

    /// Comma-separated channel values, e.g. `"12, 200, 7"`.
    pub fn rgb_text(&self) -> String {
        format!("{}, {}, {}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    /// Parses `#rrggbb`. Hex digits may be upper- or lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(s.to_string()))?;
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::BadDigits(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ColorParseError::BadDigits(s.to_string()))
        };
        Ok(Color::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    #[error("color {0:?} must start with '#'")]
    MissingHash(String),
    #[error("color {0:?} must have exactly six hex digits")]
    BadDigits(String),
}

/// Format three channels as `#rrggbb`.
pub fn to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Largest possible Euclidean distance between two colors, `sqrt(255² * 3)`.
pub fn max_distance() -> f64 {
    (255.0f64 * 255.0 * 3.0).sqrt()
}

/// Euclidean distance in RGB space.
pub fn distance(a: Color, b: Color) -> f64 {
    let dr = a.r as f64 - b.r as f64;
    let dg = a.g as f64 - b.g as f64;
    let db = a.b as f64 - b.b as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Similarity score in `[0, 100]`: 100 for identical colors, 0 at (or beyond)
/// the maximum RGB distance.
pub fn similarity(a: Color, b: Color) -> f64 {
    (100.0 * (1.0 - distance(a, b) / max_distance())).max(0.0)
}

/// A score rounded to the nearest whole percent (halves round up), clamped
/// to `0..=100`.
pub fn percent(score: f64) -> u8 {
    score.round().clamp(0.0, 100.0) as u8
}

/// `similarity` as a whole percent.
pub fn similarity_percent(a: Color, b: Color) -> u8 {
    percent(similarity(a, b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Tier {
    /// Lower bounds are inclusive: 90 is Excellent, 89.9 is Good.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Tier::Excellent
        } else if score >= 75.0 {
            Tier::Good
        } else if score >= 50.0 {
            Tier::Fair
        } else {
            Tier::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Excellent => "Excellent match",
            Tier::Good => "Good match",
            Tier::Fair => "Fair match",
            Tier::Poor => "Poor match",
        }
    }
}

pub fn tier(score: f64) -> Tier {
    Tier::from_score(score)
}
