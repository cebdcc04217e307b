use color_probe_common::color::{self, Color, Tier};
use serde::Serialize;

/// Everything the presentation layer shows, recomputed and republished after
/// every sample, target change, or state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedState {
    /// `"r, g, b"` of the last sample, empty before the first one.
    pub rgb_text: String,
    /// `#rrggbb` of the last sample, empty before the first one.
    pub hex_text: String,
    pub similarity_percent: u8,
    pub tier: Tier,
    /// Human-readable form of `tier`, e.g. `"Good match"`.
    pub tier_label: String,
    pub target_hex: String,
    /// User-visible error from the last failed `start`.
    pub error_text: String,
    pub is_active: bool,
    pub is_paused: bool,
}

impl ReportedState {
    pub fn new(
        sample: Option<Color>,
        target: Color,
        similarity: f64,
        error_text: &str,
        is_active: bool,
        is_paused: bool,
    ) -> Self {
        let (rgb_text, hex_text, similarity_percent) = match sample {
            Some(c) => (c.rgb_text(), c.to_hex(), color::percent(similarity)),
            None => (String::new(), String::new(), 0),
        };
        // Tier follows the displayed percent so the two never disagree.
        let tier = Tier::from_score(similarity_percent as f64);
        Self {
            rgb_text,
            hex_text,
            similarity_percent,
            tier,
            tier_label: tier.label().to_string(),
            target_hex: target.to_hex(),
            error_text: error_text.to_string(),
            is_active,
            is_paused,
        }
    }
}

impl Default for ReportedState {
    fn default() -> Self {
        Self::new(None, Color::new(255, 0, 0), 0.0, "", false, false)
    }
}
