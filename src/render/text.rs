/// Measures rendered text width so layout can size pills and scroll distances.
pub trait TextMeasurer {
    /// Width in pixels of `text` at `font_size_px`. `family` is a CSS-style
    /// family list; measurers may ignore it.
    fn measure_text(&self, text: &str, font_size_px: f64, family: Option<&str>) -> f64;
}

/// Width heuristic for headless use: every char is `ratio * font_size` wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatedTextMeasurer {
    pub char_width_ratio: f64,
}

impl EstimatedTextMeasurer {
    pub const DEFAULT_RATIO: f64 = 0.6;
}

impl Default for EstimatedTextMeasurer {
    fn default() -> Self {
        Self {
            char_width_ratio: Self::DEFAULT_RATIO,
        }
    }
}

impl TextMeasurer for EstimatedTextMeasurer {
    fn measure_text(&self, text: &str, font_size_px: f64, _family: Option<&str>) -> f64 {
        text.chars().count() as f64 * font_size_px * self.char_width_ratio
    }
}
