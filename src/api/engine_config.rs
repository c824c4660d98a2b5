use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, OverlayResult};
use crate::extensions::danmaku::DanmakuConfig;
use crate::extensions::{DrawingStyleConfig, StaticMarkConfig};
use crate::interaction::InteractiveMarkConfig;

/// Public overlay bootstrap configuration.
///
/// This type is serializable so host applications can persist/load overlay
/// setup without inventing their own ad-hoc format. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub drawing_style: DrawingStyleConfig,
    #[serde(default)]
    pub interactive_mark: InteractiveMarkConfig,
    #[serde(default)]
    pub static_marks: StaticMarkConfig,
    #[serde(default)]
    pub danmaku: DanmakuConfig,
    /// Register the built-in line/arrow/shape tools on startup.
    #[serde(default = "default_builtin_tools")]
    pub builtin_tools: bool,
}

fn default_builtin_tools() -> bool {
    true
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            drawing_style: DrawingStyleConfig::default(),
            interactive_mark: InteractiveMarkConfig::default(),
            static_marks: StaticMarkConfig::default(),
            danmaku: DanmakuConfig::default(),
            builtin_tools: default_builtin_tools(),
        }
    }
}

impl OverlayConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(input: &str) -> OverlayResult<Self> {
        let config: Self = serde_json::from_str(input)
            .map_err(|err| OverlayError::InvalidData(format!("invalid overlay config json: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> OverlayResult<String> {
        serde_json::to_string_pretty(self).map_err(|err| {
            OverlayError::InvalidData(format!("failed to serialize overlay config: {err}"))
        })
    }

    /// Sets the style used by drawing-tool previews and committed shapes.
    #[must_use]
    pub fn with_drawing_style(mut self, style: DrawingStyleConfig) -> Self {
        self.drawing_style = style;
        self
    }

    #[must_use]
    pub fn with_interactive_mark(mut self, config: InteractiveMarkConfig) -> Self {
        self.interactive_mark = config;
        self
    }

    #[must_use]
    pub fn with_static_marks(mut self, config: StaticMarkConfig) -> Self {
        self.static_marks = config;
        self
    }

    #[must_use]
    pub fn with_danmaku(mut self, config: DanmakuConfig) -> Self {
        self.danmaku = config;
        self
    }

    /// Starts with an empty tool registry when `false`.
    #[must_use]
    pub fn with_builtin_tools(mut self, enabled: bool) -> Self {
        self.builtin_tools = enabled;
        self
    }

    pub fn validate(&self) -> OverlayResult<()> {
        self.drawing_style.validate()?;
        self.interactive_mark.validate()?;
        self.static_marks.validate()?;
        self.danmaku.validate()?;
        Ok(())
    }
}
