use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{OverlayError, OverlayResult};

/// RGBA color in normalized 0..=1 channel values.
///
/// Serialized as a CSS color string (`#rrggbb`, `#rrggbbaa`, `rgba(..)` or a
/// small set of named colors) so configs stay hand-editable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn rgba(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    #[must_use]
    pub const fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self::rgba(red, green, blue, 1.0)
    }

    #[must_use]
    pub fn from_rgba8(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self::rgba(
            f64::from(red) / 255.0,
            f64::from(green) / 255.0,
            f64::from(blue) / 255.0,
            f64::from(alpha) / 255.0,
        )
    }

    /// Returns the color with its alpha multiplied by `opacity`.
    #[must_use]
    pub fn with_opacity(self, opacity: f64) -> Self {
        Self {
            alpha: (self.alpha * opacity).clamp(0.0, 1.0),
            ..self
        }
    }

    #[must_use]
    pub fn is_transparent(self) -> bool {
        self.alpha <= 0.0
    }

    pub fn validate(self) -> OverlayResult<()> {
        for (channel, value) in [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("alpha", self.alpha),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(OverlayError::InvalidData(format!(
                    "color channel `{channel}` must be finite and in [0, 1]"
                )));
            }
        }
        Ok(())
    }

    fn named(name: &str) -> Option<Self> {
        let color = match name {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "transparent" => Self::TRANSPARENT,
            "red" => Self::from_rgba8(255, 0, 0, 255),
            "orange" => Self::from_rgba8(255, 165, 0, 255),
            "purple" => Self::from_rgba8(128, 0, 128, 255),
            "green" => Self::from_rgba8(0, 128, 0, 255),
            "lightgreen" => Self::from_rgba8(144, 238, 144, 255),
            "lime" => Self::from_rgba8(0, 255, 0, 255),
            "teal" => Self::from_rgba8(0, 128, 128, 255),
            "blue" => Self::from_rgba8(0, 0, 255, 255),
            _ => return None,
        };
        Some(color)
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        match hex.len() {
            3 => {
                let expand = |index: usize| channel(index..index + 1).map(|v| v * 17);
                Some(Self::from_rgba8(expand(0)?, expand(1)?, expand(2)?, 255))
            }
            6 => Some(Self::from_rgba8(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                255,
            )),
            8 => Some(Self::from_rgba8(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => None,
        }
    }

    fn parse_rgba_function(body: &str) -> Option<Self> {
        let parts: SmallVec<[f64; 4]> = body
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [r, g, b] => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0)),
            [r, g, b, a] => Some(Self::rgba(r / 255.0, g / 255.0, b / 255.0, *a)),
            _ => None,
        }
    }

    /// Formats as `#rrggbb` or `#rrggbbaa` when not fully opaque.
    #[must_use]
    pub fn to_css_hex(self) -> String {
        let to_u8 = |value: f64| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        let (r, g, b, a) = (
            to_u8(self.red),
            to_u8(self.green),
            to_u8(self.blue),
            to_u8(self.alpha),
        );
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl FromStr for Color {
    type Err = OverlayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let lower = trimmed.to_ascii_lowercase();
        let parsed = if let Some(hex) = lower.strip_prefix('#') {
            Self::parse_hex(hex)
        } else if let Some(body) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            body.strip_suffix(')').and_then(Self::parse_rgba_function)
        } else {
            Self::named(&lower)
        };

        let color = parsed
            .ok_or_else(|| OverlayError::InvalidData(format!("unsupported color `{trimmed}`")))?;
        color.validate()?;
        Ok(color)
    }
}

impl TryFrom<String> for Color {
    type Error = OverlayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_css_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl LineStrokeStyle {
    /// On/off dash pattern in pixels; empty for solid strokes.
    #[must_use]
    pub fn dash_pattern(self) -> &'static [f64] {
        match self {
            Self::Solid => &[],
            Self::Dashed => &[5.0, 3.0],
            Self::Dotted => &[1.0, 3.0],
        }
    }
}

fn ensure_finite(values: &[f64], what: &str) -> OverlayResult<()> {
    if values.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(OverlayError::InvalidData(format!(
            "{what} coordinates must be finite"
        )))
    }
}

/// Draw command for one line segment in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePrimitive {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub stroke_width: f64,
    pub color: Color,
    pub stroke_style: LineStrokeStyle,
}

impl LinePrimitive {
    #[must_use]
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64, stroke_width: f64, color: Color) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            stroke_width,
            color,
            stroke_style: LineStrokeStyle::Solid,
        }
    }

    #[must_use]
    pub const fn with_stroke_style(mut self, stroke_style: LineStrokeStyle) -> Self {
        self.stroke_style = stroke_style;
        self
    }

    pub fn validate(self) -> OverlayResult<()> {
        ensure_finite(&[self.x1, self.y1, self.x2, self.y2], "line")?;
        if !self.stroke_width.is_finite() || self.stroke_width <= 0.0 {
            return Err(OverlayError::InvalidData(
                "line stroke width must be finite and > 0".to_owned(),
            ));
        }
        self.color.validate()
    }
}

/// Draw command for an axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectPrimitive {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill_color: Color,
    pub border_color: Color,
    pub border_width: f64,
    pub border_style: LineStrokeStyle,
    pub corner_radius: f64,
}

impl RectPrimitive {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64, fill_color: Color) -> Self {
        Self {
            x,
            y,
            width,
            height,
            fill_color,
            border_color: Color::TRANSPARENT,
            border_width: 0.0,
            border_style: LineStrokeStyle::Solid,
            corner_radius: 0.0,
        }
    }

    /// Builds a normalized rectangle spanning two corners.
    #[must_use]
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64, fill_color: Color) -> Self {
        Self::new(
            x1.min(x2),
            y1.min(y2),
            (x2 - x1).abs(),
            (y2 - y1).abs(),
            fill_color,
        )
    }

    #[must_use]
    pub const fn with_border(
        mut self,
        border_width: f64,
        border_color: Color,
        border_style: LineStrokeStyle,
    ) -> Self {
        self.border_width = border_width;
        self.border_color = border_color;
        self.border_style = border_style;
        self
    }

    pub fn validate(self) -> OverlayResult<()> {
        ensure_finite(
            &[self.x, self.y, self.width, self.height, self.corner_radius],
            "rect",
        )?;
        if self.width < 0.0 || self.height < 0.0 {
            return Err(OverlayError::InvalidData(
                "rect size must be >= 0".to_owned(),
            ));
        }
        if !self.border_width.is_finite() || self.border_width < 0.0 {
            return Err(OverlayError::InvalidData(
                "rect border width must be finite and >= 0".to_owned(),
            ));
        }
        self.fill_color.validate()?;
        self.border_color.validate()
    }
}

/// Filled closed polygon (arrow heads, triangles).
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonPrimitive {
    pub points: SmallVec<[(f64, f64); 4]>,
    pub fill_color: Color,
}

impl PolygonPrimitive {
    #[must_use]
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>, fill_color: Color) -> Self {
        Self {
            points: points.into_iter().collect(),
            fill_color,
        }
    }

    pub fn validate(&self) -> OverlayResult<()> {
        if self.points.len() < 3 {
            return Err(OverlayError::InvalidData(
                "polygon needs at least 3 points".to_owned(),
            ));
        }
        let flat: SmallVec<[f64; 8]> = self.points.iter().flat_map(|(x, y)| [*x, *y]).collect();
        ensure_finite(&flat, "polygon")?;
        self.fill_color.validate()
    }
}

/// Circle with optional fill and stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CirclePrimitive {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub stroke_width: f64,
    pub stroke_style: LineStrokeStyle,
}

impl CirclePrimitive {
    #[must_use]
    pub const fn filled(x: f64, y: f64, radius: f64, fill_color: Color) -> Self {
        Self {
            x,
            y,
            radius,
            fill_color,
            stroke_color: Color::TRANSPARENT,
            stroke_width: 0.0,
            stroke_style: LineStrokeStyle::Solid,
        }
    }

    #[must_use]
    pub const fn stroked(
        x: f64,
        y: f64,
        radius: f64,
        stroke_width: f64,
        stroke_color: Color,
        stroke_style: LineStrokeStyle,
    ) -> Self {
        Self {
            x,
            y,
            radius,
            fill_color: Color::TRANSPARENT,
            stroke_color,
            stroke_width,
            stroke_style,
        }
    }

    pub fn validate(self) -> OverlayResult<()> {
        ensure_finite(&[self.x, self.y, self.radius], "circle")?;
        if self.radius < 0.0 || !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(OverlayError::InvalidData(
                "circle radius/stroke width must be >= 0".to_owned(),
            ));
        }
        self.fill_color.validate()?;
        self.stroke_color.validate()
    }
}

/// Horizontal text alignment relative to `TextPrimitive::x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextHAlign {
    Left,
    Center,
    Right,
}

/// Vertical text alignment relative to `TextPrimitive::y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextVAlign {
    Top,
    Middle,
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextShadow {
    pub color: Color,
    pub offset_x: f64,
    pub offset_y: f64,
    pub blur: f64,
}

/// Draw command for one label in pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPrimitive {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size_px: f64,
    pub font_family: Option<String>,
    pub color: Color,
    pub h_align: TextHAlign,
    pub v_align: TextVAlign,
    pub shadow: Option<TextShadow>,
}

impl TextPrimitive {
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        x: f64,
        y: f64,
        font_size_px: f64,
        color: Color,
        h_align: TextHAlign,
    ) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            font_size_px,
            font_family: None,
            color,
            h_align,
            v_align: TextVAlign::Middle,
            shadow: None,
        }
    }

    #[must_use]
    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    #[must_use]
    pub fn with_v_align(mut self, v_align: TextVAlign) -> Self {
        self.v_align = v_align;
        self
    }

    #[must_use]
    pub fn with_shadow(mut self, shadow: TextShadow) -> Self {
        self.shadow = Some(shadow);
        self
    }

    pub fn validate(&self) -> OverlayResult<()> {
        if self.text.is_empty() {
            return Err(OverlayError::InvalidData(
                "text primitive must not be empty".to_owned(),
            ));
        }
        ensure_finite(&[self.x, self.y], "text")?;
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(OverlayError::InvalidData(
                "font size must be finite and > 0".to_owned(),
            ));
        }
        self.color.validate()
    }
}

/// Draw command for a loaded raster image identified by its source id.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePrimitive {
    pub source_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: f64,
}

impl ImagePrimitive {
    pub fn validate(&self) -> OverlayResult<()> {
        ensure_finite(&[self.x, self.y, self.width, self.height], "image")?;
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(OverlayError::InvalidData(
                "image size must be > 0".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(OverlayError::InvalidData(
                "image opacity must be in [0, 1]".to_owned(),
            ));
        }
        Ok(())
    }
}
