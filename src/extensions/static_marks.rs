use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use tracing::{trace, warn};

use crate::core::primitives::ensure_positive;
use crate::core::{CoordinateBridge, resolved};
use crate::error::{OverlayError, OverlayResult};
use crate::extensions::{AttachContext, Attachment, PaneRenderer, SeriesPrimitive};
use crate::render::{
    CirclePrimitive, Color, EstimatedTextMeasurer, LinePrimitive, PolygonPrimitive, RectPrimitive,
    RenderFrame, TextHAlign, TextMeasurer, TextPrimitive,
};

/// Which side of the bar a static mark stacks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkDirection {
    /// Above the bar high, stacking upwards.
    Top,
    /// Below the bar low, stacking downwards.
    Bottom,
}

impl MarkDirection {
    /// Pixel-space sign of "away from the bar".
    #[must_use]
    pub fn outward(self) -> f64 {
        match self {
            Self::Top => -1.0,
            Self::Bottom => 1.0,
        }
    }
}

fn default_base_offset_px() -> f64 {
    20.0
}
fn default_arrow_stack_step_px() -> f64 {
    25.0
}
fn default_arrow_half_width_px() -> f64 {
    6.0
}
fn default_arrow_height_px() -> f64 {
    12.0
}
fn default_stem_length_px() -> f64 {
    8.0
}
fn default_stem_width_px() -> f64 {
    2.0
}
fn default_label_offset_px() -> f64 {
    20.0
}
fn default_label_font_size_px() -> f64 {
    10.0
}
fn default_label_color() -> Color {
    Color::BLACK
}
fn default_top_palette() -> Vec<Color> {
    vec![
        Color::from_rgba8(255, 0, 0, 255),
        Color::from_rgba8(255, 165, 0, 255),
        Color::from_rgba8(0x12, 0x37, 0xdb, 255),
        Color::from_rgba8(128, 0, 128, 255),
    ]
}
fn default_bottom_palette() -> Vec<Color> {
    vec![
        Color::from_rgba8(0, 128, 0, 255),
        Color::from_rgba8(144, 238, 144, 255),
        Color::from_rgba8(0, 255, 0, 255),
        Color::from_rgba8(0, 128, 128, 255),
    ]
}
fn default_text_stack_step_px() -> f64 {
    40.0
}
fn default_text_font_size_px() -> f64 {
    11.0
}
fn default_text_padding_px() -> f64 {
    2.0
}
fn default_text_color() -> Color {
    Color::WHITE
}
fn default_text_background() -> Color {
    Color::from_rgba8(255, 0, 0, 255)
}
fn default_text_circular() -> bool {
    true
}
fn default_font_family() -> String {
    "Arial".to_owned()
}

/// Geometry and palettes shared by all static marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticMarkConfig {
    /// Distance from the bar extremum to the first glyph.
    #[serde(default = "default_base_offset_px")]
    pub base_offset_px: f64,
    #[serde(default = "default_arrow_stack_step_px")]
    pub arrow_stack_step_px: f64,
    #[serde(default = "default_arrow_half_width_px")]
    pub arrow_half_width_px: f64,
    #[serde(default = "default_arrow_height_px")]
    pub arrow_height_px: f64,
    #[serde(default = "default_stem_length_px")]
    pub stem_length_px: f64,
    #[serde(default = "default_stem_width_px")]
    pub stem_width_px: f64,
    /// Distance from a glyph to its index label (count >= 3).
    #[serde(default = "default_label_offset_px")]
    pub label_offset_px: f64,
    #[serde(default = "default_label_font_size_px")]
    pub label_font_size_px: f64,
    #[serde(default = "default_label_color")]
    pub label_color: Color,
    #[serde(default = "default_top_palette")]
    pub top_palette: Vec<Color>,
    #[serde(default = "default_bottom_palette")]
    pub bottom_palette: Vec<Color>,
    #[serde(default = "default_text_stack_step_px")]
    pub text_stack_step_px: f64,
    #[serde(default = "default_text_font_size_px")]
    pub text_font_size_px: f64,
    #[serde(default = "default_text_padding_px")]
    pub text_padding_px: f64,
    #[serde(default = "default_text_color")]
    pub text_color: Color,
    #[serde(default = "default_text_background")]
    pub text_background: Color,
    #[serde(default = "default_text_circular")]
    pub text_circular: bool,
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

impl Default for StaticMarkConfig {
    fn default() -> Self {
        Self {
            base_offset_px: default_base_offset_px(),
            arrow_stack_step_px: default_arrow_stack_step_px(),
            arrow_half_width_px: default_arrow_half_width_px(),
            arrow_height_px: default_arrow_height_px(),
            stem_length_px: default_stem_length_px(),
            stem_width_px: default_stem_width_px(),
            label_offset_px: default_label_offset_px(),
            label_font_size_px: default_label_font_size_px(),
            label_color: default_label_color(),
            top_palette: default_top_palette(),
            bottom_palette: default_bottom_palette(),
            text_stack_step_px: default_text_stack_step_px(),
            text_font_size_px: default_text_font_size_px(),
            text_padding_px: default_text_padding_px(),
            text_color: default_text_color(),
            text_background: default_text_background(),
            text_circular: default_text_circular(),
            font_family: default_font_family(),
        }
    }
}

impl StaticMarkConfig {
    #[must_use]
    pub fn with_top_palette(mut self, palette: Vec<Color>) -> Self {
        self.top_palette = palette;
        self
    }

    #[must_use]
    pub fn with_bottom_palette(mut self, palette: Vec<Color>) -> Self {
        self.bottom_palette = palette;
        self
    }

    #[must_use]
    pub fn with_base_offset_px(mut self, offset: f64) -> Self {
        self.base_offset_px = offset;
        self
    }

    #[must_use]
    pub fn palette(&self, direction: MarkDirection) -> &[Color] {
        match direction {
            MarkDirection::Top => &self.top_palette,
            MarkDirection::Bottom => &self.bottom_palette,
        }
    }

    pub fn validate(&self) -> OverlayResult<()> {
        for (value, name) in [
            (self.arrow_stack_step_px, "arrow stack step"),
            (self.arrow_half_width_px, "arrow half width"),
            (self.arrow_height_px, "arrow height"),
            (self.stem_width_px, "stem width"),
            (self.label_font_size_px, "label font size"),
            (self.text_stack_step_px, "text stack step"),
            (self.text_font_size_px, "text font size"),
        ] {
            ensure_positive(value, name)?;
        }
        if !self.base_offset_px.is_finite()
            || !self.stem_length_px.is_finite()
            || !self.label_offset_px.is_finite()
            || !self.text_padding_px.is_finite()
            || self.text_padding_px < 0.0
        {
            return Err(OverlayError::InvalidData(
                "static mark offsets must be finite (padding >= 0)".to_owned(),
            ));
        }
        if self.top_palette.is_empty() || self.bottom_palette.is_empty() {
            return Err(OverlayError::InvalidData(
                "static mark palettes must not be empty".to_owned(),
            ));
        }
        for color in self.top_palette.iter().chain(&self.bottom_palette) {
            color.validate()?;
        }
        Ok(())
    }
}

/// Resolves the pixel anchor of a static mark: bar x and the extremum y
/// pushed outwards by the base offset. `Ok(None)` means the bar is missing.
fn resolve_base(
    attachment: &Attachment,
    time: f64,
    direction: MarkDirection,
    base_offset_px: f64,
) -> OverlayResult<Option<(f64, f64)>> {
    let host = attachment.host()?;
    let bridge = CoordinateBridge::new(&*host);
    let x = resolved(bridge.time_to_pixel_x(time), "static mark time")?;
    let Some(bar) = bridge.bar_at(time) else {
        trace!(time, "no bar for static mark time key; skipping");
        return Ok(None);
    };
    let extremum = match direction {
        MarkDirection::Top => bar.high,
        MarkDirection::Bottom => bar.low,
    };
    let y = resolved(bridge.price_to_pixel_y(extremum), "static mark extremum")?;
    Ok(Some((x, y + direction.outward() * base_offset_px)))
}

/// Stack of `count` arrow glyphs pointing at one bar.
///
/// Colors are tiered by count: one glyph uses the palette head, two glyphs
/// use the first two palette entries, three or more cycle the palette and
/// get a 1-based index label.
#[derive(Debug, Clone)]
pub struct MultiArrowMark {
    time: f64,
    count: usize,
    direction: MarkDirection,
    config: StaticMarkConfig,
    attachment: Attachment,
}

impl MultiArrowMark {
    pub fn new(
        time: f64,
        count: usize,
        direction: MarkDirection,
        config: StaticMarkConfig,
    ) -> OverlayResult<Self> {
        if !time.is_finite() {
            return Err(OverlayError::InvalidData(
                "static mark time must be finite".to_owned(),
            ));
        }
        if count == 0 {
            return Err(OverlayError::InvalidData(
                "arrow mark count must be >= 1".to_owned(),
            ));
        }
        config.validate()?;
        Ok(Self {
            time,
            count,
            direction,
            config,
            attachment: Attachment::default(),
        })
    }

    /// Single arrow above/below the bar at `time`.
    pub fn single(time: f64, direction: MarkDirection) -> OverlayResult<Self> {
        Self::new(time, 1, direction, StaticMarkConfig::default())
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn direction(&self) -> MarkDirection {
        self.direction
    }

    pub fn set_count(&mut self, count: usize) -> OverlayResult<()> {
        if count == 0 {
            return Err(OverlayError::InvalidData(
                "arrow mark count must be >= 1".to_owned(),
            ));
        }
        self.count = count;
        self.attachment.request_update();
        Ok(())
    }

    /// Fill color of the glyph at `index` (0 = closest to the bar).
    #[must_use]
    pub fn color_for(&self, index: usize) -> Color {
        let palette = self.config.palette(self.direction);
        match self.count {
            1 => palette[0],
            2 => palette[index.min(1) % palette.len()],
            _ => palette[index % palette.len()],
        }
    }
}

impl PaneRenderer for MultiArrowMark {
    fn draw(&self, frame: &mut RenderFrame) -> OverlayResult<()> {
        let Some((x, base_y)) = resolve_base(
            &self.attachment,
            self.time,
            self.direction,
            self.config.base_offset_px,
        )?
        else {
            return Ok(());
        };

        let out = self.direction.outward();
        let cfg = &self.config;
        for index in 0..self.count {
            let y = base_y + out * index as f64 * cfg.arrow_stack_step_px;
            let color = self.color_for(index);
            frame.polygons.push(PolygonPrimitive::new(
                [
                    (x, y - out * cfg.arrow_height_px),
                    (x - cfg.arrow_half_width_px, y),
                    (x + cfg.arrow_half_width_px, y),
                ],
                color,
            ));
            frame.lines.push(LinePrimitive::new(
                x,
                y,
                x,
                y + out * cfg.stem_length_px,
                cfg.stem_width_px,
                color,
            ));
            if self.count >= 3 {
                frame.texts.push(
                    TextPrimitive::new(
                        (index + 1).to_string(),
                        x,
                        y + out * cfg.label_offset_px,
                        cfg.label_font_size_px,
                        cfg.label_color,
                        TextHAlign::Center,
                    )
                    .with_font_family(cfg.font_family.clone()),
                );
            }
        }
        Ok(())
    }
}

impl SeriesPrimitive for MultiArrowMark {
    fn attached(&mut self, context: AttachContext) -> OverlayResult<()> {
        self.attachment.attach(context)?;
        self.attachment.request_update();
        Ok(())
    }

    fn detached(&mut self) {
        self.attachment.detach();
    }

    fn pane_views(&self) -> SmallVec<[&dyn PaneRenderer; 2]> {
        smallvec![self as &dyn PaneRenderer]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One pill in a [`MultiTextMark`]; unset fields fall back to the config.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextTag {
    pub text: String,
    #[serde(default)]
    pub text_color: Option<Color>,
    #[serde(default)]
    pub background_color: Option<Color>,
    #[serde(default)]
    pub circular: Option<bool>,
    #[serde(default)]
    pub font_size_px: Option<f64>,
    #[serde(default)]
    pub padding_px: Option<f64>,
}

impl TextTag {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_colors(mut self, text_color: Color, background_color: Color) -> Self {
        self.text_color = Some(text_color);
        self.background_color = Some(background_color);
        self
    }

    #[must_use]
    pub fn with_circular(mut self, circular: bool) -> Self {
        self.circular = Some(circular);
        self
    }
}

/// Stack of text pills above or below one bar.
#[derive(Clone)]
pub struct MultiTextMark {
    time: f64,
    direction: MarkDirection,
    tags: Vec<TextTag>,
    config: StaticMarkConfig,
    measurer: Rc<dyn TextMeasurer>,
    attachment: Attachment,
}

impl fmt::Debug for MultiTextMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiTextMark")
            .field("time", &self.time)
            .field("direction", &self.direction)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl MultiTextMark {
    pub fn new(
        time: f64,
        direction: MarkDirection,
        tags: Vec<TextTag>,
        config: StaticMarkConfig,
    ) -> OverlayResult<Self> {
        if !time.is_finite() {
            return Err(OverlayError::InvalidData(
                "static mark time must be finite".to_owned(),
            ));
        }
        config.validate()?;
        Ok(Self {
            time,
            direction,
            tags,
            config,
            measurer: Rc::new(EstimatedTextMeasurer::default()),
            attachment: Attachment::default(),
        })
    }

    #[must_use]
    pub fn with_measurer(mut self, measurer: Rc<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    #[must_use]
    pub fn tags(&self) -> &[TextTag] {
        &self.tags
    }

    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn add_tag(&mut self, tag: TextTag) {
        self.tags.push(tag);
        self.attachment.request_update();
    }

    pub fn set_tags(&mut self, tags: Vec<TextTag>) {
        self.tags = tags;
        self.attachment.request_update();
    }

    /// Returns `false` when `index` is out of range.
    pub fn update_text(&mut self, index: usize, text: impl Into<String>) -> bool {
        let Some(tag) = self.tags.get_mut(index) else {
            return false;
        };
        tag.text = text.into();
        self.attachment.request_update();
        true
    }

    pub fn update_colors(&mut self, index: usize, text_color: Color, background: Color) -> bool {
        let Some(tag) = self.tags.get_mut(index) else {
            return false;
        };
        tag.text_color = Some(text_color);
        tag.background_color = Some(background);
        self.attachment.request_update();
        true
    }

    pub fn remove_tag(&mut self, index: usize) -> Option<TextTag> {
        if index >= self.tags.len() {
            return None;
        }
        let removed = self.tags.remove(index);
        self.attachment.request_update();
        Some(removed)
    }

    pub fn clear_tags(&mut self) {
        self.tags.clear();
        self.attachment.request_update();
    }
}

impl PaneRenderer for MultiTextMark {
    fn draw(&self, frame: &mut RenderFrame) -> OverlayResult<()> {
        let Some((x, base_y)) = resolve_base(
            &self.attachment,
            self.time,
            self.direction,
            self.config.base_offset_px,
        )?
        else {
            return Ok(());
        };

        let cfg = &self.config;
        let out = self.direction.outward();
        for (index, tag) in self.tags.iter().enumerate() {
            if tag.text.is_empty() {
                continue;
            }
            let y = base_y + out * index as f64 * cfg.text_stack_step_px;
            let font_size = tag.font_size_px.unwrap_or(cfg.text_font_size_px);
            let padding = tag.padding_px.unwrap_or(cfg.text_padding_px);
            let text_width = self
                .measurer
                .measure_text(&tag.text, font_size, Some(&cfg.font_family));
            let total_width = text_width + padding * 2.0;
            let total_height = font_size + padding * 2.0;
            let background = tag.background_color.unwrap_or(cfg.text_background);

            if tag.circular.unwrap_or(cfg.text_circular) {
                let radius = total_width.max(total_height) / 2.0;
                frame
                    .circles
                    .push(CirclePrimitive::filled(x, y, radius, background));
            } else {
                frame.rects.push(RectPrimitive::new(
                    x - total_width / 2.0,
                    y - total_height / 2.0,
                    total_width,
                    total_height,
                    background,
                ));
            }
            frame.texts.push(
                TextPrimitive::new(
                    tag.text.clone(),
                    x,
                    y,
                    font_size,
                    tag.text_color.unwrap_or(cfg.text_color),
                    TextHAlign::Center,
                )
                .with_font_family(cfg.font_family.clone()),
            );
        }
        Ok(())
    }
}

impl SeriesPrimitive for MultiTextMark {
    fn attached(&mut self, context: AttachContext) -> OverlayResult<()> {
        self.attachment.attach(context)?;
        self.attachment.request_update();
        Ok(())
    }

    fn detached(&mut self) {
        self.attachment.detach();
    }

    fn pane_views(&self) -> SmallVec<[&dyn PaneRenderer; 2]> {
        smallvec![self as &dyn PaneRenderer]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Kind of a raw static-mark record. Unrecognized kinds deserialize to
/// `Unknown` and are skipped by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaticMarkKind {
    Text,
    Arrow,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticMarkItem {
    pub direction: MarkDirection,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub tag_style: TextTagStyle,
}

/// Optional per-item styling carried by raw records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextTagStyle {
    #[serde(default)]
    pub text_color: Option<Color>,
    #[serde(default)]
    pub background_color: Option<Color>,
    #[serde(default)]
    pub circular: Option<bool>,
    #[serde(default)]
    pub font_size_px: Option<f64>,
    #[serde(default)]
    pub padding_px: Option<f64>,
}

impl StaticMarkItem {
    fn to_tag(&self) -> TextTag {
        TextTag {
            text: self.text.clone(),
            text_color: self.tag_style.text_color,
            background_color: self.tag_style.background_color,
            circular: self.tag_style.circular,
            font_size_px: self.tag_style.font_size_px,
            padding_px: self.tag_style.padding_px,
        }
    }
}

/// Raw, caller-supplied static mark data for one time key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticMarkRecord {
    pub time: f64,
    pub kind: StaticMarkKind,
    pub items: Vec<StaticMarkItem>,
}

/// Turns raw records into attachable primitives.
///
/// Records are grouped by time, then kind, then direction; each non-empty
/// group becomes one primitive. Text groups become a [`MultiTextMark`],
/// arrow groups a [`MultiArrowMark`] whose count is the group size.
#[derive(Clone)]
pub struct StaticMarkBuilder {
    config: StaticMarkConfig,
    measurer: Rc<dyn TextMeasurer>,
}

impl Default for StaticMarkBuilder {
    fn default() -> Self {
        Self::new(StaticMarkConfig::default())
    }
}

impl StaticMarkBuilder {
    #[must_use]
    pub fn new(config: StaticMarkConfig) -> Self {
        Self {
            config,
            measurer: Rc::new(EstimatedTextMeasurer::default()),
        }
    }

    #[must_use]
    pub fn with_measurer(mut self, measurer: Rc<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    pub fn build(&self, records: &[StaticMarkRecord]) -> OverlayResult<Vec<Box<dyn SeriesPrimitive>>> {
        self.config.validate()?;

        let mut by_time: BTreeMap<OrderedFloat<f64>, IndexMap<StaticMarkKind, Vec<&StaticMarkItem>>> =
            BTreeMap::new();
        for record in records {
            if !record.time.is_finite() {
                return Err(OverlayError::InvalidData(
                    "static mark record time must be finite".to_owned(),
                ));
            }
            if record.kind == StaticMarkKind::Unknown {
                warn!(time = record.time, "unknown static mark kind; record skipped");
                continue;
            }
            by_time
                .entry(OrderedFloat(record.time))
                .or_default()
                .entry(record.kind)
                .or_default()
                .extend(&record.items);
        }

        let mut primitives: Vec<Box<dyn SeriesPrimitive>> = Vec::new();
        for (time, kinds) in by_time {
            for (kind, items) in kinds {
                for direction in [MarkDirection::Top, MarkDirection::Bottom] {
                    let group: Vec<&StaticMarkItem> = items
                        .iter()
                        .copied()
                        .filter(|item| item.direction == direction)
                        .collect();
                    if group.is_empty() {
                        continue;
                    }
                    primitives.push(self.build_group(time.0, kind, direction, &group)?);
                }
            }
        }
        Ok(primitives)
    }

    fn build_group(
        &self,
        time: f64,
        kind: StaticMarkKind,
        direction: MarkDirection,
        group: &[&StaticMarkItem],
    ) -> OverlayResult<Box<dyn SeriesPrimitive>> {
        match kind {
            StaticMarkKind::Text => {
                let tags = group.iter().map(|item| item.to_tag()).collect();
                Ok(Box::new(
                    MultiTextMark::new(time, direction, tags, self.config.clone())?
                        .with_measurer(Rc::clone(&self.measurer)),
                ))
            }
            StaticMarkKind::Arrow => Ok(Box::new(MultiArrowMark::new(
                time,
                group.len(),
                direction,
                self.config.clone(),
            )?)),
            StaticMarkKind::Unknown => Err(OverlayError::InvalidData(
                "unknown static mark kind".to_owned(),
            )),
        }
    }
}
