use std::any::Any;

use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::core::primitives::{ensure_positive, ensure_unit_interval};
use crate::core::{Anchor, CoordinateBridge, PixelPoint, resolved};
use crate::error::{OverlayError, OverlayResult};
use crate::extensions::{AttachContext, Attachment, PaneRenderer, SeriesPrimitive};
use crate::render::{
    CirclePrimitive, Color, LinePrimitive, LineStrokeStyle, PolygonPrimitive, RectPrimitive,
    RenderFrame,
};

fn default_line_color() -> Color {
    Color::from_rgba8(0x29, 0x62, 0xff, 255)
}
fn default_line_width_px() -> f64 {
    2.0
}
fn default_fill_color() -> Color {
    Color::from_rgba8(0x29, 0x62, 0xff, 38)
}
fn default_preview_opacity() -> f64 {
    0.7
}
fn default_preview_stroke() -> LineStrokeStyle {
    LineStrokeStyle::Dashed
}
fn default_endpoint_radius_px() -> f64 {
    3.0
}
fn default_arrow_head_length_px() -> f64 {
    12.0
}
fn default_arrow_head_half_width_px() -> f64 {
    6.0
}

/// Stroke/fill style shared by drawing-tool geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawingStyleConfig {
    #[serde(default = "default_line_color")]
    pub color: Color,
    #[serde(default = "default_line_width_px")]
    pub line_width_px: f64,
    #[serde(default)]
    pub stroke_style: LineStrokeStyle,
    #[serde(default = "default_fill_color")]
    pub fill_color: Color,
    /// Opacity multiplier applied to preview geometry.
    #[serde(default = "default_preview_opacity")]
    pub preview_opacity: f64,
    #[serde(default = "default_preview_stroke")]
    pub preview_stroke: LineStrokeStyle,
    /// Radius of the end-point dots on committed lines.
    #[serde(default = "default_endpoint_radius_px")]
    pub endpoint_radius_px: f64,
    #[serde(default = "default_arrow_head_length_px")]
    pub arrow_head_length_px: f64,
    #[serde(default = "default_arrow_head_half_width_px")]
    pub arrow_head_half_width_px: f64,
}

impl Default for DrawingStyleConfig {
    fn default() -> Self {
        Self {
            color: default_line_color(),
            line_width_px: default_line_width_px(),
            stroke_style: LineStrokeStyle::Solid,
            fill_color: default_fill_color(),
            preview_opacity: default_preview_opacity(),
            preview_stroke: default_preview_stroke(),
            endpoint_radius_px: default_endpoint_radius_px(),
            arrow_head_length_px: default_arrow_head_length_px(),
            arrow_head_half_width_px: default_arrow_head_half_width_px(),
        }
    }
}

impl DrawingStyleConfig {
    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_line_width_px(mut self, width: f64) -> Self {
        self.line_width_px = width;
        self
    }

    #[must_use]
    pub fn with_fill_color(mut self, color: Color) -> Self {
        self.fill_color = color;
        self
    }

    pub fn validate(&self) -> OverlayResult<()> {
        self.color.validate()?;
        self.fill_color.validate()?;
        ensure_positive(self.line_width_px, "line_width_px")?;
        ensure_unit_interval(self.preview_opacity, "preview_opacity")?;
        ensure_positive(self.arrow_head_length_px, "arrow_head_length_px")?;
        ensure_positive(self.arrow_head_half_width_px, "arrow_head_half_width_px")?;
        if !self.endpoint_radius_px.is_finite() || self.endpoint_radius_px < 0.0 {
            return Err(OverlayError::InvalidData(
                "`endpoint_radius_px` must be finite and >= 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn stroke(&self, preview: bool) -> (Color, LineStrokeStyle) {
        if preview {
            (self.color.with_opacity(self.preview_opacity), self.preview_stroke)
        } else {
            (self.color, self.stroke_style)
        }
    }

    fn fill(&self, preview: bool) -> Color {
        if preview {
            self.fill_color.with_opacity(self.preview_opacity)
        } else {
            self.fill_color
        }
    }
}

fn anchor_pixel(attachment: &Attachment, anchor: Anchor) -> OverlayResult<PixelPoint> {
    let host = attachment.host()?;
    resolved(
        CoordinateBridge::new(&*host).anchor_to_pixel(anchor),
        "drawing anchor",
    )
}

fn validate_anchors(anchors: &[Anchor]) -> OverlayResult<()> {
    for anchor in anchors {
        anchor.validate()?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnds {
    Plain,
    /// Filled arrow head at the end anchor.
    Arrow,
}

/// Straight segment between two anchors.
///
/// Preview lines are dashed and translucent without end-point dots; committed
/// lines are solid with a dot on each end.
#[derive(Debug, Clone)]
pub struct LineMark {
    start: Anchor,
    end: Anchor,
    ends: LineEnds,
    style: DrawingStyleConfig,
    preview: bool,
    attachment: Attachment,
}

impl LineMark {
    pub fn new(start: Anchor, end: Anchor, style: DrawingStyleConfig) -> OverlayResult<Self> {
        validate_anchors(&[start, end])?;
        style.validate()?;
        Ok(Self {
            start,
            end,
            ends: LineEnds::Plain,
            style,
            preview: false,
            attachment: Attachment::default(),
        })
    }

    #[must_use]
    pub fn with_ends(mut self, ends: LineEnds) -> Self {
        self.ends = ends;
        self
    }

    #[must_use]
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    #[must_use]
    pub fn start(&self) -> Anchor {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> Anchor {
        self.end
    }

    #[must_use]
    pub fn ends(&self) -> LineEnds {
        self.ends
    }

    #[must_use]
    pub fn style(&self) -> &DrawingStyleConfig {
        &self.style
    }

    pub fn set_preview(&mut self, preview: bool) {
        self.preview = preview;
        self.attachment.request_update();
    }

    pub fn update_end_point(&mut self, end: Anchor) {
        self.end = end;
        self.attachment.request_update();
    }

    pub fn set_style(&mut self, style: DrawingStyleConfig) -> OverlayResult<()> {
        style.validate()?;
        self.style = style;
        self.attachment.request_update();
        Ok(())
    }
}

impl PaneRenderer for LineMark {
    fn draw(&self, frame: &mut RenderFrame) -> OverlayResult<()> {
        let start = anchor_pixel(&self.attachment, self.start)?;
        let end = anchor_pixel(&self.attachment, self.end)?;
        let (color, stroke_style) = self.style.stroke(self.preview);

        frame.lines.push(
            LinePrimitive::new(
                start.x,
                start.y,
                end.x,
                end.y,
                self.style.line_width_px,
                color,
            )
            .with_stroke_style(stroke_style),
        );

        if self.ends == LineEnds::Arrow {
            let length = start.distance_to(end);
            if length > f64::EPSILON {
                let (ux, uy) = ((end.x - start.x) / length, (end.y - start.y) / length);
                let head = self.style.arrow_head_length_px.min(length);
                let half = self.style.arrow_head_half_width_px;
                let (bx, by) = (end.x - ux * head, end.y - uy * head);
                frame.polygons.push(PolygonPrimitive::new(
                    [
                        (end.x, end.y),
                        (bx - uy * half, by + ux * half),
                        (bx + uy * half, by - ux * half),
                    ],
                    color,
                ));
            }
        }

        if !self.preview && self.style.endpoint_radius_px > 0.0 {
            let radius = self.style.endpoint_radius_px;
            frame
                .circles
                .push(CirclePrimitive::filled(start.x, start.y, radius, color));
            frame
                .circles
                .push(CirclePrimitive::filled(end.x, end.y, radius, color));
        }
        Ok(())
    }
}

impl SeriesPrimitive for LineMark {
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

    fn anchors(&self) -> SmallVec<[Anchor; 4]> {
        smallvec![self.start, self.end]
    }

    fn set_anchors(&mut self, anchors: &[Anchor]) -> bool {
        let &[start, end] = anchors else {
            return false;
        };
        self.start = start;
        self.end = end;
        self.attachment.request_update();
        true
    }

    fn is_preview(&self) -> bool {
        self.preview
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Geometry family of a [`ShapeMark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Two opposite corners.
    Rectangle,
    /// One anchor; only its price is used.
    HorizontalLine,
    /// One anchor; only its time is used.
    VerticalLine,
    /// Three vertices.
    Triangle,
}

impl ShapeKind {
    #[must_use]
    pub fn anchor_count(self) -> usize {
        match self {
            Self::HorizontalLine | Self::VerticalLine => 1,
            Self::Rectangle => 2,
            Self::Triangle => 3,
        }
    }
}

/// Filled or axis-spanning drawing geometry other than plain segments.
#[derive(Debug, Clone)]
pub struct ShapeMark {
    kind: ShapeKind,
    anchors: SmallVec<[Anchor; 4]>,
    style: DrawingStyleConfig,
    preview: bool,
    attachment: Attachment,
}

impl ShapeMark {
    pub fn new(kind: ShapeKind, anchors: &[Anchor], style: DrawingStyleConfig) -> OverlayResult<Self> {
        if anchors.len() != kind.anchor_count() {
            return Err(OverlayError::InvalidData(format!(
                "{kind:?} needs {} anchors, got {}",
                kind.anchor_count(),
                anchors.len()
            )));
        }
        validate_anchors(anchors)?;
        style.validate()?;
        Ok(Self {
            kind,
            anchors: SmallVec::from_slice(anchors),
            style,
            preview: false,
            attachment: Attachment::default(),
        })
    }

    #[must_use]
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    fn draw_axis_line(&self, frame: &mut RenderFrame, horizontal: bool) -> OverlayResult<()> {
        let host = self.attachment.host()?;
        let bridge = CoordinateBridge::new(&*host);
        let viewport = bridge.viewport();
        let anchor = self.anchors[0];
        let (color, stroke_style) = self.style.stroke(self.preview);
        let line = if horizontal {
            let y = resolved(bridge.price_to_pixel_y(anchor.price), "horizontal line price")?;
            LinePrimitive::new(0.0, y, viewport.width_px(), y, self.style.line_width_px, color)
        } else {
            let x = resolved(bridge.time_to_pixel_x(anchor.time), "vertical line time")?;
            LinePrimitive::new(x, 0.0, x, viewport.height_px(), self.style.line_width_px, color)
        };
        frame.lines.push(line.with_stroke_style(stroke_style));
        Ok(())
    }
}

impl PaneRenderer for ShapeMark {
    fn draw(&self, frame: &mut RenderFrame) -> OverlayResult<()> {
        match self.kind {
            ShapeKind::HorizontalLine => self.draw_axis_line(frame, true),
            ShapeKind::VerticalLine => self.draw_axis_line(frame, false),
            ShapeKind::Rectangle => {
                let a = anchor_pixel(&self.attachment, self.anchors[0])?;
                let b = anchor_pixel(&self.attachment, self.anchors[1])?;
                let (color, stroke_style) = self.style.stroke(self.preview);
                frame.rects.push(
                    RectPrimitive::from_corners(a.x, a.y, b.x, b.y, self.style.fill(self.preview))
                        .with_border(self.style.line_width_px, color, stroke_style),
                );
                Ok(())
            }
            ShapeKind::Triangle => {
                let mut points: SmallVec<[PixelPoint; 3]> = SmallVec::new();
                for anchor in &self.anchors {
                    points.push(anchor_pixel(&self.attachment, *anchor)?);
                }
                let (color, stroke_style) = self.style.stroke(self.preview);
                frame.polygons.push(PolygonPrimitive::new(
                    points.iter().map(|point| (point.x, point.y)),
                    self.style.fill(self.preview),
                ));
                for (index, from) in points.iter().enumerate() {
                    let to = points[(index + 1) % points.len()];
                    frame.lines.push(
                        LinePrimitive::new(from.x, from.y, to.x, to.y, self.style.line_width_px, color)
                            .with_stroke_style(stroke_style),
                    );
                }
                Ok(())
            }
        }
    }
}

impl SeriesPrimitive for ShapeMark {
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

    fn anchors(&self) -> SmallVec<[Anchor; 4]> {
        self.anchors.clone()
    }

    fn set_anchors(&mut self, anchors: &[Anchor]) -> bool {
        if anchors.len() != self.kind.anchor_count() {
            return false;
        }
        self.anchors = SmallVec::from_slice(anchors);
        self.attachment.request_update();
        true
    }

    fn is_preview(&self) -> bool {
        self.preview
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
