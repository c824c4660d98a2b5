use crate::core::Viewport;
use crate::error::{OverlayError, OverlayResult};
use crate::render::{
    CirclePrimitive, ImagePrimitive, LinePrimitive, PolygonPrimitive, RectPrimitive, TextPrimitive,
};

/// Backend-agnostic scene for one overlay draw pass.
///
/// Primitives are painted per kind in field order: rects, polygons, lines,
/// circles, images, then texts.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub viewport: Viewport,
    pub rects: Vec<RectPrimitive>,
    pub polygons: Vec<PolygonPrimitive>,
    pub lines: Vec<LinePrimitive>,
    pub circles: Vec<CirclePrimitive>,
    pub images: Vec<ImagePrimitive>,
    pub texts: Vec<TextPrimitive>,
}

impl RenderFrame {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            rects: Vec::new(),
            polygons: Vec::new(),
            lines: Vec::new(),
            circles: Vec::new(),
            images: Vec::new(),
            texts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_line(mut self, line: LinePrimitive) -> Self {
        self.lines.push(line);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: TextPrimitive) -> Self {
        self.texts.push(text);
        self
    }

    #[must_use]
    pub fn with_rect(mut self, rect: RectPrimitive) -> Self {
        self.rects.push(rect);
        self
    }

    /// Moves every primitive of `other` into `self`, keeping per-kind order.
    pub fn append(&mut self, other: &mut Self) {
        self.rects.append(&mut other.rects);
        self.polygons.append(&mut other.polygons);
        self.lines.append(&mut other.lines);
        self.circles.append(&mut other.circles);
        self.images.append(&mut other.images);
        self.texts.append(&mut other.texts);
    }

    /// Drops all primitives but keeps allocations for reuse.
    pub fn clear(&mut self) {
        self.rects.clear();
        self.polygons.clear();
        self.lines.clear();
        self.circles.clear();
        self.images.clear();
        self.texts.clear();
    }

    pub fn validate(&self) -> OverlayResult<()> {
        if !self.viewport.is_valid() {
            return Err(OverlayError::InvalidViewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }

        for rect in &self.rects {
            rect.validate()?;
        }
        for polygon in &self.polygons {
            polygon.validate()?;
        }
        for line in &self.lines {
            line.validate()?;
        }
        for circle in &self.circles {
            circle.validate()?;
        }
        for image in &self.images {
            image.validate()?;
        }
        for text in &self.texts {
            text.validate()?;
        }

        Ok(())
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.rects.len()
            + self.polygons.len()
            + self.lines.len()
            + self.circles.len()
            + self.images.len()
            + self.texts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitive_count() == 0
    }
}
