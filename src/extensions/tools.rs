use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::Anchor;
use crate::error::{OverlayError, OverlayResult};
use crate::extensions::{
    DrawingStyleConfig, LineEnds, LineMark, PrimitiveId, SeriesPrimitive, ShapeKind, ShapeMark,
};

/// Built-in tool identifiers.
pub mod tool_ids {
    pub const LINE_SEGMENT: &str = "line-segment";
    pub const ARROW_LINE: &str = "arrow-line";
    pub const HORIZONTAL_LINE: &str = "horizontal-line";
    pub const VERTICAL_LINE: &str = "vertical-line";
    pub const RECTANGLE: &str = "rectangle";
    pub const TRIANGLE: &str = "triangle";
}

/// Builds a primitive from captured anchors.
pub type PrimitiveFactory =
    Rc<dyn Fn(&[Anchor], &DrawingStyleConfig) -> OverlayResult<Box<dyn SeriesPrimitive>>>;

/// Registry entry driving the generic drawing state machine.
///
/// The preview factory receives the collected anchors plus one trailing
/// anchor that follows the pointer; the finalize factory receives exactly
/// `required_points` anchors.
#[derive(Clone)]
pub struct ToolSpec {
    required_points: usize,
    preview: Option<PrimitiveFactory>,
    finalize: PrimitiveFactory,
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("required_points", &self.required_points)
            .field("has_preview", &self.preview.is_some())
            .finish()
    }
}

impl ToolSpec {
    pub fn new(
        required_points: usize,
        finalize: impl Fn(&[Anchor], &DrawingStyleConfig) -> OverlayResult<Box<dyn SeriesPrimitive>>
        + 'static,
    ) -> OverlayResult<Self> {
        if required_points == 0 {
            return Err(OverlayError::InvalidData(
                "tool must require at least one point".to_owned(),
            ));
        }
        Ok(Self {
            required_points,
            preview: None,
            finalize: Rc::new(finalize),
        })
    }

    #[must_use]
    pub fn with_preview(
        mut self,
        preview: impl Fn(&[Anchor], &DrawingStyleConfig) -> OverlayResult<Box<dyn SeriesPrimitive>>
        + 'static,
    ) -> Self {
        self.preview = Some(Rc::new(preview));
        self
    }

    #[must_use]
    pub fn required_points(&self) -> usize {
        self.required_points
    }

    #[must_use]
    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn build_preview(
        &self,
        anchors: &[Anchor],
        style: &DrawingStyleConfig,
    ) -> Option<OverlayResult<Box<dyn SeriesPrimitive>>> {
        self.preview.as_ref().map(|factory| factory(anchors, style))
    }

    pub fn finalize(
        &self,
        anchors: &[Anchor],
        style: &DrawingStyleConfig,
    ) -> OverlayResult<Box<dyn SeriesPrimitive>> {
        if anchors.len() != self.required_points {
            return Err(OverlayError::InvalidData(format!(
                "tool needs {} points, got {}",
                self.required_points,
                anchors.len()
            )));
        }
        (self.finalize)(anchors, style)
    }
}

fn segment(
    anchors: &[Anchor],
    style: &DrawingStyleConfig,
    ends: LineEnds,
    preview: bool,
) -> OverlayResult<Box<dyn SeriesPrimitive>> {
    let (Some(first), Some(last)) = (anchors.first(), anchors.last()) else {
        return Err(OverlayError::InvalidData("line needs two anchors".to_owned()));
    };
    Ok(Box::new(
        LineMark::new(*first, *last, *style)?
            .with_ends(ends)
            .with_preview(preview),
    ))
}

fn shape(
    kind: ShapeKind,
    anchors: &[Anchor],
    style: &DrawingStyleConfig,
    preview: bool,
) -> OverlayResult<Box<dyn SeriesPrimitive>> {
    Ok(Box::new(ShapeMark::new(kind, anchors, *style)?.with_preview(preview)))
}

/// A committed drawing, as reported to callers for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: PrimitiveId,
    pub tool_id: String,
    pub anchors: Vec<Anchor>,
}

/// Tool identifier → [`ToolSpec`], in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolSpec>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the line, arrow, axis-line, rectangle and
    /// triangle tools.
    #[must_use]
    pub fn with_builtin_tools() -> Self {
        let mut tools = IndexMap::new();
        let mut insert = |id: &str, spec: ToolSpec| {
            tools.insert(id.to_owned(), spec);
        };

        insert(
            tool_ids::LINE_SEGMENT,
            two_point(|anchors, style, preview| segment(anchors, style, LineEnds::Plain, preview)),
        );
        insert(
            tool_ids::ARROW_LINE,
            two_point(|anchors, style, preview| segment(anchors, style, LineEnds::Arrow, preview)),
        );
        insert(
            tool_ids::RECTANGLE,
            two_point(|anchors, style, preview| shape(ShapeKind::Rectangle, anchors, style, preview)),
        );
        insert(
            tool_ids::HORIZONTAL_LINE,
            one_point(|anchors, style| shape(ShapeKind::HorizontalLine, anchors, style, false)),
        );
        insert(
            tool_ids::VERTICAL_LINE,
            one_point(|anchors, style| shape(ShapeKind::VerticalLine, anchors, style, false)),
        );
        insert(
            tool_ids::TRIANGLE,
            ToolSpec {
                required_points: 3,
                preview: Some(Rc::new(|anchors: &[Anchor], style: &DrawingStyleConfig| {
                    if anchors.len() == 3 {
                        shape(ShapeKind::Triangle, anchors, style, true)
                    } else {
                        segment(anchors, style, LineEnds::Plain, true)
                    }
                })),
                finalize: Rc::new(|anchors: &[Anchor], style: &DrawingStyleConfig| {
                    shape(ShapeKind::Triangle, anchors, style, false)
                }),
            },
        );

        Self { tools }
    }

    /// Adds a tool. Ids must be non-empty and unique.
    pub fn register(&mut self, id: impl Into<String>, spec: ToolSpec) -> OverlayResult<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(OverlayError::InvalidData(
                "tool id must not be empty".to_owned(),
            ));
        }
        if self.tools.contains_key(&id) {
            return Err(OverlayError::InvalidData(format!(
                "tool with id `{id}` is already registered"
            )));
        }
        debug!(tool_id = %id, required_points = spec.required_points, "tool registered");
        self.tools.insert(id, spec);
        Ok(())
    }

    /// Removes a tool. Returns `true` when removed.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.tools.shift_remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> OverlayResult<&ToolSpec> {
        self.tools
            .get(id)
            .ok_or_else(|| OverlayError::UnknownTool(id.to_owned()))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn two_point(
    build: impl Fn(&[Anchor], &DrawingStyleConfig, bool) -> OverlayResult<Box<dyn SeriesPrimitive>>
    + 'static,
) -> ToolSpec {
    let build = Rc::new(build);
    let preview = Rc::clone(&build);
    ToolSpec {
        required_points: 2,
        preview: Some(Rc::new(move |anchors: &[Anchor], style: &DrawingStyleConfig| {
            preview(anchors, style, true)
        })),
        finalize: Rc::new(move |anchors: &[Anchor], style: &DrawingStyleConfig| {
            build(anchors, style, false)
        }),
    }
}

fn one_point(
    build: impl Fn(&[Anchor], &DrawingStyleConfig) -> OverlayResult<Box<dyn SeriesPrimitive>>
    + 'static,
) -> ToolSpec {
    ToolSpec {
        required_points: 1,
        preview: None,
        finalize: Rc::new(build),
    }
}
