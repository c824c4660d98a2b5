//! Overlay primitives attached to the host chart.
//!
//! Everything here draws through [`PaneRenderer`] into a backend-agnostic
//! frame and reaches the host only through the coordinate bridge.

pub mod danmaku;
mod image;
mod line_marks;
mod plugins;
mod primitive;
mod static_marks;
mod tools;

pub use image::{ImageHandle, ImageLoadCallback, ImageState};
pub use line_marks::{DrawingStyleConfig, LineEnds, LineMark, ShapeKind, ShapeMark};
pub use plugins::{ModeExitReason, OverlayEvent, OverlayPlugin, PluginContext};
pub use primitive::{
    AttachContext, Attachment, PaneRenderer, PrimitiveId, PrimitiveLayer, RenderPassStats,
    SeriesPrimitive,
};
pub use static_marks::{
    MarkDirection, MultiArrowMark, MultiTextMark, StaticMarkBuilder, StaticMarkConfig,
    StaticMarkItem, StaticMarkKind, StaticMarkRecord, TextTag, TextTagStyle,
};
pub use tools::{AnnotationRecord, PrimitiveFactory, ToolRegistry, ToolSpec, tool_ids};
