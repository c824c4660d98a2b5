mod frame;
mod null_renderer;
mod primitives;
mod text;

pub use frame::RenderFrame;
pub use null_renderer::NullRenderer;
pub use primitives::{
    CirclePrimitive, Color, ImagePrimitive, LinePrimitive, LineStrokeStyle, PolygonPrimitive,
    RectPrimitive, TextHAlign, TextPrimitive, TextShadow, TextVAlign,
};
pub use text::{EstimatedTextMeasurer, TextMeasurer};

use crate::error::OverlayResult;

/// Contract implemented by any rendering backend.
///
/// Backends receive a fully materialized `RenderFrame` so drawing code stays
/// isolated from anchors, hosts and interaction state.
pub trait Renderer {
    fn render(&mut self, frame: &RenderFrame) -> OverlayResult<()>;
}

#[cfg(feature = "cairo-backend")]
mod cairo_backend;
#[cfg(feature = "cairo-backend")]
pub use cairo_backend::{CairoContextRenderer, CairoRenderStats, CairoRenderer, PangoTextMeasurer};
