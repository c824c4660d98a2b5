use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::core::{Anchor, ChartHost};
use crate::error::OverlayResult;
use crate::extensions::danmaku::{DanmakuEngine, FrameScheduler};
use crate::extensions::{
    OverlayEvent, OverlayPlugin, PrimitiveId, PrimitiveLayer, RenderPassStats, SeriesPrimitive,
    StaticMarkBuilder, StaticMarkRecord, ToolRegistry,
};
use crate::interaction::{EventDispatcher, InteractiveMark, MarkContent, MarkStyle};
use crate::render::{RenderFrame, Renderer};

use super::{OverlayConfig, ToolDispatcher};

/// Main orchestration facade consumed by host applications.
///
/// `OverlayEngine` owns the primitive layer attached to one host chart, the
/// event dispatcher overlays subscribe to, the tool dispatcher and plugin
/// observers. The host drives it with raw input and asks it for a frame on
/// every repaint.
pub struct OverlayEngine<R: Renderer> {
    pub(super) renderer: R,
    pub(super) host: Rc<dyn ChartHost>,
    pub(super) config: OverlayConfig,
    pub(super) events: EventDispatcher,
    pub(super) layer: PrimitiveLayer,
    pub(super) tools: ToolDispatcher,
    pub(super) plugins: IndexMap<String, Box<dyn OverlayPlugin>>,
    pub(super) static_marks: StaticMarkBuilder,
    pub(super) last_stats: RenderPassStats,
}

impl<R: Renderer> OverlayEngine<R> {
    pub fn new(renderer: R, host: Rc<dyn ChartHost>, config: OverlayConfig) -> OverlayResult<Self> {
        config.validate()?;

        let events = EventDispatcher::new();
        let layer = PrimitiveLayer::new(&host, events.clone());
        let registry = if config.builtin_tools {
            ToolRegistry::with_builtin_tools()
        } else {
            ToolRegistry::new()
        };
        debug!(tools = registry.len(), "overlay engine created");

        Ok(Self {
            renderer,
            tools: ToolDispatcher::new(registry, config.drawing_style),
            static_marks: StaticMarkBuilder::new(config.static_marks.clone()),
            host,
            config,
            events,
            layer,
            plugins: IndexMap::new(),
            last_stats: RenderPassStats::default(),
        })
    }

    #[must_use]
    pub fn host(&self) -> &Rc<dyn ChartHost> {
        &self.host
    }

    #[must_use]
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Dispatcher overlays and callers subscribe to.
    #[must_use]
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    #[must_use]
    pub fn layer(&self) -> &PrimitiveLayer {
        &self.layer
    }

    pub fn layer_mut(&mut self) -> &mut PrimitiveLayer {
        &mut self.layer
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[must_use]
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.layer.len()
    }

    pub fn attach_primitive(&mut self, primitive: Box<dyn SeriesPrimitive>) -> OverlayResult<PrimitiveId> {
        let id = self.layer.attach_primitive(primitive)?;
        self.emit_overlay_event(OverlayEvent::PrimitiveAttached { id });
        Ok(id)
    }

    /// Detaches any primitive. Committed drawings also lose their record.
    pub fn detach_primitive(&mut self, id: PrimitiveId) -> Option<Box<dyn SeriesPrimitive>> {
        let primitive = self.layer.detach_primitive(id)?;
        let mut events = vec![OverlayEvent::PrimitiveDetached { id }];
        if let Some(record) = self.tools.take_annotation(id) {
            debug!(primitive_id = %id, tool_id = %record.tool_id, "annotation removed");
            events.push(OverlayEvent::AnnotationRemoved { id });
        }
        self.emit_overlay_events(events);
        Some(primitive)
    }

    /// Attaches an interactive mark using this engine's dispatcher.
    pub fn add_interactive_mark(&mut self, mark: InteractiveMark) -> OverlayResult<PrimitiveId> {
        self.attach_primitive(Box::new(mark))
    }

    /// Glyph mark using the engine's interactive-mark config.
    pub fn add_glyph_mark(
        &mut self,
        anchor: Anchor,
        glyph: impl Into<String>,
        style: MarkStyle,
    ) -> OverlayResult<PrimitiveId> {
        let mark = InteractiveMark::new(
            anchor,
            MarkContent::Glyph {
                glyph: glyph.into(),
            },
            style,
            self.config.interactive_mark,
        )?;
        self.add_interactive_mark(mark)
    }

    /// Groups raw static-mark records and attaches one primitive per group.
    pub fn add_static_marks(&mut self, records: &[StaticMarkRecord]) -> OverlayResult<Vec<PrimitiveId>> {
        let primitives = self.static_marks.build(records)?;
        let mut ids = Vec::with_capacity(primitives.len());
        for primitive in primitives {
            ids.push(self.attach_primitive(primitive)?);
        }
        Ok(ids)
    }

    /// Danmaku engine configured from this engine's config.
    ///
    /// The danmaku loop is independent of drawing state; the caller owns it.
    pub fn create_danmaku(&self, scheduler: Box<dyn FrameScheduler>) -> OverlayResult<DanmakuEngine> {
        DanmakuEngine::new(self.config.danmaku.clone(), scheduler)
    }

    /// Builds the overlay frame for the current host geometry.
    pub fn build_render_frame(&mut self) -> (RenderFrame, RenderPassStats) {
        let mut frame = RenderFrame::new(self.host.viewport());
        self.layer.update_all_views();
        let stats = self.layer.render(&mut frame);
        (frame, stats)
    }

    /// Renders one repaint. Per-primitive failures never abort the pass.
    pub fn render(&mut self) -> OverlayResult<RenderPassStats> {
        let (frame, stats) = self.build_render_frame();
        self.renderer.render(&frame)?;
        self.last_stats = stats;
        self.emit_overlay_event(OverlayEvent::Rendered { stats });
        Ok(stats)
    }

    #[must_use]
    pub fn last_render_stats(&self) -> RenderPassStats {
        self.last_stats
    }
}
