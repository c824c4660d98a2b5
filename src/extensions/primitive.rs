use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::core::{Anchor, ChartHost};
use crate::error::{OverlayError, OverlayResult};
use crate::interaction::EventDispatcher;
use crate::render::RenderFrame;

/// Identity of a primitive inside one [`PrimitiveLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimitiveId(u64);

impl PrimitiveId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a primitive receives on attach.
///
/// The host reference is non-owning: a primitive never keeps the chart alive
/// and must treat a dropped host as "not ready".
#[derive(Clone)]
pub struct AttachContext {
    host: Weak<dyn ChartHost>,
    events: EventDispatcher,
    primitive_id: PrimitiveId,
}

impl fmt::Debug for AttachContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachContext")
            .field("primitive_id", &self.primitive_id)
            .field("host_alive", &(self.host.strong_count() > 0))
            .finish()
    }
}

impl AttachContext {
    #[must_use]
    pub fn new(host: Weak<dyn ChartHost>, events: EventDispatcher, primitive_id: PrimitiveId) -> Self {
        Self {
            host,
            events,
            primitive_id,
        }
    }

    #[must_use]
    pub fn host(&self) -> Option<Rc<dyn ChartHost>> {
        self.host.upgrade()
    }

    #[must_use]
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    #[must_use]
    pub fn primitive_id(&self) -> PrimitiveId {
        self.primitive_id
    }

    pub fn request_update(&self) {
        if let Some(host) = self.host() {
            host.request_update();
        }
    }
}

/// Attach-once slot embedded in every primitive.
#[derive(Debug, Default, Clone)]
pub struct Attachment {
    context: Option<AttachContext>,
}

impl Attachment {
    pub fn attach(&mut self, context: AttachContext) -> OverlayResult<()> {
        if let Some(existing) = &self.context {
            return Err(OverlayError::InvalidData(format!(
                "primitive is already attached as {}",
                existing.primitive_id
            )));
        }
        self.context = Some(context);
        Ok(())
    }

    pub fn detach(&mut self) -> Option<AttachContext> {
        self.context.take()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self) -> OverlayResult<&AttachContext> {
        self.context.as_ref().ok_or(OverlayError::AttachmentNotReady)
    }

    /// Live host handle, or `AttachmentNotReady` when unattached or torn down.
    pub fn host(&self) -> OverlayResult<Rc<dyn ChartHost>> {
        self.context()?
            .host()
            .ok_or(OverlayError::AttachmentNotReady)
    }

    pub fn request_update(&self) {
        if let Some(context) = &self.context {
            context.request_update();
        }
    }
}

/// One drawable view of a primitive (the host's `renderer().draw(target)`).
pub trait PaneRenderer {
    /// Appends draw commands for the current frame.
    ///
    /// `Err` means "draw nothing for this primitive this frame"; partial
    /// output is discarded by the layer.
    fn draw(&self, frame: &mut RenderFrame) -> OverlayResult<()>;
}

/// Lifecycle contract every overlay implements.
///
/// `attached` runs exactly once before the first render pass and `detached`
/// guarantees no further passes. Views must tolerate an unready context by
/// returning a frame-skip error.
pub trait SeriesPrimitive: Any {
    fn attached(&mut self, context: AttachContext) -> OverlayResult<()>;
    fn detached(&mut self);

    fn update_all_views(&mut self) {}

    fn pane_views(&self) -> SmallVec<[&dyn PaneRenderer; 2]>;

    fn anchors(&self) -> SmallVec<[Anchor; 4]> {
        SmallVec::new()
    }

    /// Replaces anchors in place. Returns `false` when the primitive has no
    /// editable anchors or `anchors` has the wrong arity.
    fn set_anchors(&mut self, _anchors: &[Anchor]) -> bool {
        false
    }

    fn is_preview(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Per-pass counters returned by [`PrimitiveLayer::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderPassStats {
    pub drawn: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Owns attached primitives in attach order and runs the render pass.
///
/// Ownership enforces "attached to at most one layer": detaching hands the
/// box back to the caller.
pub struct PrimitiveLayer {
    host: Weak<dyn ChartHost>,
    events: EventDispatcher,
    next_id: u64,
    primitives: IndexMap<PrimitiveId, Box<dyn SeriesPrimitive>>,
    scratch: RenderFrame,
}

impl fmt::Debug for PrimitiveLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveLayer")
            .field("primitives", &self.primitives.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PrimitiveLayer {
    #[must_use]
    pub fn new(host: &Rc<dyn ChartHost>, events: EventDispatcher) -> Self {
        Self {
            host: Rc::downgrade(host),
            scratch: RenderFrame::new(host.viewport()),
            events,
            next_id: 0,
            primitives: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn attach_primitive(
        &mut self,
        mut primitive: Box<dyn SeriesPrimitive>,
    ) -> OverlayResult<PrimitiveId> {
        let host = self.host.upgrade().ok_or(OverlayError::AttachmentNotReady)?;
        self.next_id += 1;
        let id = PrimitiveId(self.next_id);
        primitive.attached(AttachContext::new(
            self.host.clone(),
            self.events.clone(),
            id,
        ))?;
        self.primitives.insert(id, primitive);
        debug!(primitive_id = %id, "primitive attached");
        host.request_update();
        Ok(id)
    }

    /// Detaches and returns the primitive; `None` when `id` is unknown.
    pub fn detach_primitive(&mut self, id: PrimitiveId) -> Option<Box<dyn SeriesPrimitive>> {
        let mut primitive = self.primitives.shift_remove(&id)?;
        primitive.detached();
        debug!(primitive_id = %id, "primitive detached");
        if let Some(host) = self.host.upgrade() {
            host.request_update();
        }
        Some(primitive)
    }

    #[must_use]
    pub fn contains(&self, id: PrimitiveId) -> bool {
        self.primitives.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: PrimitiveId) -> Option<&dyn SeriesPrimitive> {
        self.primitives.get(&id).map(AsRef::as_ref)
    }

    pub fn get_mut(&mut self, id: PrimitiveId) -> Option<&mut (dyn SeriesPrimitive + 'static)> {
        self.primitives.get_mut(&id).map(AsMut::as_mut)
    }

    #[must_use]
    pub fn downcast_ref<T: SeriesPrimitive>(&self, id: PrimitiveId) -> Option<&T> {
        self.get(id)?.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: SeriesPrimitive>(&mut self, id: PrimitiveId) -> Option<&mut T> {
        self.get_mut(id)?.as_any_mut().downcast_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PrimitiveId> + '_ {
        self.primitives.keys().copied()
    }

    #[must_use]
    pub fn preview_count(&self) -> usize {
        self.primitives
            .values()
            .filter(|primitive| primitive.is_preview())
            .count()
    }

    pub fn update_all_views(&mut self) {
        for primitive in self.primitives.values_mut() {
            primitive.update_all_views();
        }
    }

    /// Draws every primitive into `frame` in attach order.
    ///
    /// Each primitive renders into a scratch frame first; its output is
    /// merged only when every view succeeded, so a failing primitive draws
    /// nothing and never stops its siblings.
    pub fn render(&mut self, frame: &mut RenderFrame) -> RenderPassStats {
        let mut stats = RenderPassStats::default();
        self.scratch.viewport = frame.viewport;

        for (id, primitive) in &self.primitives {
            self.scratch.clear();
            let result = primitive
                .pane_views()
                .iter()
                .try_for_each(|view| view.draw(&mut self.scratch));
            match result {
                Ok(()) => {
                    frame.append(&mut self.scratch);
                    stats.drawn += 1;
                }
                Err(err) if err.is_frame_skip() => {
                    trace!(primitive_id = %id, error = %err, "primitive skipped this frame");
                    stats.skipped += 1;
                }
                Err(err) => {
                    warn!(primitive_id = %id, error = %err, "primitive draw failed");
                    stats.failed += 1;
                }
            }
        }
        stats
    }

    /// Detaches everything, in attach order.
    pub fn clear(&mut self) {
        let ids: Vec<PrimitiveId> = self.ids().collect();
        for id in ids {
            self.detach_primitive(id);
        }
    }
}

impl Drop for PrimitiveLayer {
    fn drop(&mut self) {
        for (_, mut primitive) in self.primitives.drain(..) {
            primitive.detached();
        }
    }
}
