use serde::{Deserialize, Serialize};

use crate::core::{NativeGestures, Viewport};
use crate::extensions::{AnnotationRecord, PrimitiveId, RenderPassStats};
use crate::interaction::DrawingState;

/// Read-only state snapshot passed to plugin hooks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PluginContext {
    pub viewport: Viewport,
    pub primitive_count: usize,
    pub annotation_count: usize,
    pub drawing_state: DrawingState,
    pub gestures: NativeGestures,
}

/// Why a drawing mode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeExitReason {
    Committed,
    /// Escape, `cancel_mode`, or an internal error.
    Cancelled,
    /// Another tool was selected while capturing.
    Replaced,
}

/// Event stream exposed to plugins.
///
/// `AnnotationCommitted` / `AnnotationRemoved` are the add/remove callbacks
/// callers use to persist drawings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OverlayEvent {
    ModeEntered { tool_id: String },
    ModeExited { tool_id: String, reason: ModeExitReason },
    AnnotationCommitted(AnnotationRecord),
    AnnotationRemoved { id: PrimitiveId },
    PrimitiveAttached { id: PrimitiveId },
    PrimitiveDetached { id: PrimitiveId },
    Rendered { stats: RenderPassStats },
}

/// Extension hook interface for bounded custom logic.
///
/// Plugins observe events and read engine context without mutating overlay
/// internals directly.
pub trait OverlayPlugin {
    fn id(&self) -> &str;
    fn on_event(&mut self, event: &OverlayEvent, context: PluginContext);
}
