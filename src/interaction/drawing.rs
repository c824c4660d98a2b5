use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::core::{Anchor, ChartHost, CoordinateBridge, GestureHolder, PixelPoint};
use crate::error::{OverlayError, OverlayResult};
use crate::extensions::{
    AnnotationRecord, DrawingStyleConfig, PrimitiveId, PrimitiveLayer, ToolSpec,
};
use crate::interaction::Key;

/// Capture progress of the drawing state machine.
///
/// `AwaitingPoint(k)` means `k - 1` points are already committed and the
/// next click supplies point `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawingState {
    #[default]
    Idle,
    AwaitingPoint(usize),
}

impl DrawingState {
    #[must_use]
    pub fn is_capturing(self) -> bool {
        matches!(self, Self::AwaitingPoint(_))
    }
}

/// Result of feeding one input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawingStep {
    /// Not capturing, or the input could not be converted.
    Ignored,
    Advanced(DrawingState),
    PreviewUpdated,
    Committed(AnnotationRecord),
    Cancelled(OverlayError),
}

impl DrawingStep {
    /// `true` when the session ended, whether committed or cancelled.
    #[must_use]
    pub fn exits_mode(&self) -> bool {
        matches!(self, Self::Committed(_) | Self::Cancelled(_))
    }
}

#[derive(Debug)]
struct DrawingSession {
    tool_id: String,
    spec: ToolSpec,
    style: DrawingStyleConfig,
    points: SmallVec<[Anchor; 4]>,
    preview: Option<PrimitiveId>,
}

impl DrawingSession {
    fn state(&self) -> DrawingState {
        DrawingState::AwaitingPoint(self.points.len() + 1)
    }

    /// Collected points plus a trailing anchor that follows the pointer.
    fn preview_anchors(&self, trailing: Anchor) -> SmallVec<[Anchor; 4]> {
        let mut anchors = self.points.clone();
        anchors.push(trailing);
        anchors
    }
}

/// Turns a bounded sequence of clicks into one committed primitive.
///
/// One generic machine serves every tool; per-tool geometry comes from the
/// [`ToolSpec`] factories. While a session is active the machine holds a
/// gesture holder so clicks are not taken as native pans.
#[derive(Debug, Default)]
pub struct DrawingStateMachine {
    session: Option<DrawingSession>,
    holder: Option<GestureHolder>,
}

impl DrawingStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> DrawingState {
        self.session
            .as_ref()
            .map_or(DrawingState::Idle, DrawingSession::state)
    }

    #[must_use]
    pub fn active_tool(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.tool_id.as_str())
    }

    #[must_use]
    pub fn collected_points(&self) -> &[Anchor] {
        self.session
            .as_ref()
            .map_or(&[][..], |session| session.points.as_slice())
    }

    #[must_use]
    pub fn preview_id(&self) -> Option<PrimitiveId> {
        self.session.as_ref().and_then(|session| session.preview)
    }

    /// Starts capturing for `tool_id`, discarding any running session.
    ///
    /// Returns the id of the tool that was replaced, if any.
    pub fn enter_mode(
        &mut self,
        tool_id: impl Into<String>,
        spec: ToolSpec,
        style: DrawingStyleConfig,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> Option<String> {
        let replaced = self.end_session(host, layer).map(|session| session.tool_id);
        let tool_id = tool_id.into();
        debug!(tool_id = %tool_id, required_points = spec.required_points(), "drawing mode entered");

        let holder = *self
            .holder
            .get_or_insert_with(|| host.gesture_gate().register_holder());
        host.gesture_gate().suppress(holder);

        self.session = Some(DrawingSession {
            tool_id,
            spec,
            style,
            points: SmallVec::new(),
            preview: None,
        });
        replaced
    }

    /// Aborts the running session. Returns [`DrawingStep::Ignored`] when idle.
    pub fn cancel(
        &mut self,
        reason: &str,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> DrawingStep {
        match self.end_session(host, layer) {
            Some(session) => {
                debug!(tool_id = %session.tool_id, reason, "drawing session cancelled");
                DrawingStep::Cancelled(OverlayError::SessionCancelled {
                    reason: reason.to_owned(),
                })
            }
            None => DrawingStep::Ignored,
        }
    }

    pub fn on_pointer_down(
        &mut self,
        point: PixelPoint,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> DrawingStep {
        let Some(session) = self.session.as_mut() else {
            return DrawingStep::Ignored;
        };
        let Some(anchor) = CoordinateBridge::new(host).pixel_to_anchor(point) else {
            trace!(x = point.x, y = point.y, "click outside visible range ignored");
            return DrawingStep::Ignored;
        };
        session.points.push(anchor);

        let result = if session.points.len() < session.spec.required_points() {
            Self::sync_preview(session, anchor, layer).map(|()| DrawingStep::Advanced(session.state()))
        } else {
            self.commit(host, layer).map(DrawingStep::Committed)
        };
        result.unwrap_or_else(|err| self.abort(err, host, layer))
    }

    /// Moves the preview's trailing anchor to the pointer. Never commits.
    pub fn on_pointer_move(
        &mut self,
        point: PixelPoint,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> DrawingStep {
        let Some(session) = self.session.as_mut() else {
            return DrawingStep::Ignored;
        };
        if session.points.is_empty() || !session.spec.has_preview() {
            return DrawingStep::Ignored;
        }
        let Some(anchor) = CoordinateBridge::new(host).pixel_to_anchor(point) else {
            return DrawingStep::Ignored;
        };
        match Self::sync_preview(session, anchor, layer) {
            Ok(()) => {
                host.request_update();
                DrawingStep::PreviewUpdated
            }
            Err(err) => self.abort(err, host, layer),
        }
    }

    pub fn on_key(
        &mut self,
        key: Key,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> DrawingStep {
        match key {
            Key::Escape => self.cancel("escape pressed", host, layer),
            _ => DrawingStep::Ignored,
        }
    }

    /// Updates the preview in place or rebuilds it when the arity changed.
    fn sync_preview(
        session: &mut DrawingSession,
        trailing: Anchor,
        layer: &mut PrimitiveLayer,
    ) -> OverlayResult<()> {
        let anchors = session.preview_anchors(trailing);
        if let Some(id) = session.preview {
            let updated = layer
                .get_mut(id)
                .is_some_and(|preview| preview.set_anchors(&anchors));
            if updated {
                return Ok(());
            }
            layer.detach_primitive(id);
            session.preview = None;
        }
        let Some(preview) = session.spec.build_preview(&anchors, &session.style) else {
            return Ok(());
        };
        session.preview = Some(layer.attach_primitive(preview?)?);
        Ok(())
    }

    fn commit(
        &mut self,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> OverlayResult<AnnotationRecord> {
        let Some(session) = self.end_session(host, layer) else {
            return Err(OverlayError::SessionCancelled {
                reason: "no active session".to_owned(),
            });
        };
        let primitive = session.spec.finalize(&session.points, &session.style)?;
        let id = layer.attach_primitive(primitive)?;
        debug!(tool_id = %session.tool_id, primitive_id = %id, "drawing committed");
        Ok(AnnotationRecord {
            id,
            tool_id: session.tool_id,
            anchors: session.points.into_vec(),
        })
    }

    fn abort(
        &mut self,
        err: OverlayError,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> DrawingStep {
        warn!(error = %err, "drawing session aborted");
        self.end_session(host, layer);
        DrawingStep::Cancelled(OverlayError::SessionCancelled {
            reason: err.to_string(),
        })
    }

    /// Detaches the preview, releases the gesture holder and returns to idle.
    fn end_session(
        &mut self,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> Option<DrawingSession> {
        let mut session = self.session.take()?;
        if let Some(id) = session.preview.take() {
            layer.detach_primitive(id);
        }
        if let Some(holder) = self.holder {
            host.gesture_gate().release(holder);
        }
        host.request_update();
        Some(session)
    }
}
