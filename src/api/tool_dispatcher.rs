use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::{ChartHost, PixelPoint};
use crate::error::OverlayResult;
use crate::extensions::{
    AnnotationRecord, DrawingStyleConfig, ModeExitReason, OverlayEvent, PrimitiveId,
    PrimitiveLayer, ToolRegistry, ToolSpec,
};
use crate::interaction::{DrawingState, DrawingStateMachine, DrawingStep, Key};
use crate::render::Renderer;

use super::OverlayEngine;

/// Tool state exposed upward for UI highlighting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolStateSnapshot {
    pub active_tool: Option<String>,
    pub state: DrawingState,
    pub collected_points: usize,
    pub required_points: Option<usize>,
    pub has_preview: bool,
}

/// Routes a selected tool id to its registry entry and drives the shared
/// drawing state machine. Keeps the records of committed drawings.
#[derive(Debug)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    machine: DrawingStateMachine,
    style: DrawingStyleConfig,
    annotations: IndexMap<PrimitiveId, AnnotationRecord>,
}

impl ToolDispatcher {
    #[must_use]
    pub fn new(registry: ToolRegistry, style: DrawingStyleConfig) -> Self {
        Self {
            registry,
            machine: DrawingStateMachine::new(),
            style,
            annotations: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub fn style(&self) -> &DrawingStyleConfig {
        &self.style
    }

    #[must_use]
    pub fn state(&self) -> DrawingState {
        self.machine.state()
    }

    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.machine.state().is_capturing()
    }

    #[must_use]
    pub fn snapshot(&self) -> ToolStateSnapshot {
        let active_tool = self.machine.active_tool().map(str::to_owned);
        let required_points = self
            .machine
            .active_tool()
            .and_then(|id| self.registry.get(id).ok())
            .map(ToolSpec::required_points);
        ToolStateSnapshot {
            active_tool,
            state: self.machine.state(),
            collected_points: self.machine.collected_points().len(),
            required_points,
            has_preview: self.machine.preview_id().is_some(),
        }
    }

    /// Enters capture for `tool_id`. Emits exit for a replaced session first.
    fn enter_mode(
        &mut self,
        tool_id: &str,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> OverlayResult<Vec<OverlayEvent>> {
        let spec = self.registry.get(tool_id)?.clone();
        let mut events = Vec::with_capacity(2);
        if let Some(replaced) = self.machine.enter_mode(tool_id, spec, self.style, host, layer) {
            events.push(OverlayEvent::ModeExited {
                tool_id: replaced,
                reason: ModeExitReason::Replaced,
            });
        }
        events.push(OverlayEvent::ModeEntered {
            tool_id: tool_id.to_owned(),
        });
        Ok(events)
    }

    fn finish_step(&mut self, tool_id: Option<String>, step: &DrawingStep) -> Vec<OverlayEvent> {
        let Some(tool_id) = tool_id else {
            return Vec::new();
        };
        match step {
            DrawingStep::Committed(record) => {
                self.annotations.insert(record.id, record.clone());
                vec![
                    OverlayEvent::AnnotationCommitted(record.clone()),
                    OverlayEvent::PrimitiveAttached { id: record.id },
                    OverlayEvent::ModeExited {
                        tool_id,
                        reason: ModeExitReason::Committed,
                    },
                ]
            }
            DrawingStep::Cancelled(_) => vec![OverlayEvent::ModeExited {
                tool_id,
                reason: ModeExitReason::Cancelled,
            }],
            DrawingStep::Ignored | DrawingStep::Advanced(_) | DrawingStep::PreviewUpdated => {
                Vec::new()
            }
        }
    }

    pub(super) fn take_annotation(&mut self, id: PrimitiveId) -> Option<AnnotationRecord> {
        self.annotations.shift_remove(&id)
    }

    fn on_pointer_down(
        &mut self,
        point: PixelPoint,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> (DrawingStep, Vec<OverlayEvent>) {
        let tool_id = self.machine.active_tool().map(str::to_owned);
        let step = self.machine.on_pointer_down(point, host, layer);
        let events = self.finish_step(tool_id, &step);
        (step, events)
    }

    fn on_pointer_move(
        &mut self,
        point: PixelPoint,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> (DrawingStep, Vec<OverlayEvent>) {
        let tool_id = self.machine.active_tool().map(str::to_owned);
        let step = self.machine.on_pointer_move(point, host, layer);
        let events = self.finish_step(tool_id, &step);
        (step, events)
    }

    fn on_key(
        &mut self,
        key: Key,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> (DrawingStep, Vec<OverlayEvent>) {
        let tool_id = self.machine.active_tool().map(str::to_owned);
        let step = self.machine.on_key(key, host, layer);
        let events = self.finish_step(tool_id, &step);
        (step, events)
    }

    fn cancel(
        &mut self,
        host: &dyn ChartHost,
        layer: &mut PrimitiveLayer,
    ) -> (DrawingStep, Vec<OverlayEvent>) {
        let tool_id = self.machine.active_tool().map(str::to_owned);
        let step = self.machine.cancel("mode cancelled", host, layer);
        let events = self.finish_step(tool_id, &step);
        (step, events)
    }
}

impl<R: Renderer> OverlayEngine<R> {
    /// Activates a drawing tool. Any running session is replaced.
    pub fn enter_mode(&mut self, tool_id: &str) -> OverlayResult<()> {
        let events = self
            .tools
            .enter_mode(tool_id, &*self.host, &mut self.layer)?;
        self.emit_overlay_events(events);
        Ok(())
    }

    /// Leaves the current drawing mode. Returns `false` when already idle.
    pub fn cancel_mode(&mut self) -> bool {
        let (step, events) = self.tools.cancel(&*self.host, &mut self.layer);
        self.emit_overlay_events(events);
        step.exits_mode()
    }

    #[must_use]
    pub fn active_state(&self) -> ToolStateSnapshot {
        self.tools.snapshot()
    }

    #[must_use]
    pub fn drawing_state(&self) -> DrawingState {
        self.tools.state()
    }

    pub fn register_tool(&mut self, tool_id: impl Into<String>, spec: ToolSpec) -> OverlayResult<()> {
        self.tools.registry.register(tool_id, spec)
    }

    /// Removes a tool. Cancels the session first when it is the active tool.
    pub fn unregister_tool(&mut self, tool_id: &str) -> bool {
        if self.tools.machine.active_tool() == Some(tool_id) {
            self.cancel_mode();
        }
        self.tools.registry.unregister(tool_id)
    }

    #[must_use]
    pub fn tool_ids(&self) -> Vec<String> {
        self.tools.registry.ids().map(str::to_owned).collect()
    }

    pub fn set_drawing_style(&mut self, style: DrawingStyleConfig) -> OverlayResult<()> {
        style.validate()?;
        self.tools.style = style;
        Ok(())
    }

    /// Committed drawings in commit order.
    pub fn annotations(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.tools.annotations.values()
    }

    #[must_use]
    pub fn annotation_count(&self) -> usize {
        self.tools.annotations.len()
    }

    /// Detaches a committed drawing. Returns its record when it existed.
    pub fn remove_annotation(&mut self, id: PrimitiveId) -> Option<AnnotationRecord> {
        let record = self.tools.annotations.get(&id).cloned()?;
        self.detach_primitive(id);
        Some(record)
    }

    pub(super) fn drawing_pointer_down(&mut self, point: PixelPoint) -> DrawingStep {
        let (step, events) = self
            .tools
            .on_pointer_down(point, &*self.host, &mut self.layer);
        self.emit_overlay_events(events);
        step
    }

    pub(super) fn drawing_pointer_move(&mut self, point: PixelPoint) -> DrawingStep {
        let (step, events) = self
            .tools
            .on_pointer_move(point, &*self.host, &mut self.layer);
        self.emit_overlay_events(events);
        step
    }

    pub(super) fn drawing_key(&mut self, key: Key) -> DrawingStep {
        let (step, events) = self.tools.on_key(key, &*self.host, &mut self.layer);
        self.emit_overlay_events(events);
        step
    }
}
