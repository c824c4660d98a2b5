use crate::extensions::{OverlayEvent, PluginContext};
use crate::render::Renderer;

use super::OverlayEngine;

impl<R: Renderer> OverlayEngine<R> {
    pub(super) fn plugin_context(&self) -> PluginContext {
        PluginContext {
            viewport: self.host.viewport(),
            primitive_count: self.layer.len(),
            annotation_count: self.annotation_count(),
            drawing_state: self.drawing_state(),
            gestures: self.host.gesture_gate().effective(),
        }
    }

    pub(super) fn emit_overlay_event(&mut self, event: OverlayEvent) {
        if self.plugins.is_empty() {
            return;
        }
        let context = self.plugin_context();
        for plugin in self.plugins.values_mut() {
            plugin.on_event(&event, context);
        }
    }

    pub(super) fn emit_overlay_events(&mut self, events: Vec<OverlayEvent>) {
        for event in events {
            self.emit_overlay_event(event);
        }
    }
}
