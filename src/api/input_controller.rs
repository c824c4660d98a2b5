use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::{Anchor, CoordinateBridge, NativeInput, PixelPoint};
use crate::interaction::{
    DrawingStep, EventKind, EventScope, InputEvent, Key, Phase, PointerButton, Propagation,
    Subscription,
};
use crate::render::Renderer;

use super::OverlayEngine;

/// Which layer consumed an input.
///
/// Routing order is overlay listeners (capture phase first), then the active
/// drawing session, then the host's native pan/zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputDisposition {
    Overlay,
    Drawing,
    Native,
    Unhandled,
}

/// Payload handed to click subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEvent {
    pub point: PixelPoint,
    /// `None` when the click is outside the visible range.
    pub anchor: Option<Anchor>,
}

impl<R: Renderer> OverlayEngine<R> {
    /// Routes one raw input event.
    pub fn handle_input(&mut self, event: InputEvent) -> InputDisposition {
        match event {
            InputEvent::PointerDown { x, y, button } => self.pointer_down(x, y, button),
            InputEvent::PointerMove { x, y } => self.pointer_move(x, y),
            InputEvent::PointerUp { x, y, button } => self.pointer_up(x, y, button),
            InputEvent::Wheel { x, y, delta_y } => self.wheel(x, y, delta_y),
            InputEvent::ContextMenu { x, y } => {
                if self.context_menu(x, y) {
                    InputDisposition::Overlay
                } else {
                    InputDisposition::Unhandled
                }
            }
            InputEvent::Click { x, y } => self.click(x, y),
            InputEvent::Key(key) => self.key(key),
        }
    }

    /// Overlay listeners see the press before the drawing session does.
    ///
    /// A press inside an interactive mark's hit radius starts a drag and
    /// returns [`InputDisposition::Overlay`] even while a tool is capturing;
    /// the session keeps waiting for the same point. Presses elsewhere feed the
    /// session, or fall through to native pan when no tool is active.
    pub fn pointer_down(&mut self, x: f64, y: f64, button: PointerButton) -> InputDisposition {
        let event = InputEvent::PointerDown { x, y, button };
        if self.events.dispatch(&event, EventScope::Element).stopped {
            return InputDisposition::Overlay;
        }
        if self.tools.is_capturing() {
            if button == PointerButton::Primary {
                self.drawing_pointer_down(PixelPoint::new(x, y));
            }
            return InputDisposition::Drawing;
        }
        if button == PointerButton::Primary
            && self.host.handle_native_input(NativeInput::PointerDown { x, y })
        {
            InputDisposition::Native
        } else {
            InputDisposition::Unhandled
        }
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> InputDisposition {
        let event = InputEvent::PointerMove { x, y };
        if self.events.dispatch(&event, EventScope::Element).stopped {
            return InputDisposition::Overlay;
        }
        if self.tools.is_capturing() {
            self.drawing_pointer_move(PixelPoint::new(x, y));
            return InputDisposition::Drawing;
        }
        self.native(NativeInput::PointerMove { x, y })
    }

    /// Pointer moved while outside the chart element.
    ///
    /// Only document-scope listeners see it, so an ongoing mark drag keeps
    /// tracking the pointer.
    pub fn pointer_move_outside(&mut self, x: f64, y: f64) -> InputDisposition {
        let event = InputEvent::PointerMove { x, y };
        if self.events.dispatch(&event, EventScope::Document).stopped {
            InputDisposition::Overlay
        } else {
            InputDisposition::Unhandled
        }
    }

    /// The host always sees pointer-up so a native pan never gets stuck.
    pub fn pointer_up(&mut self, x: f64, y: f64, button: PointerButton) -> InputDisposition {
        let event = InputEvent::PointerUp { x, y, button };
        let stopped = self.events.dispatch(&event, EventScope::Element).stopped;
        let native = self.host.handle_native_input(NativeInput::PointerUp);
        if stopped {
            InputDisposition::Overlay
        } else if native {
            InputDisposition::Native
        } else {
            InputDisposition::Unhandled
        }
    }

    /// Pointer released outside the chart element.
    pub fn pointer_up_outside(&mut self, x: f64, y: f64, button: PointerButton) -> InputDisposition {
        let event = InputEvent::PointerUp { x, y, button };
        let stopped = self.events.dispatch(&event, EventScope::Document).stopped;
        self.host.handle_native_input(NativeInput::PointerUp);
        if stopped {
            InputDisposition::Overlay
        } else {
            InputDisposition::Unhandled
        }
    }

    /// `delta_y > 0` scrolls away from the user.
    pub fn wheel(&mut self, x: f64, y: f64, delta_y: f64) -> InputDisposition {
        if !delta_y.is_finite() {
            return InputDisposition::Unhandled;
        }
        let event = InputEvent::Wheel { x, y, delta_y };
        if self.events.dispatch(&event, EventScope::Element).stopped {
            return InputDisposition::Overlay;
        }
        self.native(NativeInput::Wheel { x, y, delta_y })
    }

    /// Returns `true` when an overlay suppressed the context menu.
    pub fn context_menu(&mut self, x: f64, y: f64) -> bool {
        let event = InputEvent::ContextMenu { x, y };
        let stopped = self.events.dispatch(&event, EventScope::Element).stopped;
        if stopped {
            trace!(x, y, "context menu suppressed");
        }
        stopped
    }

    pub fn click(&mut self, x: f64, y: f64) -> InputDisposition {
        let outcome = self
            .events
            .dispatch(&InputEvent::Click { x, y }, EventScope::Element);
        if outcome.listeners_run > 0 {
            InputDisposition::Overlay
        } else {
            InputDisposition::Unhandled
        }
    }

    /// Keys go to document listeners first; Escape then cancels drawing.
    pub fn key(&mut self, key: Key) -> InputDisposition {
        if self
            .events
            .dispatch(&InputEvent::Key(key), EventScope::Document)
            .stopped
        {
            return InputDisposition::Overlay;
        }
        match self.drawing_key(key) {
            DrawingStep::Ignored => InputDisposition::Unhandled,
            _ => InputDisposition::Drawing,
        }
    }

    /// Calls `handler` for every click on the chart element.
    ///
    /// The handler stays registered until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes the handler"]
    pub fn subscribe_click(&self, mut handler: impl FnMut(ClickEvent) + 'static) -> Subscription {
        let host = Rc::downgrade(&self.host);
        self.events.subscribe(
            EventKind::Click,
            EventScope::Element,
            Phase::Bubble,
            move |event| {
                let Some(point) = event.position() else {
                    return Propagation::Continue;
                };
                let anchor = host
                    .upgrade()
                    .and_then(|host| CoordinateBridge::new(&*host).pixel_to_anchor(point));
                handler(ClickEvent { point, anchor });
                Propagation::Continue
            },
        )
    }

    fn native(&self, input: NativeInput) -> InputDisposition {
        if self.host.handle_native_input(input) {
            InputDisposition::Native
        } else {
            InputDisposition::Unhandled
        }
    }
}
