use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;

use crate::core::PixelPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Enter,
    Backspace,
    Delete,
    Character(char),
}

/// Raw input in element-relative pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerDown {
        x: f64,
        y: f64,
        button: PointerButton,
    },
    PointerMove {
        x: f64,
        y: f64,
    },
    PointerUp {
        x: f64,
        y: f64,
        button: PointerButton,
    },
    /// `delta_y > 0` scrolls away from the user.
    Wheel {
        x: f64,
        y: f64,
        delta_y: f64,
    },
    ContextMenu {
        x: f64,
        y: f64,
    },
    Click {
        x: f64,
        y: f64,
    },
    Key(Key),
}

impl InputEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PointerDown { .. } => EventKind::PointerDown,
            Self::PointerMove { .. } => EventKind::PointerMove,
            Self::PointerUp { .. } => EventKind::PointerUp,
            Self::Wheel { .. } => EventKind::Wheel,
            Self::ContextMenu { .. } => EventKind::ContextMenu,
            Self::Click { .. } => EventKind::Click,
            Self::Key(_) => EventKind::Key,
        }
    }

    #[must_use]
    pub fn position(&self) -> Option<PixelPoint> {
        match *self {
            Self::PointerDown { x, y, .. }
            | Self::PointerMove { x, y }
            | Self::PointerUp { x, y, .. }
            | Self::Wheel { x, y, .. }
            | Self::ContextMenu { x, y }
            | Self::Click { x, y } => Some(PixelPoint::new(x, y)),
            Self::Key(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    PointerDown,
    PointerMove,
    PointerUp,
    Wheel,
    ContextMenu,
    Click,
    Key,
}

/// Where a listener is registered. `Document` listeners also see events that
/// happen outside the chart element (a drag that leaves the surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventScope {
    Element,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Capture,
    Bubble,
}

/// Listener verdict. `Stop` halts delivery to every later listener, the
/// drawing tools and the host's native handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    pub listeners_run: usize,
    pub stopped: bool,
}

type Listener = Rc<RefCell<dyn FnMut(&InputEvent) -> Propagation>>;

struct ListenerEntry {
    kind: EventKind,
    scope: EventScope,
    phase: Phase,
    callback: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: IndexMap<u64, ListenerEntry>,
}

/// Listener registry shared by the engine and every attached primitive.
///
/// Delivery for an event targeted at the element runs document capture,
/// element capture, element bubble, then document bubble; events outside the
/// element only reach document listeners. Listeners may subscribe or drop
/// subscriptions while an event is being delivered: removed listeners are
/// skipped and new ones see the next event.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Rc<RefCell<Registry>>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`; it stays active until the returned guard drops.
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe(
        &self,
        kind: EventKind,
        scope: EventScope,
        phase: Phase,
        listener: impl FnMut(&InputEvent) -> Propagation + 'static,
    ) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.insert(
            id,
            ListenerEntry {
                kind,
                scope,
                phase,
                callback: Rc::new(RefCell::new(listener)),
            },
        );
        trace!(listener_id = id, ?kind, ?scope, ?phase, "event listener subscribed");
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Delivers `event`; `target` is the innermost scope the pointer is in.
    pub fn dispatch(&self, event: &InputEvent, target: EventScope) -> DispatchOutcome {
        let stages: &[(EventScope, Phase)] = match target {
            EventScope::Element => &[
                (EventScope::Document, Phase::Capture),
                (EventScope::Element, Phase::Capture),
                (EventScope::Element, Phase::Bubble),
                (EventScope::Document, Phase::Bubble),
            ],
            EventScope::Document => &[
                (EventScope::Document, Phase::Capture),
                (EventScope::Document, Phase::Bubble),
            ],
        };

        let kind = event.kind();
        let mut outcome = DispatchOutcome::default();
        for &(scope, phase) in stages {
            let snapshot: SmallVec<[(u64, Listener); 8]> = self
                .registry
                .borrow()
                .listeners
                .iter()
                .filter(|(_, entry)| {
                    entry.kind == kind && entry.scope == scope && entry.phase == phase
                })
                .map(|(id, entry)| (*id, Rc::clone(&entry.callback)))
                .collect();

            for (id, callback) in snapshot {
                if !self.registry.borrow().listeners.contains_key(&id) {
                    continue;
                }
                let Ok(mut callback) = callback.try_borrow_mut() else {
                    trace!(listener_id = id, "skipping re-entrant listener");
                    continue;
                };
                outcome.listeners_run += 1;
                if (*callback)(event) == Propagation::Stop {
                    outcome.stopped = true;
                    return outcome;
                }
            }
        }
        outcome
    }
}

/// Scoped listener registration; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.borrow().listeners.contains_key(&self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.listeners.shift_remove(&self.id);
            }
        }
    }
}
