mod drawing;
mod events;
mod interactive;

pub use drawing::{DrawingState, DrawingStateMachine, DrawingStep};
pub use events::{
    DispatchOutcome, EventDispatcher, EventKind, EventScope, InputEvent, Key, Phase,
    PointerButton, Propagation, Subscription,
};
pub use interactive::{
    DragOutcome, DragState, InteractiveMark, InteractiveMarkConfig, MarkContent, MarkStyle,
    drag_anchor,
};
