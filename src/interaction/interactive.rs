use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use tracing::{debug, trace};

use crate::core::primitives::{ensure_positive, ensure_unit_interval};
use crate::core::{Anchor, ChartHost, CoordinateBridge, GestureHolder, PixelPoint, resolved};
use crate::error::{OverlayError, OverlayResult};
use crate::extensions::{
    AttachContext, Attachment, ImageHandle, PaneRenderer, SeriesPrimitive,
};
use crate::interaction::{
    EventKind, EventScope, InputEvent, Phase, PointerButton, Propagation, Subscription,
};
use crate::render::{
    CirclePrimitive, Color, ImagePrimitive, LineStrokeStyle, RectPrimitive, RenderFrame,
    TextHAlign, TextPrimitive, TextShadow,
};

fn default_hit_radius_px() -> f64 {
    20.0
}
fn default_min_scale() -> f64 {
    0.5
}
fn default_max_scale() -> f64 {
    3.0
}
fn default_scale_up_factor() -> f64 {
    1.1
}
fn default_scale_down_factor() -> f64 {
    0.9
}
fn default_caption_size_px() -> f64 {
    12.0
}
fn default_caption_offset_px() -> f64 {
    14.0
}
fn default_glyph_lift_px() -> f64 {
    8.0
}
fn default_drag_opacity() -> f64 {
    0.7
}
fn default_show_hit_ring() -> bool {
    true
}

/// Hit-test, scale and visual tuning for interactive marks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractiveMarkConfig {
    /// Hit radius at scale 1; the effective radius is `hit_radius_px * scale`.
    #[serde(default = "default_hit_radius_px")]
    pub hit_radius_px: f64,
    #[serde(default = "default_min_scale")]
    pub min_scale: f64,
    #[serde(default = "default_max_scale")]
    pub max_scale: f64,
    /// Wheel toward the user (`delta_y <= 0`).
    #[serde(default = "default_scale_up_factor")]
    pub scale_up_factor: f64,
    /// Wheel away from the user (`delta_y > 0`).
    #[serde(default = "default_scale_down_factor")]
    pub scale_down_factor: f64,
    #[serde(default = "default_caption_size_px")]
    pub caption_size_px: f64,
    #[serde(default = "default_caption_offset_px")]
    pub caption_offset_px: f64,
    /// Gap between the anchor and the bottom of the glyph.
    #[serde(default = "default_glyph_lift_px")]
    pub glyph_lift_px: f64,
    #[serde(default = "default_drag_opacity")]
    pub drag_opacity: f64,
    #[serde(default = "default_show_hit_ring")]
    pub show_hit_ring: bool,
}

impl Default for InteractiveMarkConfig {
    fn default() -> Self {
        Self {
            hit_radius_px: default_hit_radius_px(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            scale_up_factor: default_scale_up_factor(),
            scale_down_factor: default_scale_down_factor(),
            caption_size_px: default_caption_size_px(),
            caption_offset_px: default_caption_offset_px(),
            glyph_lift_px: default_glyph_lift_px(),
            drag_opacity: default_drag_opacity(),
            show_hit_ring: default_show_hit_ring(),
        }
    }
}

impl InteractiveMarkConfig {
    #[must_use]
    pub fn with_hit_radius_px(mut self, radius: f64) -> Self {
        self.hit_radius_px = radius;
        self
    }

    #[must_use]
    pub fn with_scale_range(mut self, min_scale: f64, max_scale: f64) -> Self {
        self.min_scale = min_scale;
        self.max_scale = max_scale;
        self
    }

    #[must_use]
    pub fn with_hit_ring(mut self, show: bool) -> Self {
        self.show_hit_ring = show;
        self
    }

    pub fn validate(&self) -> OverlayResult<()> {
        ensure_positive(self.hit_radius_px, "hit_radius_px")?;
        ensure_positive(self.min_scale, "min_scale")?;
        ensure_positive(self.max_scale, "max_scale")?;
        if self.min_scale > self.max_scale {
            return Err(OverlayError::InvalidData(
                "min_scale must be <= max_scale".to_owned(),
            ));
        }
        ensure_positive(self.scale_up_factor, "scale_up_factor")?;
        ensure_positive(self.scale_down_factor, "scale_down_factor")?;
        ensure_positive(self.caption_size_px, "caption_size_px")?;
        ensure_unit_interval(self.drag_opacity, "drag_opacity")?;
        Ok(())
    }

    #[must_use]
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Scale after one wheel step.
    #[must_use]
    pub fn apply_wheel(&self, scale: f64, delta_y: f64) -> f64 {
        let factor = if delta_y > 0.0 {
            self.scale_down_factor
        } else {
            self.scale_up_factor
        };
        self.clamp_scale(scale * factor)
    }
}

fn default_mark_color() -> Color {
    Color::BLACK
}
fn default_mark_size_px() -> f64 {
    24.0
}
fn default_mark_opacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkStyle {
    #[serde(default = "default_mark_color")]
    pub color: Color,
    /// Glyph or image edge length at scale 1.
    #[serde(default = "default_mark_size_px")]
    pub size_px: f64,
    #[serde(default = "default_mark_opacity")]
    pub opacity: f64,
}

impl Default for MarkStyle {
    fn default() -> Self {
        Self {
            color: default_mark_color(),
            size_px: default_mark_size_px(),
            opacity: default_mark_opacity(),
        }
    }
}

impl MarkStyle {
    pub fn validate(&self) -> OverlayResult<()> {
        self.color.validate()?;
        ensure_positive(self.size_px, "size_px")?;
        ensure_unit_interval(self.opacity, "opacity")?;
        Ok(())
    }
}

/// What an interactive mark shows at its anchor.
#[derive(Debug, Clone)]
pub enum MarkContent {
    /// Emoji or short text.
    Glyph { glyph: String },
    /// Image drawn once its handle is ready; a dashed placeholder until then.
    Image { handle: ImageHandle },
}

/// Captured at pointer-down; the drag is always relative to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub original_anchor: Anchor,
    pub original_pixel: PixelPoint,
    pub pointer_down: PixelPoint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragOutcome {
    pub anchor: Anchor,
    pub time_updated: bool,
    pub price_updated: bool,
}

/// New anchor for a drag of `delta` pixels from `original_pixel`.
///
/// Each axis is inverted independently and keeps `fallback`'s value when its
/// inversion fails (pointer dragged past the visible range).
#[must_use]
pub fn drag_anchor(
    fallback: Anchor,
    original_pixel: PixelPoint,
    delta: (f64, f64),
    bridge: &CoordinateBridge<'_>,
) -> DragOutcome {
    let target = original_pixel.offset(delta.0, delta.1);
    let time = bridge.pixel_x_to_time(target.x);
    let price = bridge.pixel_y_to_price(target.y);
    DragOutcome {
        anchor: Anchor::new(
            time.unwrap_or(fallback.time),
            price.unwrap_or(fallback.price),
        ),
        time_updated: time.is_some(),
        price_updated: price.is_some(),
    }
}

#[derive(Debug)]
struct MarkState {
    anchor: Anchor,
    scale: f64,
    drag: Option<DragState>,
    content: MarkContent,
    caption: Option<String>,
    style: MarkStyle,
    config: InteractiveMarkConfig,
}

impl MarkState {
    fn hit_radius(&self) -> f64 {
        self.config.hit_radius_px * self.scale
    }

    fn hit_test(&self, bridge: &CoordinateBridge<'_>, point: PixelPoint) -> bool {
        bridge
            .anchor_to_pixel(self.anchor)
            .is_some_and(|center| center.distance_to(point) <= self.hit_radius())
    }
}

/// Single-anchor mark that can be dragged and wheel-scaled.
///
/// While dragging, the mark holds a [`GestureHolder`] on the host's gesture
/// gate so native pan/zoom stays off; pointer-up releases it
/// unconditionally. Move/up listeners live at document scope so a drag
/// continues when the pointer leaves the chart.
pub struct InteractiveMark {
    state: Rc<RefCell<MarkState>>,
    attachment: Attachment,
    holder: Option<GestureHolder>,
    subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for InteractiveMark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveMark")
            .field("state", &self.state.borrow())
            .field("attached", &self.attachment.is_attached())
            .finish_non_exhaustive()
    }
}

impl InteractiveMark {
    pub fn new(
        anchor: Anchor,
        content: MarkContent,
        style: MarkStyle,
        config: InteractiveMarkConfig,
    ) -> OverlayResult<Self> {
        anchor.validate()?;
        style.validate()?;
        config.validate()?;
        if let MarkContent::Glyph { glyph } = &content {
            if glyph.is_empty() {
                return Err(OverlayError::InvalidData(
                    "mark glyph must not be empty".to_owned(),
                ));
            }
        }
        Ok(Self {
            state: Rc::new(RefCell::new(MarkState {
                anchor,
                scale: config.clamp_scale(1.0),
                drag: None,
                content,
                caption: None,
                style,
                config,
            })),
            attachment: Attachment::default(),
            holder: None,
            subscriptions: Vec::new(),
        })
    }

    /// Emoji/text mark with default style and config.
    pub fn glyph(anchor: Anchor, glyph: impl Into<String>) -> OverlayResult<Self> {
        Self::new(
            anchor,
            MarkContent::Glyph {
                glyph: glyph.into(),
            },
            MarkStyle::default(),
            InteractiveMarkConfig::default(),
        )
    }

    #[must_use]
    pub fn with_caption(self, caption: impl Into<String>) -> Self {
        self.state.borrow_mut().caption = Some(caption.into());
        self
    }

    #[must_use]
    pub fn anchor(&self) -> Anchor {
        self.state.borrow().anchor
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.state.borrow().scale
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.state.borrow().drag.is_some()
    }

    #[must_use]
    pub fn drag_state(&self) -> Option<DragState> {
        self.state.borrow().drag
    }

    pub fn set_anchor(&mut self, anchor: Anchor) -> OverlayResult<()> {
        self.state.borrow_mut().anchor = anchor.validate()?;
        self.attachment.request_update();
        Ok(())
    }

    /// Sets the scale, clamped to the configured range.
    pub fn set_scale(&mut self, scale: f64) {
        if !scale.is_finite() {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            state.scale = state.config.clamp_scale(scale);
        }
        self.attachment.request_update();
    }

    /// Pointer-in-mark test against current pixel geometry.
    pub fn hit_test(&self, point: PixelPoint) -> OverlayResult<bool> {
        let host = self.attachment.host()?;
        Ok(self
            .state
            .borrow()
            .hit_test(&CoordinateBridge::new(&*host), point))
    }

    fn subscribe_listeners(&mut self, context: &AttachContext, holder: GestureHolder) {
        let events = context.events();
        let host = context.host().map(|host| Rc::downgrade(&host));
        let Some(host) = host else {
            return;
        };

        let (state, weak) = (Rc::clone(&self.state), host.clone());
        self.subscriptions.push(events.subscribe(
            EventKind::PointerDown,
            EventScope::Element,
            Phase::Capture,
            move |event| on_pointer_down(&state, &weak, holder, event),
        ));

        let (state, weak) = (Rc::clone(&self.state), host.clone());
        self.subscriptions.push(events.subscribe(
            EventKind::PointerMove,
            EventScope::Document,
            Phase::Bubble,
            move |event| on_pointer_move(&state, &weak, event),
        ));

        let (state, weak) = (Rc::clone(&self.state), host.clone());
        self.subscriptions.push(events.subscribe(
            EventKind::PointerUp,
            EventScope::Document,
            Phase::Bubble,
            move |_| on_pointer_up(&state, &weak, holder),
        ));

        let (state, weak) = (Rc::clone(&self.state), host.clone());
        self.subscriptions.push(events.subscribe(
            EventKind::Wheel,
            EventScope::Element,
            Phase::Capture,
            move |event| on_wheel(&state, &weak, event),
        ));

        let state = Rc::clone(&self.state);
        self.subscriptions.push(events.subscribe(
            EventKind::ContextMenu,
            EventScope::Element,
            Phase::Capture,
            move |event| on_context_menu(&state, &host, event),
        ));
    }
}

fn on_pointer_down(
    state: &RefCell<MarkState>,
    host: &Weak<dyn ChartHost>,
    holder: GestureHolder,
    event: &InputEvent,
) -> Propagation {
    let InputEvent::PointerDown {
        x,
        y,
        button: PointerButton::Primary,
    } = *event
    else {
        return Propagation::Continue;
    };
    let Some(host) = host.upgrade() else {
        return Propagation::Continue;
    };
    let bridge = CoordinateBridge::new(&*host);
    let pointer = PixelPoint::new(x, y);

    let mut state = state.borrow_mut();
    if !state.hit_test(&bridge, pointer) {
        return Propagation::Continue;
    }
    let Some(original_pixel) = bridge.anchor_to_pixel(state.anchor) else {
        return Propagation::Continue;
    };
    state.drag = Some(DragState {
        original_anchor: state.anchor,
        original_pixel,
        pointer_down: pointer,
    });
    drop(state);

    host.gesture_gate().suppress(holder);
    debug!(x, y, "interactive mark drag started");
    host.request_update();
    Propagation::Stop
}

fn on_pointer_move(
    state: &RefCell<MarkState>,
    host: &Weak<dyn ChartHost>,
    event: &InputEvent,
) -> Propagation {
    let InputEvent::PointerMove { x, y } = *event else {
        return Propagation::Continue;
    };
    let mut state = state.borrow_mut();
    let Some(drag) = state.drag else {
        return Propagation::Continue;
    };
    let Some(host) = host.upgrade() else {
        return Propagation::Continue;
    };

    let delta = PixelPoint::new(x, y).delta_from(drag.pointer_down);
    let outcome = drag_anchor(
        state.anchor,
        drag.original_pixel,
        delta,
        &CoordinateBridge::new(&*host),
    );
    if !(outcome.time_updated || outcome.price_updated) {
        trace!(x, y, "drag target outside visible range");
    }
    state.anchor = outcome.anchor;
    drop(state);

    host.request_update();
    Propagation::Stop
}

fn on_pointer_up(
    state: &RefCell<MarkState>,
    host: &Weak<dyn ChartHost>,
    holder: GestureHolder,
) -> Propagation {
    let was_dragging = state.borrow_mut().drag.take().is_some();
    if let Some(host) = host.upgrade() {
        host.gesture_gate().release(holder);
        if was_dragging {
            host.request_update();
        }
    }
    if was_dragging {
        debug!("interactive mark drag finished");
        Propagation::Stop
    } else {
        Propagation::Continue
    }
}

fn on_wheel(
    state: &RefCell<MarkState>,
    host: &Weak<dyn ChartHost>,
    event: &InputEvent,
) -> Propagation {
    let InputEvent::Wheel { x, y, delta_y } = *event else {
        return Propagation::Continue;
    };
    let Some(host) = host.upgrade() else {
        return Propagation::Continue;
    };
    let mut state = state.borrow_mut();
    if !state.hit_test(&CoordinateBridge::new(&*host), PixelPoint::new(x, y)) {
        return Propagation::Continue;
    }
    state.scale = state.config.apply_wheel(state.scale, delta_y);
    trace!(scale = state.scale, "interactive mark scaled");
    drop(state);

    host.request_update();
    Propagation::Stop
}

fn on_context_menu(
    state: &RefCell<MarkState>,
    host: &Weak<dyn ChartHost>,
    event: &InputEvent,
) -> Propagation {
    let (Some(point), Some(host)) = (event.position(), host.upgrade()) else {
        return Propagation::Continue;
    };
    if state
        .borrow()
        .hit_test(&CoordinateBridge::new(&*host), point)
    {
        Propagation::Stop
    } else {
        Propagation::Continue
    }
}

impl PaneRenderer for InteractiveMark {
    fn draw(&self, frame: &mut RenderFrame) -> OverlayResult<()> {
        let host = self.attachment.host()?;
        let bridge = CoordinateBridge::new(&*host);
        let state = self.state.borrow();
        let center = resolved(bridge.anchor_to_pixel(state.anchor), "interactive mark anchor")?;

        let cfg = &state.config;
        let dragging = state.drag.is_some();
        let size = state.style.size_px * state.scale;
        let opacity = if dragging {
            state.style.opacity * cfg.drag_opacity
        } else {
            state.style.opacity
        };
        let box_top = center.y - size - cfg.glyph_lift_px;

        match &state.content {
            MarkContent::Glyph { glyph } => {
                let mut text = TextPrimitive::new(
                    glyph.clone(),
                    center.x,
                    center.y - size / 2.0 - cfg.glyph_lift_px,
                    size,
                    state.style.color.with_opacity(opacity),
                    TextHAlign::Center,
                );
                if dragging {
                    text = text.with_shadow(TextShadow {
                        color: Color::rgba(0.0, 0.0, 0.0, 0.5),
                        offset_x: 0.0,
                        offset_y: 0.0,
                        blur: 10.0,
                    });
                }
                frame.texts.push(text);
            }
            MarkContent::Image { handle } if handle.is_ready() => {
                frame.images.push(ImagePrimitive {
                    source_id: handle.source_id(),
                    x: center.x - size / 2.0,
                    y: box_top,
                    width: size,
                    height: size,
                    opacity,
                });
            }
            MarkContent::Image { .. } => {
                frame.rects.push(
                    RectPrimitive::new(center.x - size / 2.0, box_top, size, size, Color::TRANSPARENT)
                        .with_border(1.0, Color::rgba(0.0, 0.0, 0.0, 0.4), LineStrokeStyle::Dashed),
                );
            }
        }

        if let Some(caption) = state.caption.as_deref().filter(|caption| !caption.is_empty()) {
            let color = if dragging {
                Color::rgba(1.0, 0.0, 0.0, 0.8)
            } else {
                Color::rgba(0.0, 0.0, 0.0, 0.6)
            };
            frame.texts.push(TextPrimitive::new(
                caption,
                center.x,
                center.y + cfg.caption_offset_px * state.scale,
                cfg.caption_size_px * state.scale,
                color,
                TextHAlign::Center,
            ));
        }

        if cfg.show_hit_ring {
            let color = if dragging {
                Color::rgb(1.0, 0.0, 0.0)
            } else {
                Color::rgba(0.0, 0.0, 1.0, 0.5)
            };
            frame.circles.push(CirclePrimitive::stroked(
                center.x,
                center.y,
                state.hit_radius(),
                1.0,
                color,
                LineStrokeStyle::Dashed,
            ));
        }
        Ok(())
    }
}

impl SeriesPrimitive for InteractiveMark {
    fn attached(&mut self, context: AttachContext) -> OverlayResult<()> {
        let host = context.host().ok_or(OverlayError::AttachmentNotReady)?;
        self.attachment.attach(context.clone())?;
        let holder = host.gesture_gate().register_holder();
        self.holder = Some(holder);
        self.subscribe_listeners(&context, holder);

        if let MarkContent::Image { handle } = &self.state.borrow().content {
            let weak = Rc::downgrade(&host);
            handle.on_ready(move || {
                if let Some(host) = weak.upgrade() {
                    host.request_update();
                }
            });
        }
        host.request_update();
        Ok(())
    }

    fn detached(&mut self) {
        self.subscriptions.clear();
        if let MarkContent::Image { handle } = &self.state.borrow().content {
            handle.clear_on_ready();
        }
        self.state.borrow_mut().drag = None;
        if let (Some(holder), Ok(host)) = (self.holder.take(), self.attachment.host()) {
            host.gesture_gate().release(holder);
        }
        self.attachment.detach();
    }

    fn pane_views(&self) -> SmallVec<[&dyn PaneRenderer; 2]> {
        smallvec![self as &dyn PaneRenderer]
    }

    fn anchors(&self) -> SmallVec<[Anchor; 4]> {
        smallvec![self.anchor()]
    }

    fn set_anchors(&mut self, anchors: &[Anchor]) -> bool {
        let &[anchor] = anchors else {
            return false;
        };
        self.set_anchor(anchor).is_ok()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
