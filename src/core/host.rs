use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::core::{OhlcBar, PriceScale, TimeScale, Viewport};
use crate::error::{OverlayError, OverlayResult};

/// Host-side pan/zoom switches (`handleScroll` / `handleScale` in the host API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeGestures {
    pub handle_scroll: bool,
    pub handle_scale: bool,
}

impl NativeGestures {
    pub const ENABLED: Self = Self {
        handle_scroll: true,
        handle_scale: true,
    };

    pub const DISABLED: Self = Self {
        handle_scroll: false,
        handle_scale: false,
    };
}

impl Default for NativeGestures {
    fn default() -> Self {
        Self::ENABLED
    }
}

/// Identity of one party that may suppress native gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GestureHolder(u64);

/// Tracks who currently suppresses the host's native pan/zoom.
///
/// Gestures are enabled iff no holder is registered as suppressing. Releasing
/// a holder that is not suppressing is a no-op, so pointer-up handlers may
/// release unconditionally.
#[derive(Debug)]
pub struct GestureGate {
    base: Cell<NativeGestures>,
    next_holder: Cell<u64>,
    suppressing: RefCell<SmallVec<[GestureHolder; 4]>>,
}

impl Default for GestureGate {
    fn default() -> Self {
        Self::new(NativeGestures::ENABLED)
    }
}

impl GestureGate {
    #[must_use]
    pub fn new(base: NativeGestures) -> Self {
        Self {
            base: Cell::new(base),
            next_holder: Cell::new(1),
            suppressing: RefCell::new(SmallVec::new()),
        }
    }

    #[must_use]
    pub fn register_holder(&self) -> GestureHolder {
        let id = self.next_holder.get();
        self.next_holder.set(id + 1);
        GestureHolder(id)
    }

    /// Marks `holder` as suppressing. Returns `true` when newly suppressing.
    pub fn suppress(&self, holder: GestureHolder) -> bool {
        let mut suppressing = self.suppressing.borrow_mut();
        if suppressing.contains(&holder) {
            return false;
        }
        suppressing.push(holder);
        trace!(holder = holder.0, "native gestures suppressed");
        true
    }

    /// Removes `holder` from the suppressing set. Returns `true` when it was present.
    pub fn release(&self, holder: GestureHolder) -> bool {
        let mut suppressing = self.suppressing.borrow_mut();
        let Some(position) = suppressing.iter().position(|entry| *entry == holder) else {
            return false;
        };
        suppressing.remove(position);
        trace!(holder = holder.0, "native gestures released");
        true
    }

    #[must_use]
    pub fn is_suppressed_by(&self, holder: GestureHolder) -> bool {
        self.suppressing.borrow().contains(&holder)
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        !self.suppressing.borrow().is_empty()
    }

    /// Gesture switches as the host should apply them right now.
    #[must_use]
    pub fn effective(&self) -> NativeGestures {
        if self.is_suppressed() {
            NativeGestures::DISABLED
        } else {
            self.base.get()
        }
    }

    #[must_use]
    pub fn base(&self) -> NativeGestures {
        self.base.get()
    }

    pub fn set_base(&self, gestures: NativeGestures) {
        self.base.set(gestures);
    }
}

/// Input forwarded to the host after overlay handlers had their turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeInput {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    Wheel { x: f64, y: f64, delta_y: f64 },
}

/// The externally rendered chart surface the overlay engine draws on.
///
/// Every conversion is nullable: `None` means the value is outside the visible
/// range or the host is not ready, and callers skip the frame.
pub trait ChartHost {
    fn viewport(&self) -> Viewport;
    fn time_to_coordinate(&self, time: f64) -> Option<f64>;
    fn coordinate_to_time(&self, x: f64) -> Option<f64>;
    fn price_to_coordinate(&self, price: f64) -> Option<f64>;
    fn coordinate_to_price(&self, y: f64) -> Option<f64>;
    /// Exact time-key lookup against the series data.
    fn bar_at(&self, time: f64) -> Option<OhlcBar>;
    fn gesture_gate(&self) -> &GestureGate;

    /// Asks the host to schedule a repaint.
    fn request_update(&self) {}

    /// Lets the host run its own pan/zoom for input no overlay consumed.
    /// Returns `true` when the host acted on it.
    fn handle_native_input(&self, _input: NativeInput) -> bool {
        false
    }
}

/// Bootstrap options for [`HeadlessChart::create_view`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadlessChartOptions {
    pub time_range: (f64, f64),
    pub price_range: (f64, f64),
    #[serde(default)]
    pub gestures: NativeGestures,
    #[serde(default = "default_wheel_zoom_step")]
    pub wheel_zoom_step: f64,
}

fn default_wheel_zoom_step() -> f64 {
    1.1
}

impl HeadlessChartOptions {
    #[must_use]
    pub fn new(time_range: (f64, f64), price_range: (f64, f64)) -> Self {
        Self {
            time_range,
            price_range,
            gestures: NativeGestures::ENABLED,
            wheel_zoom_step: default_wheel_zoom_step(),
        }
    }
}

/// Reference host with linear scales and exact-key bar storage.
///
/// It renders nothing itself; it exists so overlays can be driven headlessly
/// (tests, benches, server-side snapshotting).
#[derive(Debug)]
pub struct HeadlessChart {
    viewport: Cell<Viewport>,
    time_scale: Cell<TimeScale>,
    price_scale: Cell<PriceScale>,
    bars: RefCell<Vec<OhlcBar>>,
    gestures: GestureGate,
    wheel_zoom_step: f64,
    ready: Cell<bool>,
    pan_origin_x: Cell<Option<f64>>,
    update_requests: Cell<u64>,
}

impl HeadlessChart {
    pub fn create_view(
        width: u32,
        height: u32,
        options: HeadlessChartOptions,
    ) -> OverlayResult<Rc<Self>> {
        let viewport = Viewport::new(width, height);
        if !viewport.is_valid() {
            return Err(OverlayError::InvalidViewport { width, height });
        }
        if !options.wheel_zoom_step.is_finite() || options.wheel_zoom_step <= 1.0 {
            return Err(OverlayError::InvalidData(
                "wheel zoom step must be finite and > 1".to_owned(),
            ));
        }

        let time_scale = TimeScale::new(options.time_range.0, options.time_range.1)?;
        let price_scale = PriceScale::new(options.price_range.0, options.price_range.1)?;
        debug!(width, height, "create headless chart view");

        Ok(Rc::new(Self {
            viewport: Cell::new(viewport),
            time_scale: Cell::new(time_scale),
            price_scale: Cell::new(price_scale),
            bars: RefCell::new(Vec::new()),
            gestures: GestureGate::new(options.gestures),
            wheel_zoom_step: options.wheel_zoom_step,
            ready: Cell::new(true),
            pan_origin_x: Cell::new(None),
            update_requests: Cell::new(0),
        }))
    }

    /// Replaces series data. Bars are sorted by time; duplicate keys are rejected.
    pub fn set_bars(&self, mut bars: Vec<OhlcBar>) -> OverlayResult<()> {
        bars.sort_by(|a, b| a.time.total_cmp(&b.time));
        if bars.windows(2).any(|pair| pair[0].time == pair[1].time) {
            return Err(OverlayError::InvalidData(
                "bar times must be unique".to_owned(),
            ));
        }
        debug!(count = bars.len(), "set headless chart bars");
        *self.bars.borrow_mut() = bars;
        self.request_update();
        Ok(())
    }

    #[must_use]
    pub fn bars_len(&self) -> usize {
        self.bars.borrow().len()
    }

    pub fn set_viewport(&self, viewport: Viewport) -> OverlayResult<()> {
        if !viewport.is_valid() {
            return Err(OverlayError::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        self.viewport.set(viewport);
        Ok(())
    }

    pub fn set_time_visible_range(&self, start: f64, end: f64) -> OverlayResult<()> {
        let mut scale = self.time_scale.get();
        scale.set_visible_range(start, end)?;
        self.time_scale.set(scale);
        Ok(())
    }

    #[must_use]
    pub fn time_visible_range(&self) -> (f64, f64) {
        self.time_scale.get().visible_range()
    }

    pub fn set_price_range(&self, min: f64, max: f64) -> OverlayResult<()> {
        self.price_scale.set(PriceScale::new(min, max)?);
        Ok(())
    }

    /// Fits both scales to the stored bars.
    pub fn fit_content(&self, padding_ratio: f64) -> OverlayResult<()> {
        let bars = self.bars.borrow();
        self.time_scale
            .set(TimeScale::from_bars(&bars, padding_ratio)?);
        self.price_scale
            .set(PriceScale::from_bars(&bars, padding_ratio)?);
        Ok(())
    }

    /// Simulates host teardown: every conversion returns `None` while not ready.
    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }

    #[must_use]
    pub fn update_requests(&self) -> u64 {
        self.update_requests.get()
    }

    fn pan_by_pixels(&self, dx: f64) -> bool {
        let viewport = self.viewport.get();
        let mut scale = self.time_scale.get();
        let (start, end) = scale.visible_range();
        let delta_time = -dx * (end - start) / viewport.width_px();
        if scale.pan_visible_by_delta(delta_time).is_err() {
            return false;
        }
        self.time_scale.set(scale);
        true
    }

    fn zoom_at(&self, x: f64, delta_y: f64) -> bool {
        let Some(anchor_time) = self.coordinate_to_time(x) else {
            return false;
        };
        let factor = if delta_y < 0.0 {
            self.wheel_zoom_step
        } else {
            1.0 / self.wheel_zoom_step
        };
        let mut scale = self.time_scale.get();
        if scale.zoom_visible_by_factor(factor, anchor_time).is_err() {
            return false;
        }
        self.time_scale.set(scale);
        true
    }
}

impl ChartHost for HeadlessChart {
    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn time_to_coordinate(&self, time: f64) -> Option<f64> {
        let scale = self.time_scale.get();
        if !self.ready.get() || !scale.is_visible(time) {
            return None;
        }
        scale
            .time_to_pixel(time, self.viewport.get().width_px())
            .ok()
    }

    fn coordinate_to_time(&self, x: f64) -> Option<f64> {
        let width = self.viewport.get().width_px();
        if !self.ready.get() || !(0.0..=width).contains(&x) {
            return None;
        }
        self.time_scale.get().pixel_to_time(x, width).ok()
    }

    fn price_to_coordinate(&self, price: f64) -> Option<f64> {
        let scale = self.price_scale.get();
        if !self.ready.get() || !scale.is_visible(price) {
            return None;
        }
        scale
            .price_to_pixel(price, self.viewport.get().height_px())
            .ok()
    }

    fn coordinate_to_price(&self, y: f64) -> Option<f64> {
        let height = self.viewport.get().height_px();
        if !self.ready.get() || !(0.0..=height).contains(&y) {
            return None;
        }
        self.price_scale.get().pixel_to_price(y, height).ok()
    }

    fn bar_at(&self, time: f64) -> Option<OhlcBar> {
        if !self.ready.get() {
            return None;
        }
        let bars = self.bars.borrow();
        bars.binary_search_by(|bar| bar.time.total_cmp(&time))
            .ok()
            .map(|index| bars[index])
    }

    fn gesture_gate(&self) -> &GestureGate {
        &self.gestures
    }

    fn request_update(&self) {
        self.update_requests.set(self.update_requests.get() + 1);
    }

    fn handle_native_input(&self, input: NativeInput) -> bool {
        let gestures = self.gestures.effective();
        match input {
            NativeInput::PointerDown { x, .. } => {
                if !gestures.handle_scroll {
                    return false;
                }
                self.pan_origin_x.set(Some(x));
                true
            }
            NativeInput::PointerMove { x, .. } => {
                let Some(origin) = self.pan_origin_x.get() else {
                    return false;
                };
                if !gestures.handle_scroll {
                    self.pan_origin_x.set(None);
                    return false;
                }
                self.pan_origin_x.set(Some(x));
                self.pan_by_pixels(x - origin)
            }
            NativeInput::PointerUp => self.pan_origin_x.take().is_some(),
            NativeInput::Wheel { x, delta_y, .. } => gestures.handle_scale && self.zoom_at(x, delta_y),
        }
    }
}
