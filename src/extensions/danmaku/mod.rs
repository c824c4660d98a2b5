//! Scrolling-text ("danmaku") overlay with its own frame clock.
//!
//! Items enter at the right edge, move left at their style speed and are
//! recycled into a slot pool once fully off-screen. The engine never touches
//! drawing-tool state.

mod pool;
mod scheduler;

pub use pool::{Acquired, SlotId, SlotPool};
pub use scheduler::{FrameRequestId, FrameScheduler, ManualFrameScheduler};

use std::collections::VecDeque;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::core::Viewport;
use crate::core::primitives::{ensure_positive, ensure_unit_interval};
use crate::error::{OverlayError, OverlayResult};
use crate::render::{
    Color, RenderFrame, Renderer, TextHAlign, TextMeasurer, TextPrimitive, TextShadow, TextVAlign,
};

/// Width used when no surface is available to measure text.
pub const FALLBACK_TEXT_WIDTH_PX: f64 = 100.0;

const RANDOM_COLORS: [&str; 10] = [
    "#FFFFFF", "#FF6B6B", "#4ECDC4", "#FFD166", "#06D6A0", "#118AB2", "#EF476F", "#073B4C",
    "#7209B7", "#F72585",
];
const RANDOM_FONT_SIZES: [f64; 3] = [14.0, 16.0, 18.0];
const RANDOM_SPEEDS: [f64; 4] = [50.0, 60.0, 70.0, 80.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DanmakuStyle {
    pub color: Color,
    pub font_size_px: f64,
    /// Pixels per second, leftwards.
    pub speed_px_per_sec: f64,
    pub opacity: f64,
    /// Fraction of the container height for the text's vertical center.
    pub y_position: f64,
}

impl Default for DanmakuStyle {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            font_size_px: 16.0,
            speed_px_per_sec: 60.0,
            opacity: 0.9,
            y_position: 0.5,
        }
    }
}

impl DanmakuStyle {
    #[must_use]
    pub fn with_speed(mut self, speed_px_per_sec: f64) -> Self {
        self.speed_px_per_sec = speed_px_per_sec;
        self
    }

    #[must_use]
    pub fn with_y_position(mut self, y_position: f64) -> Self {
        self.y_position = y_position;
        self
    }

    #[must_use]
    pub fn with_font_size(mut self, font_size_px: f64) -> Self {
        self.font_size_px = font_size_px;
        self
    }

    pub fn validate(&self) -> OverlayResult<()> {
        self.color.validate()?;
        ensure_positive(self.font_size_px, "font_size_px")?;
        ensure_positive(self.speed_px_per_sec, "speed_px_per_sec")?;
        ensure_unit_interval(self.opacity, "opacity")?;
        ensure_unit_interval(self.y_position, "y_position")?;
        Ok(())
    }

    fn random(rng: &mut StdRng) -> Self {
        let color = RANDOM_COLORS
            .choose(rng)
            .and_then(|hex| hex.parse().ok())
            .unwrap_or(Color::WHITE);
        Self {
            color,
            font_size_px: RANDOM_FONT_SIZES.choose(rng).copied().unwrap_or(16.0),
            speed_px_per_sec: RANDOM_SPEEDS.choose(rng).copied().unwrap_or(60.0),
            opacity: rng.gen_range(0.8..=1.0),
            y_position: rng.gen_range(0.1..=0.9),
        }
    }
}

fn default_max_concurrent() -> usize {
    10
}
fn default_font_family() -> String {
    "Arial, sans-serif".to_owned()
}
fn default_line_height() -> f64 {
    1.2
}
fn default_auto_start() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanmakuConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub default_style: DanmakuStyle,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Line box height as a multiple of the font size.
    #[serde(default = "default_line_height")]
    pub line_height: f64,
    /// Start the frame loop as soon as a surface is attached.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
    /// Give freshly allocated items a random style instead of `default_style`.
    #[serde(default)]
    pub randomize_style: bool,
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for DanmakuConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            default_style: DanmakuStyle::default(),
            font_family: default_font_family(),
            line_height: default_line_height(),
            auto_start: default_auto_start(),
            randomize_style: false,
            rng_seed: None,
        }
    }
}

impl DanmakuConfig {
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    #[must_use]
    pub fn with_default_style(mut self, style: DanmakuStyle) -> Self {
        self.default_style = style;
        self
    }

    #[must_use]
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    #[must_use]
    pub fn with_random_style(mut self, seed: Option<u64>) -> Self {
        self.randomize_style = true;
        self.rng_seed = seed;
        self
    }

    pub fn validate(&self) -> OverlayResult<()> {
        if self.max_concurrent == 0 {
            return Err(OverlayError::InvalidData(
                "danmaku max_concurrent must be >= 1".to_owned(),
            ));
        }
        if self.font_family.trim().is_empty() {
            return Err(OverlayError::InvalidData(
                "danmaku font family must not be empty".to_owned(),
            ));
        }
        ensure_positive(self.line_height, "line_height")?;
        self.default_style.validate()
    }
}

/// One scrolling text item. Lives in exactly one of the active list or the
/// free stack of the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct DanmakuItem {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub style: DanmakuStyle,
    pub spawned_at_ms: f64,
    pub visible: bool,
}

impl DanmakuItem {
    #[must_use]
    pub fn right_edge(&self) -> f64 {
        self.x + self.width
    }
}

/// Where danmaku frames are measured and presented.
pub trait DanmakuSurface: TextMeasurer {
    fn viewport(&self) -> Viewport;
    fn present(&mut self, frame: &RenderFrame) -> OverlayResult<()>;
}

/// Adapts any [`Renderer`] plus [`TextMeasurer`] into a danmaku surface.
#[derive(Debug)]
pub struct RendererSurface<R, M> {
    pub renderer: R,
    pub measurer: M,
    viewport: Viewport,
}

impl<R: Renderer, M: TextMeasurer> RendererSurface<R, M> {
    #[must_use]
    pub fn new(renderer: R, measurer: M, viewport: Viewport) -> Self {
        Self {
            renderer,
            measurer,
            viewport,
        }
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}

impl<R, M: TextMeasurer> TextMeasurer for RendererSurface<R, M> {
    fn measure_text(&self, text: &str, font_size_px: f64, family: Option<&str>) -> f64 {
        self.measurer.measure_text(text, font_size_px, family)
    }
}

impl<R: Renderer, M: TextMeasurer> DanmakuSurface for RendererSurface<R, M> {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn present(&mut self, frame: &RenderFrame) -> OverlayResult<()> {
        self.renderer.render(frame)
    }
}

/// What one [`DanmakuEngine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub recycled: usize,
    pub spawned: Option<SlotId>,
}

/// Pooled scrolling-text engine.
///
/// Per tick: move every active item left by `speed * delta`, recycle those
/// whose right edge passed 0 (back to front, in place), then spawn at most one
/// queued text if below `max_concurrent`.
pub struct DanmakuEngine {
    config: DanmakuConfig,
    queue: VecDeque<String>,
    pool: SlotPool<DanmakuItem>,
    active: Vec<SlotId>,
    surface: Option<Box<dyn DanmakuSurface>>,
    container: Viewport,
    scheduler: Box<dyn FrameScheduler>,
    pending_frame: Option<FrameRequestId>,
    playing: bool,
    last_frame_ms: f64,
    rng: StdRng,
    frame: RenderFrame,
}

impl fmt::Debug for DanmakuEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DanmakuEngine")
            .field("playing", &self.playing)
            .field("active", &self.active.len())
            .field("pending", &self.queue.len())
            .field("pool", &self.pool.len())
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl DanmakuEngine {
    pub fn new(config: DanmakuConfig, scheduler: Box<dyn FrameScheduler>) -> OverlayResult<Self> {
        config.validate()?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let container = Viewport::new(0, 0);
        Ok(Self {
            config,
            queue: VecDeque::new(),
            pool: SlotPool::new(),
            active: Vec::new(),
            surface: None,
            container,
            scheduler,
            pending_frame: None,
            playing: false,
            last_frame_ms: 0.0,
            rng,
            frame: RenderFrame::new(container),
        })
    }

    #[must_use]
    pub fn config(&self) -> &DanmakuConfig {
        &self.config
    }

    /// Binds the drawing surface; starts the loop when `auto_start` is set.
    pub fn initialize(&mut self, surface: Box<dyn DanmakuSurface>, now_ms: f64) {
        self.surface = Some(surface);
        self.update_surface_size();
        debug!(
            width = self.container.width,
            height = self.container.height,
            "danmaku surface initialized"
        );
        if self.config.auto_start {
            self.start(now_ms);
        }
    }

    /// Re-reads the container size from the surface.
    pub fn update_surface_size(&mut self) {
        if let Some(surface) = &self.surface {
            self.container = surface.viewport();
        }
    }

    /// Sets the container size directly, for engines running without a surface.
    pub fn set_container_size(&mut self, viewport: Viewport) {
        self.container = viewport;
    }

    #[must_use]
    pub fn container(&self) -> Viewport {
        self.container
    }

    /// Replaces the pending queue.
    pub fn set_queue<I, S>(&mut self, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queue = texts.into_iter().map(Into::into).collect();
    }

    pub fn push(&mut self, text: impl Into<String>) {
        self.queue.push_back(text.into());
    }

    pub fn append_queue<I, S>(&mut self, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queue.extend(texts.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Runs one frame immediately and schedules the next. No-op while playing.
    pub fn start(&mut self, now_ms: f64) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.last_frame_ms = now_ms;
        debug!("danmaku loop started");
        self.run_frame(now_ms);
    }

    /// Stops the loop and cancels the already-requested next frame.
    pub fn stop(&mut self) {
        if !self.playing && self.pending_frame.is_none() {
            return;
        }
        self.playing = false;
        if let Some(id) = self.pending_frame.take() {
            self.scheduler.cancel_frame(id);
        }
        debug!("danmaku loop stopped");
    }

    /// Frame callback from the host. Returns `false` for stale or unexpected ids.
    pub fn on_frame(&mut self, id: FrameRequestId, now_ms: f64) -> bool {
        if !self.playing || self.pending_frame != Some(id) {
            trace!(frame_id = id.get(), "ignoring stale danmaku frame");
            return false;
        }
        self.pending_frame = None;
        self.run_frame(now_ms);
        true
    }

    fn run_frame(&mut self, now_ms: f64) {
        let delta_ms = (now_ms - self.last_frame_ms).max(0.0);
        self.last_frame_ms = now_ms;
        self.tick(delta_ms);
        self.render_frame();
        self.pending_frame = Some(self.scheduler.request_frame());
    }

    /// Advances the simulation by `delta_ms` without scheduling or rendering.
    pub fn tick(&mut self, delta_ms: f64) -> TickReport {
        let mut report = TickReport::default();
        let step = delta_ms.max(0.0) / 1000.0;

        for position in (0..self.active.len()).rev() {
            let id = self.active[position];
            let Some(item) = self.pool.get_mut(id) else {
                self.active.remove(position);
                continue;
            };
            item.x -= item.style.speed_px_per_sec * step;
            if item.right_edge() < 0.0 {
                item.visible = false;
                self.pool.release(id);
                self.active.remove(position);
                report.recycled += 1;
            }
        }

        report.spawned = self.spawn();
        report
    }

    fn spawn(&mut self) -> Option<SlotId> {
        if self.active.len() >= self.config.max_concurrent {
            return None;
        }
        let text = self.queue.pop_front()?;

        let style = if self.config.randomize_style {
            DanmakuStyle::random(&mut self.rng)
        } else {
            self.config.default_style
        };
        let id = self
            .pool
            .acquire(|| DanmakuItem {
                text: String::new(),
                x: 0.0,
                y: 0.0,
                width: 0.0,
                style,
                spawned_at_ms: 0.0,
                visible: false,
            })
            .id();

        let width = match &self.surface {
            Some(surface) => surface.measure_text(
                &text,
                self.pool.get(id).map_or(style.font_size_px, |item| item.style.font_size_px),
                Some(&self.config.font_family),
            ),
            None => FALLBACK_TEXT_WIDTH_PX,
        };
        let (container_width, container_height) =
            (self.container.width_px(), self.container.height_px());
        let spawned_at_ms = self.last_frame_ms;

        let item = self.pool.get_mut(id)?;
        item.text = text;
        item.width = width;
        item.x = container_width;
        item.y = item.style.y_position * container_height;
        item.spawned_at_ms = spawned_at_ms;
        item.visible = true;
        self.active.push(id);
        trace!(slot = id.index(), x = item.x, y = item.y, width, "danmaku spawned");
        Some(id)
    }

    /// Clears the surface and draws every active item, oldest first.
    pub fn render_frame(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if !self.container.is_valid() {
            return;
        }
        self.frame.clear();
        self.frame.viewport = self.container;
        for id in &self.active {
            let Some(item) = self.pool.get(*id) else {
                continue;
            };
            if !item.visible || item.text.is_empty() {
                continue;
            }
            self.frame.texts.push(
                TextPrimitive::new(
                    item.text.clone(),
                    item.x,
                    item.y,
                    item.style.font_size_px,
                    item.style.color.with_opacity(item.style.opacity),
                    TextHAlign::Left,
                )
                .with_v_align(TextVAlign::Middle)
                .with_font_family(self.config.font_family.clone())
                .with_shadow(TextShadow {
                    color: Color::rgba(0.0, 0.0, 0.0, 0.5),
                    offset_x: 1.0,
                    offset_y: 1.0,
                    blur: 2.0,
                }),
            );
        }
        if let Err(err) = surface.present(&self.frame) {
            warn!(error = %err, "danmaku frame presentation failed");
        }
    }

    /// Empties the queue and retires every active item into the pool.
    pub fn clear(&mut self) {
        self.queue.clear();
        for id in self.active.drain(..) {
            if let Some(item) = self.pool.get_mut(id) {
                item.visible = false;
            }
            self.pool.release(id);
        }
        self.render_frame();
    }

    /// Stops, clears, drops the surface and the pool.
    pub fn destroy(&mut self) {
        self.stop();
        self.clear();
        self.surface = None;
        self.pool.clear();
        debug!("danmaku engine destroyed");
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Allocated pool slots, active or free.
    #[must_use]
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    #[must_use]
    pub fn free_len(&self) -> usize {
        self.pool.free_len()
    }

    /// Active items with their slots, oldest first.
    pub fn active_items(&self) -> impl Iterator<Item = (SlotId, &DanmakuItem)> + '_ {
        self.active
            .iter()
            .filter_map(|id| self.pool.get(*id).map(|item| (*id, item)))
    }

    #[must_use]
    pub fn item(&self, id: SlotId) -> Option<&DanmakuItem> {
        self.pool.get(id)
    }
}

impl Drop for DanmakuEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
