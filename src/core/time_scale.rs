use serde::{Deserialize, Serialize};

use crate::core::{LinearScale, OhlcBar};
use crate::error::{OverlayError, OverlayResult};

/// Time axis model of the headless host with separate full and visible ranges.
///
/// `full_*` tracks the fitted bar range.
/// `visible_*` follows user-driven scroll and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeScale {
    full_start: f64,
    full_end: f64,
    visible_start: f64,
    visible_end: f64,
}

impl TimeScale {
    /// Creates a scale with matching full and visible ranges.
    pub fn new(time_start: f64, time_end: f64) -> OverlayResult<Self> {
        let normalized = normalize_range(time_start, time_end, 1.0)?;
        Ok(Self {
            full_start: normalized.0,
            full_end: normalized.1,
            visible_start: normalized.0,
            visible_end: normalized.1,
        })
    }

    /// Fits full/visible ranges to the bars, padding the visible range by `padding_ratio`.
    pub fn from_bars(bars: &[OhlcBar], padding_ratio: f64) -> OverlayResult<Self> {
        if bars.is_empty() {
            return Err(OverlayError::InvalidData(
                "time scale cannot be built from empty data".to_owned(),
            ));
        }
        if !padding_ratio.is_finite() || padding_ratio < 0.0 {
            return Err(OverlayError::InvalidData(
                "time scale padding ratio must be finite and >= 0".to_owned(),
            ));
        }

        let (min, max) = bars
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), bar| {
                (min.min(bar.time), max.max(bar.time))
            });
        let (full_start, full_end) = normalize_range(min, max, 1.0)?;
        let pad = (full_end - full_start) * padding_ratio;

        Ok(Self {
            full_start,
            full_end,
            visible_start: full_start - pad,
            visible_end: full_end + pad,
        })
    }

    #[must_use]
    pub fn full_range(self) -> (f64, f64) {
        (self.full_start, self.full_end)
    }

    #[must_use]
    pub fn visible_range(self) -> (f64, f64) {
        (self.visible_start, self.visible_end)
    }

    /// Overrides the visible range without modifying the full fitted range.
    pub fn set_visible_range(&mut self, start: f64, end: f64) -> OverlayResult<()> {
        let normalized = normalize_range(start, end, 1e-9)?;
        self.visible_start = normalized.0;
        self.visible_end = normalized.1;
        Ok(())
    }

    /// Pans the visible range by an additive time delta.
    pub fn pan_visible_by_delta(&mut self, delta_time: f64) -> OverlayResult<()> {
        if !delta_time.is_finite() {
            return Err(OverlayError::InvalidData(
                "pan delta must be finite".to_owned(),
            ));
        }

        self.visible_start += delta_time;
        self.visible_end += delta_time;
        Ok(())
    }

    /// Zooms visible range around an anchor time.
    ///
    /// `factor > 1.0` zooms in, `0.0 < factor < 1.0` zooms out.
    pub fn zoom_visible_by_factor(&mut self, factor: f64, anchor_time: f64) -> OverlayResult<()> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(OverlayError::InvalidData(
                "zoom factor must be finite and > 0".to_owned(),
            ));
        }
        if !anchor_time.is_finite() {
            return Err(OverlayError::InvalidData(
                "zoom anchor must be finite".to_owned(),
            ));
        }

        let current_span = self.visible_end - self.visible_start;
        let target_span = current_span / factor;
        let left_ratio = (anchor_time - self.visible_start) / current_span;

        let new_start = anchor_time - left_ratio * target_span;
        self.set_visible_range(new_start, new_start + target_span)
    }

    #[must_use]
    pub fn is_visible(self, time: f64) -> bool {
        time >= self.visible_start && time <= self.visible_end
    }

    pub fn time_to_pixel(self, time: f64, width_px: f64) -> OverlayResult<f64> {
        self.visible_linear()?.domain_to_pixel(time, width_px)
    }

    pub fn pixel_to_time(self, pixel: f64, width_px: f64) -> OverlayResult<f64> {
        self.visible_linear()?.pixel_to_domain(pixel, width_px)
    }

    fn visible_linear(self) -> OverlayResult<LinearScale> {
        LinearScale::new(self.visible_start, self.visible_end)
    }
}

pub(crate) fn normalize_range(start: f64, end: f64, min_span: f64) -> OverlayResult<(f64, f64)> {
    if !start.is_finite() || !end.is_finite() {
        return Err(OverlayError::InvalidData(
            "scale range must be finite".to_owned(),
        ));
    }

    if start == end {
        let half = min_span / 2.0;
        return Ok((start - half, end + half));
    }

    Ok((start.min(end), start.max(end)))
}
