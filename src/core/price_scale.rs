use serde::{Deserialize, Serialize};

use crate::core::time_scale::normalize_range;
use crate::core::{LinearScale, OhlcBar};
use crate::error::{OverlayError, OverlayResult};

/// Price axis model mapped to an inverted Y pixel axis.
///
/// `price_max` maps to pixel `0`, `price_min` maps to the pane height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceScale {
    price_min: f64,
    price_max: f64,
}

impl PriceScale {
    pub fn new(price_min: f64, price_max: f64) -> OverlayResult<Self> {
        let (price_min, price_max) = normalize_range(price_min, price_max, 1e-6)?;
        Ok(Self {
            price_min,
            price_max,
        })
    }

    /// Fits the domain to bar lows/highs with symmetric `padding_ratio`.
    pub fn from_bars(bars: &[OhlcBar], padding_ratio: f64) -> OverlayResult<Self> {
        if bars.is_empty() {
            return Err(OverlayError::InvalidData(
                "price scale cannot be built from empty data".to_owned(),
            ));
        }
        if !padding_ratio.is_finite() || padding_ratio < 0.0 {
            return Err(OverlayError::InvalidData(
                "price scale padding ratio must be finite and >= 0".to_owned(),
            ));
        }

        let (low, high) = bars
            .iter()
            .map(|bar| bar.price_span())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), (bar_low, bar_high)| {
                (low.min(bar_low), high.max(bar_high))
            });
        let (low, high) = normalize_range(low, high, 1e-6)?;
        let pad = (high - low) * padding_ratio;
        Self::new(low - pad, high + pad)
    }

    #[must_use]
    pub fn domain(self) -> (f64, f64) {
        (self.price_min, self.price_max)
    }

    #[must_use]
    pub fn is_visible(self, price: f64) -> bool {
        price >= self.price_min && price <= self.price_max
    }

    pub fn price_to_pixel(self, price: f64, height_px: f64) -> OverlayResult<f64> {
        let normalized = self.linear()?.domain_to_pixel(price, height_px)?;
        Ok(height_px - normalized)
    }

    pub fn pixel_to_price(self, pixel: f64, height_px: f64) -> OverlayResult<f64> {
        self.linear()?.pixel_to_domain(height_px - pixel, height_px)
    }

    fn linear(self) -> OverlayResult<LinearScale> {
        LinearScale::new(self.price_min, self.price_max)
    }
}
