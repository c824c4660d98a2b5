use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::primitives::{datetime_to_unix_seconds, decimal_to_f64};
use crate::error::{OverlayError, OverlayResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[must_use]
    pub fn width_px(self) -> f64 {
        f64::from(self.width)
    }

    #[must_use]
    pub fn height_px(self) -> f64 {
        f64::from(self.height)
    }

    #[must_use]
    pub fn contains(self, point: PixelPoint) -> bool {
        (0.0..=self.width_px()).contains(&point.x) && (0.0..=self.height_px()).contains(&point.y)
    }
}

/// Element-relative pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Vector from `origin` to `self`.
    #[must_use]
    pub fn delta_from(self, origin: Self) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A `(time, price)` position in chart data space.
///
/// `time` is expressed in unix seconds, matching the keys of host bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub time: f64,
    pub price: f64,
}

impl Anchor {
    #[must_use]
    pub const fn new(time: f64, price: f64) -> Self {
        Self { time, price }
    }

    pub fn from_decimal_time(time: DateTime<Utc>, price: Decimal) -> OverlayResult<Self> {
        Ok(Self {
            time: datetime_to_unix_seconds(time),
            price: decimal_to_f64(price, "price")?,
        })
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.time.is_finite() && self.price.is_finite()
    }

    pub fn validate(self) -> OverlayResult<Self> {
        if !self.is_finite() {
            return Err(OverlayError::InvalidData(
                "anchor time/price must be finite".to_owned(),
            ));
        }
        Ok(self)
    }
}
