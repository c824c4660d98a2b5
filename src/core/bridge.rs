use crate::core::{Anchor, ChartHost, OhlcBar, PixelPoint, Viewport};
use crate::error::{OverlayError, OverlayResult};

/// Stateless adapter between anchor space and pixel space.
///
/// All lookups go through the host on every call, so results always reflect
/// the host's current scroll/zoom. Callers must treat `None` as "skip this
/// frame" and never substitute a default coordinate.
#[derive(Clone, Copy)]
pub struct CoordinateBridge<'a> {
    host: &'a dyn ChartHost,
}

impl<'a> CoordinateBridge<'a> {
    #[must_use]
    pub fn new(host: &'a dyn ChartHost) -> Self {
        Self { host }
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.host.viewport()
    }

    #[must_use]
    pub fn time_to_pixel_x(&self, time: f64) -> Option<f64> {
        if !time.is_finite() {
            return None;
        }
        self.host.time_to_coordinate(time).filter(|x| x.is_finite())
    }

    #[must_use]
    pub fn price_to_pixel_y(&self, price: f64) -> Option<f64> {
        if !price.is_finite() {
            return None;
        }
        self.host.price_to_coordinate(price).filter(|y| y.is_finite())
    }

    #[must_use]
    pub fn pixel_x_to_time(&self, x: f64) -> Option<f64> {
        if !x.is_finite() {
            return None;
        }
        self.host.coordinate_to_time(x).filter(|time| time.is_finite())
    }

    #[must_use]
    pub fn pixel_y_to_price(&self, y: f64) -> Option<f64> {
        if !y.is_finite() {
            return None;
        }
        self.host.coordinate_to_price(y).filter(|price| price.is_finite())
    }

    #[must_use]
    pub fn anchor_to_pixel(&self, anchor: Anchor) -> Option<PixelPoint> {
        Some(PixelPoint::new(
            self.time_to_pixel_x(anchor.time)?,
            self.price_to_pixel_y(anchor.price)?,
        ))
    }

    #[must_use]
    pub fn pixel_to_anchor(&self, point: PixelPoint) -> Option<Anchor> {
        Some(Anchor::new(
            self.pixel_x_to_time(point.x)?,
            self.pixel_y_to_price(point.y)?,
        ))
    }

    #[must_use]
    pub fn bar_at(&self, time: f64) -> Option<OhlcBar> {
        self.host.bar_at(time)
    }
}

/// Lifts a nullable bridge lookup into the frame-skip error used by draw code.
pub fn resolved<T>(value: Option<T>, what: &'static str) -> OverlayResult<T> {
    value.ok_or(OverlayError::CoordinateUnavailable(what))
}
