use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::primitives::{datetime_to_unix_seconds, decimal_to_f64};
use crate::error::{OverlayError, OverlayResult};

/// One bar of the host series, keyed by time.
///
/// Static marks hang off a bar's extremum, so only the shape invariants that
/// placement depends on are enforced: finite values and `low <= open, close <= high`.
/// Deserialized bars go through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBar")]
pub struct OhlcBar {
    pub time: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Deserialize)]
struct RawBar {
    time: f64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl TryFrom<RawBar> for OhlcBar {
    type Error = OverlayError;

    fn try_from(raw: RawBar) -> OverlayResult<Self> {
        Self::new(raw.time, raw.open, raw.high, raw.low, raw.close)
    }
}

impl OhlcBar {
    pub fn new(time: f64, open: f64, high: f64, low: f64, close: f64) -> OverlayResult<Self> {
        let values = [("time", time), ("open", open), ("high", high), ("low", low), ("close", close)];
        if let Some((name, _)) = values.iter().find(|(_, value)| !value.is_finite()) {
            return Err(OverlayError::InvalidData(format!("bar `{name}` must be finite")));
        }
        if !(low <= open.min(close) && open.max(close) <= high) {
            return Err(OverlayError::InvalidData(format!(
                "bar at {time}: open/close must lie within [low, high]"
            )));
        }
        Ok(Self {
            time,
            open,
            high,
            low,
            close,
        })
    }

    pub fn from_decimal_time(
        time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> OverlayResult<Self> {
        Self::new(
            datetime_to_unix_seconds(time),
            decimal_to_f64(open, "open")?,
            decimal_to_f64(high, "high")?,
            decimal_to_f64(low, "low")?,
            decimal_to_f64(close, "close")?,
        )
    }

    /// `(low, high)`.
    #[must_use]
    pub fn price_span(self) -> (f64, f64) {
        (self.low, self.high)
    }
}
