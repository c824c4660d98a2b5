use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{OverlayError, OverlayResult};

pub fn decimal_to_f64(value: Decimal, field_name: &str) -> OverlayResult<f64> {
    value.to_f64().ok_or_else(|| {
        OverlayError::InvalidData(format!("{field_name} cannot be represented as f64"))
    })
}

#[must_use]
pub fn datetime_to_unix_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

/// Validates that `value` is finite and strictly positive.
pub(crate) fn ensure_positive(value: f64, name: &str) -> OverlayResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(OverlayError::InvalidData(format!(
            "`{name}` must be finite and > 0"
        )));
    }
    Ok(value)
}

/// Validates that `value` is finite and inside `[0, 1]`.
pub(crate) fn ensure_unit_interval(value: f64, name: &str) -> OverlayResult<f64> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(OverlayError::InvalidData(format!(
            "`{name}` must be finite and in [0, 1]"
        )));
    }
    Ok(value)
}
