//! Opt-in `tracing` setup for applications embedding `chart-overlay`.
//!
//! The crate only emits events; nothing is installed unless the host calls
//! one of these helpers with the `telemetry` feature enabled. Useful targets:
//! `chart_overlay::extensions` reports per-frame skips and failures,
//! `chart_overlay::interaction` reports drawing-session transitions.

/// Filter used when `RUST_LOG` is unset: overlay events at `debug`, the rest at `warn`.
pub const DEFAULT_OVERLAY_FILTER: &str = "warn,chart_overlay=debug";

/// Installs a compact subscriber honoring `RUST_LOG`, else [`DEFAULT_OVERLAY_FILTER`].
///
/// Returns `false` when the feature is disabled or a global subscriber is
/// already set.
#[must_use]
pub fn init_default_tracing() -> bool {
    init_tracing_with_filter(DEFAULT_OVERLAY_FILTER)
}

/// Like [`init_default_tracing`] with a caller-supplied fallback directive.
#[must_use]
pub fn init_tracing_with_filter(fallback: &str) -> bool {
    #[cfg(feature = "telemetry")]
    {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
        return tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init()
            .is_ok();
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = fallback;
        false
    }
}
