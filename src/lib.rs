//! chart-overlay: annotation and drawing-tool overlay engine.
//!
//! Marks, drawing tools and a scrolling-text layer are drawn on top of a
//! chart rendered elsewhere. The host chart is reached only through the
//! [`core::ChartHost`] trait, so every coordinate lookup may fail and every
//! failure degrades to a skipped primitive instead of a broken frame.

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod interaction;
pub mod render;
pub mod telemetry;

pub use api::{OverlayConfig, OverlayEngine};
pub use error::{OverlayError, OverlayResult};
