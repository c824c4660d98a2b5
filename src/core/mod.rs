pub mod bar;
pub mod bridge;
pub mod host;
pub mod price_scale;
pub mod primitives;
pub mod scale;
pub mod time_scale;
pub mod types;

pub use bar::OhlcBar;
pub use bridge::{CoordinateBridge, resolved};
pub use host::{
    ChartHost, GestureGate, GestureHolder, HeadlessChart, HeadlessChartOptions, NativeGestures,
    NativeInput,
};
pub use price_scale::PriceScale;
pub use scale::LinearScale;
pub use time_scale::TimeScale;
pub use types::{Anchor, PixelPoint, Viewport};
