mod engine;
mod engine_config;
mod input_controller;
mod plugin_dispatch;
mod plugin_registry;
mod tool_dispatcher;

pub use engine::OverlayEngine;
pub use engine_config::OverlayConfig;
pub use input_controller::{ClickEvent, InputDisposition};
pub use tool_dispatcher::{ToolDispatcher, ToolStateSnapshot};
