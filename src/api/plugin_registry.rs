use indexmap::map::Entry;
use tracing::debug;

use crate::error::{OverlayError, OverlayResult};
use crate::extensions::OverlayPlugin;
use crate::render::Renderer;

use super::OverlayEngine;

impl<R: Renderer> OverlayEngine<R> {
    /// Adds an observer. Plugins see events in registration order; ids are unique.
    pub fn register_plugin(&mut self, plugin: Box<dyn OverlayPlugin>) -> OverlayResult<()> {
        let id = plugin.id().to_owned();
        if id.is_empty() {
            return Err(OverlayError::InvalidData(
                "plugin id must not be empty".to_owned(),
            ));
        }
        match self.plugins.entry(id) {
            Entry::Occupied(entry) => Err(OverlayError::InvalidData(format!(
                "plugin `{}` is already registered",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                debug!(plugin = entry.key().as_str(), "overlay plugin registered");
                entry.insert(plugin);
                Ok(())
            }
        }
    }

    /// Keeps the remaining plugins in registration order.
    pub fn unregister_plugin(&mut self, plugin_id: &str) -> bool {
        self.plugins.shift_remove(plugin_id).is_some()
    }

    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugins.contains_key(plugin_id)
    }

    pub fn plugin_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.plugins.keys().map(String::as_str)
    }
}
