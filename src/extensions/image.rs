use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::OverlayError;

/// Load progress of an image-backed mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageState {
    Pending,
    Ready { width: u32, height: u32 },
    /// Terminal. The mark keeps its pending placeholder forever.
    Failed { reason: String },
}

struct ImageSlot {
    source_id: String,
    state: ImageState,
    on_ready: Option<Box<dyn FnOnce()>>,
}

/// Shared readiness cell read by draw code.
///
/// Loading happens outside the render path; the loader completes it through
/// the paired [`ImageLoadCallback`].
#[derive(Clone)]
pub struct ImageHandle {
    slot: Rc<RefCell<ImageSlot>>,
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("ImageHandle")
            .field("source_id", &slot.source_id)
            .field("state", &slot.state)
            .finish()
    }
}

impl ImageHandle {
    /// Creates a pending image and the one-shot callback its loader completes.
    #[must_use]
    pub fn pending(source_id: impl Into<String>) -> (Self, ImageLoadCallback) {
        let slot = Rc::new(RefCell::new(ImageSlot {
            source_id: source_id.into(),
            state: ImageState::Pending,
            on_ready: None,
        }));
        let callback = ImageLoadCallback {
            slot: Rc::downgrade(&slot),
        };
        (Self { slot }, callback)
    }

    #[must_use]
    pub fn source_id(&self) -> String {
        self.slot.borrow().source_id.clone()
    }

    #[must_use]
    pub fn state(&self) -> ImageState {
        self.slot.borrow().state.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.slot.borrow().state, ImageState::Ready { .. })
    }

    /// Runs `hook` once the image is ready, immediately if it already is.
    pub fn on_ready(&self, hook: impl FnOnce() + 'static) {
        if self.is_ready() {
            hook();
            return;
        }
        self.slot.borrow_mut().on_ready = Some(Box::new(hook));
    }

    pub(crate) fn clear_on_ready(&self) {
        self.slot.borrow_mut().on_ready = None;
    }
}

/// Completion side of an [`ImageHandle`]. Consumed by the first outcome.
pub struct ImageLoadCallback {
    slot: Weak<RefCell<ImageSlot>>,
}

impl fmt::Debug for ImageLoadCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoadCallback")
            .field("alive", &(self.slot.strong_count() > 0))
            .finish()
    }
}

impl ImageLoadCallback {
    /// Marks the image ready. No-op when the mark was dropped meanwhile.
    pub fn complete(self, width: u32, height: u32) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let hook = {
            let mut slot = slot.borrow_mut();
            if slot.state != ImageState::Pending {
                return;
            }
            slot.state = ImageState::Ready { width, height };
            debug!(source_id = %slot.source_id, width, height, "image ready");
            slot.on_ready.take()
        };
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Records a load failure and logs it once.
    pub fn fail(self, reason: impl Into<String>) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let mut slot = slot.borrow_mut();
        if slot.state != ImageState::Pending {
            return;
        }
        let reason = reason.into();
        let error = OverlayError::AssetLoadFailure {
            source_id: slot.source_id.clone(),
            reason: reason.clone(),
        };
        warn!(error = %error, "image-backed mark stays in pending state");
        slot.state = ImageState::Failed { reason };
        slot.on_ready = None;
    }
}
