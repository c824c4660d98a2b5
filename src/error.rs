use thiserror::Error;

pub type OverlayResult<T> = Result<T, OverlayError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OverlayError {
    /// The host could not map an anchor or pixel for the current frame.
    #[error("coordinate unavailable: {0}")]
    CoordinateUnavailable(&'static str),

    /// A primitive was asked to draw before `attached` or after the host went away.
    #[error("primitive is not attached to a ready chart/series")]
    AttachmentNotReady,

    #[error("failed to load asset `{source_id}`: {reason}")]
    AssetLoadFailure { source_id: String, reason: String },

    #[error("drawing session cancelled: {reason}")]
    SessionCancelled { reason: String },

    #[error("unknown drawing tool `{0}`")]
    UnknownTool(String),

    #[error("invalid viewport size: width={width}, height={height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl OverlayError {
    /// Returns `true` for errors that only mean "skip this primitive for this frame".
    #[must_use]
    pub fn is_frame_skip(&self) -> bool {
        matches!(
            self,
            Self::CoordinateUnavailable(_) | Self::AttachmentNotReady
        )
    }
}
