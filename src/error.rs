use thiserror::Error;

/// Library error type for gallery operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No asset with this identifier exists in the library.
    #[error("asset not found: {0}")]
    NotFound(String),

    /// The asset exists but could not be decoded or re-encoded.
    #[error("failed to decode asset {id}: {reason}")]
    DecodeFailed { id: String, reason: String },

    /// The slice call itself failed (library unavailable, enumeration failed).
    #[error("asset source failed: {0}")]
    Transport(String),
}

impl Error {
    /// Wire code used at the plugin boundary.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::DecodeFailed { .. } => "DecodeFailed",
            Self::Transport(_) => "Unavailable",
        }
    }
}
