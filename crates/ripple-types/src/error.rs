use thiserror::Error;

/// Error taxonomy of the messaging core.
///
/// Live-push failures are deliberately absent: an offline recipient is
/// expected, not exceptional, and never aborts the durable half of an
/// operation. The REST layer owns the translation of these kinds into
/// transport responses; the core never formats a response body.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input, e.g. a message with neither text nor media.
    #[error("{0}")]
    Validation(String),

    /// Unknown conversation, notification or identity.
    #[error("{0}")]
    NotFound(String),

    /// The media collaborator failed; aborts a send before any persistence.
    #[error("media upload failed: {0}")]
    Upload(String),

    /// The caller's identity could not be resolved.
    #[error("unauthorized")]
    Unauthorized,

    /// Persistence or runtime failure, surfaced to the caller unmodified.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
