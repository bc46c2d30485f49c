/// Errors surfaced by the listing services.
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    #[error("Failed to upload image {index}: {source}")]
    UploadFailed {
        /// 1-based position of the image in the caller's list
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("Listing not found: {0}")]
    NotFound(String),

    #[error("User {actor} does not own listing {id}")]
    NotOwner { id: String, actor: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ListingError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias.
pub type ListingResult<T> = Result<T, ListingError>;
