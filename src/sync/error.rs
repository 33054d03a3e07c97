use thiserror::Error;

use crate::codec::ParseError;
use crate::storage::ValidationError;

use super::remote::RemoteError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Restore rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error("Chapter not found: {0}")]
    ChapterNotFound(String),
    #[error("Photo not found: {photo_id} in chapter {chapter_id}")]
    PhotoNotFound { chapter_id: String, photo_id: String },
    #[error("Slug already used by another chapter: {0}")]
    DuplicateSlug(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    /// Deployed code moved ahead of this instance; writes are refused
    /// until it is restarted
    #[error("Deployed code changed at {0}, reload required")]
    ReloadRequired(String),
    /// A later push that carried this change failed
    #[error("Sync failed: {0}")]
    SyncFailed(String),
}

impl SyncError {
    /// True when the mutation was refused before touching the cache. Any
    /// other error from a mutation means the change is applied locally but
    /// did not reach the remote store.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::ChapterNotFound(_)
                | Self::PhotoNotFound { .. }
                | Self::DuplicateSlug(_)
                | Self::InvalidRecord(_)
                | Self::ReloadRequired(_)
                | Self::Validation(_)
                | Self::Parse(_)
        )
    }
}
