use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Conflict: {0} was modified since it was read")]
    Conflict(String),
    #[error("No write token configured, setup required")]
    ReadOnly,
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Network-level failures that the next poll tick will simply retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result of a successful whole-file write
#[derive(Debug, Clone, PartialEq)]
pub struct WriteReceipt {
    /// Commit created by the write
    pub revision_id: String,
    pub html_url: Option<String>,
}

/// A version-controlled repository holding the archive files.
///
/// Reads are addressed by a revision reference (branch name or commit id).
/// Writes replace a whole file and are conditioned on its current revision.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Latest commit id on `reference`
    async fn read_commit_head(&self, reference: &str) -> Result<String, RemoteError>;

    /// Latest commit id on `reference` that touched `path`, `None` if the
    /// path was never committed
    async fn read_file_history(
        &self,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>, RemoteError>;

    /// File contents at `reference`. A missing file is `Ok(None)`.
    async fn read_file(&self, path: &str, reference: &str) -> Result<Option<String>, RemoteError>;

    /// Replace `path` with `text` on the configured branch
    async fn write_file(
        &self,
        path: &str,
        text: &str,
        message: &str,
    ) -> Result<WriteReceipt, RemoteError>;

    /// Whether a write credential is configured
    fn can_write(&self) -> bool;
}
