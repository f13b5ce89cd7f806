//! The download collaborator.

use std::path::PathBuf;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    #[error("download failed with HTTP {status}")]
    Http { status: u16 },

    #[error("download transport error: {message}")]
    Transport { message: String },

    #[error("could not write '{path}': {message}")]
    Io { path: String, message: String },
}

impl DownloadError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DownloadError::Http { status: 403 | 404 } => {
                "The download link has expired or you no longer have access."
            }
            DownloadError::Http { .. } | DownloadError::Transport { .. } => {
                "The download failed. Check your connection and try again."
            }
            DownloadError::Io { .. } => "The file could not be saved on this device.",
        }
    }
}

/// Transfers a resolved URL to local storage.
///
/// Failures are reported to the caller and never touch entitlements.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Save `url` as `filename`; returns where the file ended up.
    async fn download(&self, url: &str, filename: &str) -> Result<PathBuf, DownloadError>;
}
