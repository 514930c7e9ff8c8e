//! Artifact error types.

use thiserror::Error;

/// Result type for artifact operations.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Errors that can occur while fetching or unpacking the model artifact.
///
/// All of these are fatal at startup; the service must not come up without
/// a complete artifact on disk.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact download failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Artifact server returned {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Artifact archive is invalid: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArtifactError {
    /// Create an archive failure error.
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive(message.into())
    }
}
