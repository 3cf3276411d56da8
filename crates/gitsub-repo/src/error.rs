//! Error types for repository operations

use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Fetch Errors ============
    #[error("Failed to fetch repository {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ============ Classification Errors ============
    #[error("Failed to classify repository tree at {path}: {message}")]
    Classification { path: String, message: String },

    // ============ Index Errors ============
    #[error("Invalid chart manifest {path}: {message}")]
    ChartManifest { path: String, message: String },

    // ============ Constraint Errors ============
    #[error("Invalid version range '{range}': {message}")]
    InvalidRange { range: String, message: String },

    #[error("Invalid version '{version}': {message}")]
    InvalidVersion { version: String, message: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<walkdir::Error> for RepoError {
    fn from(e: walkdir::Error) -> Self {
        RepoError::Classification {
            path: e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            message: e.to_string(),
        }
    }
}
