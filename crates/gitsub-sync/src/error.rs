//! Error types for synchronizer and object-client operations

use thiserror::Error;

/// Synchronizer-facing errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to register deployable {deployable}: {message}")]
    Registration { deployable: String, message: String },

    #[error("{kind} not found: {key}")]
    NotFound { kind: String, key: String },

    #[error("Conflict updating {key}: {message}")]
    Conflict { key: String, message: String },

    #[error("Status update failed: {message}")]
    Status { message: String },

    #[error("Object client error: {message}")]
    Client { message: String },
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }
}

/// Result type for synchronizer operations
pub type Result<T> = std::result::Result<T, SyncError>;
