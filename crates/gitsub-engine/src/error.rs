//! Engine error types
//!
//! The taxonomy mirrors how failures propagate through a cycle: fetch and
//! classification errors are fatal to the cycle, unsupported kinds and filter
//! rejections skip one resource, override failures skip one package, and
//! status errors are logged without blocking.

use thiserror::Error;

use gitsub_core::CoreError;
use gitsub_repo::RepoError;
use gitsub_sync::SyncError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No channel bound to subscription {subscription}")]
    NoChannel { subscription: String },

    #[error("Resource kind {gvk} is not supported by the synchronizer")]
    UnsupportedKind { gvk: String },

    #[error("Resource {resource} rejected by package filter: {reason}")]
    FilterRejected { resource: String, reason: String },

    #[error("Override failed for package {package}: {message}")]
    Override { package: String, message: String },

    #[error("Cycle exceeded deadline of {seconds}s")]
    CycleTimeout { seconds: u64 },

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
