//! Repository fetch seam and staging-area management
//!
//! The Git transport itself is an external collaborator behind
//! `RepositoryFetcher`. This module owns what surrounds it: deriving a
//! staging directory per (channel, subscription) pair, recreating it each
//! cycle, and serializing concurrent cycles that resolve to the same path.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

use gitsub_core::ObjectRef;

use crate::error::Result;

/// Basic credentials resolved from a channel's secret reference
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// One fetch invocation
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Repository URL
    pub url: String,

    /// Branch or reference; `None` means the remote default branch
    pub reference: Option<String>,

    pub credentials: Option<BasicCredentials>,

    /// Directory the transport materializes the working tree into
    pub staging_dir: PathBuf,
}

/// A fetched working tree with its content identifier
#[derive(Debug, Clone)]
pub struct FetchedRepository {
    pub root: PathBuf,

    /// Stable content identifier (commit hash), compared across cycles
    pub commit_id: String,
}

/// The transport that materializes a repository. Implementations must support
/// shallow, single-branch fetches and return a stable content identifier.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedRepository>;
}

/// Derive the staging directory for one (channel, subscription) pair.
///
/// Keying on both identities keeps items subscribed to the same channel from
/// clobbering each other's working trees.
pub fn staging_dir(base: &Path, channel: &ObjectRef, subscription: &ObjectRef) -> PathBuf {
    base.join(&channel.namespace)
        .join(&channel.name)
        .join(&subscription.namespace)
        .join(&subscription.name)
}

/// Delete and recreate a staging directory
pub fn prepare_staging_dir(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    std::fs::create_dir_all(path)?;
    Ok(())
}

static STAGING_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Acquire the process-wide lock for a staging path. Held for the duration of
/// a cycle's fetch-and-process window so concurrent cycles resolving to the
/// same path serialize instead of racing on delete/recreate.
pub async fn lock_staging_path(path: &Path) -> OwnedMutexGuard<()> {
    let lock = {
        let mut locks = STAGING_LOCKS.lock().expect("staging lock registry poisoned");
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    };
    lock.lock_owned().await
}
