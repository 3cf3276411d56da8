//! Gitsub Repo - repository handling for the Git subscription engine
//!
//! This crate owns everything between the fetched working tree and the
//! filtered chart index:
//!
//! - **Fetch seam**: the `RepositoryFetcher` trait the Git transport plugs
//!   into, plus staging-directory derivation and per-path serialization
//! - **Classifier**: partitions a fetched tree into chart roots and
//!   plain-resource directories
//! - **Chart index**: one entry per discovered chart version, sorted by
//!   descending semantic version
//! - **Constraint matcher**: semantic-version range parsing and matching
//! - **Filter pipeline**: name and version/tiller filtering over the index

pub mod classify;
pub mod constraint;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod index;

pub use classify::{CHART_MANIFEST, ClassifiedRepository, classify_repository};
pub use constraint::{VersionRange, version_matches};
pub use error::{RepoError, Result};
pub use fetch::{
    BasicCredentials, FetchRequest, FetchedRepository, RepositoryFetcher, lock_staging_path,
    prepare_staging_dir, staging_dir,
};
pub use filter::filter_charts;
pub use index::{ChartEntry, ChartIndex, ChartMetadata};
