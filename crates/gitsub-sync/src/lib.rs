//! Gitsub Sync - downstream synchronizer contracts
//!
//! The synchronizer that applies deployables to a target environment is an
//! external collaborator. This crate defines the seams the engine talks
//! through:
//!
//! - **`Synchronizer`**: template registration, supported-kind lookup, and
//!   validator-driven garbage collection of stale deployables
//! - **`ObjectClient`**: reads and status writes for the object store backing
//!   subscriptions, secrets, config maps, and chart releases
//! - **`status`**: per-package status recording and stale-entry pruning
//! - **`mock`**: in-memory implementations with operation counters for tests

pub mod client;
pub mod error;
pub mod mock;
pub mod status;
pub mod synchronizer;

pub use client::{ConfigMap, ObjectClient, Secret};
pub use error::{Result, SyncError};
pub use status::{set_package_status, validate_packages_in_status};
pub use synchronizer::{RegisteredKind, ResourceValidator, Synchronizer, ValidEntry};
