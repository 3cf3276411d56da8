//! Synchronizer contract
//!
//! Registration calls for the same host key serialize such that an
//! `apply_validator` call observes every registration made before it by the
//! same cycle. The synchronizer is the only cross-item shared mutable state,
//! so implementations must be safe for concurrent calls from multiple items.

use async_trait::async_trait;

use gitsub_core::{Deployable, Gvk, ObjectRef};

use crate::error::Result;

/// A supported kind as the synchronizer sees it: the normalized group,
/// version and kind plus whether the kind is namespace-scoped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredKind {
    pub gvk: Gvk,
    pub namespaced: bool,
}

/// One resource marked valid during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidEntry {
    pub gvk: Gvk,
    pub host: ObjectRef,
    pub deployable: ObjectRef,
}

/// Accumulates the resources a cycle re-validated. Applying it garbage
/// collects every deployable previously registered under the same source tag
/// that was not re-validated this round.
#[derive(Debug, Clone)]
pub struct ResourceValidator {
    source: String,
    entries: Vec<ValidEntry>,
}

impl ResourceValidator {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            entries: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn add_valid_resource(&mut self, gvk: Gvk, host: ObjectRef, deployable: ObjectRef) {
        self.entries.push(ValidEntry {
            gvk,
            host,
            deployable,
        });
    }

    pub fn entries(&self) -> &[ValidEntry] {
        &self.entries
    }

    pub fn is_valid(&self, deployable: &ObjectRef) -> bool {
        self.entries.iter().any(|e| &e.deployable == deployable)
    }
}

/// The downstream reconciler the engine registers deployables with
#[async_trait]
pub trait Synchronizer: Send + Sync {
    /// Start a validation round for one source tag
    fn create_validator(&self, source: &str) -> ResourceValidator {
        ResourceValidator::new(source)
    }

    /// Map an observed kind to a supported, normalized kind.
    /// `None` means the kind is not supported.
    fn validated_gvk(&self, gvk: &Gvk) -> Option<RegisteredKind>;

    /// Register a deployable template under a host key and source tag
    async fn register_template(
        &self,
        host: &ObjectRef,
        deployable: Deployable,
        source: &str,
    ) -> Result<()>;

    /// Apply a validation round: remove deployables under the validator's
    /// source tag that were not marked valid this round
    async fn apply_validator(&self, validator: ResourceValidator) -> Result<()>;
}
