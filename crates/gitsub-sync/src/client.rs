//! Object client contract
//!
//! Read access to the objects the engine consults during a cycle (secrets,
//! config maps, chart releases, subscriptions) and write access to
//! subscription status. Backed by a real object store in production and by
//! `mock::MockObjectClient` in tests.

use async_trait::async_trait;
use std::collections::BTreeMap;

use gitsub_core::{HelmRelease, ObjectRef, Subscription, SubscriptionStatus};

use crate::error::Result;

/// A secret's decoded key/value data
#[derive(Debug, Clone, Default)]
pub struct Secret {
    pub data: BTreeMap<String, String>,
}

/// A config map's key/value data
#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    pub data: BTreeMap<String, String>,
}

/// Read/write access to the object store backing the engine
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn get_secret(&self, key: &ObjectRef) -> Result<Secret>;

    async fn get_config_map(&self, key: &ObjectRef) -> Result<ConfigMap>;

    /// Look up an existing chart release descriptor; `None` when absent
    async fn get_helm_release(&self, key: &ObjectRef) -> Result<Option<HelmRelease>>;

    /// Re-fetch a subscription (used to recover from status conflicts)
    async fn get_subscription(&self, key: &ObjectRef) -> Result<Subscription>;

    /// Persist a subscription's status
    async fn update_subscription_status(
        &self,
        key: &ObjectRef,
        status: &SubscriptionStatus,
    ) -> Result<()>;
}
