//! In-memory mock collaborators for testing
//!
//! These mocks keep everything in memory and track operation counts, so
//! engine tests can assert registration and garbage-collection behavior
//! without a real cluster behind the seams.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use gitsub_core::{Deployable, Gvk, HelmRelease, ObjectRef, Subscription, SubscriptionStatus};

use crate::client::{ConfigMap, ObjectClient, Secret};
use crate::error::{Result, SyncError};
use crate::synchronizer::{RegisteredKind, ResourceValidator, Synchronizer};

/// Counts of synchronizer operations for test assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub registrations: usize,
    pub validator_applies: usize,
    pub removals: usize,
}

/// In-memory synchronizer
#[derive(Clone, Default)]
pub struct MockSynchronizer {
    /// Supported kinds: observed GVK -> normalized kind + scope
    kinds: HashMap<Gvk, RegisteredKind>,
    /// Registered deployables: source tag -> deployable name -> deployable
    registered: Arc<RwLock<HashMap<String, BTreeMap<String, Deployable>>>>,
    /// Deployable names whose registration should fail
    fail_registration_for: Arc<RwLock<HashSet<String>>>,
    operations: Arc<RwLock<OperationCounts>>,
}

impl MockSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A synchronizer accepting the common namespaced kinds used in tests
    pub fn with_default_kinds() -> Self {
        let mut sync = Self::new();
        sync.register_kind(Gvk::new("", "v1", "ConfigMap"), true);
        sync.register_kind(Gvk::new("", "v1", "Secret"), true);
        sync.register_kind(Gvk::new("apps", "v1", "Deployment"), true);
        sync.register_kind(Gvk::new("", "v1", "Namespace"), false);
        sync
    }

    /// Declare a supported kind, mapped to itself
    pub fn register_kind(&mut self, gvk: Gvk, namespaced: bool) {
        self.kinds.insert(
            gvk.clone(),
            RegisteredKind { gvk, namespaced },
        );
    }

    /// Make registration fail for one deployable name
    pub fn fail_registration_for(&self, deployable_name: &str) {
        self.fail_registration_for
            .write()
            .unwrap()
            .insert(deployable_name.to_string());
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    pub fn registration_count(&self) -> usize {
        self.operations.read().unwrap().registrations
    }

    /// Deployables currently registered under a source tag
    pub fn registered(&self, source: &str) -> Vec<Deployable> {
        self.registered
            .read()
            .unwrap()
            .get(source)
            .map(|by_name| by_name.values().cloned().collect())
            .unwrap_or_default()
    }

    /// All registered deployable names across sources, sorted
    pub fn all_registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registered
            .read()
            .unwrap()
            .values()
            .flat_map(|by_name| by_name.keys().cloned())
            .collect();
        names.sort();
        names
    }

    /// Look up one registered deployable by source tag and name
    pub fn deployable(&self, source: &str, name: &str) -> Option<Deployable> {
        self.registered
            .read()
            .unwrap()
            .get(source)
            .and_then(|by_name| by_name.get(name).cloned())
    }
}

#[async_trait]
impl Synchronizer for MockSynchronizer {
    fn validated_gvk(&self, gvk: &Gvk) -> Option<RegisteredKind> {
        self.kinds.get(gvk).cloned()
    }

    async fn register_template(
        &self,
        _host: &ObjectRef,
        deployable: Deployable,
        source: &str,
    ) -> Result<()> {
        if self
            .fail_registration_for
            .read()
            .unwrap()
            .contains(&deployable.name)
        {
            return Err(SyncError::Registration {
                deployable: deployable.name.clone(),
                message: "injected registration failure".to_string(),
            });
        }

        self.operations.write().unwrap().registrations += 1;
        self.registered
            .write()
            .unwrap()
            .entry(source.to_string())
            .or_default()
            .insert(deployable.name.clone(), deployable);
        Ok(())
    }

    async fn apply_validator(&self, validator: ResourceValidator) -> Result<()> {
        let mut operations = self.operations.write().unwrap();
        operations.validator_applies += 1;

        let mut registered = self.registered.write().unwrap();
        if let Some(by_name) = registered.get_mut(validator.source()) {
            let before = by_name.len();
            by_name.retain(|_, dpl| validator.is_valid(&dpl.object_ref()));
            operations.removals += before - by_name.len();
        }
        Ok(())
    }
}

/// In-memory object client
#[derive(Clone, Default)]
pub struct MockObjectClient {
    secrets: Arc<RwLock<HashMap<ObjectRef, Secret>>>,
    config_maps: Arc<RwLock<HashMap<ObjectRef, ConfigMap>>>,
    helm_releases: Arc<RwLock<HashMap<ObjectRef, HelmRelease>>>,
    subscriptions: Arc<RwLock<HashMap<ObjectRef, Subscription>>>,
    statuses: Arc<RwLock<HashMap<ObjectRef, SubscriptionStatus>>>,
    conflict_next_update: Arc<AtomicBool>,
}

impl MockObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_secret(&self, key: ObjectRef, data: BTreeMap<String, String>) {
        self.secrets.write().unwrap().insert(key, Secret { data });
    }

    pub fn put_config_map(&self, key: ObjectRef, data: BTreeMap<String, String>) {
        self.config_maps
            .write()
            .unwrap()
            .insert(key, ConfigMap { data });
    }

    pub fn put_helm_release(&self, key: ObjectRef, release: HelmRelease) {
        self.helm_releases.write().unwrap().insert(key, release);
    }

    pub fn put_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .unwrap()
            .insert(subscription.object_ref(), subscription);
    }

    /// Make the next status update fail with a conflict
    pub fn fail_next_status_update(&self) {
        self.conflict_next_update.store(true, Ordering::SeqCst);
    }

    /// The last status persisted for a subscription
    pub fn stored_status(&self, key: &ObjectRef) -> Option<SubscriptionStatus> {
        self.statuses.read().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectClient for MockObjectClient {
    async fn get_secret(&self, key: &ObjectRef) -> Result<Secret> {
        self.secrets
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::NotFound {
                kind: "Secret".to_string(),
                key: key.to_string(),
            })
    }

    async fn get_config_map(&self, key: &ObjectRef) -> Result<ConfigMap> {
        self.config_maps
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::NotFound {
                kind: "ConfigMap".to_string(),
                key: key.to_string(),
            })
    }

    async fn get_helm_release(&self, key: &ObjectRef) -> Result<Option<HelmRelease>> {
        Ok(self.helm_releases.read().unwrap().get(key).cloned())
    }

    async fn get_subscription(&self, key: &ObjectRef) -> Result<Subscription> {
        self.subscriptions
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::NotFound {
                kind: "Subscription".to_string(),
                key: key.to_string(),
            })
    }

    async fn update_subscription_status(
        &self,
        key: &ObjectRef,
        status: &SubscriptionStatus,
    ) -> Result<()> {
        if self.conflict_next_update.swap(false, Ordering::SeqCst) {
            return Err(SyncError::Conflict {
                key: key.to_string(),
                message: "injected status conflict".to_string(),
            });
        }

        self.statuses
            .write()
            .unwrap()
            .insert(key.clone(), status.clone());

        if let Some(subscription) = self.subscriptions.write().unwrap().get_mut(key) {
            subscription.status = status.clone();
        }
        Ok(())
    }
}
