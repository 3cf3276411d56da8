//! Subscription definition and status
//!
//! A subscription declares the desired state for one channel: which packages
//! to pick up, how to filter them, and which per-package overrides to apply
//! before the artifacts are handed to the synchronizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

use crate::reference::{ConfigMapRef, ObjectRef};

/// API version stamped on owner references pointing back at a subscription
pub const SUBSCRIPTION_API_VERSION: &str = "apps.gitsub.io/v1alpha1";

/// Kind stamped on owner references pointing back at a subscription
pub const SUBSCRIPTION_KIND: &str = "Subscription";

/// Set of deployable names processed in one reconciliation cycle.
///
/// Rebuilt every cycle and used to prune stale entries from the subscription
/// status. Packages that failed with a recorded status are inserted as well,
/// so their failure entry survives the pruning pass.
pub type PackageSet = BTreeSet<String>;

/// A subscription to a source channel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub name: String,
    pub namespace: String,

    /// Unique identifier, used for owner references on generated releases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    pub spec: SubscriptionSpec,

    #[serde(default)]
    pub status: SubscriptionStatus,
}

impl Subscription {
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.name.clone(), self.namespace.clone())
    }
}

/// Subscription spec
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// Channel key (`namespace/name`) this subscription is bound to
    #[serde(default)]
    pub channel: String,

    /// Exact package name to subscribe to; empty means all packages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Filters applied to candidate packages and resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_filter: Option<PackageFilter>,

    /// Per-package override fragments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_overrides: Vec<PackageOverrides>,
}

impl SubscriptionSpec {
    /// The declared package name, with the empty string treated as absent
    pub fn package_name(&self) -> Option<&str> {
        self.package.as_deref().filter(|p| !p.is_empty())
    }
}

/// Filter criteria for candidate packages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFilter {
    /// Label selector a resource must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,

    /// Annotations a resource must carry, matched by equality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// Semantic version range a chart version must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Semantic version range the chart's declared tiller version must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiller_version: Option<String>,

    /// Config map whose `path` key narrows the repository sub-tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_ref: Option<ConfigMapRef>,
}

impl PackageFilter {
    /// The declared version range, with the empty string treated as absent
    pub fn version_range(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }

    /// The declared tiller version range, with the empty string treated as absent
    pub fn tiller_version_range(&self) -> Option<&str> {
        self.tiller_version.as_deref().filter(|v| !v.is_empty())
    }
}

/// Kubernetes-style label selector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

impl LabelSelector {
    /// Check whether a label set satisfies this selector.
    ///
    /// An empty selector matches everything. All terms are conjunctive.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        for (key, value) in &self.match_labels {
            if labels.get(key) != Some(value) {
                return false;
            }
        }

        self.match_expressions.iter().all(|req| req.matches(labels))
    }
}

/// A single selector requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl LabelSelectorRequirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.iter().any(|x| x == v)),
            SelectorOperator::NotIn => value.is_none_or(|v| !self.values.iter().any(|x| x == v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }
}

/// Selector requirement operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// Ordered override fragments for one package
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOverrides {
    pub package_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_overrides: Vec<OverrideFragment>,
}

/// A raw override tree, merged into the target document by the override engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideFragment(pub JsonValue);

/// Subscription status, keyed by deployable name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub statuses: BTreeMap<String, UnitStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

/// Per-package status entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStatus {
    pub phase: UnitPhase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_status: Option<JsonValue>,

    pub last_update_time: DateTime<Utc>,
}

/// Phase of a per-package status entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitPhase {
    Subscribed,
    Failed,
}
