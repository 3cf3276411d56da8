//! Chart release descriptor
//!
//! The descriptor generated for each subscribed chart package. It is not
//! applied directly; the engine wraps it into a `Deployable` and the
//! downstream reconciler materializes the actual release.

use serde::{Deserialize, Serialize};

use crate::reference::{ConfigMapRef, SecretRef};
use crate::subscription::{SUBSCRIPTION_API_VERSION, SUBSCRIPTION_KIND, Subscription};

/// API version of generated release descriptors
pub const HELM_RELEASE_API_VERSION: &str = "apps.gitsub.io/v1alpha1";

/// Kind of generated release descriptors
pub const HELM_RELEASE_KIND: &str = "HelmRelease";

/// A chart release descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRelease {
    pub api_version: String,
    pub kind: String,
    pub metadata: ReleaseMetadata,
    pub spec: HelmReleaseSpec,
}

impl HelmRelease {
    /// Build a fresh descriptor owned by `subscription`
    pub fn new(name: impl Into<String>, subscription: &Subscription, spec: HelmReleaseSpec) -> Self {
        let owner = OwnerReference {
            api_version: SUBSCRIPTION_API_VERSION.to_string(),
            kind: SUBSCRIPTION_KIND.to_string(),
            name: subscription.name.clone(),
            uid: subscription.uid.clone().unwrap_or_default(),
        };

        Self {
            api_version: HELM_RELEASE_API_VERSION.to_string(),
            kind: HELM_RELEASE_KIND.to_string(),
            metadata: ReleaseMetadata {
                name: name.into(),
                namespace: subscription.namespace.clone(),
                owner_references: vec![owner],
            },
            spec,
        }
    }

    /// Restamp type markers lost on objects read back from a store
    pub fn restore_type_meta(&mut self) {
        self.api_version = HELM_RELEASE_API_VERSION.to_string();
        self.kind = HELM_RELEASE_KIND.to_string();
    }
}

/// Release metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseMetadata {
    pub name: String,
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

/// Owner reference back to the subscription that generated the release
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
}

/// Release spec
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseSpec {
    pub source: ReleaseSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<ConfigMapRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,

    pub chart_name: String,
    pub release_name: String,
    pub version: String,
}

/// Where the chart content comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSource {
    pub source_type: SourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSource>,
}

impl ReleaseSource {
    pub fn git(urls: Vec<String>, chart_path: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Git,
            git: Some(GitSource {
                urls,
                chart_path: chart_path.into(),
            }),
        }
    }
}

/// Source type of a release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Git,
}

/// Git source location of a chart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    pub urls: Vec<String>,
    pub chart_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_release_carries_owner_reference() {
        let sub = Subscription {
            name: "mysub".to_string(),
            namespace: "dev".to_string(),
            uid: Some("abc-123".to_string()),
            ..Default::default()
        };

        let spec = HelmReleaseSpec {
            source: ReleaseSource::git(vec!["https://example.com/repo.git".to_string()], "charts/demo"),
            chart_name: "demo".to_string(),
            release_name: "demo".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        };

        let release = HelmRelease::new("demo-mysub-dev", &sub, spec);
        assert_eq!(release.api_version, HELM_RELEASE_API_VERSION);
        assert_eq!(release.kind, HELM_RELEASE_KIND);
        assert_eq!(release.metadata.namespace, "dev");
        assert_eq!(release.metadata.owner_references.len(), 1);
        assert_eq!(release.metadata.owner_references[0].uid, "abc-123");
    }

    #[test]
    fn test_serializes_camel_case() {
        let sub = Subscription {
            name: "mysub".to_string(),
            namespace: "dev".to_string(),
            ..Default::default()
        };
        let spec = HelmReleaseSpec {
            source: ReleaseSource::git(vec!["https://example.com/repo.git".to_string()], "demo"),
            chart_name: "demo".to_string(),
            release_name: "demo".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        };
        let release = HelmRelease::new("demo-mysub-dev", &sub, spec);

        let value = serde_json::to_value(&release).unwrap();
        assert_eq!(value["apiVersion"], HELM_RELEASE_API_VERSION);
        assert_eq!(value["spec"]["chartName"], "demo");
        assert_eq!(value["spec"]["releaseName"], "demo");
        assert_eq!(value["spec"]["source"]["sourceType"], "git");
        assert_eq!(value["spec"]["source"]["git"]["chartPath"], "demo");
    }
}
