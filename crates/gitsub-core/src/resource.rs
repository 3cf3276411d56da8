//! Duck-typed access to parsed declarative manifests
//!
//! Manifest files are conventional YAML/JSON documents; this module gives the
//! engine structured access to the handful of fields it cares about (kind,
//! apiVersion, metadata) without committing to any concrete resource schema.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::Result;

/// Group, version and kind of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Build from an `apiVersion` string (`"v1"` or `"apps/v1"`) and a kind
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }
}

impl std::fmt::Display for Gvk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}, Kind={}", self.version, self.kind)
        } else {
            write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
        }
    }
}

/// A parsed declarative document with duck-typed field access
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResource(JsonValue);

impl RawResource {
    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(content)?;
        Ok(Self(value))
    }

    pub fn from_value(value: JsonValue) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    fn str_field(&self, path: &[&str]) -> &str {
        let mut current = &self.0;
        for key in path {
            match current.get(key) {
                Some(next) => current = next,
                None => return "",
            }
        }
        current.as_str().unwrap_or("")
    }

    fn string_map(&self, path: &[&str]) -> BTreeMap<String, String> {
        let mut current = &self.0;
        for key in path {
            match current.get(key) {
                Some(next) => current = next,
                None => return BTreeMap::new(),
            }
        }
        current
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn api_version(&self) -> &str {
        self.str_field(&["apiVersion"])
    }

    pub fn kind(&self) -> &str {
        self.str_field(&["kind"])
    }

    pub fn name(&self) -> &str {
        self.str_field(&["metadata", "name"])
    }

    pub fn namespace(&self) -> &str {
        self.str_field(&["metadata", "namespace"])
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map(&["metadata", "labels"])
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map(&["metadata", "annotations"])
    }

    pub fn gvk(&self) -> Gvk {
        Gvk::from_api_version(self.api_version(), self.kind())
    }

    /// A document qualifies as a resource when it carries both an API version
    /// marker and a kind marker
    pub fn is_resource(&self) -> bool {
        !self.api_version().is_empty() && !self.kind().is_empty()
    }

    /// Force the document's namespace, creating `metadata` if needed
    pub fn set_namespace(&mut self, namespace: &str) {
        let Some(root) = self.0.as_object_mut() else {
            return;
        };
        let metadata = root
            .entry("metadata")
            .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
        if let Some(metadata) = metadata.as_object_mut() {
            metadata.insert(
                "namespace".to_string(),
                JsonValue::String(namespace.to_string()),
            );
        }
    }
}
