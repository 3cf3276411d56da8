//! Namespaced object references

use serde::{Deserialize, Serialize};

/// A fully qualified reference to a namespaced object
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub name: String,
    pub namespace: String,
}

impl ObjectRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Reference to a config map, optionally in another namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ConfigMapRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Resolve to a full reference, falling back to `default_namespace`
    pub fn resolve(&self, default_namespace: &str) -> ObjectRef {
        ObjectRef::new(
            self.name.clone(),
            self.namespace
                .clone()
                .unwrap_or_else(|| default_namespace.to_string()),
        )
    }
}

/// Reference to a secret, optionally in another namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SecretRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Resolve to a full reference, falling back to `default_namespace`
    pub fn resolve(&self, default_namespace: &str) -> ObjectRef {
        ObjectRef::new(
            self.name.clone(),
            self.namespace
                .clone()
                .unwrap_or_else(|| default_namespace.to_string()),
        )
    }
}
