//! Deployable - the artifact unit registered with the synchronizer
//!
//! A deployable wraps one target artifact (a plain resource or a chart
//! release descriptor) under a deterministic name, giving the downstream
//! reconciler upsert semantics across cycles.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::reference::ObjectRef;

/// Annotation marking a deployable as generated from a local subscription
pub const ANNOTATION_LOCAL: &str = "apps.gitsub.io/is-local-deployable";

/// The unit handed to the synchronizer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployable {
    pub name: String,
    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Raw serialized payload of the wrapped artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<JsonValue>,
}

impl Deployable {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            annotations: BTreeMap::new(),
            template: None,
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.name.clone(), self.namespace.clone())
    }

    pub fn set_template(&mut self, template: JsonValue) {
        self.template = Some(template);
    }

    /// Stamp the locally-sourced marker annotation
    pub fn mark_local(&mut self) {
        self.annotations
            .insert(ANNOTATION_LOCAL.to_string(), "true".to_string());
    }

    pub fn is_local(&self) -> bool {
        self.annotations.get(ANNOTATION_LOCAL).map(String::as_str) == Some("true")
    }
}
