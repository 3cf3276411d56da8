//! Channel definition - the source side of a subscription
//!
//! A channel points at a remote Git repository and optionally carries a
//! credential reference and a config map reference shared with the releases
//! generated from its charts.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, Result};
use crate::reference::{ConfigMapRef, ObjectRef, SecretRef};

/// A source channel bound to one or more subscriptions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub name: String,
    pub namespace: String,
    pub spec: ChannelSpec,
}

/// Channel spec
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    /// Repository URL
    pub pathname: String,

    /// Credentials used to fetch the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,

    /// Config map copied into generated chart releases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<ConfigMapRef>,
}

impl Channel {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, pathname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            spec: ChannelSpec {
                pathname: pathname.into(),
                secret_ref: None,
                config_map_ref: None,
            },
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.name.clone(), self.namespace.clone())
    }

    /// Parse and validate the repository URL
    pub fn repository_url(&self) -> Result<Url> {
        Url::parse(&self.spec.pathname).map_err(|e| CoreError::InvalidChannelUrl {
            url: self.spec.pathname.clone(),
            reason: e.to_string(),
        })
    }
}
