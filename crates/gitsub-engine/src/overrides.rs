//! Override adapter
//!
//! Bridges typed documents and the generic override engine: serialize the
//! document to a JSON tree, apply the matching package's fragments in order,
//! and deserialize back into the original shape. Pure function of
//! (document, fragments); no state retained between calls.

use serde::Serialize;
use serde::de::DeserializeOwned;

use gitsub_core::{OverrideEngine, PackageOverrides};

use crate::error::{EngineError, Result};

/// Apply the overrides declared for `package` to a document. Documents with
/// no matching override entry pass through unchanged (modulo a serde round
/// trip).
pub fn apply_package_overrides<T>(
    engine: &dyn OverrideEngine,
    document: &T,
    overrides: &[PackageOverrides],
    package: &str,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let fragments = overrides
        .iter()
        .find(|entry| entry.package_name == package)
        .map(|entry| entry.package_overrides.as_slice())
        .unwrap_or(&[]);

    if !fragments.is_empty() {
        tracing::debug!(package, fragments = fragments.len(), "applying overrides");
    }

    let tree = serde_json::to_value(document).map_err(|e| EngineError::Override {
        package: package.to_string(),
        message: e.to_string(),
    })?;

    let merged = engine
        .apply(tree, fragments)
        .map_err(|e| EngineError::Override {
            package: package.to_string(),
            message: e.to_string(),
        })?;

    serde_json::from_value(merged).map_err(|e| EngineError::Override {
        package: package.to_string(),
        message: e.to_string(),
    })
}
