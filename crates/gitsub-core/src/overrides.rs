//! Override engine - merges raw override fragments into a target document
//!
//! Rules:
//! - Scalars: fragment replaces base
//! - Objects: recursive merge
//! - Arrays: fragment replaces base (not appended)
//!
//! Fragments are applied in declaration order; later fragments win on
//! conflicting paths.

use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::subscription::OverrideFragment;

/// Applies an ordered list of override fragments to a document tree
pub trait OverrideEngine: Send + Sync {
    fn apply(&self, base: JsonValue, fragments: &[OverrideFragment]) -> Result<JsonValue>;
}

/// Default engine: ordered deep merge
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepMergeEngine;

impl OverrideEngine for DeepMergeEngine {
    fn apply(&self, mut base: JsonValue, fragments: &[OverrideFragment]) -> Result<JsonValue> {
        for fragment in fragments {
            deep_merge(&mut base, &fragment.0);
        }
        Ok(base)
    }
}

fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}
