//! Chart index - one entry per discovered chart version
//!
//! Rebuilt every cycle from the classified tree. Entry URLs are chart
//! directory paths relative to the repository root, which downstream release
//! descriptors use as the in-repo chart path.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::classify::{CHART_MANIFEST, ClassifiedRepository};
use crate::error::{RepoError, Result};

/// Chart manifest metadata (`Chart.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub tiller_version: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ChartMetadata {
    /// Load and validate a chart manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let metadata: ChartMetadata =
            serde_yaml::from_str(&content).map_err(|e| RepoError::ChartManifest {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        if metadata.name.is_empty() || metadata.version.is_empty() {
            return Err(RepoError::ChartManifest {
                path: path.display().to_string(),
                message: "name and version are required".to_string(),
            });
        }

        Ok(metadata)
    }
}

/// One chart version in the index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,
    pub version: String,

    /// Chart directory paths relative to the repository root
    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default)]
    pub tiller_version: Option<String>,

    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    pub created: DateTime<Utc>,
}

impl ChartEntry {
    /// Primary in-repo chart path
    pub fn chart_path(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }

    /// Parse the entry's version as semver
    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(&self.version).ok()
    }
}

/// Index of discovered chart packages, keyed by package name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartIndex {
    pub generated: DateTime<Utc>,

    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartEntry>>,
}

impl Default for ChartIndex {
    fn default() -> Self {
        Self {
            generated: Utc::now(),
            entries: HashMap::new(),
        }
    }
}

impl ChartIndex {
    /// Build an index from the classified tree.
    ///
    /// Chart directories are visited in sorted order; a manifest that fails to
    /// parse aborts the build (fatal to the caller's cycle).
    pub fn build(repo_root: &Path, classified: &ClassifiedRepository) -> Result<Self> {
        let mut index = ChartIndex::default();
        let generated = index.generated;

        for chart_dir in classified.sorted_chart_dirs() {
            let metadata = ChartMetadata::load(&chart_dir.join(CHART_MANIFEST))?;

            let relative = chart_dir
                .strip_prefix(repo_root)
                .unwrap_or(chart_dir)
                .to_string_lossy()
                .to_string();

            tracing::debug!(
                package = %metadata.name,
                version = %metadata.version,
                path = %relative,
                "indexed chart"
            );

            index.add_entry(ChartEntry {
                name: metadata.name.clone(),
                version: metadata.version,
                urls: vec![relative],
                tiller_version: metadata.tiller_version,
                digest: None,
                description: metadata.description,
                created: generated,
            });
        }

        index.sort_entries();
        Ok(index)
    }

    /// Add an entry under its package name
    pub fn add_entry(&mut self, entry: ChartEntry) {
        self.entries.entry(entry.name.clone()).or_default().push(entry);
    }

    /// Sort every package's versions in descending semantic-version order.
    /// Entries whose version does not parse sort after all parseable ones.
    pub fn sort_entries(&mut self) {
        for versions in self.entries.values_mut() {
            versions.sort_by(|a, b| {
                match (a.parsed_version(), b.parsed_version()) {
                    (Some(va), Some(vb)) => vb.cmp(&va),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => b.version.cmp(&a.version),
                }
            });
        }
    }

    /// The best (first after sorting) version of a package
    pub fn best_version(&self, name: &str) -> Option<&ChartEntry> {
        self.entries.get(name).and_then(|versions| versions.first())
    }

    /// Package names in stable (sorted) order
    pub fn package_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
