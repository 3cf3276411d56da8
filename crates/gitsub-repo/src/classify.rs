//! Repository tree classification
//!
//! Partitions a fetched working tree into chart roots and plain-resource
//! directories. A directory is a chart root when it directly contains a chart
//! manifest and is not nested inside an already-identified chart root;
//! everything else outside chart roots and version-control metadata is a
//! plain-resource directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;

/// File name marking a directory as a chart root
pub const CHART_MANIFEST: &str = "Chart.yaml";

/// Version-control metadata directory, always excluded
pub const VCS_METADATA_DIR: &str = ".git";

/// The two disjoint partitions of a fetched repository tree
#[derive(Debug, Clone, Default)]
pub struct ClassifiedRepository {
    /// Directories directly containing a chart manifest
    pub chart_dirs: HashSet<PathBuf>,
    /// Directories holding plain declarative resource files
    pub resource_dirs: HashSet<PathBuf>,
}

impl ClassifiedRepository {
    /// Chart directories in stable (sorted) order
    pub fn sorted_chart_dirs(&self) -> Vec<&PathBuf> {
        let mut dirs: Vec<_> = self.chart_dirs.iter().collect();
        dirs.sort();
        dirs
    }

    /// Resource directories in stable (sorted) order
    pub fn sorted_resource_dirs(&self) -> Vec<&PathBuf> {
        let mut dirs: Vec<_> = self.resource_dirs.iter().collect();
        dirs.sort();
        dirs
    }
}

/// Classify the tree rooted at `root`.
///
/// Traversal is depth-first with sorted siblings, so a parent chart root is
/// always identified before its descendants are visited. Any traversal error
/// is fatal to the caller's cycle.
pub fn classify_repository(root: &Path) -> Result<ClassifiedRepository> {
    let mut classified = ClassifiedRepository::default();
    let vcs_dir = root.join(VCS_METADATA_DIR);
    let mut current_chart_dir: Option<PathBuf> = None;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if path.starts_with(&vcs_dir) {
            tracing::debug!(path = %path.display(), "skipping version-control metadata");
            continue;
        }

        if let Some(chart_dir) = &current_chart_dir {
            if path.starts_with(chart_dir) {
                tracing::debug!(path = %path.display(), "inside chart root, skipping");
                continue;
            }
        }

        if path.join(CHART_MANIFEST).is_file() {
            tracing::debug!(path = %path.display(), "found chart root");
            classified.chart_dirs.insert(path.to_path_buf());
            current_chart_dir = Some(path.to_path_buf());
        } else {
            classified.resource_dirs.insert(path.to_path_buf());
        }
    }

    tracing::debug!(
        charts = classified.chart_dirs.len(),
        resources = classified.resource_dirs.len(),
        root = %root.display(),
        "classified repository tree"
    );

    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "name: demo\nversion: 1.0.0\n").unwrap();
    }

    #[test]
    fn test_nested_chart_roots_and_vcs_exclusion() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        // /root          - no manifest
        // /root/a        - chart manifest
        // /root/a/b      - chart manifest, nested inside a
        // /root/.git     - metadata
        touch(&root.join("a").join(CHART_MANIFEST));
        touch(&root.join("a/b").join(CHART_MANIFEST));
        fs::create_dir_all(root.join(".git/objects")).unwrap();

        let classified = classify_repository(root).unwrap();

        assert!(classified.chart_dirs.contains(&root.join("a")));
        assert!(!classified.chart_dirs.contains(&root.join("a/b")));
        assert_eq!(classified.chart_dirs.len(), 1);

        assert!(classified.resource_dirs.contains(&root.to_path_buf()));
        assert!(
            !classified
                .resource_dirs
                .iter()
                .any(|d| d.starts_with(root.join(".git")))
        );
        assert!(
            !classified
                .resource_dirs
                .iter()
                .any(|d| d.starts_with(root.join("a")))
        );
    }

    #[test]
    fn test_sibling_with_shared_name_prefix_not_swallowed() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        touch(&root.join("app").join(CHART_MANIFEST));
        fs::create_dir_all(root.join("app-config")).unwrap();

        let classified = classify_repository(root).unwrap();

        // Path prefix checks are component-wise: app-config is a sibling of
        // the app chart root, not a descendant.
        assert!(classified.chart_dirs.contains(&root.join("app")));
        assert!(classified.resource_dirs.contains(&root.join("app-config")));
    }

    #[test]
    fn test_multiple_chart_roots() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        touch(&root.join("charts/alpha").join(CHART_MANIFEST));
        touch(&root.join("charts/beta").join(CHART_MANIFEST));
        fs::create_dir_all(root.join("manifests")).unwrap();

        let classified = classify_repository(root).unwrap();

        assert_eq!(classified.chart_dirs.len(), 2);
        assert!(classified.chart_dirs.contains(&root.join("charts/alpha")));
        assert!(classified.chart_dirs.contains(&root.join("charts/beta")));
        assert!(classified.resource_dirs.contains(&root.join("manifests")));
        assert!(classified.resource_dirs.contains(&root.join("charts")));
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("missing");
        assert!(classify_repository(&gone).is_err());
    }
}
