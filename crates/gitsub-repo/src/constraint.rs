//! Semantic-version range parsing and matching
//!
//! Subscriptions declare ranges in the dialect commonly found in package
//! filters: comparator sets separated by whitespace and/or commas
//! (`>=1.2.0 <2.0.0`), `||`-separated alternatives, wildcards (`1.2.x`,
//! `1.2.*`), and bare versions. A range matches when any alternative matches.

use semver::{Version, VersionReq};

use crate::error::{RepoError, Result};

/// A parsed version range: one or more `||`-separated alternatives
#[derive(Debug, Clone)]
pub struct VersionRange {
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse a range expression
    pub fn parse(range: &str) -> Result<Self> {
        let trimmed = range.trim();
        if trimmed.is_empty() {
            return Err(RepoError::InvalidRange {
                range: range.to_string(),
                message: "empty range".to_string(),
            });
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let normalized = normalize_comparators(alternative);
            if normalized.is_empty() {
                return Err(RepoError::InvalidRange {
                    range: range.to_string(),
                    message: "empty alternative".to_string(),
                });
            }

            let req = VersionReq::parse(&normalized).map_err(|e| RepoError::InvalidRange {
                range: range.to_string(),
                message: e.to_string(),
            })?;
            alternatives.push(req);
        }

        Ok(Self { alternatives })
    }

    /// Check whether a version satisfies this range
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

/// Rewrite one alternative into the comma-separated comparator list
/// `VersionReq` expects. Splits on whitespace and commas, re-attaching
/// dangling operators (`>= 1.2.3`) to the version that follows them.
fn normalize_comparators(alternative: &str) -> String {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_operator: Option<String> = None;

    for token in alternative.split([' ', '\t', ',']) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if token.chars().all(|c| "<>=!~^".contains(c)) {
            pending_operator = Some(match pending_operator.take() {
                Some(prev) => prev + token,
                None => token.to_string(),
            });
            continue;
        }

        match pending_operator.take() {
            Some(op) => comparators.push(op + token),
            None => comparators.push(token.to_string()),
        }
    }

    if let Some(op) = pending_operator {
        // Trailing operator with no version; let VersionReq reject it
        comparators.push(op);
    }

    comparators.join(", ")
}

/// Check whether `version` satisfies `range`. Both sides are parsed here;
/// either side failing to parse is an error the caller maps to "exclude".
pub fn version_matches(range: &str, version: &str) -> Result<bool> {
    let range = VersionRange::parse(range)?;
    let version = Version::parse(version.trim()).map_err(|e| RepoError::InvalidVersion {
        version: version.to_string(),
        message: e.to_string(),
    })?;
    Ok(range.matches(&version))
}
