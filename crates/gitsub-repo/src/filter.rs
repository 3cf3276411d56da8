//! Chart index filter pipeline
//!
//! Two sequential in-place passes over the index: exact-name filtering, then
//! version/tiller-range filtering. Malformed versions or ranges exclude only
//! the offending record; packages left with no surviving versions are removed
//! entirely.

use gitsub_core::{PackageFilter, Subscription};

use crate::constraint::version_matches;
use crate::index::{ChartEntry, ChartIndex};

/// Filter the index by the subscription's package name and version ranges
pub fn filter_charts(index: &mut ChartIndex, subscription: &Subscription) {
    remove_non_matching_names(index, subscription);
    filter_on_version(index, subscription.spec.package_filter.as_ref());
}

/// Remove packages whose key does not match the declared package name.
///
/// When no name is declared the full index is kept; skipping the name filter
/// is expected for subscribe-everything subscriptions, so it is only logged.
fn remove_non_matching_names(index: &mut ChartIndex, subscription: &Subscription) {
    match subscription.spec.package_name() {
        Some(package) => {
            index.entries.retain(|name, _| name == package);
        }
        None => {
            tracing::warn!(
                subscription = %subscription.object_ref(),
                "no package name declared, keeping full chart index"
            );
        }
    }
}

/// Keep only version records satisfying the declared version and tiller
/// ranges; drop packages with nothing left.
fn filter_on_version(index: &mut ChartIndex, filter: Option<&PackageFilter>) {
    let Some(filter) = filter else {
        return;
    };

    for versions in index.entries.values_mut() {
        versions.retain(|entry| version_allowed(entry, filter) && tiller_allowed(entry, filter));
    }

    index.entries.retain(|name, versions| {
        if versions.is_empty() {
            tracing::debug!(package = %name, "no versions left after filtering, dropping package");
            false
        } else {
            true
        }
    });
}

fn version_allowed(entry: &ChartEntry, filter: &PackageFilter) -> bool {
    let Some(range) = filter.version_range() else {
        return true;
    };

    match version_matches(range, &entry.version) {
        Ok(matched) => matched,
        Err(err) => {
            tracing::warn!(
                package = %entry.name,
                version = %entry.version,
                error = %err,
                "excluding version record with unparseable constraint comparison"
            );
            false
        }
    }
}

fn tiller_allowed(entry: &ChartEntry, filter: &PackageFilter) -> bool {
    let Some(range) = filter.tiller_version_range() else {
        return true;
    };

    // A record that declares no tiller version cannot satisfy a declared range
    let Some(tiller) = entry.tiller_version.as_deref().filter(|t| !t.is_empty()) else {
        return false;
    };

    match version_matches(range, tiller) {
        Ok(matched) => matched,
        Err(err) => {
            tracing::warn!(
                package = %entry.name,
                tiller = %tiller,
                error = %err,
                "excluding version record with unparseable tiller comparison"
            );
            false
        }
    }
}
