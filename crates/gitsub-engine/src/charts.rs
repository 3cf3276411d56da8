//! Chart pass - converts filtered chart index entries into release
//! deployables
//!
//! Each remaining (package, best-version) pair becomes a create-or-update
//! release descriptor, overridden, wrapped as a deployable, and registered.
//! Failures here skip only the affected package. After the pass, subscription
//! status is reconciled against the cycle's accumulated package set.

use gitsub_core::{
    Channel, Deployable, HelmRelease, HelmReleaseSpec, ObjectRef, PackageSet, ReleaseSource,
};
use gitsub_repo::{ChartEntry, ChartIndex};
use gitsub_sync::{set_package_status, validate_packages_in_status};

use crate::error::Result;
use crate::item::ItemState;
use crate::overrides::apply_package_overrides;

/// Registration source-tag prefix for chart-release deployables
pub const CHART_SOURCE_PREFIX: &str = "git-helm-";

impl ItemState {
    /// Process every package left in the filtered index, then reconcile
    /// subscription status against the cycle's package set
    pub(crate) async fn subscribe_charts(
        &mut self,
        channel: &Channel,
        index: &ChartIndex,
        packages: &mut PackageSet,
    ) -> Result<()> {
        let host = self.subscription.object_ref();
        let source = format!("{CHART_SOURCE_PREFIX}{host}");

        for package in index.package_names() {
            let Some(entry) = index.best_version(&package) else {
                continue;
            };

            tracing::debug!(
                package = %package,
                version = %entry.version,
                "subscribing chart package"
            );

            let release = match self.release_for_chart(channel, &package, entry).await {
                Ok(release) => release,
                Err(err) => {
                    tracing::error!(
                        package = %package,
                        error = %err,
                        "failed to look up existing release, aborting chart scan"
                    );
                    break;
                }
            };

            let (host_name, host_namespace) = self.deployable_host();
            let deployable_name = format!("{host_name}-{package}-{}", entry.version);

            let release = match apply_package_overrides(
                self.override_engine.as_ref(),
                &release,
                &self.subscription.spec.package_overrides,
                &package,
            ) {
                Ok(release) => release,
                Err(err) => {
                    tracing::warn!(package = %package, error = %err, "override failed, skipping package");
                    set_package_status(
                        &mut self.subscription.status,
                        &deployable_name,
                        Some(err.to_string()),
                        None,
                    );
                    packages.insert(deployable_name);
                    continue;
                }
            };

            let template = match serde_json::to_value(&release) {
                Ok(template) => template,
                Err(err) => {
                    tracing::warn!(package = %package, error = %err, "failed to serialize release, skipping package");
                    continue;
                }
            };

            let mut deployable = Deployable::new(deployable_name, host_namespace);
            deployable.set_template(template);
            deployable.mark_local();

            let deployable_name = deployable.name.clone();
            if let Err(err) = self
                .synchronizer
                .register_template(&host, deployable, &source)
                .await
            {
                tracing::warn!(
                    deployable = %deployable_name,
                    error = %err,
                    "registration failed, skipping package"
                );
                set_package_status(
                    &mut self.subscription.status,
                    &deployable_name,
                    Some(err.to_string()),
                    None,
                );
                packages.insert(deployable_name);
                continue;
            }

            packages.insert(deployable_name);
        }

        self.reconcile_package_status(packages).await;
        Ok(())
    }

    /// Build the release descriptor for a chart: fresh when absent, spec
    /// overwrite with release-name preservation when present
    async fn release_for_chart(
        &self,
        channel: &Channel,
        package: &str,
        entry: &ChartEntry,
    ) -> Result<HelmRelease> {
        let release_name = format!(
            "{package}-{}-{}",
            self.subscription.name, self.subscription.namespace
        );
        let key = ObjectRef::new(release_name.clone(), self.subscription.namespace.clone());

        let spec = HelmReleaseSpec {
            source: ReleaseSource::git(
                vec![channel.spec.pathname.clone()],
                entry.chart_path().unwrap_or_default(),
            ),
            config_map_ref: channel.spec.config_map_ref.clone(),
            secret_ref: channel.spec.secret_ref.clone(),
            chart_name: package.to_string(),
            release_name: package.to_string(),
            version: entry.version.clone(),
        };

        match self.client.get_helm_release(&key).await? {
            Some(mut existing) => {
                tracing::debug!(release = %release_name, "updating existing release spec");
                existing.restore_type_meta();
                let preserved_release_name = existing.spec.release_name.clone();
                existing.spec = spec;
                existing.spec.release_name = preserved_release_name;
                Ok(existing)
            }
            None => {
                tracing::debug!(release = %release_name, "creating release descriptor");
                Ok(HelmRelease::new(release_name, &self.subscription, spec))
            }
        }
    }

    /// Prune status entries for packages absent from this cycle's set. A
    /// stale-subscription conflict triggers one re-fetch-and-retry; any
    /// remaining failure is logged without blocking the cycle.
    async fn reconcile_package_status(&mut self, packages: &PackageSet) {
        let key = self.subscription.object_ref();

        let Err(err) =
            validate_packages_in_status(self.client.as_ref(), &mut self.subscription, packages)
                .await
        else {
            return;
        };

        tracing::warn!(
            subscription = %key,
            error = %err,
            "package status reconcile failed, re-fetching subscription"
        );

        match self.client.get_subscription(&key).await {
            Ok(fresh) => {
                self.subscription = fresh;
                if let Err(err) = validate_packages_in_status(
                    self.client.as_ref(),
                    &mut self.subscription,
                    packages,
                )
                .await
                {
                    tracing::warn!(
                        subscription = %key,
                        error = %err,
                        "package status reconcile failed after retry"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(subscription = %key, error = %err, "failed to re-fetch subscription");
            }
        }
    }
}
