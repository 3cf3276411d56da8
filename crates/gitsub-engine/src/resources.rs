//! Resource pass - converts qualifying plain-resource files into deployables
//!
//! Every manifest file in every plain-resource directory is parsed, filtered,
//! overridden, wrapped, and registered. After the pass, the validator is
//! applied so deployables registered in earlier cycles but not re-validated
//! this cycle are garbage collected downstream.

use std::path::{Path, PathBuf};

use gitsub_core::{Deployable, Gvk, PackageSet, RawResource};
use gitsub_repo::ClassifiedRepository;
use gitsub_sync::set_package_status;

use crate::error::{EngineError, Result};
use crate::item::{ItemState, RegistrationFailurePolicy};
use crate::overrides::apply_package_overrides;

/// Registration source-tag prefix for plain-resource deployables
pub const RESOURCE_SOURCE_PREFIX: &str = "git-resource-";

/// Manifest file extensions recognized in plain-resource directories
const MANIFEST_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

impl ItemState {
    /// Process every plain-resource directory of the classified tree
    pub(crate) async fn subscribe_resources(
        &mut self,
        classified: &ClassifiedRepository,
        packages: &mut PackageSet,
    ) -> Result<()> {
        let host = self.subscription.object_ref();
        let source = format!("{RESOURCE_SOURCE_PREFIX}{host}");
        let mut validator = self.synchronizer.create_validator(&source);

        for dir in classified.sorted_resource_dirs() {
            let files = match list_manifest_files(dir) {
                Ok(files) => files,
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "failed to list directory");
                    continue;
                }
            };

            for path in files {
                let content = match std::fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(err) => {
                        tracing::warn!(file = %path.display(), error = %err, "failed to read manifest");
                        continue;
                    }
                };

                let resource = match RawResource::from_yaml(&content) {
                    Ok(resource) => resource,
                    Err(err) => {
                        tracing::warn!(file = %path.display(), error = %err, "failed to parse manifest");
                        continue;
                    }
                };

                if !resource.is_resource() {
                    tracing::debug!(file = %path.display(), "not a declarative resource, skipping");
                    continue;
                }

                let (deployable, gvk) = match self.subscribe_resource(resource, packages) {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::debug!(file = %path.display(), error = %err, "skipping resource");
                        continue;
                    }
                };

                let deployable_key = deployable.object_ref();
                let deployable_name = deployable.name.clone();

                if let Err(err) = self
                    .synchronizer
                    .register_template(&host, deployable, &source)
                    .await
                {
                    set_package_status(
                        &mut self.subscription.status,
                        &deployable_name,
                        Some(err.to_string()),
                        None,
                    );
                    packages.insert(deployable_name.clone());

                    match self.registration_policy {
                        RegistrationFailurePolicy::AbortPass => {
                            tracing::error!(
                                deployable = %deployable_name,
                                error = %err,
                                "registration failed, aborting resource pass"
                            );
                            return Err(err.into());
                        }
                        RegistrationFailurePolicy::SkipAndContinue => {
                            tracing::warn!(
                                deployable = %deployable_name,
                                error = %err,
                                "registration failed, skipping resource"
                            );
                            continue;
                        }
                    }
                }

                validator.add_valid_resource(gvk, host.clone(), deployable_key);
                packages.insert(deployable_name);
            }
        }

        if let Err(err) = self.synchronizer.apply_validator(validator).await {
            tracing::warn!(error = %err, "failed to apply resource validator");
        }
        Ok(())
    }

    /// Convert one parsed manifest into a deployable. Errors here skip only
    /// this resource; unsupported kinds and override failures also record a
    /// per-package failure status.
    fn subscribe_resource(
        &mut self,
        mut resource: RawResource,
        packages: &mut PackageSet,
    ) -> Result<(Deployable, Gvk)> {
        let (host_name, host_namespace) = self.deployable_host();
        let mut deployable = Deployable::new(
            format!("{host_name}-{}-{}", resource.kind(), resource.name()),
            host_namespace,
        );

        let observed = resource.gvk();
        let Some(supported) = self.synchronizer.validated_gvk(&observed) else {
            let err = EngineError::UnsupportedKind {
                gvk: observed.to_string(),
            };
            set_package_status(
                &mut self.subscription.status,
                &deployable.name,
                Some(err.to_string()),
                None,
            );
            packages.insert(deployable.name.clone());
            return Err(err);
        };

        // Manifest namespaces are never trusted as-is
        if supported.namespaced {
            resource.set_namespace(&self.subscription.namespace);
        }

        if self.subscription.spec.package_filter.is_some() {
            self.check_resource_filter(&resource)?;

            resource = match apply_package_overrides(
                self.override_engine.as_ref(),
                &resource,
                &self.subscription.spec.package_overrides,
                resource.name(),
            ) {
                Ok(resource) => resource,
                Err(err) => {
                    set_package_status(
                        &mut self.subscription.status,
                        &deployable.name,
                        Some(err.to_string()),
                        None,
                    );
                    packages.insert(deployable.name.clone());
                    return Err(err);
                }
            };
        }

        deployable.set_template(resource.into_inner());
        deployable.mark_local();
        Ok((deployable, supported.gvk))
    }

    /// Conjunctive name, label and annotation filtering; the first failing
    /// predicate short-circuits
    fn check_resource_filter(&self, resource: &RawResource) -> Result<()> {
        let rejected = |reason: String| {
            Err(EngineError::FilterRejected {
                resource: resource.name().to_string(),
                reason,
            })
        };

        if let Some(package) = self.subscription.spec.package_name() {
            if package != resource.name() {
                return rejected(format!("name does not match package '{package}'"));
            }
        }

        let Some(filter) = &self.subscription.spec.package_filter else {
            return Ok(());
        };

        if let Some(selector) = &filter.label_selector {
            if !selector.matches(&resource.labels()) {
                return rejected("label selector not satisfied".to_string());
            }
        }

        if let Some(required) = &filter.annotations {
            let annotations = resource.annotations();
            for (key, value) in required {
                if annotations.get(key) != Some(value) {
                    return rejected(format!("annotation '{key}' does not match"));
                }
            }
        }

        Ok(())
    }
}

/// Regular files with a recognized manifest extension, in sorted order
fn list_manifest_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        let recognized = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                MANIFEST_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            });
        if recognized {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
