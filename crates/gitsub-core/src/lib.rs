//! Gitsub Core - Core types for the Git subscription engine
//!
//! This crate provides the foundational types used throughout gitsub:
//! - `Subscription`: the desired-state declaration (filters, overrides, target namespace)
//! - `Channel`: the source declaration (repository URL, credentials, sub-path)
//! - `Deployable`: the artifact unit handed to the downstream synchronizer
//! - `HelmRelease`: the chart-release descriptor wrapped into a deployable
//! - `RawResource`: duck-typed access to parsed declarative manifests
//! - `OverrideEngine`: the merge engine applied to per-package override fragments

pub mod channel;
pub mod deployable;
pub mod error;
pub mod overrides;
pub mod reference;
pub mod release;
pub mod resource;
pub mod subscription;

pub use channel::{Channel, ChannelSpec};
pub use deployable::{ANNOTATION_LOCAL, Deployable};
pub use error::{CoreError, Result};
pub use overrides::{DeepMergeEngine, OverrideEngine};
pub use reference::{ConfigMapRef, ObjectRef, SecretRef};
pub use release::{GitSource, HelmRelease, HelmReleaseSpec, OwnerReference, ReleaseSource};
pub use resource::{Gvk, RawResource};
pub use subscription::{
    LabelSelector, LabelSelectorRequirement, OverrideFragment, PackageFilter, PackageOverrides,
    PackageSet, SelectorOperator, Subscription, SubscriptionSpec, SubscriptionStatus, UnitPhase,
    UnitStatus,
};
