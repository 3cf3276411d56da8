//! Gitsub Engine - the reconciliation core
//!
//! One `SubscriberItem` exists per (subscription, channel) pair. Each item
//! owns a periodic background task; every firing runs one reconciliation
//! cycle to completion:
//!
//! 1. Fetch the channel's repository and obtain its content identifier
//! 2. Skip the cycle when the identifier matches the last processed one
//! 3. Classify the tree into chart roots and plain-resource directories
//! 4. Build and filter the chart index
//! 5. Run the resource pass, then the chart pass, registering deployables
//!    with the synchronizer and accumulating the cycle's package set
//! 6. Reconcile subscription status against the package set
//! 7. Commit the content identifier only after both passes succeed
//!
//! A cycle that fails partway leaves the stored identifier unchanged, so the
//! next tick retries the entire cycle from scratch.

pub mod charts;
pub mod error;
pub mod item;
pub mod overrides;
pub mod resources;

pub use charts::CHART_SOURCE_PREFIX;
pub use error::{EngineError, Result};
pub use item::{
    CONFIG_KEY_PATH, CycleOutcome, RegistrationFailurePolicy, SECRET_KEY_PASSWORD, SECRET_KEY_USER,
    SubscriberItem, SubscriberItemSpec,
};
pub use overrides::apply_package_overrides;
pub use resources::RESOURCE_SOURCE_PREFIX;
