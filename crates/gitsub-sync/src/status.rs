//! Per-package status recording and pruning
//!
//! Status entries are keyed by deployable name. `set_package_status` records
//! one package's outcome; `validate_packages_in_status` prunes entries for
//! packages not processed this cycle and persists the result.

use chrono::Utc;
use serde_json::Value as JsonValue;

use gitsub_core::{PackageSet, Subscription, SubscriptionStatus, UnitPhase, UnitStatus};

use crate::client::ObjectClient;
use crate::error::Result;

/// Record one package's outcome in the subscription status
pub fn set_package_status(
    status: &mut SubscriptionStatus,
    package: &str,
    error: Option<String>,
    resource_status: Option<JsonValue>,
) {
    let now = Utc::now();
    let unit = match error {
        Some(message) => {
            tracing::debug!(package, %message, "recording package failure");
            UnitStatus {
                phase: UnitPhase::Failed,
                message: Some(message),
                resource_status,
                last_update_time: now,
            }
        }
        None => UnitStatus {
            phase: UnitPhase::Subscribed,
            message: None,
            resource_status,
            last_update_time: now,
        },
    };

    status.statuses.insert(package.to_string(), unit);
    status.last_update_time = Some(now);
}

/// Prune status entries for packages absent from this cycle's set and persist
/// the subscription status. A `Conflict` error means the caller holds a stale
/// subscription and should re-fetch and retry once.
pub async fn validate_packages_in_status(
    client: &dyn ObjectClient,
    subscription: &mut Subscription,
    packages: &PackageSet,
) -> Result<()> {
    let before = subscription.status.statuses.len();
    subscription
        .status
        .statuses
        .retain(|name, _| packages.contains(name));

    let pruned = before - subscription.status.statuses.len();
    if pruned > 0 {
        tracing::info!(
            subscription = %subscription.object_ref(),
            pruned,
            "pruned stale package statuses"
        );
        subscription.status.last_update_time = Some(Utc::now());
    }

    client
        .update_subscription_status(&subscription.object_ref(), &subscription.status)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockObjectClient;
    use gitsub_core::ObjectRef;

    fn subscription() -> Subscription {
        Subscription {
            name: "mysub".to_string(),
            namespace: "dev".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_package_status_phases() {
        let mut status = SubscriptionStatus::default();

        set_package_status(&mut status, "chan-ConfigMap-cfg", None, None);
        assert_eq!(
            status.statuses["chan-ConfigMap-cfg"].phase,
            UnitPhase::Subscribed
        );

        set_package_status(
            &mut status,
            "chan-ConfigMap-cfg",
            Some("kind not supported".to_string()),
            None,
        );
        let unit = &status.statuses["chan-ConfigMap-cfg"];
        assert_eq!(unit.phase, UnitPhase::Failed);
        assert_eq!(unit.message.as_deref(), Some("kind not supported"));
    }

    #[tokio::test]
    async fn test_validate_prunes_stale_entries() {
        let client = MockObjectClient::new();
        let mut sub = subscription();

        set_package_status(&mut sub.status, "keep", None, None);
        set_package_status(&mut sub.status, "stale", None, None);

        let mut packages = PackageSet::new();
        packages.insert("keep".to_string());

        validate_packages_in_status(&client, &mut sub, &packages)
            .await
            .unwrap();

        assert!(sub.status.statuses.contains_key("keep"));
        assert!(!sub.status.statuses.contains_key("stale"));

        let persisted = client
            .stored_status(&ObjectRef::new("mysub", "dev"))
            .expect("status persisted");
        assert_eq!(persisted.statuses.len(), 1);
    }

    #[tokio::test]
    async fn test_validate_surfaces_conflict() {
        let client = MockObjectClient::new();
        client.fail_next_status_update();

        let mut sub = subscription();
        let packages = PackageSet::new();

        let err = validate_packages_in_status(&client, &mut sub, &packages)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
