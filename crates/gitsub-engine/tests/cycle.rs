//! End-to-end reconciliation cycle tests
//!
//! Drive `SubscriberItem` against an on-disk fixture repository, a fixture
//! fetcher, and the in-memory synchronizer/object-client mocks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use gitsub_core::{
    Channel, ConfigMapRef, DeepMergeEngine, HelmRelease, HelmReleaseSpec, LabelSelector, ObjectRef,
    OverrideFragment, PackageFilter, PackageOverrides, ReleaseSource, Subscription,
    SubscriptionSpec, UnitPhase,
};
use gitsub_engine::{
    CHART_SOURCE_PREFIX, CycleOutcome, EngineError, RESOURCE_SOURCE_PREFIX,
    RegistrationFailurePolicy, SubscriberItem, SubscriberItemSpec,
};
use gitsub_repo::{FetchRequest, FetchedRepository, RepositoryFetcher};
use gitsub_sync::mock::{MockObjectClient, MockSynchronizer};

/// Serves a fixed on-disk tree and a settable commit id
struct FixtureFetcher {
    root: PathBuf,
    commit: Mutex<String>,
    fetches: AtomicUsize,
}

impl FixtureFetcher {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            commit: Mutex::new("commit-1".to_string()),
            fetches: AtomicUsize::new(0),
        }
    }

    fn set_commit(&self, commit: &str) {
        *self.commit.lock().unwrap() = commit.to_string();
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryFetcher for FixtureFetcher {
    async fn fetch(&self, _request: &FetchRequest) -> gitsub_repo::Result<FetchedRepository> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedRepository {
            root: self.root.clone(),
            commit_id: self.commit.lock().unwrap().clone(),
        })
    }
}

const CONFIG_MAP_MANIFEST: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: cfg
  namespace: untrusted
  labels:
    app: web
  annotations:
    team: platform
data:
  greeting: hello
"#;

fn write_config_map(dir: &Path, file: &str, manifest: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file), manifest).unwrap();
}

fn write_chart(dir: &Path, name: &str, version: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("Chart.yaml"),
        format!("name: {name}\nversion: {version}\n"),
    )
    .unwrap();
}

fn write_base_repo(root: &Path) {
    write_config_map(&root.join("resources"), "cfg.yaml", CONFIG_MAP_MANIFEST);
    write_chart(&root.join("demo"), "demo", "1.0.0");
}

fn subscription() -> Subscription {
    Subscription {
        name: "mysub".to_string(),
        namespace: "dev".to_string(),
        uid: Some("uid-1".to_string()),
        ..Default::default()
    }
}

struct Harness {
    _tmp: TempDir,
    repo_root: PathBuf,
    fetcher: Arc<FixtureFetcher>,
    synchronizer: Arc<MockSynchronizer>,
    client: Arc<MockObjectClient>,
    item: SubscriberItem,
}

impl Harness {
    fn resource_source(&self) -> String {
        format!("{RESOURCE_SOURCE_PREFIX}dev/mysub")
    }

    fn chart_source(&self) -> String {
        format!("{CHART_SOURCE_PREFIX}dev/mysub")
    }
}

fn new_harness(subscription: Subscription, policy: RegistrationFailurePolicy) -> Harness {
    let tmp = TempDir::new().unwrap();
    let repo_root = tmp.path().join("repo");
    std::fs::create_dir_all(&repo_root).unwrap();
    write_base_repo(&repo_root);

    let channel = Channel::new("gitops", "dev", "https://example.com/org/repo.git");
    let fetcher = Arc::new(FixtureFetcher::new(repo_root.clone()));
    let synchronizer = Arc::new(MockSynchronizer::with_default_kinds());
    let client = Arc::new(MockObjectClient::new());
    client.put_subscription(subscription.clone());

    let item = SubscriberItem::new(
        SubscriberItemSpec {
            subscription,
            channel: Some(channel),
            sync_interval: Duration::from_millis(30),
            cycle_timeout: Some(Duration::from_secs(30)),
            registration_policy: policy,
            staging_base: tmp.path().join("staging"),
        },
        fetcher.clone(),
        synchronizer.clone(),
        client.clone(),
        Arc::new(DeepMergeEngine),
    );

    Harness {
        _tmp: tmp,
        repo_root,
        fetcher,
        synchronizer,
        client,
        item,
    }
}

#[tokio::test]
async fn test_end_to_end_cycle() {
    let h = new_harness(subscription(), RegistrationFailurePolicy::default());

    let outcome = h.item.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Processed);
    assert_eq!(h.item.last_commit_id().await, "commit-1");

    // Exactly two registrations: one resource, one chart release
    assert_eq!(
        h.synchronizer.all_registered_names(),
        vec![
            "gitops-ConfigMap-cfg".to_string(),
            "gitops-demo-1.0.0".to_string()
        ]
    );

    // Resource deployable: namespace forced, locally sourced
    let resource = h
        .synchronizer
        .deployable(&h.resource_source(), "gitops-ConfigMap-cfg")
        .unwrap();
    assert!(resource.is_local());
    let template = resource.template.unwrap();
    assert_eq!(template["metadata"]["namespace"], "dev");
    assert_eq!(template["data"]["greeting"], "hello");

    // Chart deployable: wraps a release descriptor for the chosen version
    let chart = h
        .synchronizer
        .deployable(&h.chart_source(), "gitops-demo-1.0.0")
        .unwrap();
    assert!(chart.is_local());
    let template = chart.template.unwrap();
    assert_eq!(template["spec"]["version"], "1.0.0");
    assert_eq!(template["spec"]["chartName"], "demo");
    assert_eq!(template["spec"]["releaseName"], "demo");
    assert_eq!(template["spec"]["source"]["git"]["chartPath"], "demo");
    assert_eq!(
        template["metadata"]["ownerReferences"][0]["name"],
        "mysub"
    );
}

#[tokio::test]
async fn test_idempotent_when_commit_unchanged() {
    let h = new_harness(subscription(), RegistrationFailurePolicy::default());

    assert_eq!(h.item.run_cycle().await.unwrap(), CycleOutcome::Processed);
    let registrations = h.synchronizer.registration_count();

    assert_eq!(h.item.run_cycle().await.unwrap(), CycleOutcome::Unchanged);
    assert_eq!(h.synchronizer.registration_count(), registrations);
    assert_eq!(h.fetcher.fetch_count(), 2);
}

#[tokio::test]
async fn test_reprocesses_on_new_commit() {
    let h = new_harness(subscription(), RegistrationFailurePolicy::default());

    h.item.run_cycle().await.unwrap();
    assert_eq!(h.synchronizer.registration_count(), 2);

    h.fetcher.set_commit("commit-2");
    assert_eq!(h.item.run_cycle().await.unwrap(), CycleOutcome::Processed);
    assert_eq!(h.item.last_commit_id().await, "commit-2");
    assert_eq!(h.synchronizer.registration_count(), 4);
}

#[tokio::test]
async fn test_resource_registration_failure_aborts_pass() {
    let h = new_harness(subscription(), RegistrationFailurePolicy::AbortPass);
    h.synchronizer.fail_registration_for("gitops-ConfigMap-cfg");

    let err = h.item.run_cycle().await.unwrap_err();
    assert!(matches!(err, EngineError::Sync(_)));

    // The commit is not committed, so the next tick retries from scratch
    assert_eq!(h.item.last_commit_id().await, "");

    // The aborted pass never applies its validator
    assert_eq!(h.synchronizer.operation_counts().validator_applies, 0);

    // The chart pass still ran and registered its package
    assert_eq!(
        h.synchronizer.all_registered_names(),
        vec!["gitops-demo-1.0.0".to_string()]
    );

    // The failure is recorded in package status
    let sub = h.item.subscription().await;
    let unit = &sub.status.statuses["gitops-ConfigMap-cfg"];
    assert_eq!(unit.phase, UnitPhase::Failed);
}

#[tokio::test]
async fn test_skip_and_continue_policy() {
    let h = new_harness(subscription(), RegistrationFailurePolicy::SkipAndContinue);
    h.synchronizer.fail_registration_for("gitops-ConfigMap-cfg");

    let outcome = h.item.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Processed);
    assert_eq!(h.item.last_commit_id().await, "commit-1");
    assert_eq!(h.synchronizer.operation_counts().validator_applies, 1);

    let sub = h.item.subscription().await;
    assert_eq!(
        sub.status.statuses["gitops-ConfigMap-cfg"].phase,
        UnitPhase::Failed
    );
}

#[tokio::test]
async fn test_unsupported_kind_skips_resource_only() {
    let h = new_harness(subscription(), RegistrationFailurePolicy::default());
    write_config_map(
        &h.repo_root.join("resources"),
        "cron.yaml",
        "apiVersion: batch/v1\nkind: CronJob\nmetadata:\n  name: nightly\n",
    );

    let outcome = h.item.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Processed);

    // The unsupported resource is skipped; everything else registers
    assert_eq!(
        h.synchronizer.all_registered_names(),
        vec![
            "gitops-ConfigMap-cfg".to_string(),
            "gitops-demo-1.0.0".to_string()
        ]
    );

    // Its failure is recorded and survives the status pruning pass
    let sub = h.item.subscription().await;
    let unit = &sub.status.statuses["gitops-CronJob-nightly"];
    assert_eq!(unit.phase, UnitPhase::Failed);
    assert!(unit.message.as_deref().unwrap().contains("not supported"));

    let persisted = h
        .client
        .stored_status(&ObjectRef::new("mysub", "dev"))
        .unwrap();
    assert!(persisted.statuses.contains_key("gitops-CronJob-nightly"));
}

#[tokio::test]
async fn test_filter_conjunction() {
    // Label selector matches but one required annotation does not
    let mut sub = subscription();
    sub.spec = SubscriptionSpec {
        package_filter: Some(PackageFilter {
            label_selector: Some(LabelSelector {
                match_labels: BTreeMap::from([("app".to_string(), "web".to_string())]),
                match_expressions: vec![],
            }),
            annotations: Some(BTreeMap::from([(
                "team".to_string(),
                "infra".to_string(),
            )])),
            ..Default::default()
        }),
        ..Default::default()
    };

    let h = new_harness(sub, RegistrationFailurePolicy::default());
    h.item.run_cycle().await.unwrap();
    assert_eq!(
        h.synchronizer.all_registered_names(),
        vec!["gitops-demo-1.0.0".to_string()]
    );

    // Flipping the annotation to match makes the resource pass
    let mut sub = subscription();
    sub.spec = SubscriptionSpec {
        package_filter: Some(PackageFilter {
            label_selector: Some(LabelSelector {
                match_labels: BTreeMap::from([("app".to_string(), "web".to_string())]),
                match_expressions: vec![],
            }),
            annotations: Some(BTreeMap::from([(
                "team".to_string(),
                "platform".to_string(),
            )])),
            ..Default::default()
        }),
        ..Default::default()
    };

    let h = new_harness(sub, RegistrationFailurePolicy::default());
    h.item.run_cycle().await.unwrap();
    assert_eq!(
        h.synchronizer.all_registered_names(),
        vec![
            "gitops-ConfigMap-cfg".to_string(),
            "gitops-demo-1.0.0".to_string()
        ]
    );
}

#[tokio::test]
async fn test_stale_deployables_garbage_collected() {
    let h = new_harness(subscription(), RegistrationFailurePolicy::default());
    h.item.run_cycle().await.unwrap();

    let names: Vec<String> = h
        .synchronizer
        .registered(&h.resource_source())
        .iter()
        .map(|d| d.name.clone())
        .collect();
    assert_eq!(names, vec!["gitops-ConfigMap-cfg".to_string()]);

    // The manifest disappears from the repository; a new one appears
    std::fs::remove_file(h.repo_root.join("resources/cfg.yaml")).unwrap();
    write_config_map(
        &h.repo_root.join("resources"),
        "cfg2.yaml",
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg2\n",
    );
    h.fetcher.set_commit("commit-2");
    h.item.run_cycle().await.unwrap();

    let names: Vec<String> = h
        .synchronizer
        .registered(&h.resource_source())
        .iter()
        .map(|d| d.name.clone())
        .collect();
    assert_eq!(names, vec!["gitops-ConfigMap-cfg2".to_string()]);
    assert_eq!(h.synchronizer.operation_counts().removals, 1);
}

#[tokio::test]
async fn test_existing_release_name_preserved() {
    let h = new_harness(subscription(), RegistrationFailurePolicy::default());

    // A release for this chart already exists with a custom release name
    let existing = HelmRelease::new(
        "demo-mysub-dev",
        &subscription(),
        HelmReleaseSpec {
            source: ReleaseSource::git(vec!["https://old.example.com/repo.git".to_string()], "demo"),
            chart_name: "demo".to_string(),
            release_name: "custom".to_string(),
            version: "0.9.0".to_string(),
            ..Default::default()
        },
    );
    h.client
        .put_helm_release(ObjectRef::new("demo-mysub-dev", "dev"), existing);

    h.item.run_cycle().await.unwrap();

    let chart = h
        .synchronizer
        .deployable(&h.chart_source(), "gitops-demo-1.0.0")
        .unwrap();
    let template = chart.template.unwrap();
    // Spec is overwritten with the freshly computed one, release name aside
    assert_eq!(template["spec"]["releaseName"], "custom");
    assert_eq!(template["spec"]["version"], "1.0.0");
    assert_eq!(
        template["spec"]["source"]["git"]["urls"][0],
        "https://example.com/org/repo.git"
    );
}

#[tokio::test]
async fn test_status_conflict_refetches_and_retries() {
    let h = new_harness(subscription(), RegistrationFailurePolicy::default());
    h.client.fail_next_status_update();

    let outcome = h.item.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Processed);

    // The retry after re-fetching the subscription persisted the status
    assert!(
        h.client
            .stored_status(&ObjectRef::new("mysub", "dev"))
            .is_some()
    );
}

#[tokio::test]
async fn test_sub_path_selector_narrows_scan() {
    let mut sub = subscription();
    sub.spec.package_filter = Some(PackageFilter {
        filter_ref: Some(ConfigMapRef::new("scope")),
        ..Default::default()
    });

    let h = new_harness(sub, RegistrationFailurePolicy::default());
    h.client.put_config_map(
        ObjectRef::new("scope", "dev"),
        BTreeMap::from([("path".to_string(), "nested".to_string())]),
    );

    // Only the nested sub-tree should be scanned
    write_config_map(
        &h.repo_root.join("nested/resources"),
        "inner.yaml",
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: inner\n  labels:\n    app: web\n",
    );
    write_chart(&h.repo_root.join("nested/chart"), "nested-demo", "2.0.0");

    h.item.run_cycle().await.unwrap();

    let names = h.synchronizer.all_registered_names();
    assert!(names.contains(&"gitops-ConfigMap-inner".to_string()));
    assert!(names.contains(&"gitops-nested-demo-2.0.0".to_string()));
    assert!(!names.contains(&"gitops-ConfigMap-cfg".to_string()));
    assert!(!names.contains(&"gitops-demo-1.0.0".to_string()));

    // Chart paths stay relative to the repository root
    let chart = h
        .synchronizer
        .deployable(&h.chart_source(), "gitops-nested-demo-2.0.0")
        .unwrap();
    let template = chart.template.unwrap();
    assert_eq!(template["spec"]["source"]["git"]["chartPath"], "nested/chart");
}

#[tokio::test]
async fn test_chart_override_applied() {
    let mut sub = subscription();
    sub.spec.package_overrides = vec![PackageOverrides {
        package_name: "demo".to_string(),
        package_overrides: vec![OverrideFragment(serde_json::json!({
            "spec": {"values": "replicas: 3"}
        }))],
    }];

    let h = new_harness(sub, RegistrationFailurePolicy::default());
    h.item.run_cycle().await.unwrap();

    let chart = h
        .synchronizer
        .deployable(&h.chart_source(), "gitops-demo-1.0.0")
        .unwrap();
    let template = chart.template.unwrap();
    assert_eq!(template["spec"]["values"], "replicas: 3");
    assert_eq!(template["spec"]["version"], "1.0.0");
}

#[tokio::test]
async fn test_scheduler_runs_and_stops() {
    let mut h = new_harness(subscription(), RegistrationFailurePolicy::default());

    h.item.start();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let handle = h.item.stop().expect("was running");
    handle.await.unwrap();

    let fetches = h.fetcher.fetch_count();
    assert!(fetches >= 2, "expected repeated cycles, saw {fetches}");

    // No further cycles after stop
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.fetcher.fetch_count(), fetches);

    // Content was only processed once; later ticks hit the sync gate
    assert_eq!(h.synchronizer.registration_count(), 2);
}
