//! SubscriberItem - the unit of subscription, one per (subscription, channel)
//! pair
//!
//! Owns the periodic timer, the last-seen-commit gate, and cycle sequencing.
//! Cycles for one item never overlap: the background task awaits each cycle
//! to completion before the next firing. Items for different subscriptions
//! run concurrently and share only the synchronizer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use gitsub_core::{Channel, OverrideEngine, PackageSet, Subscription};
use gitsub_repo::{
    FetchRequest, RepositoryFetcher, classify_repository, filter_charts, lock_staging_path,
    prepare_staging_dir, staging_dir,
};
use gitsub_repo::{BasicCredentials, ChartIndex, RepoError};
use gitsub_sync::{ObjectClient, Synchronizer};

use crate::error::{EngineError, Result};

/// Secret key holding the fetch username
pub const SECRET_KEY_USER: &str = "user";

/// Secret key holding the fetch password or access token
pub const SECRET_KEY_PASSWORD: &str = "password";

/// Config map key narrowing the repository sub-tree
pub const CONFIG_KEY_PATH: &str = "path";

/// What to do when registering a resource deployable fails.
///
/// `AbortPass` reproduces the reference behavior: a resource registration
/// failure aborts the remainder of the resource pass, while the chart pass
/// always skips just the failing package. `SkipAndContinue` unifies both
/// passes to skip-and-continue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationFailurePolicy {
    #[default]
    AbortPass,
    SkipAndContinue,
}

/// Outcome of one reconciliation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Content identifier unchanged; nothing was done
    Unchanged,
    /// The tree was processed and the content identifier committed
    Processed,
}

/// Static configuration of a subscriber item
#[derive(Debug, Clone)]
pub struct SubscriberItemSpec {
    pub subscription: Subscription,
    pub channel: Option<Channel>,
    pub sync_interval: Duration,
    /// Optional per-cycle deadline; a timed-out cycle is fatal and retried
    pub cycle_timeout: Option<Duration>,
    pub registration_policy: RegistrationFailurePolicy,
    /// Base directory staging areas are derived under
    pub staging_base: PathBuf,
}

/// One subscribed (subscription, channel) pair with its background task
pub struct SubscriberItem {
    state: Arc<Mutex<ItemState>>,
    sync_interval: Duration,
    cycle_timeout: Option<Duration>,
    running: Option<RunningTask>,
}

struct RunningTask {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SubscriberItem {
    pub fn new(
        spec: SubscriberItemSpec,
        fetcher: Arc<dyn RepositoryFetcher>,
        synchronizer: Arc<dyn Synchronizer>,
        client: Arc<dyn ObjectClient>,
        override_engine: Arc<dyn OverrideEngine>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ItemState {
                subscription: spec.subscription,
                channel: spec.channel,
                last_commit_id: String::new(),
                registration_policy: spec.registration_policy,
                staging_base: spec.staging_base,
                fetcher,
                synchronizer,
                client,
                override_engine,
            })),
            sync_interval: spec.sync_interval,
            cycle_timeout: spec.cycle_timeout,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Begin the periodic background task. No-op when already started.
    pub fn start(&mut self) {
        if self.running.is_some() {
            tracing::debug!("subscriber item already started");
            return;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let state = self.state.clone();
        let interval = self.sync_interval;
        let cycle_timeout = self.cycle_timeout;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        tracing::debug!("subscriber item stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let mut state = state.lock().await;
                        match run_guarded(&mut state, cycle_timeout).await {
                            Ok(outcome) => tracing::debug!(?outcome, "cycle finished"),
                            Err(err) => {
                                tracing::warn!(error = %err, "cycle failed, retrying next tick");
                            }
                        }
                    }
                }
            }
        });

        self.running = Some(RunningTask { stop_tx, handle });
    }

    /// Stop the periodic task before its next firing. Safe to call any number
    /// of times; an in-flight cycle runs to completion. Returns the task
    /// handle so callers can await shutdown.
    pub fn stop(&mut self) -> Option<JoinHandle<()>> {
        match self.running.take() {
            Some(running) => {
                tracing::debug!("stopping subscriber item");
                let _ = running.stop_tx.send(());
                Some(running.handle)
            }
            None => {
                tracing::debug!("subscriber item already stopped");
                None
            }
        }
    }

    /// Run one cycle outside the scheduler. Serializes with the background
    /// task through the item's state lock.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let mut state = self.state.lock().await;
        run_guarded(&mut state, self.cycle_timeout).await
    }

    /// The last committed content identifier; empty until the first
    /// successful cycle
    pub async fn last_commit_id(&self) -> String {
        self.state.lock().await.last_commit_id.clone()
    }

    /// Snapshot of the subscription, including per-package status
    pub async fn subscription(&self) -> Subscription {
        self.state.lock().await.subscription.clone()
    }
}

async fn run_guarded(
    state: &mut ItemState,
    cycle_timeout: Option<Duration>,
) -> Result<CycleOutcome> {
    match cycle_timeout {
        Some(limit) => match tokio::time::timeout(limit, state.reconcile()).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::CycleTimeout {
                seconds: limit.as_secs(),
            }),
        },
        None => state.reconcile().await,
    }
}

/// Mutable per-item state, owned by the item's lock
pub(crate) struct ItemState {
    pub(crate) subscription: Subscription,
    pub(crate) channel: Option<Channel>,
    pub(crate) last_commit_id: String,
    pub(crate) registration_policy: RegistrationFailurePolicy,
    pub(crate) staging_base: PathBuf,
    pub(crate) fetcher: Arc<dyn RepositoryFetcher>,
    pub(crate) synchronizer: Arc<dyn Synchronizer>,
    pub(crate) client: Arc<dyn ObjectClient>,
    pub(crate) override_engine: Arc<dyn OverrideEngine>,
}

impl ItemState {
    /// One full reconciliation cycle
    async fn reconcile(&mut self) -> Result<CycleOutcome> {
        let Some(channel) = self.channel.clone() else {
            return Err(EngineError::NoChannel {
                subscription: self.subscription.object_ref().to_string(),
            });
        };

        let credentials = self.resolve_credentials(&channel).await?;

        let staging = staging_dir(
            &self.staging_base,
            &channel.object_ref(),
            &self.subscription.object_ref(),
        );
        let _staging_guard = lock_staging_path(&staging).await;
        prepare_staging_dir(&staging).map_err(EngineError::Repo)?;

        let request = FetchRequest {
            url: channel.spec.pathname.clone(),
            reference: None,
            credentials,
            staging_dir: staging,
        };
        let fetched = self.fetcher.fetch(&request).await?;

        if fetched.commit_id == self.last_commit_id {
            tracing::debug!(
                subscription = %self.subscription.object_ref(),
                commit = %fetched.commit_id,
                "content identifier unchanged, skipping cycle"
            );
            return Ok(CycleOutcome::Unchanged);
        }

        tracing::info!(
            subscription = %self.subscription.object_ref(),
            commit = %fetched.commit_id,
            "content identifier changed, processing repository"
        );

        let scan_root = match self.resolve_sub_path().await {
            Some(sub_path) => fetched.root.join(sub_path),
            None => fetched.root.clone(),
        };

        let classified = classify_repository(&scan_root)?;
        let mut index = ChartIndex::build(&fetched.root, &classified)?;
        filter_charts(&mut index, &self.subscription);

        let mut packages = PackageSet::new();
        let resource_result = self.subscribe_resources(&classified, &mut packages).await;
        let chart_result = self.subscribe_charts(&channel, &index, &mut packages).await;

        resource_result?;
        chart_result?;

        self.last_commit_id = fetched.commit_id;
        Ok(CycleOutcome::Processed)
    }

    /// Resolve the channel's credentials from its secret reference
    async fn resolve_credentials(&self, channel: &Channel) -> Result<Option<BasicCredentials>> {
        let Some(secret_ref) = &channel.spec.secret_ref else {
            return Ok(None);
        };

        let key = secret_ref.resolve(&channel.namespace);
        let secret = self.client.get_secret(&key).await?;

        let username = secret.data.get(SECRET_KEY_USER).cloned();
        let password = secret.data.get(SECRET_KEY_PASSWORD).cloned();
        match (username, password) {
            (Some(username), Some(password)) => Ok(Some(BasicCredentials { username, password })),
            _ => Err(EngineError::Repo(RepoError::Auth {
                message: format!(
                    "secret {key} is missing the '{SECRET_KEY_USER}' or '{SECRET_KEY_PASSWORD}' key"
                ),
            })),
        }
    }

    /// Resolve the sub-path selector from the filter's config map reference.
    /// Failures fall back to the repository root and are only logged.
    async fn resolve_sub_path(&self) -> Option<String> {
        let filter_ref = self
            .subscription
            .spec
            .package_filter
            .as_ref()
            .and_then(|f| f.filter_ref.as_ref())?;

        let key = filter_ref.resolve(&self.subscription.namespace);
        match self.client.get_config_map(&key).await {
            Ok(config_map) => config_map.data.get(CONFIG_KEY_PATH).cloned(),
            Err(err) => {
                tracing::warn!(
                    config_map = %key,
                    error = %err,
                    "failed to read filter config map, scanning full tree"
                );
                None
            }
        }
    }

    /// The identity deployable names and namespaces derive from: the channel
    /// when one is bound, the subscription otherwise
    pub(crate) fn deployable_host(&self) -> (String, String) {
        match &self.channel {
            Some(channel) => (channel.name.clone(), channel.namespace.clone()),
            None => (
                self.subscription.name.clone(),
                self.subscription.namespace.clone(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsub_core::DeepMergeEngine;
    use gitsub_repo::FetchedRepository;
    use gitsub_sync::mock::{MockObjectClient, MockSynchronizer};

    struct NoopFetcher;

    #[async_trait::async_trait]
    impl RepositoryFetcher for NoopFetcher {
        async fn fetch(&self, request: &FetchRequest) -> gitsub_repo::Result<FetchedRepository> {
            Ok(FetchedRepository {
                root: request.staging_dir.clone(),
                commit_id: "deadbeef".to_string(),
            })
        }
    }

    fn item(subscription: Subscription, channel: Option<Channel>) -> SubscriberItem {
        SubscriberItem::new(
            SubscriberItemSpec {
                subscription,
                channel,
                sync_interval: Duration::from_secs(60),
                cycle_timeout: None,
                registration_policy: RegistrationFailurePolicy::default(),
                staging_base: std::env::temp_dir().join("gitsub-item-tests"),
            },
            Arc::new(NoopFetcher),
            Arc::new(MockSynchronizer::with_default_kinds()),
            Arc::new(MockObjectClient::new()),
            Arc::new(DeepMergeEngine),
        )
    }

    fn subscription() -> Subscription {
        Subscription {
            name: "mysub".to_string(),
            namespace: "dev".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cycle_without_channel_fails() {
        let item = item(subscription(), None);
        let err = item.run_cycle().await.unwrap_err();
        assert!(matches!(err, EngineError::NoChannel { .. }));
        assert_eq!(item.last_commit_id().await, "");
    }

    #[tokio::test]
    async fn test_deployable_host_prefers_channel() {
        let channel = Channel::new("gitops", "channels", "https://example.com/repo.git");
        let with_channel = item(subscription(), Some(channel));
        let state = with_channel.state.lock().await;
        assert_eq!(
            state.deployable_host(),
            ("gitops".to_string(), "channels".to_string())
        );
        drop(state);

        let without_channel = item(subscription(), None);
        let state = without_channel.state.lock().await;
        assert_eq!(
            state.deployable_host(),
            ("mysub".to_string(), "dev".to_string())
        );
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let channel = Channel::new("gitops", "dev", "https://example.com/repo.git");
        let mut item = item(subscription(), Some(channel));

        assert!(!item.is_running());
        item.start();
        assert!(item.is_running());
        // Second start is a no-op
        item.start();

        let handle = item.stop();
        assert!(handle.is_some());
        assert!(!item.is_running());

        // Repeated stops are safe no-ops
        assert!(item.stop().is_none());
        assert!(item.stop().is_none());

        handle.unwrap().await.unwrap();
    }
}
