//! Process-wide shared state (§5 Concurrency & Resource Model): one
//! `Arc<AppState>` threaded through the HTTP layer, the Executor and the
//! background loops. `snapshot` is the Router's read-mostly cache; every
//! admin mutation rebuilds it from storage and publishes a fresh `Arc` via
//! `arc-swap`, exactly the split the teacher's `CredentialPool` draws
//! between a live read path and a writer that owns the source of truth.

use std::sync::Arc;

use arc_swap::ArcSwap;
use maxx_common::GlobalConfig;
use maxx_provider_core::cooldown::CooldownManager;
use maxx_provider_core::events::EventHub;
use maxx_provider_core::registry::ProviderRegistry;
use maxx_storage::{Storage, StorageResult, StorageSnapshot};

use crate::auth::{AuthProvider, NoopAuth};
use crate::request_tracker::RequestTracker;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub snapshot: ArcSwap<StorageSnapshot>,
    pub cooldowns: Arc<CooldownManager>,
    pub events: EventHub,
    pub registry: Arc<ProviderRegistry>,
    pub auth: Arc<dyn AuthProvider>,
    pub global: ArcSwap<GlobalConfig>,
    pub instance_id: String,
    pub tracker: Arc<RequestTracker>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        snapshot: StorageSnapshot,
        events: EventHub,
        registry: Arc<ProviderRegistry>,
        global: GlobalConfig,
    ) -> Self {
        Self {
            storage,
            snapshot: ArcSwap::from_pointee(snapshot),
            cooldowns: Arc::new(CooldownManager::new(events.clone())),
            events,
            registry,
            auth: Arc::new(NoopAuth),
            global: ArcSwap::from_pointee(global),
            instance_id: uuid::Uuid::new_v4().to_string(),
            tracker: RequestTracker::new(),
        }
    }

    /// Rebuilds and publishes the routing snapshot from storage (run after
    /// every admin mutation, and by the stats aggregator's periodic
    /// refresh, §4.8).
    pub async fn refresh_snapshot(&self) -> StorageResult<()> {
        let snapshot = self.storage.load_snapshot().await?;
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }

    pub fn global_config(&self) -> Arc<GlobalConfig> {
        self.global.load_full()
    }
}
