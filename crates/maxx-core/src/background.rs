//! §4.8 Background Loops: the periodic/startup maintenance work that keeps
//! the in-memory caches and the persisted history honest without sitting on
//! the request path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{Mutex, oneshot};

use crate::state::AppState;

/// Startup recovery (§3 ProxyRequest invariant): any row left non-terminal
/// by a crashed prior instance is this instance's problem to close out.
pub async fn recover_orphaned_requests(app: &Arc<AppState>) -> anyhow::Result<u64> {
    let recovered = app.storage.recover_orphaned_requests(&app.instance_id).await?;
    if recovered > 0 {
        tracing::warn!(recovered, "recovered orphaned proxy requests from a prior instance");
    }
    Ok(recovered)
}

/// Hourly cooldown GC (§4.3 gcLoop): drop expired in-memory rows; storage
/// rows are swept on the same cadence so the two stay in sync.
pub fn spawn_cooldown_gc(app: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let dropped = app.cooldowns.gc_expired().await;
            if let Err(err) = app.storage.gc_expired_cooldowns(OffsetDateTime::now_utc()).await {
                tracing::warn!(%err, "cooldown gc storage sweep failed");
            }
            if dropped > 0 {
                tracing::debug!(dropped, "cooldown gc dropped expired rows");
            }
        }
    })
}

/// Stats aggregator (§4.8, §3 UsageStats granularity chain): periodically
/// refreshes the routing snapshot (picking up admin mutations) and rolls
/// minute buckets up through hour/day/week/month.
pub fn spawn_stats_aggregator(app: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            if let Err(err) = app.refresh_snapshot().await {
                tracing::warn!(%err, "snapshot refresh failed");
            }
            if let Err(err) = rollup_usage(&app).await {
                tracing::warn!(%err, "usage stats rollup failed");
            }
        }
    })
}

async fn rollup_usage(app: &Arc<AppState>) -> anyhow::Result<()> {
    let now = OffsetDateTime::now_utc();
    const CHAIN: [(&str, &str); 4] = [
        ("minute", "hour"),
        ("hour", "day"),
        ("day", "week"),
        ("week", "month"),
    ];
    for (from, to) in CHAIN {
        app.storage.rollup_usage_stats(from, to, now).await?;
    }
    Ok(())
}

/// Periodic OAuth credential refresh for the first-party providers
/// (Antigravity/Codex/Kiro, §4.5 point 4): adapters refresh lazily on a
/// near-expiry attempt too, this loop just keeps tokens warm so the first
/// request after an idle period doesn't pay the refresh latency.
pub fn spawn_quota_refresh(app: Arc<AppState>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(err) = app.refresh_snapshot().await {
                tracing::warn!(%err, "quota refresh snapshot reload failed");
            }
        }
    })
}

/// Per-session gate used when a routing strategy requires a session to be
/// bound to a specific project before its first candidate is dispatched
/// (§4.6 step 4a): the admin surface resolves the wait by calling
/// `resolve`, which wakes exactly one blocked `wait_for_binding` caller.
#[derive(Default)]
pub struct ProjectWaiter {
    pending: Mutex<HashMap<String, oneshot::Sender<i64>>>,
}

impl ProjectWaiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn wait_for_binding(&self, session_id: &str, timeout: Duration) -> Option<i64> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(session_id.to_string(), tx);
        let result = tokio::time::timeout(timeout, rx).await.ok().and_then(Result::ok);
        self.pending.lock().await.remove(session_id);
        result
    }

    pub async fn resolve(&self, session_id: &str, project_id: i64) -> bool {
        if let Some(tx) = self.pending.lock().await.remove(session_id) {
            return tx.send(project_id).is_ok();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waiter_wakes_on_resolve() {
        let waiter = ProjectWaiter::new();
        let waiter2 = waiter.clone();
        let handle = tokio::spawn(async move { waiter2.wait_for_binding("s1", Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(waiter.resolve("s1", 42).await);
        assert_eq!(handle.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn waiter_times_out_when_never_resolved() {
        let waiter = ProjectWaiter::new();
        assert_eq!(waiter.wait_for_binding("s2", Duration::from_millis(20)).await, None);
    }
}
