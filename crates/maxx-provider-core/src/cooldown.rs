use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::events::{CooldownUpdateEvent, Event, EventHub};

/// §3 Cooldown.reason / §4.3 policy table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownReason {
    ServerError,
    NetworkError,
    QuotaExhausted,
    RateLimitExceeded,
    ConcurrentLimit,
    Unknown,
}

impl CooldownReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CooldownReason::ServerError => "server_error",
            CooldownReason::NetworkError => "network_error",
            CooldownReason::QuotaExhausted => "quota_exhausted",
            CooldownReason::RateLimitExceeded => "rate_limit_exceeded",
            CooldownReason::ConcurrentLimit => "concurrent_limit",
            CooldownReason::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "server_error" => CooldownReason::ServerError,
            "network_error" => CooldownReason::NetworkError,
            "quota_exhausted" => CooldownReason::QuotaExhausted,
            "rate_limit_exceeded" => CooldownReason::RateLimitExceeded,
            "concurrent_limit" => CooldownReason::ConcurrentLimit,
            "unknown" => CooldownReason::Unknown,
            _ => return None,
        })
    }

    /// Policy table from §4.3. `failure_count` is 1-based (the count
    /// *after* this failure is recorded).
    fn duration(self, failure_count: u32, override_duration: Option<Duration>) -> Duration {
        if let Some(d) = override_duration {
            return d;
        }
        match self {
            CooldownReason::ServerError => linear(5, failure_count, 600),
            CooldownReason::NetworkError => exponential(5, failure_count, 1800),
            CooldownReason::QuotaExhausted => Duration::from_secs(3600),
            CooldownReason::RateLimitExceeded => Duration::from_secs(5),
            CooldownReason::ConcurrentLimit => Duration::from_secs(5),
            CooldownReason::Unknown => linear(5, failure_count, 300),
        }
    }
}

fn linear(base_secs: u64, failure_count: u32, cap_secs: u64) -> Duration {
    let secs = base_secs.saturating_mul(failure_count.max(1) as u64).min(cap_secs);
    Duration::from_secs(secs)
}

fn exponential(base_secs: u64, failure_count: u32, cap_secs: u64) -> Duration {
    let exp = failure_count.saturating_sub(1).min(20);
    let secs = base_secs.saturating_mul(1u64 << exp).min(cap_secs);
    Duration::from_secs(secs)
}

#[derive(Debug, Clone)]
struct CooldownRow {
    until: OffsetDateTime,
    reason: CooldownReason,
}

type CooldownKey = (i64, String);

/// In-memory `(providerId, clientDialect) → (until, reason, failureCount)`
/// map guarded by a single `RwLock` (§4.3). Mirroring to persistence and
/// garbage collection are driven by whoever holds this manager (see
/// `maxx-core`'s background loops) subscribing to `events()`, matching how
/// `CredentialPool` keeps its in-memory state independent of storage and
/// lets an `EventSink` do the persisting.
pub struct CooldownManager {
    rows: RwLock<HashMap<CooldownKey, CooldownRow>>,
    failure_counts: RwLock<HashMap<CooldownKey, u32>>,
    events: EventHub,
}

impl CooldownManager {
    pub fn new(events: EventHub) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            failure_counts: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// `record`: bump the failure count, compute `until` from the policy
    /// table, and last-writer-wins-by-max against any concurrent writer's
    /// proposed `until` (§4.3 concurrency note).
    pub async fn record(
        &self,
        provider_id: i64,
        client_dialect: &str,
        reason: CooldownReason,
        override_duration: Option<Duration>,
    ) -> OffsetDateTime {
        let key = (provider_id, client_dialect.to_string());
        let failure_count = {
            let mut counts = self.failure_counts.write().await;
            let entry = counts.entry(key.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        let duration = reason.duration(failure_count, override_duration);
        let proposed_until = OffsetDateTime::now_utc() + duration;

        let until = {
            let mut rows = self.rows.write().await;
            let row = rows.entry(key).or_insert(CooldownRow {
                until: proposed_until,
                reason,
            });
            if proposed_until > row.until {
                row.until = proposed_until;
                row.reason = reason;
            }
            row.until
        };

        self.events
            .emit(Event::CooldownUpdate(CooldownUpdateEvent {
                provider_id,
                client_dialect: client_dialect.to_string(),
                reason,
                until,
                failure_count,
            }))
            .await;
        until
    }

    pub async fn record_success(&self, provider_id: i64, client_dialect: &str) {
        let key = (provider_id, client_dialect.to_string());
        self.failure_counts.write().await.remove(&key);
        self.rows.write().await.remove(&key);
    }

    /// A row is active if `until > now` and it applies to this dialect
    /// (stored dialect empty = all dialects, §4.3 isActive).
    pub async fn is_active(&self, provider_id: i64, client_dialect: &str) -> bool {
        let now = OffsetDateTime::now_utc();
        let rows = self.rows.read().await;
        rows.iter().any(|((pid, dialect), row)| {
            *pid == provider_id
                && (dialect.is_empty() || dialect == client_dialect)
                && row.until > now
        })
    }

    pub async fn clear(&self, provider_id: i64) {
        self.rows.write().await.retain(|(pid, _), _| *pid != provider_id);
    }

    /// Hourly GC: drop rows whose `until` has already passed (§4.3 gcLoop,
    /// §4.8 Background Loops).
    pub async fn gc_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, row| row.until > now);
        before - rows.len()
    }

    pub async fn snapshot(&self) -> Vec<(i64, String, CooldownReason, OffsetDateTime, u32)> {
        let rows = self.rows.read().await;
        let counts = self.failure_counts.read().await;
        rows.iter()
            .map(|((pid, dialect), row)| {
                let count = counts.get(&(*pid, dialect.clone())).copied().unwrap_or(0);
                (*pid, dialect.clone(), row.reason, row.until, count)
            })
            .collect()
    }
}

pub type SharedCooldownManager = Arc<CooldownManager>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_linear_backoff_for_server_error() {
        let manager = CooldownManager::new(EventHub::new(16));
        manager
            .record(1, "claude", CooldownReason::ServerError, None)
            .await;
        assert!(manager.is_active(1, "claude").await);
        let until1 = manager.snapshot().await[0].3;
        manager
            .record(1, "claude", CooldownReason::ServerError, None)
            .await;
        let until2 = manager.snapshot().await[0].3;
        assert!(until2 >= until1);
    }

    #[tokio::test]
    async fn empty_dialect_applies_to_all() {
        let manager = CooldownManager::new(EventHub::new(16));
        manager
            .record(7, "", CooldownReason::QuotaExhausted, None)
            .await;
        assert!(manager.is_active(7, "openai").await);
        assert!(manager.is_active(7, "gemini").await);
    }

    #[tokio::test]
    async fn record_success_clears_row() {
        let manager = CooldownManager::new(EventHub::new(16));
        manager
            .record(3, "claude", CooldownReason::RateLimitExceeded, None)
            .await;
        manager.record_success(3, "claude").await;
        assert!(!manager.is_active(3, "claude").await);
    }
}
