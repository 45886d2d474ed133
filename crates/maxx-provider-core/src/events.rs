use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{RwLock, broadcast};

use crate::cooldown::CooldownReason;
use crate::headers::Headers;

/// Per-attempt telemetry emitted on `eventsChan` by `ProviderAdapter::execute`
/// (§4.5 point 5): request/response framing plus the usage/model facts the
/// Executor folds into `ProxyUpstreamAttempt`/`ProxyRequest` token metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AdapterEvent {
    RequestInfo(RequestInfo),
    ResponseInfo(ResponseInfo),
    Metrics(Metrics),
    ResponseModel(ResponseModel),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub status: u16,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub input: i64,
    pub output: i64,
    pub cache_read: i64,
    pub cache_creation: i64,
    pub cache_5m: i64,
    pub cache_1h: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseModel {
    pub name: String,
}

/// Broadcast-wide events (§4.2 `proxy_request_update`, §4.3
/// `cooldown_update`). `ProxyRequestUpdate`/`ProxyUpstreamAttemptUpdate`
/// mirror the Executor's lifecycle transitions so the admin surface (and,
/// in this build, the stats aggregator / persistence sinks) can follow
/// along without polling the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ProxyRequestUpdate(ProxyRequestUpdateEvent),
    ProxyUpstreamAttemptUpdate(ProxyUpstreamAttemptUpdateEvent),
    CooldownUpdate(CooldownUpdateEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequestUpdateEvent {
    pub proxy_request_id: i64,
    pub status: String,
    pub at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyUpstreamAttemptUpdateEvent {
    pub proxy_upstream_attempt_id: i64,
    pub proxy_request_id: i64,
    pub status: String,
    pub at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownUpdateEvent {
    pub provider_id: i64,
    pub client_dialect: String,
    pub reason: CooldownReason,
    pub until: OffsetDateTime,
    pub failure_count: u32,
}

pub trait EventSink: Send + Sync {
    fn write<'a>(&'a self, event: &'a Event) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Broadcast channel plus pluggable sinks, exactly `maxx-provider-core`'s
/// `EventHub` (`events/hub.rs`) generalised from its transport-level `Event`
/// enum to this crate's dispatch-lifecycle one.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<Inner>,
}

struct Inner {
    tx: broadcast::Sender<Event>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventHub {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            inner: Arc::new(Inner {
                tx,
                sinks: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.tx.subscribe()
    }

    pub async fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.inner.sinks.write().await.push(sink);
    }

    pub async fn emit(&self, event: Event) {
        let _ = self.inner.tx.send(event.clone());
        let sinks = self.inner.sinks.read().await.clone();
        for sink in sinks {
            let event_ref = event.clone();
            tokio::spawn(async move {
                sink.write(&event_ref).await;
            });
        }
    }
}
