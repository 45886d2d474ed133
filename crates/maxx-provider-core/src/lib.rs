//! Provider-facing abstractions shared by every adapter in `maxx-provider-impl`:
//! the discriminated `Provider.config` types, the `ProviderAdapter` contract,
//! the Cooldown Manager (§4.3), and the `AdapterEvent`/`Event` telemetry
//! vocabulary an adapter emits while executing an attempt (§4.5).
//!
//! Mirrors `maxx-provider-core`'s split (headers / events / provider /
//! registry) generalised from "credential" granularity to this design's
//! "provider" granularity (one credential per provider, §3).

pub mod config;
pub mod cooldown;
pub mod errors;
pub mod events;
pub mod headers;
pub mod provider;
pub mod registry;

pub use config::{
    AntigravityConfig, CodexConfig, CustomConfig, KiroConfig, ProviderConfig, ProviderKind,
};
pub use cooldown::{CooldownManager, CooldownReason, SharedCooldownManager};
pub use errors::{ProviderError, ProviderResult, ProxyError, classify_http_status, classify_upstream_failure};
pub use events::{
    AdapterEvent, CooldownUpdateEvent, Event, EventHub, EventSink, Metrics,
    ProxyRequestUpdateEvent, ProxyUpstreamAttemptUpdateEvent, RequestInfo, ResponseInfo,
    ResponseModel,
};
pub use headers::{Headers, header_get, header_remove, header_set};
pub use provider::{
    ClientWriter, ExecutionContext, HttpMethod, ProviderAdapter, SharedProviderAdapter,
    UpstreamHttpRequest, UpstreamInvocation, config_from_json, retry_after_from_header,
};
pub use registry::ProviderRegistry;
