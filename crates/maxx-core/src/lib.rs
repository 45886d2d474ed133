//! Dispatch engine: wires the Client Adapter, Router, Executor, Cooldown
//! Manager and background loops (SPEC_FULL §4) on top of `maxx-storage`'s
//! snapshot cache and `maxx-provider-core`'s adapter contract.

pub mod auth;
pub mod background;
pub mod bootstrap;
pub mod client_adapter;
pub mod error;
pub mod executor;
pub mod model_mapping;
pub mod request_tracker;
pub mod router;
pub mod state;

pub use auth::{
    AuthContext, AuthError, AuthKeyEntry, AuthProvider, AuthSnapshot, MemoryAuth, NoopAuth,
    UserEntry,
};
pub use client_adapter::{ClientAdapterError, ExtractedInfo};
pub use error::RequestError;
pub use executor::{ExecuteParams, ExecutorError, execute};
pub use request_tracker::{Admission, RequestTracker};
pub use router::{Candidate, RouterError};
pub use state::AppState;
