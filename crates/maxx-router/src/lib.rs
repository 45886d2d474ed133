//! HTTP surface (§6 External Interfaces): the client-facing proxy endpoints
//! only. Admin CRUD and the dashboard UI are out of scope here — they sit
//! on `AppState`/`Storage` directly in whatever surface embeds this router.

pub mod proxy;

pub use proxy::build_router;
