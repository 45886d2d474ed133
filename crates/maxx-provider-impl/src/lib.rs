//! Concrete `ProviderAdapter` implementations (§4.5) for the four provider
//! kinds the data model supports: a plain API-key-and-base-URL reverse
//! proxy (`custom`), and three OAuth-backed first-party backends
//! (`antigravity`, `kiro`, `codex`), each translating its own native wire
//! dialect to/from the client's via `maxx-transform`.

mod http;
mod providers;
mod registry;

pub use registry::register_builtin_providers;
