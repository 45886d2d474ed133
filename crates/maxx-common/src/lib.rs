//! Shared identities, configuration and small value types used across every
//! `maxx` crate. Grounded on `maxx-common`'s `GlobalConfig`/`GlobalConfigPatch`.

mod config;
mod dialect;
mod ids;

pub use config::{GlobalConfig, GlobalConfigError, GlobalConfigPatch};
pub use dialect::ClientDialect;
pub use ids::Id;
