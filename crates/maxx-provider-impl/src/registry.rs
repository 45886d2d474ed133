//! Wires the four built-in `ProviderAdapter`s into a fresh
//! `ProviderRegistry` at bootstrap (§3 Provider.kind).

use std::sync::Arc;

use maxx_provider_core::registry::ProviderRegistry;

use crate::providers::antigravity::AntigravityAdapter;
use crate::providers::codex::CodexAdapter;
use crate::providers::custom::CustomAdapter;
use crate::providers::kiro::KiroAdapter;

pub fn register_builtin_providers(registry: &mut ProviderRegistry) {
    registry.register(Arc::new(CustomAdapter::new()));
    registry.register(Arc::new(AntigravityAdapter::new()));
    registry.register(Arc::new(KiroAdapter::new()));
    registry.register(Arc::new(CodexAdapter::new()));
}
