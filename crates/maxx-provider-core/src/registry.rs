use std::collections::HashMap;

use crate::provider::SharedProviderAdapter;

#[derive(Default)]
pub struct ProviderRegistry {
    adapters: HashMap<&'static str, SharedProviderAdapter>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: SharedProviderAdapter) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: &str) -> Option<SharedProviderAdapter> {
        self.adapters.get(kind).cloned()
    }
}
