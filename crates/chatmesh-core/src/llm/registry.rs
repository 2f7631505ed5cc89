//! Provider registry for runtime provider lookup.
//!
//! A simple name-indexed registry of boxed LLM providers, used when a
//! binary is configured with more than one backend (e.g. a local default
//! plus an operator-overridden endpoint).

use std::collections::HashMap;

use super::box_provider::BoxLlmProvider;

pub struct ProviderRegistry {
    providers: HashMap<String, BoxLlmProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { providers: HashMap::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: BoxLlmProvider) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&BoxLlmProvider> {
        self.providers.get(name)
    }

    pub fn list_names(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
