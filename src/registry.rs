//! Named registration table for session storage backends.
//!
//! The registry is a plain value owned by the composition root and populated
//! before any [`SessionManager`](crate::manager::SessionManager) is
//! constructed; it is never mutated at runtime. Registration failures are
//! returned as configuration errors rather than panicking.

use crate::error::{LocksideError, Result};
use crate::store::MemoryProvider;
use crate::traits::Provider;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps backend names to provider instances.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the in-memory backend pre-registered under `"memory"`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("memory", Arc::new(MemoryProvider::new()))
            .expect("empty registry cannot hold a duplicate");
        registry
    }

    /// Register `provider` under `name`.
    ///
    /// A name may be registered at most once; a duplicate is a configuration
    /// error and the registry is left unchanged.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Result<()> {
        let name = name.into();
        if self.providers.contains_key(&name) {
            return Err(LocksideError::duplicate_provider(name));
        }
        tracing::debug!(provider = %name, "Registered session provider");
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Look up the provider registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }
}
