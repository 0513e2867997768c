//! In-memory layered configuration store
//!
//! Holds a user layer and a workspace layer; reads prefer the workspace
//! value. Used by tests and by hosts that keep settings in memory.

use super::{ConfigStore, ConfigTarget, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Layers {
    user: HashMap<String, Value>,
    workspace: HashMap<String, Value>,
}

impl Layers {
    fn layer_mut(&mut self, target: ConfigTarget) -> &mut HashMap<String, Value> {
        match target {
            ConfigTarget::User => &mut self.user,
            ConfigTarget::Workspace => &mut self.workspace,
        }
    }
}

/// Layered in-memory settings
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    layers: Mutex<Layers>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seed of a value, mostly for tests
    pub fn with_value(self, key: &str, value: Value, target: ConfigTarget) -> Self {
        self.set(key, value, target);
        self
    }

    /// Synchronously set a value, bypassing the async interface.
    ///
    /// Stands in for the user (or another window) editing settings.
    pub fn set(&self, key: &str, value: Value, target: ConfigTarget) {
        let mut layers = self.lock();
        layers.layer_mut(target).insert(key.to_string(), value);
    }

    /// Remove a key from one layer
    pub fn remove(&self, key: &str, target: ConfigTarget) {
        self.lock().layer_mut(target).remove(key);
    }

    /// Effective value, read synchronously
    pub fn value(&self, key: &str) -> Option<Value> {
        let layers = self.lock();
        layers
            .workspace
            .get(key)
            .or_else(|| layers.user.get(key))
            .cloned()
    }

    /// Value stored in a specific layer
    pub fn layer_value(&self, key: &str, target: ConfigTarget) -> Option<Value> {
        let mut layers = self.lock();
        layers.layer_mut(target).get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Layers> {
        self.layers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.value(key))
    }

    async fn update(
        &self,
        key: &str,
        value: Value,
        target: ConfigTarget,
    ) -> Result<(), StoreError> {
        self.set(key, value, target);
        Ok(())
    }
}
