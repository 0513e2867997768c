//! Unreliable configuration store for testing
//!
//! This module provides a decorator around any `ConfigStore` that misbehaves
//! the way a real editor settings store can: writes that are acknowledged but
//! never land, writes that are rejected outright, and writes that are
//! immediately overwritten by another writer. It also counts calls so tests
//! can assert how many round trips a reconciliation took.

use super::{ConfigStore, ConfigTarget, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Metrics tracking for store operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    /// Number of get calls
    pub get_calls: usize,
    /// Number of update calls, including dropped and rejected ones
    pub update_calls: usize,
    /// Updates acknowledged but silently discarded
    pub dropped_updates: usize,
    /// Updates that returned an error
    pub rejected_updates: usize,
    /// Updates clobbered by a queued competing write
    pub clobbered_updates: usize,
}

impl StoreMetrics {
    /// Updates that actually reached the inner store
    pub fn applied_updates(&self) -> usize {
        self.update_calls - self.dropped_updates - self.rejected_updates
    }
}

#[derive(Debug, Default)]
struct Faults {
    drop_next: usize,
    reject_next: usize,
    competing_writes: VecDeque<(String, Value)>,
}

/// Fault-injecting store wrapper
pub struct FlakyConfigStore {
    /// The underlying store
    inner: Arc<dyn ConfigStore>,
    faults: Mutex<Faults>,
    metrics: Mutex<StoreMetrics>,
}

impl FlakyConfigStore {
    pub fn new(inner: Arc<dyn ConfigStore>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
            metrics: Mutex::new(StoreMetrics::default()),
        }
    }

    /// Acknowledge the next `count` updates without applying them
    pub async fn drop_next_updates(&self, count: usize) {
        self.faults.lock().await.drop_next += count;
    }

    /// Fail the next `count` updates with `StoreError::Rejected`
    pub async fn reject_next_updates(&self, count: usize) {
        self.faults.lock().await.reject_next += count;
    }

    /// After the next applied update to `key`, another writer replaces it
    /// with `value`. Multiple queued writes are consumed one per update.
    pub async fn compete_on_next_update(&self, key: &str, value: Value) {
        self.faults
            .lock()
            .await
            .competing_writes
            .push_back((key.to_string(), value));
    }

    /// Get a snapshot of current metrics
    pub async fn metrics(&self) -> StoreMetrics {
        self.metrics.lock().await.clone()
    }

    /// Reset metrics to zero
    pub async fn reset_metrics(&self) {
        *self.metrics.lock().await = StoreMetrics::default();
    }
}

#[async_trait]
impl ConfigStore for FlakyConfigStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.metrics.lock().await.get_calls += 1;
        self.inner.get(key).await
    }

    async fn update(
        &self,
        key: &str,
        value: Value,
        target: ConfigTarget,
    ) -> Result<(), StoreError> {
        self.metrics.lock().await.update_calls += 1;

        let mut faults = self.faults.lock().await;
        if faults.reject_next > 0 {
            faults.reject_next -= 1;
            drop(faults);
            self.metrics.lock().await.rejected_updates += 1;
            return Err(StoreError::Rejected(format!("injected failure writing {key}")));
        }
        if faults.drop_next > 0 {
            faults.drop_next -= 1;
            drop(faults);
            self.metrics.lock().await.dropped_updates += 1;
            return Ok(());
        }
        let competing = match faults.competing_writes.front() {
            Some((competing_key, _)) if competing_key == key => faults.competing_writes.pop_front(),
            _ => None,
        };
        drop(faults);

        self.inner.update(key, value, target).await?;

        if let Some((competing_key, competing_value)) = competing {
            self.inner
                .update(&competing_key, competing_value, target)
                .await?;
            self.metrics.lock().await.clobbered_updates += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config_store::MemoryConfigStore;
    use serde_json::json;

    fn flaky() -> (Arc<MemoryConfigStore>, FlakyConfigStore) {
        let memory = Arc::new(MemoryConfigStore::new());
        let flaky = FlakyConfigStore::new(memory.clone());
        (memory, flaky)
    }

    #[tokio::test]
    async fn test_dropped_update_is_acknowledged_but_not_applied() {
        let (memory, store) = flaky();
        store.drop_next_updates(1).await;

        store
            .update("clangd.arguments", json!(["--a"]), ConfigTarget::Workspace)
            .await
            .unwrap();
        assert_eq!(memory.value("clangd.arguments"), None);

        store
            .update("clangd.arguments", json!(["--b"]), ConfigTarget::Workspace)
            .await
            .unwrap();
        assert_eq!(memory.value("clangd.arguments"), Some(json!(["--b"])));

        let metrics = store.metrics().await;
        assert_eq!(metrics.update_calls, 2);
        assert_eq!(metrics.dropped_updates, 1);
        assert_eq!(metrics.applied_updates(), 1);
    }

    #[tokio::test]
    async fn test_rejected_update_returns_error() {
        let (memory, store) = flaky();
        store.reject_next_updates(1).await;

        let result = store
            .update("clangd.arguments", json!(["--a"]), ConfigTarget::Workspace)
            .await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert_eq!(memory.value("clangd.arguments"), None);
        assert_eq!(store.metrics().await.rejected_updates, 1);
    }

    #[tokio::test]
    async fn test_competing_write_only_fires_for_matching_key() {
        let (memory, store) = flaky();
        store
            .compete_on_next_update("clangd.arguments", json!(["--other"]))
            .await;

        store
            .update("clangd.path", json!("/bin/clangd"), ConfigTarget::Workspace)
            .await
            .unwrap();
        assert_eq!(store.metrics().await.clobbered_updates, 0);

        store
            .update("clangd.arguments", json!(["--mine"]), ConfigTarget::Workspace)
            .await
            .unwrap();
        assert_eq!(memory.value("clangd.arguments"), Some(json!(["--other"])));
        assert_eq!(store.metrics().await.clobbered_updates, 1);
    }

    #[tokio::test]
    async fn test_reads_are_counted() {
        let (_memory, store) = flaky();
        let _ = store.get("clangd.path").await.unwrap();
        let _ = store.get("clangd.path").await.unwrap();
        assert_eq!(store.metrics().await.get_calls, 2);

        store.reset_metrics().await;
        assert_eq!(store.metrics().await, StoreMetrics::default());
    }
}
