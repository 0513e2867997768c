//! Editor configuration store abstraction
//!
//! The store is owned by the host editor. It is shared with the user and with
//! other windows running the same synchronizer, offers no locking, and may
//! coalesce or ignore a write. Everything in this crate treats it as
//! eventually consistent.

mod flaky;
mod memory;

pub use flaky::{FlakyConfigStore, StoreMetrics};
pub use memory::MemoryConfigStore;

use async_trait::async_trait;
use serde_json::Value;

/// Which settings layer a write lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigTarget {
    User,
    Workspace,
}

/// Errors raised by a configuration store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused the write (read-only workspace, schema violation, ...)
    Rejected(String),
    /// The store could not be reached at all
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Rejected(msg) => write!(f, "Write rejected: {msg}"),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Async key-value settings store
///
/// Keys are fully qualified dotted paths such as `clangd.arguments`.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the effective value of a key
    ///
    /// Returns `None` when no layer defines the key; callers substitute their
    /// own default.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a value into the given layer
    ///
    /// A successful return does not guarantee that a subsequent `get` observes
    /// the value.
    async fn update(&self, key: &str, value: Value, target: ConfigTarget)
        -> Result<(), StoreError>;
}
