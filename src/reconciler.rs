//! Write/verify/retry reconciliation of `clangd.arguments`
//!
//! The settings store offers no lock and may acknowledge a write it later
//! drops, and other windows running this same synchronizer write the same
//! key. A pass therefore writes, waits, reads back and compares; on mismatch
//! it re-encodes from the *current* desired value and tries again until the
//! store reflects what was written.
//!
//! The wait between write and read-back is derived from a hash of the
//! instance identity, so concurrently running instances verify at different
//! moments instead of rewriting the key in lockstep.

use crate::codec::{self, EncodingPolicy};
use crate::config::{self, ConfigError};
use crate::services::config_store::ConfigStore;
use crate::services::time_source::SharedTimeSource;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Lower bound of the read-back delay
pub const JITTER_MIN_MS: u64 = 20;

/// Width of the jitter window; delays fall in `JITTER_MIN_MS..JITTER_MIN_MS + JITTER_SPAN_MS`
pub const JITTER_SPAN_MS: u64 = 200;

/// Delay between writing the argument list and reading it back.
///
/// Pure function of `identity`: the same identity always yields the same
/// delay.
pub fn recheck_delay(identity: &[u8]) -> Duration {
    let digest = Sha256::digest(identity);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let spread = u64::from_be_bytes(head) % JITTER_SPAN_MS;
    Duration::from_millis(JITTER_MIN_MS + spread)
}

/// Desired flag value plus whether a write is owed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagState {
    pub desired: bool,
    pub dirty: bool,
}

impl Default for FlagState {
    fn default() -> Self {
        Self {
            desired: codec::DEFAULT_ENABLED,
            dirty: false,
        }
    }
}

impl FlagState {
    /// Set the desired value and mark a write as owed
    pub fn request(&mut self, desired: bool) {
        self.desired = desired;
        self.dirty = true;
    }

    /// Clear the dirty bit, returning the desired value if it was set
    fn take(&mut self) -> Option<bool> {
        if self.dirty {
            self.dirty = false;
            Some(self.desired)
        } else {
            None
        }
    }
}

/// Flag state shared between event handlers and an in-flight reconciliation.
///
/// The lock is only held for a read-modify-write, never across an await.
#[derive(Debug, Default, Clone)]
pub struct SharedFlagState(Arc<Mutex<FlagState>>);

impl SharedFlagState {
    pub fn new(state: FlagState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FlagState) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn snapshot(&self) -> FlagState {
        self.with(|s| *s)
    }

    pub fn mark_dirty(&self) {
        self.with(|s| s.dirty = true);
    }
}

/// Order- and duplicate-insensitive comparison used to verify a write
pub fn same_arguments(written: &[String], observed: &[String]) -> bool {
    let written: HashSet<&str> = written.iter().map(String::as_str).collect();
    let observed: HashSet<&str> = observed.iter().map(String::as_str).collect();
    written == observed
}

/// Outcome counters of the most recent `reconcile` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Writes issued
    pub writes: usize,
    /// Read-backs that did not match the write
    pub mismatches: usize,
}

/// Drives the argument list towards the desired flag value
pub struct Reconciler {
    store: Arc<dyn ConfigStore>,
    time: SharedTimeSource,
    recheck_delay: Duration,
    last_pass: Mutex<PassStats>,
}

impl Reconciler {
    /// `identity` seeds the jittered read-back delay; use something stable for
    /// the running instance (extension id, window id).
    pub fn new(store: Arc<dyn ConfigStore>, time: SharedTimeSource, identity: &str) -> Self {
        let recheck_delay = recheck_delay(identity.as_bytes());
        tracing::debug!(identity, delay_ms = recheck_delay.as_millis() as u64, "Reconciler ready");
        Self {
            store,
            time,
            recheck_delay,
            last_pass: Mutex::new(PassStats::default()),
        }
    }

    pub fn recheck_delay(&self) -> Duration {
        self.recheck_delay
    }

    pub fn last_pass(&self) -> PassStats {
        self.last_pass.lock().map(|s| *s).unwrap_or_default()
    }

    /// Bring `clangd.arguments` in line with `state`.
    ///
    /// Returns `Ok(true)` when a write landed that changed the effective flag
    /// value, `Ok(false)` when nothing was dirty, the list already encoded the
    /// desired value, or only the spelling of the entry changed.
    ///
    /// # Errors
    ///
    /// Store failures and an argument list that is not a list of strings are
    /// returned with the dirty bit set again, so the next event retries. The
    /// list is never written in the latter case.
    pub async fn reconcile(
        &self,
        state: &SharedFlagState,
        policy: EncodingPolicy,
    ) -> Result<bool, ConfigError> {
        let mut stats = PassStats::default();
        let result = self.run(state, policy, &mut stats).await;
        if let Ok(mut last) = self.last_pass.lock() {
            *last = stats;
        }
        if let Err(e) = &result {
            tracing::warn!(error = %e, "clangd arguments not updated, write still owed");
            state.mark_dirty();
        }
        result
    }

    async fn run(
        &self,
        state: &SharedFlagState,
        policy: EncodingPolicy,
        stats: &mut PassStats,
    ) -> Result<bool, ConfigError> {
        // Effective value before the first write and after the last confirmed one
        let mut initial: Option<bool> = None;
        let mut settled: Option<bool> = None;

        while let Some(desired) = state.with(FlagState::take) {
            let current = config::read_arguments_strict(self.store.as_ref()).await?;
            let effective = codec::decode_effective(&current);
            initial.get_or_insert(effective);

            let next = codec::encode(desired, policy, &current);
            if next == current {
                tracing::debug!(desired, "Argument list already encodes code lens state");
                settled = Some(effective);
                continue;
            }

            tracing::debug!(?current, ?next, "Writing clangd arguments");
            stats.writes += 1;
            config::write_arguments(self.store.as_ref(), &next).await?;

            self.time.sleep(self.recheck_delay).await;

            let observed = config::read_arguments_strict(self.store.as_ref()).await?;
            if !same_arguments(&next, &observed) {
                stats.mismatches += 1;
                tracing::debug!(
                    ?observed,
                    attempt = stats.writes,
                    "clangd arguments did not settle, retrying"
                );
                state.mark_dirty();
                continue;
            }
            settled = Some(desired);
        }

        let changed = matches!((initial, settled), (Some(before), Some(after)) if before != after);
        if changed {
            tracing::info!(
                enabled = settled.unwrap_or(codec::DEFAULT_ENABLED),
                writes = stats.writes,
                "Updated clangd arguments for code lens"
            );
        }
        Ok(changed)
    }
}
