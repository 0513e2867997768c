//! Per-binary capability probing
//!
//! Older clangd releases reject `--code-lens` and refuse to start when it is
//! passed. Before encoding the flag we ask the configured binary for its
//! `--help` listing and look for the flag there. The answer is memoised per
//! resolved binary path for the lifetime of the process: upgrading clangd in
//! place is not noticed until restart, which keeps probing to one spawn per
//! path.

use crate::codec::CODE_LENS_FLAG;
use crate::services::config_store::ConfigStore;
use crate::services::placeholders::{self, PlaceholderContext};
use crate::services::process::ProcessLauncher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Binary launched when `clangd.path` is empty
pub const DEFAULT_BINARY: &str = "clangd";

/// Argument that makes clangd print its option listing
pub const HELP_ARG: &str = "--help";

/// How long a `--help` run may take before the binary counts as unsupported
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// What we know about a binary's support for the tracked flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Capability {
    #[default]
    Unknown,
    Supported,
    Unsupported,
}

impl Capability {
    pub fn from_supported(supported: bool) -> Self {
        if supported {
            Capability::Supported
        } else {
            Capability::Unsupported
        }
    }

    pub fn is_known(self) -> bool {
        self != Capability::Unknown
    }
}

/// Memo from resolved binary path to capability
#[derive(Debug, Default, Clone)]
pub struct CapabilityCache {
    entries: HashMap<String, Capability>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Unknown` for paths never probed
    pub fn get(&self, path: &str) -> Capability {
        self.entries.get(path).copied().unwrap_or_default()
    }

    /// Record a probe result. Recording `Unknown` is ignored.
    pub fn record(&mut self, path: &str, capability: Capability) {
        if capability.is_known() {
            self.entries.insert(path.to_string(), capability);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A probe that could not run or produced nothing usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub path: String,
    pub reason: String,
}

/// Resolves `clangd.path` values to a cached capability, probing on a miss
pub struct CapabilityResolver {
    launcher: Arc<dyn ProcessLauncher>,
    store: Arc<dyn ConfigStore>,
    context: PlaceholderContext,
    probe_timeout: Duration,
    /// Held across the probe so a path is probed at most once
    cache: tokio::sync::Mutex<CapabilityCache>,
    failures: std::sync::Mutex<Vec<ProbeFailure>>,
}

impl CapabilityResolver {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        store: Arc<dyn ConfigStore>,
        context: PlaceholderContext,
    ) -> Self {
        Self {
            launcher,
            store,
            context,
            probe_timeout: PROBE_TIMEOUT,
            cache: tokio::sync::Mutex::new(CapabilityCache::new()),
            failures: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Turn a raw `clangd.path` value into the string that is launched and
    /// used as the cache key.
    pub async fn resolve_path(&self, raw_path: &str) -> String {
        if raw_path.is_empty() {
            return DEFAULT_BINARY.to_string();
        }
        match placeholders::resolve(raw_path, &self.context, self.store.as_ref()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(path = raw_path, error = %e, "Could not expand clangd path placeholders");
                raw_path.to_string()
            }
        }
    }

    /// Whether the binary behind `raw_path` understands the tracked flag
    pub async fn is_supported(&self, raw_path: &str) -> bool {
        let path = self.resolve_path(raw_path).await;

        let mut cache = self.cache.lock().await;
        let cached = cache.get(&path);
        if cached.is_known() {
            return cached == Capability::Supported;
        }

        let capability = self.probe(&path).await;
        cache.record(&path, capability);
        tracing::info!(path = %path, ?capability, "Probed clangd for {}", CODE_LENS_FLAG);
        capability == Capability::Supported
    }

    /// Cached capability for an already resolved path, without probing
    pub async fn cached(&self, resolved_path: &str) -> Capability {
        self.cache.lock().await.get(resolved_path)
    }

    /// Probe failures seen so far, oldest first
    pub fn failures(&self) -> Vec<ProbeFailure> {
        self.failures
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    async fn probe(&self, path: &str) -> Capability {
        let help = [HELP_ARG.to_string()];
        let launch = self.launcher.run(path, &help);
        // Dropping the launch future kills the child
        let output = match tokio::time::timeout(self.probe_timeout, launch).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                self.report_failure(path, format!("failed to launch: {e}"));
                return Capability::Unsupported;
            }
            Err(_) => {
                self.report_failure(
                    path,
                    format!("no answer within {}ms", self.probe_timeout.as_millis()),
                );
                return Capability::Unsupported;
            }
        };

        if !output.success() && output.stdout.trim().is_empty() {
            self.report_failure(
                path,
                format!(
                    "exited with code {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            );
            return Capability::Unsupported;
        }

        Capability::from_supported(output.stdout.contains(CODE_LENS_FLAG))
    }

    fn report_failure(&self, path: &str, reason: String) {
        tracing::warn!(path, reason = %reason, "clangd capability probe failed, assuming unsupported");
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(ProbeFailure {
                path: path.to_string(),
                reason,
            });
        }
    }
}
