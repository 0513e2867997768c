//! Editor event handling
//!
//! Two kinds of events drive reconciliation:
//!
//! - **Document focus**: when a C-family document becomes active, any owed
//!   write is flushed. This is cheap when nothing is dirty.
//! - **Configuration change**: edits to the code lens setting, the clangd
//!   path, the encoding or the argument list update the desired state and
//!   trigger a pass.
//!
//! Before every configuration pass the clangd binary's capability is looked
//! up (probing it on first use). A binary that does not know `--code-lens`
//! gets the default: the flag is removed from the argument list whatever the
//! user asked for.
//!
//! When a pass changed the effective value and
//! `clangd.CodeLens.RestartServerOnChange` is set, clangd is restarted after
//! a short delay so its own settings watcher sees the new arguments first.

use crate::codec::{self, EncodingPolicy};
use crate::config::ConfigError;
use crate::reconciler::{FlagState, Reconciler, SharedFlagState};
use crate::services::capability::{CapabilityResolver, PROBE_TIMEOUT};
use crate::services::config_store::ConfigStore;
use crate::services::host::{LogNotifier, Notifier, ServerController};
use crate::services::placeholders::PlaceholderContext;
use crate::services::process::ProcessLauncher;
use crate::services::time_source::SharedTimeSource;
use crate::types::{keys, ClangdSettings};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Language ids whose activation flushes pending writes
pub const RELEVANT_LANGUAGES: &[&str] = &["c", "cpp", "cuda-cpp", "objective-c", "objective-cpp"];

/// Delay between a confirmed write and the clangd restart
pub const RESTART_DELAY: Duration = Duration::from_millis(1000);

/// Default identity used to derive the read-back jitter
pub const DEFAULT_IDENTITY: &str = "clangd-lens-sync";

/// Set of settings keys touched by one configuration change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigChange {
    keys: Vec<String>,
}

impl ConfigChange {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `key` changed: a changed key affects itself, its parent
    /// sections and its children.
    pub fn affects(&self, key: &str) -> bool {
        self.keys.iter().any(|changed| {
            changed == key || is_section_of(key, changed) || is_section_of(changed, key)
        })
    }
}

fn is_section_of(section: &str, key: &str) -> bool {
    key.len() > section.len() && key.starts_with(section) && key.as_bytes()[section.len()] == b'.'
}

/// Events delivered by the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The active text editor changed; `None` when no document is focused
    ActiveDocumentChanged { language_id: Option<String> },
    ConfigurationChanged(ConfigChange),
}

/// What handling an event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event was not relevant
    Ignored,
    /// A pass ran but the effective flag value did not change
    Unchanged,
    /// The effective value changed; no restart was requested
    Changed,
    /// The effective value changed and a restart is pending
    RestartScheduled,
}

/// Construction options
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// Seeds the read-back jitter, should differ between windows
    pub identity: String,
    /// Values for `${...}` placeholders in `clangd.path`
    pub placeholders: PlaceholderContext,
    /// Deadline for the `--help` capability probe
    pub probe_timeout: Duration,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            placeholders: PlaceholderContext::default(),
            probe_timeout: PROBE_TIMEOUT,
        }
    }
}

/// Encoding for the next pass: the configured one if clangd understands the
/// flag, otherwise presence encoding so the flag disappears.
pub fn select_policy(supported: bool, configured: EncodingPolicy) -> EncodingPolicy {
    if supported {
        configured
    } else {
        EncodingPolicy::Presence
    }
}

#[derive(Debug, Default)]
struct Session {
    binary_path: String,
    policy: EncodingPolicy,
    advised: bool,
}

/// Turns editor events into reconciliation passes and restarts
pub struct ChangeDispatcher {
    store: Arc<dyn ConfigStore>,
    reconciler: Reconciler,
    capabilities: CapabilityResolver,
    controller: Arc<dyn ServerController>,
    notifier: Arc<dyn Notifier>,
    time: SharedTimeSource,
    flag: SharedFlagState,
    session: Mutex<Session>,
    restarts: Mutex<Vec<JoinHandle<()>>>,
}

impl ChangeDispatcher {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        launcher: Arc<dyn ProcessLauncher>,
        controller: Arc<dyn ServerController>,
        time: SharedTimeSource,
        options: DispatcherOptions,
    ) -> Self {
        let reconciler = Reconciler::new(store.clone(), time.clone(), &options.identity);
        let capabilities = CapabilityResolver::new(launcher, store.clone(), options.placeholders)
            .with_probe_timeout(options.probe_timeout);
        Self {
            store,
            reconciler,
            capabilities,
            controller,
            notifier: Arc::new(LogNotifier),
            time,
            flag: SharedFlagState::default(),
            session: Mutex::new(Session::default()),
            restarts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn flag_state(&self) -> FlagState {
        self.flag.snapshot()
    }

    pub fn policy(&self) -> EncodingPolicy {
        self.with_session(|s| s.policy)
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn capabilities(&self) -> &CapabilityResolver {
        &self.capabilities
    }

    /// Initial pass: adopt the configured value and write it out
    pub async fn start(&self) -> Result<Outcome, ConfigError> {
        let settings = ClangdSettings::read(self.store.as_ref()).await?;
        self.with_session(|s| s.binary_path = settings.path.clone());
        self.flag.with(|s| s.request(settings.code_lens.enabled));
        tracing::info!(
            enabled = settings.code_lens.enabled,
            path = %settings.path,
            "Starting code lens synchronization"
        );

        self.apply_capability(&settings).await;
        let changed = self.reconcile().await?;
        self.after_pass(changed, settings.code_lens.restart_server_on_change)
            .await
    }

    /// Handle events in delivery order until the channel closes
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<EditorEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(event).await {
                tracing::warn!(error = %e, "Failed to update clangd arguments");
            }
        }
        tracing::debug!("Editor event channel closed");
    }

    pub async fn handle(&self, event: EditorEvent) -> Result<Outcome, ConfigError> {
        match event {
            EditorEvent::ActiveDocumentChanged { language_id } => {
                self.did_change_document(language_id.as_deref()).await
            }
            EditorEvent::ConfigurationChanged(change) => {
                self.did_change_configuration(&change).await
            }
        }
    }

    pub async fn did_change_document(
        &self,
        language_id: Option<&str>,
    ) -> Result<Outcome, ConfigError> {
        let relevant = language_id.is_some_and(|lang| RELEVANT_LANGUAGES.contains(&lang));
        if !relevant {
            return Ok(Outcome::Ignored);
        }

        let changed = self.reconcile().await?;
        if !changed {
            return Ok(Outcome::Unchanged);
        }
        let settings = ClangdSettings::read(self.store.as_ref()).await?;
        self.after_pass(true, settings.code_lens.restart_server_on_change)
            .await
    }

    pub async fn did_change_configuration(
        &self,
        change: &ConfigChange,
    ) -> Result<Outcome, ConfigError> {
        let lens_changed = change.affects(keys::CODE_LENS_ENABLED);
        let path_changed = change.affects(keys::PATH);
        let args_changed = change.affects(keys::ARGUMENTS);
        let encoding_changed = change.affects(keys::CODE_LENS_ENCODING);
        if !(lens_changed || path_changed || args_changed || encoding_changed) {
            return Ok(Outcome::Ignored);
        }

        let settings = ClangdSettings::read(self.store.as_ref()).await?;

        if path_changed {
            tracing::debug!(path = %settings.path, "clangd path changed");
            self.with_session(|s| s.binary_path = settings.path.clone());
        }
        if lens_changed || path_changed {
            // A new binary may support what the previous one did not
            self.flag.with(|s| s.request(settings.code_lens.enabled));
        }
        if args_changed {
            self.advise_if_hand_edited(&settings.arguments);
            self.flag.mark_dirty();
        }
        if encoding_changed {
            self.flag.mark_dirty();
        }

        self.apply_capability(&settings).await;
        let changed = self.reconcile().await?;
        self.after_pass(changed, settings.code_lens.restart_server_on_change)
            .await
    }

    /// Await every restart scheduled so far
    pub async fn wait_for_restarts(&self) {
        let handles: Vec<JoinHandle<()>> = match self.restarts.lock() {
            Ok(mut restarts) => restarts.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "clangd restart task failed");
            }
        }
    }

    async fn apply_capability(&self, settings: &ClangdSettings) {
        let binary_path = self.with_session(|s| s.binary_path.clone());
        let supported = self.capabilities.is_supported(&binary_path).await;
        let policy = select_policy(supported, settings.code_lens.encoding);
        self.with_session(|s| s.policy = policy);

        if !supported {
            tracing::debug!(
                path = %binary_path,
                "clangd lacks {}, forcing default",
                codec::CODE_LENS_FLAG
            );
            self.flag.with(|s| s.request(codec::DEFAULT_ENABLED));
        }
    }

    async fn reconcile(&self) -> Result<bool, ConfigError> {
        let policy = self.policy();
        self.reconciler.reconcile(&self.flag, policy).await
    }

    async fn after_pass(
        &self,
        changed: bool,
        restart_on_change: bool,
    ) -> Result<Outcome, ConfigError> {
        if !changed {
            return Ok(Outcome::Unchanged);
        }
        if restart_on_change && self.schedule_restart().await {
            return Ok(Outcome::RestartScheduled);
        }
        Ok(Outcome::Changed)
    }

    async fn schedule_restart(&self) -> bool {
        if !self.controller.is_active().await {
            tracing::debug!("clangd extension inactive, nothing to restart");
            return false;
        }

        let controller = self.controller.clone();
        let time = self.time.clone();
        let handle = tokio::spawn(async move {
            time.sleep(RESTART_DELAY).await;
            tracing::info!("Restarting clangd to apply code lens setting");
            if let Err(e) = controller.restart().await {
                tracing::warn!(error = %e, "clangd restart failed");
            }
        });

        if let Ok(mut restarts) = self.restarts.lock() {
            restarts.retain(|h| !h.is_finished());
            restarts.push(handle);
        }
        true
    }

    /// One notice per session when the user spells the flag in
    /// `clangd.arguments` differently from the code lens setting.
    fn advise_if_hand_edited(&self, arguments: &[String]) {
        let Some(written) = codec::decode(arguments) else {
            return;
        };
        if written == self.flag.snapshot().desired {
            return;
        }
        let first = self.with_session(|s| !std::mem::replace(&mut s.advised, true));
        if first {
            self.notifier.advise(&format!(
                "{} in {} is managed by {}; edit that setting instead.",
                codec::CODE_LENS_FLAG,
                keys::ARGUMENTS,
                keys::CODE_LENS_ENABLED
            ));
        }
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}
