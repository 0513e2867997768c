// Test harness wiring a dispatcher to in-memory collaborators

use async_trait::async_trait;
use lens_sync::services::config_store::{ConfigTarget, FlakyConfigStore, MemoryConfigStore};
use lens_sync::services::host::{Notifier, ServerController};
use lens_sync::services::process::{ProcessLauncher, ProcessOutput};
use lens_sync::services::time_source::TestTimeSource;
use lens_sync::types::keys;
use lens_sync::{ChangeDispatcher, ConfigChange, DispatcherOptions};
use serde_json::{json, Value};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Controller recording restarts
#[derive(Default)]
pub struct FakeController {
    pub active: AtomicBool,
    pub restarts: AtomicUsize,
}

impl FakeController {
    pub fn active() -> Arc<Self> {
        let controller = Self::default();
        controller.active.store(true, Ordering::SeqCst);
        Arc::new(controller)
    }

    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerController for FakeController {
    async fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn activate(&self) -> anyhow::Result<()> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn restart(&self) -> anyhow::Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher answering `--help` with or without `--code-lens`
pub struct FakeLauncher {
    pub supports_flag: AtomicBool,
    pub fail: AtomicBool,
    /// Paths answering without `--code-lens` regardless of `supports_flag`
    pub legacy_paths: Mutex<Vec<String>>,
    pub launched: Mutex<Vec<String>>,
}

impl FakeLauncher {
    pub fn new(supports_flag: bool) -> Arc<Self> {
        Arc::new(Self {
            supports_flag: AtomicBool::new(supports_flag),
            fail: AtomicBool::new(false),
            legacy_paths: Mutex::new(Vec::new()),
            launched: Mutex::new(Vec::new()),
        })
    }

    pub fn mark_legacy(&self, path: &str) {
        self.legacy_paths.lock().unwrap().push(path.to_string());
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn run(&self, program: &str, _args: &[String]) -> io::Result<ProcessOutput> {
        self.launched.lock().unwrap().push(program.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such binary"));
        }
        let legacy = self.legacy_paths.lock().unwrap().iter().any(|p| p == program);
        let stdout = if self.supports_flag.load(Ordering::SeqCst) && !legacy {
            "  --background-index\n  --code-lens\n"
        } else {
            "  --background-index\n"
        };
        Ok(ProcessOutput {
            stdout: stdout.to_string(),
            ..Default::default()
        })
    }
}

/// Notifier keeping every notice
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn advise(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

pub struct Harness {
    pub memory: Arc<MemoryConfigStore>,
    pub store: Arc<FlakyConfigStore>,
    pub time: Arc<TestTimeSource>,
    pub controller: Arc<FakeController>,
    pub launcher: Arc<FakeLauncher>,
    pub notifier: Arc<RecordingNotifier>,
    pub dispatcher: ChangeDispatcher,
}

impl Harness {
    /// Dispatcher over an empty store with a clangd that supports the flag
    pub fn new() -> Self {
        Self::with_launcher(FakeLauncher::new(true))
    }

    pub fn with_launcher(launcher: Arc<FakeLauncher>) -> Self {
        super::tracing::init_tracing_from_env();

        let memory = Arc::new(MemoryConfigStore::new());
        let store = Arc::new(FlakyConfigStore::new(memory.clone()));
        let time = TestTimeSource::shared();
        let controller = FakeController::active();
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = ChangeDispatcher::new(
            store.clone(),
            launcher.clone(),
            controller.clone(),
            time.clone(),
            DispatcherOptions::default(),
        )
        .with_notifier(notifier.clone());

        Self {
            memory,
            store,
            time,
            controller,
            launcher,
            notifier,
            dispatcher,
        }
    }

    /// Set a value as the user would, in the workspace layer
    pub fn set(&self, key: &str, value: Value) {
        self.memory.set(key, value, ConfigTarget::Workspace);
    }

    pub fn set_arguments(&self, args: &[&str]) {
        self.set(keys::ARGUMENTS, json!(args));
    }

    pub fn arguments(&self) -> Vec<String> {
        self.memory
            .value(keys::ARGUMENTS)
            .map(|v| serde_json::from_value(v).unwrap())
            .unwrap_or_default()
    }

    /// Set a key and deliver the matching change event
    pub async fn change(&self, key: &str, value: Value) -> lens_sync::Outcome {
        self.set(key, value);
        self.dispatcher
            .did_change_configuration(&ConfigChange::new([key]))
            .await
            .unwrap()
    }

    pub async fn focus(&self, language_id: &str) -> lens_sync::Outcome {
        self.dispatcher
            .did_change_document(Some(language_id))
            .await
            .unwrap()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notifier.notices.lock().unwrap().clone()
    }
}
