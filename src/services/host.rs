//! Host-side collaborators: the clangd extension and user notices.

use async_trait::async_trait;
use lsp_types::{Location, Position, Uri};

/// Extension id of the clangd extension whose server is restarted
pub const CLANGD_EXTENSION: &str = "llvm-vs-code-extensions.vscode-clangd";

/// Command that restarts the clangd language server
pub const CLANGD_RESTART_COMMAND: &str = "clangd.restart";

/// Controls the dependent clangd extension
#[async_trait]
pub trait ServerController: Send + Sync {
    /// Whether the clangd extension is currently active
    async fn is_active(&self) -> bool;

    /// Activate the clangd extension
    async fn activate(&self) -> anyhow::Result<()>;

    /// Issue the restart command
    async fn restart(&self) -> anyhow::Result<()>;
}

/// Shows reference locations in the editor
#[async_trait]
pub trait ReferencesPresenter: Send + Sync {
    async fn show_references(
        &self,
        uri: Uri,
        position: Position,
        locations: Vec<Location>,
    ) -> anyhow::Result<()>;
}

/// Receives user-facing advisory notices
pub trait Notifier: Send + Sync {
    fn advise(&self, message: &str);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn advise(&self, message: &str) {
        tracing::info!("{}", message);
    }
}
