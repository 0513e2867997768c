//! `clangd.action.showReferences`
//!
//! clangd's code lenses carry this command with a document URI, a position
//! and the reference locations. It is forwarded unchanged to the editor's
//! reference view, activating the clangd extension first if needed.

use crate::services::host::{ReferencesPresenter, ServerController};
use lsp_types::{Location, Position, Uri};
use serde::Deserialize;
use serde_json::Value;

/// Command id contributed by the code lenses
pub const SHOW_REFERENCES_COMMAND: &str = "clangd.action.showReferences";

/// Arguments as sent by clangd
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShowReferencesArgs {
    pub uri: String,
    pub position: Position,
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Errors raised while running the command
#[derive(Debug)]
pub enum CommandError {
    InvalidArguments(String),
    InvalidUri(String),
    Host(anyhow::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CommandError::InvalidUri(uri) => write!(f, "Invalid URI: {uri}"),
            CommandError::Host(err) => write!(f, "Host error: {err}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        CommandError::Host(err)
    }
}

impl ShowReferencesArgs {
    /// Decode the raw command argument
    pub fn from_value(value: Value) -> Result<Self, CommandError> {
        serde_json::from_value(value).map_err(|e| CommandError::InvalidArguments(e.to_string()))
    }
}

/// Run the command: validate the URI, make sure clangd is active, then show
/// the references
pub async fn show_references(
    controller: &dyn ServerController,
    presenter: &dyn ReferencesPresenter,
    args: ShowReferencesArgs,
) -> Result<(), CommandError> {
    let uri: Uri = args
        .uri
        .parse()
        .map_err(|_| CommandError::InvalidUri(args.uri.clone()))?;

    if !controller.is_active().await {
        tracing::debug!("Activating clangd extension for {}", SHOW_REFERENCES_COMMAND);
        controller.activate().await?;
    }

    presenter
        .show_references(uri, args.position, args.locations)
        .await?;
    Ok(())
}
