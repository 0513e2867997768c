//! Typed access to the `clangd` settings section.

use crate::services::config_store::{ConfigStore, ConfigTarget, StoreError};
use crate::types::{keys, ClangdSettings, CodeLensSettings, EncodingPolicy};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    StoreError(StoreError),
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::StoreError(err) => write!(f, "Store error: {err}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<StoreError> for ConfigError {
    fn from(err: StoreError) -> Self {
        ConfigError::StoreError(err)
    }
}

/// Read a single key, falling back to `default` when it is absent or does not
/// deserialize into `T`.
pub async fn read_key<T: DeserializeOwned>(
    store: &dyn ConfigStore,
    key: &str,
    default: T,
) -> Result<T, StoreError> {
    match store.get(key).await? {
        None | Some(Value::Null) => Ok(default),
        Some(value) => match serde_json::from_value(value) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring malformed setting, using default");
                Ok(default)
            }
        },
    }
}

impl ClangdSettings {
    /// Load every key this crate uses, applying defaults for missing ones
    pub async fn read(store: &dyn ConfigStore) -> Result<Self, StoreError> {
        let defaults = CodeLensSettings::default();
        Ok(Self {
            path: read_key(store, keys::PATH, String::new()).await?,
            arguments: read_arguments(store).await?,
            code_lens: CodeLensSettings {
                enabled: read_key(store, keys::CODE_LENS_ENABLED, defaults.enabled).await?,
                restart_server_on_change: read_key(
                    store,
                    keys::CODE_LENS_RESTART,
                    defaults.restart_server_on_change,
                )
                .await?,
                encoding: read_key(store, keys::CODE_LENS_ENCODING, EncodingPolicy::default())
                    .await?,
            },
        })
    }
}

/// Current `clangd.arguments` list, empty when malformed
pub async fn read_arguments(store: &dyn ConfigStore) -> Result<Vec<String>, StoreError> {
    read_key(store, keys::ARGUMENTS, Vec::new()).await
}

/// Current `clangd.arguments` list for rewriting.
///
/// Unlike [`read_arguments`], a value that is present but not a list of
/// strings is an error: encoding against a substitute would overwrite the
/// user's arguments.
pub async fn read_arguments_strict(store: &dyn ConfigStore) -> Result<Vec<String>, ConfigError> {
    match store.get(keys::ARGUMENTS).await? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value).map_err(|e| {
            ConfigError::ParseError(format!("{} is not a list of strings: {e}", keys::ARGUMENTS))
        }),
    }
}

/// Write `clangd.arguments` into the workspace layer
pub async fn write_arguments(store: &dyn ConfigStore, args: &[String]) -> Result<(), StoreError> {
    store
        .update(keys::ARGUMENTS, Value::from(args.to_vec()), ConfigTarget::Workspace)
        .await
}

/// Toggle `clangd.CodeLens.Enabled` for the current workspace
pub async fn set_code_lens_enabled(
    store: &dyn ConfigStore,
    enabled: bool,
) -> Result<(), StoreError> {
    store
        .update(
            keys::CODE_LENS_ENABLED,
            Value::Bool(enabled),
            ConfigTarget::Workspace,
        )
        .await
}
