//! `${...}` placeholder expansion for the clangd path setting
//!
//! Supported names:
//!
//! | Placeholder                  | Value                                  |
//! |------------------------------|----------------------------------------|
//! | `${userHome}`                | home directory                         |
//! | `${workspaceRoot}`           | workspace folder                       |
//! | `${workspaceFolder}`         | workspace folder                       |
//! | `${workspaceFolderBasename}` | last component of the workspace folder |
//! | `${cwd}`                     | working directory of the host          |
//! | `${env:NAME}`                | environment variable `NAME`            |
//! | `${config:KEY}`              | string setting `KEY` from the store    |
//!
//! Anything that cannot be resolved is left in the output verbatim.

use crate::services::config_store::{ConfigStore, StoreError};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").unwrap());

const ENV_PREFIX: &str = "env:";
const CONFIG_PREFIX: &str = "config:";

/// Values placeholders can expand to
#[derive(Debug, Clone, Default)]
pub struct PlaceholderContext {
    pub home: Option<PathBuf>,
    pub workspace_folder: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    /// Explicit environment; consulted before the process environment
    pub env: HashMap<String, String>,
    /// Whether `${env:NAME}` falls back to the process environment
    pub inherit_env: bool,
}

impl PlaceholderContext {
    /// Context for the running host: real home, cwd and environment.
    pub fn from_process(workspace_folder: Option<PathBuf>) -> Self {
        Self {
            home: dirs::home_dir(),
            workspace_folder,
            cwd: std::env::current_dir().ok(),
            env: HashMap::new(),
            inherit_env: true,
        }
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned().or_else(|| {
            if self.inherit_env {
                std::env::var(name).ok()
            } else {
                None
            }
        })
    }

    fn builtin(&self, name: &str) -> Option<String> {
        let path_string = |p: &PathBuf| p.to_string_lossy().into_owned();
        match name {
            "userHome" => self.home.as_ref().map(path_string),
            "workspaceRoot" | "workspaceFolder" => self.workspace_folder.as_ref().map(path_string),
            "workspaceFolderBasename" => self
                .workspace_folder
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            "cwd" => self.cwd.as_ref().map(path_string),
            _ => None,
        }
    }
}

/// Expand every placeholder in `input`.
///
/// `${config:KEY}` lookups go through the store, so this is async; the other
/// placeholders are resolved from `ctx`.
pub async fn resolve(
    input: &str,
    ctx: &PlaceholderContext,
    store: &dyn ConfigStore,
) -> Result<String, StoreError> {
    let config_keys: Vec<String> = PLACEHOLDER_RE
        .captures_iter(input)
        .filter_map(|caps| caps[1].strip_prefix(CONFIG_PREFIX).map(str::to_string))
        .collect();

    let mut config_values = HashMap::new();
    for key in config_keys {
        if config_values.contains_key(&key) {
            continue;
        }
        if let Some(Value::String(value)) = store.get(&key).await? {
            config_values.insert(key, value);
        }
    }

    let resolved = PLACEHOLDER_RE.replace_all(input, |caps: &Captures| {
        let name = &caps[1];
        let value = if let Some(var) = name.strip_prefix(ENV_PREFIX) {
            ctx.env_var(var)
        } else if let Some(key) = name.strip_prefix(CONFIG_PREFIX) {
            config_values.get(key).cloned()
        } else {
            ctx.builtin(name)
        };
        value.unwrap_or_else(|| caps[0].to_string())
    });

    Ok(resolved.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config_store::{ConfigTarget, MemoryConfigStore};
    use serde_json::json;

    fn ctx() -> PlaceholderContext {
        PlaceholderContext {
            home: Some(PathBuf::from("/home/dev")),
            workspace_folder: Some(PathBuf::from("/src/project")),
            cwd: Some(PathBuf::from("/tmp")),
            env: HashMap::from([("LLVM_ROOT".to_string(), "/opt/llvm".to_string())]),
            inherit_env: false,
        }
    }

    #[tokio::test]
    async fn test_plain_path_unchanged() {
        let store = MemoryConfigStore::new();
        let out = resolve("/usr/bin/clangd", &ctx(), &store).await.unwrap();
        assert_eq!(out, "/usr/bin/clangd");
    }

    #[tokio::test]
    async fn test_builtin_placeholders() {
        let store = MemoryConfigStore::new();
        let ctx = ctx();

        assert_eq!(
            resolve("${userHome}/bin/clangd", &ctx, &store).await.unwrap(),
            "/home/dev/bin/clangd"
        );
        assert_eq!(
            resolve("${workspaceFolder}/tools/clangd", &ctx, &store)
                .await
                .unwrap(),
            "/src/project/tools/clangd"
        );
        assert_eq!(
            resolve("${workspaceRoot}/${workspaceFolderBasename}", &ctx, &store)
                .await
                .unwrap(),
            "/src/project/project"
        );
        assert_eq!(resolve("${cwd}/clangd", &ctx, &store).await.unwrap(), "/tmp/clangd");
    }

    #[tokio::test]
    async fn test_env_and_config_placeholders() {
        let store = MemoryConfigStore::new().with_value(
            "toolchain.clangdName",
            json!("clangd-18"),
            ConfigTarget::User,
        );

        let out = resolve("${env:LLVM_ROOT}/bin/${config:toolchain.clangdName}", &ctx(), &store)
            .await
            .unwrap();
        assert_eq!(out, "/opt/llvm/bin/clangd-18");
    }

    #[tokio::test]
    async fn test_unresolved_placeholders_left_verbatim() {
        let store = MemoryConfigStore::new()
            .with_value("toolchain.version", json!(18), ConfigTarget::User);
        let mut ctx = ctx();
        ctx.workspace_folder = None;

        let out = resolve(
            "${env:MISSING}/${config:toolchain.version}/${workspaceFolder}/${bogus}",
            &ctx,
            &store,
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            "${env:MISSING}/${config:toolchain.version}/${workspaceFolder}/${bogus}"
        );
    }
}
