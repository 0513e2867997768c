//! Shared configuration types used by both schema generation and runtime.
//!
//! These types are kept in a separate module so that the schema generator
//! can import them without pulling in the async runtime pieces.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fully qualified setting keys read from and written to the configuration store
pub mod keys {
    pub const SECTION: &str = "clangd";
    pub const ARGUMENTS: &str = "clangd.arguments";
    pub const PATH: &str = "clangd.path";
    pub const CODE_LENS: &str = "clangd.CodeLens";
    pub const CODE_LENS_ENABLED: &str = "clangd.CodeLens.Enabled";
    pub const CODE_LENS_RESTART: &str = "clangd.CodeLens.RestartServerOnChange";
    pub const CODE_LENS_ENCODING: &str = "clangd.CodeLens.Encoding";
}

/// How the code lens flag is written into the clangd argument list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EncodingPolicy {
    /// Always present: `--code-lens=1` or `--code-lens=0`
    Explicit,
    /// Absent when enabled (clangd's default), `--code-lens=0` when disabled
    #[default]
    Presence,
}

/// Code lens settings under `clangd.CodeLens`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CodeLensSettings {
    /// Whether clangd should provide code lenses
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Restart clangd after the argument list was rewritten
    #[serde(default)]
    pub restart_server_on_change: bool,

    /// How the flag is encoded when the clangd binary supports it
    #[serde(default)]
    pub encoding: EncodingPolicy,
}

fn default_true() -> bool {
    true
}

impl Default for CodeLensSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            restart_server_on_change: false,
            encoding: EncodingPolicy::default(),
        }
    }
}

/// The subset of the `clangd` settings section this crate cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClangdSettings {
    /// Path to the clangd binary; empty means `clangd` from `PATH`.
    /// May contain `${...}` placeholders.
    #[serde(default)]
    pub path: String,

    /// Extra command-line arguments passed to clangd
    #[serde(default)]
    pub arguments: Vec<String>,

    /// Code lens settings
    #[serde(default, rename = "CodeLens")]
    pub code_lens: CodeLensSettings,
}
