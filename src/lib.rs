//! Keeps clangd's code lens flag in `clangd.arguments` in step with the
//! `clangd.CodeLens.Enabled` setting, restarting clangd when it changes.

pub mod codec;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod reconciler;
pub mod services;
pub mod types;

pub use config::ConfigError;
pub use dispatcher::{ChangeDispatcher, ConfigChange, DispatcherOptions, EditorEvent, Outcome};
pub use types::{ClangdSettings, CodeLensSettings, EncodingPolicy};
