//! Asynchronous services and external integrations
//!
//! This module contains all code that deals with the host editor, external
//! processes and time.

pub mod capability;
pub mod config_store;
pub mod host;
pub mod placeholders;
pub mod process;
pub mod time_source;
