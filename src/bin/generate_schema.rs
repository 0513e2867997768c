//! Generate JSON Schema for the clangd settings this crate reads
//!
//! The output is used for the `contributes.configuration` section of the
//! extension manifest.
//!
//! Usage:
//!   cargo run --features dev-bins --bin generate_schema > clangd-settings-schema.json

use lens_sync::types::ClangdSettings;
use schemars::schema_for;

fn main() {
    let schema = schema_for!(ClangdSettings);
    let output = serde_json::to_string_pretty(&schema).expect("Failed to serialize schema");
    println!("{}", output);
}
