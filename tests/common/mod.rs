// Common test utilities

#[allow(dead_code)]
pub mod fake_clangd;
#[allow(dead_code)]
pub mod harness;
#[allow(dead_code)]
pub mod tracing;
