//! Encoding of the code lens flag inside the clangd argument list
//!
//! The flag occupies at most one entry of `clangd.arguments`. Decoding is
//! permissive: `--code-lens`, `--code-lens=1` and `--code-lens = TRUE` all
//! mean enabled, any other value means disabled. Encoding only ever touches
//! flag entries; every other argument keeps its text and position.

pub use crate::types::EncodingPolicy;

/// The tracked clangd flag
pub const CODE_LENS_FLAG: &str = "--code-lens";

/// Value clangd assumes when the flag is absent
pub const DEFAULT_ENABLED: bool = true;

fn is_flag_entry(arg: &str) -> bool {
    arg.trim_start().starts_with(CODE_LENS_FLAG)
}

/// Index of the first flag entry, if any
pub fn find_flag(args: &[String]) -> Option<usize> {
    args.iter().position(|arg| is_flag_entry(arg))
}

/// Parse the text following the flag name.
///
/// Empty suffix (bare flag) is enabled; `=1`/`=true` is enabled; anything
/// else is disabled.
fn parse_suffix(entry: &str) -> bool {
    let rest = entry.trim_start()[CODE_LENS_FLAG.len()..].trim();
    let value = match rest.strip_prefix('=') {
        Some(value) => value.trim().to_ascii_lowercase(),
        None if rest.is_empty() => return true,
        None => rest.to_ascii_lowercase(),
    };
    value == "1" || value == "true"
}

/// Value explicitly written in the list, `None` when the flag is absent
pub fn decode(args: &[String]) -> Option<bool> {
    find_flag(args).map(|idx| parse_suffix(&args[idx]))
}

/// Effective value: the written one, or clangd's default when absent
pub fn decode_effective(args: &[String]) -> bool {
    decode(args).unwrap_or(DEFAULT_ENABLED)
}

/// `--code-lens=1` / `--code-lens=0`
pub fn flag_entry(enabled: bool) -> String {
    format!("{}={}", CODE_LENS_FLAG, if enabled { '1' } else { '0' })
}

/// Produce the argument list that encodes `desired` under `policy`.
///
/// The first flag entry is replaced in place (or removed); any further flag
/// entries are dropped so at most one survives.
pub fn encode(desired: bool, policy: EncodingPolicy, args: &[String]) -> Vec<String> {
    let replacement = match policy {
        EncodingPolicy::Explicit => Some(flag_entry(desired)),
        EncodingPolicy::Presence if desired == DEFAULT_ENABLED => None,
        EncodingPolicy::Presence => Some(flag_entry(desired)),
    };

    let mut out = Vec::with_capacity(args.len() + 1);
    let mut placed = false;
    for arg in args {
        if !is_flag_entry(arg) {
            out.push(arg.clone());
            continue;
        }
        if !placed {
            placed = true;
            if let Some(entry) = &replacement {
                out.push(entry.clone());
            }
        }
    }

    if !placed {
        if let Some(entry) = replacement {
            out.push(entry);
        }
    }
    out
}
