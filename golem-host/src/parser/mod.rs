//! Parsers for the free-text output of `golemsp` and `yagna`
//!
//! Every entry point strips terminal escape sequences first. Missing fields
//! become `None`/unknown; only structurally required data that is present but
//! malformed (a non-numeric price) fails a parse.

mod ansi;
mod identity;
mod process;
mod settings;
mod status;

use regex::Regex;

pub use ansi::strip_ansi;
pub use identity::{parse_identity, IdentityRecord};
pub use process::{etime_seconds, parse_uptime};
pub use settings::{parse_settings, Preset, Presets, SettingsRecord};
pub use status::{parse_status, Earnings, ServiceStatus, StatusRecord, VmStatus};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid price {value:?} in pricing line {line:?}")]
    InvalidPrice { line: String, value: String },
}

/// First match of `re` in `text`, capture group 1, trimmed.
fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Compiles a fixed pattern table. The tables are constants covered by tests.
fn compile<K: Copy>(table: &[(K, &str)]) -> Vec<(K, Regex)> {
    table
        .iter()
        .map(|(key, pattern)| (*key, Regex::new(pattern).expect("built-in pattern must compile")))
        .collect()
}
