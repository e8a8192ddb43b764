use super::{capture, compile, strip_ansi};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Parsed `yagna id show`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub node_id: String,
    pub alias: Option<String>,
    pub deleted: Option<bool>,
    pub is_default: Option<bool>,
    pub is_locked: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
enum IdentityField {
    NodeId,
    Alias,
    Deleted,
    IsDefault,
    IsLocked,
}

const IDENTITY_PATTERNS: &[(IdentityField, &str)] = &[
    (IdentityField::NodeId, r"nodeId:\s+(0x[a-f0-9]+)"),
    (IdentityField::Alias, r"alias:\s+(null|\S+)"),
    (IdentityField::Deleted, r"deleted:\s+(true|false)"),
    (IdentityField::IsDefault, r"isDefault:\s+(true|false)"),
    (IdentityField::IsLocked, r"isLocked:\s+(true|false)"),
];

fn identity_rules() -> &'static [(IdentityField, Regex)] {
    static RULES: OnceLock<Vec<(IdentityField, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| compile(IDENTITY_PATTERNS))
}

fn flag(value: Option<String>) -> Option<bool> {
    value.map(|v| v == "true")
}

/// Parses `yagna id show` output.
///
/// `None` when no `nodeId:` is present: that is a "no identity yet" answer,
/// not a failure, and no partial record is ever returned.
pub fn parse_identity(output: &str) -> Option<IdentityRecord> {
    let text = strip_ansi(output);
    let rules = identity_rules();

    let node_id = rules
        .iter()
        .find(|(field, _)| matches!(field, IdentityField::NodeId))
        .and_then(|(_, re)| capture(re, &text))?;

    let mut record = IdentityRecord {
        node_id,
        alias: None,
        deleted: None,
        is_default: None,
        is_locked: None,
    };

    for (field, re) in rules {
        let value = capture(re, &text);
        match field {
            IdentityField::NodeId => {}
            IdentityField::Alias => record.alias = value.filter(|alias| alias != "null"),
            IdentityField::Deleted => record.deleted = flag(value),
            IdentityField::IsDefault => record.is_default = flag(value),
            IdentityField::IsLocked => record.is_locked = flag(value),
        }
    }

    Some(record)
}
