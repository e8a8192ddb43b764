use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

// Two-character escapes (ESC + @..Z, \, -, _) and full CSI sequences
const ANSI_ESCAPE: &str = r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])";

fn ansi_escape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ANSI_ESCAPE).expect("escape pattern must compile"))
}

/// Removes terminal colour/cursor control sequences.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ansi_escape().replace_all(text, "")
}
