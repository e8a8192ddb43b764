use golem_host::execution::CommandError;
use golem_host::provider::{ProviderError, SettingsUpdate, StatusSnapshot, DEFAULT_LOG_LINES};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::macros::format_description;
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub lines: Option<usize>,
}

impl LogQuery {
    pub fn lines(&self) -> usize {
        self.lines.unwrap_or(DEFAULT_LOG_LINES)
    }
}

/// `golem_status` payload: parsed fields plus capture time and raw text
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub timestamp: i64,
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
}

/// UTC time as `YYYY-MM-DD HH:MM:SS`
pub fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default()
}

pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

pub fn command_error(message: &str, err: &CommandError) -> Value {
    json!({
        "status": "error",
        "message": message,
        "details": err.to_string(),
        "stdout": err.stdout(),
        "stderr": err.stderr(),
    })
}

/// Error body for a provider operation; `context` names the failed action.
pub fn provider_error(context: &str, err: &ProviderError) -> Value {
    match err {
        ProviderError::Command(e) => command_error(context, e),
        ProviderError::NotRunning => json!({
            "status": "error",
            "message": "Golem provider is not running",
            "note": "Start the provider first using /start-golem",
        }),
        ProviderError::NoIdentity { raw_output } => json!({
            "status": "error",
            "message": "Could not parse node ID from yagna output",
            "raw_output": raw_output,
        }),
        ProviderError::NoSettings => json!({
            "status": "error",
            "message": "No settings provided to update",
            "available_settings": SettingsUpdate::AVAILABLE,
        }),
        ProviderError::ProcessNotFound => json!({
            "status": "error",
            "message": "Could not determine uptime",
            "note": "Golem process may not be running or command failed",
        }),
        ProviderError::LogMissing { path } => json!({
            "status": "error",
            "message": "Log file not found",
            "log_file": path.display().to_string(),
            "note": "Provider may not be running or logs not generated yet",
        }),
        ProviderError::Parse(_) | ProviderError::Io { .. } => json!({
            "status": "error",
            "message": context,
            "details": err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_body_keeps_streams() {
        let err = CommandError::Failed {
            command: "golemsp status".into(),
            exit_code: Some(1),
            stdout: "partial".into(),
            stderr: "boom".into(),
        };
        let body = command_error("Could not get Golem status", &err);
        assert_eq!(body["status"], "error");
        assert_eq!(body["stdout"], "partial");
        assert_eq!(body["stderr"], "boom");
        assert_eq!(body["details"], "`golemsp status` exited with status 1");
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }

    #[test]
    fn test_default_log_lines() {
        assert_eq!(LogQuery { lines: None }.lines(), 20);
        assert_eq!(LogQuery { lines: Some(5) }.lines(), 5);
    }
}
