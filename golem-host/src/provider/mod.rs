//! Control of the Golem provider agent
//!
//! Wraps the `golemsp` and `yagna` CLIs: status, start/stop, identity,
//! settings, uptime and log tails. All text output goes through
//! [`crate::parser`].

mod settings;

pub use settings::SettingsUpdate;

use crate::config::HostConfig;
use crate::execution::{CommandError, CommandOutput, CommandRunner};
use crate::parser::{
    etime_seconds, parse_identity, parse_settings, parse_status, parse_uptime, IdentityRecord, ParseError,
    ServiceStatus, SettingsRecord, StatusRecord,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, info, warn};

pub const DEFAULT_LOG_LINES: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Golem is not running")]
    NotRunning,
    #[error("node ID not found in identity output")]
    NoIdentity { raw_output: String },
    #[error("no settings provided to update")]
    NoSettings,
    #[error("agent process not found in process table")]
    ProcessNotFound,
    #[error("log file not found: {}", .path.display())]
    LogMissing { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Parsed `golemsp status` together with the text it came from
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub record: StatusRecord,
    pub raw_output: String,
}

/// Parsed `yagna id show` with the text it came from
#[derive(Debug, Clone, Serialize)]
pub struct NodeIdentity {
    #[serde(flatten)]
    pub record: IdentityRecord,
    pub raw_output: String,
}

#[derive(Debug)]
pub enum StartOutcome {
    AlreadyRunning,
    Started { pid: Option<u32> },
}

#[derive(Debug)]
pub enum StopOutcome {
    NotRunning,
    Stopped { output: CommandOutput },
}

/// Result of `golemsp settings set`
#[derive(Debug, Clone, Serialize)]
pub struct SettingsApplied {
    pub command: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Uptime {
    pub uptime: String,
    pub seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Golem,
    Provider,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogTail {
    pub log_file: String,
    pub lines: Vec<String>,
}

pub struct GolemProvider {
    runner: Arc<dyn CommandRunner>,
    config: HostConfig,
}

impl GolemProvider {
    pub fn new(runner: Arc<dyn CommandRunner>, config: HostConfig) -> Self {
        Self { runner, config }
    }

    async fn golemsp(&self, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run(&self.config.commands.golemsp, &args).await
    }

    pub async fn status(&self) -> Result<StatusSnapshot, ProviderError> {
        let output = self.golemsp(&["status"]).await?;
        let raw_output = output.stdout.trim().to_string();
        Ok(StatusSnapshot {
            record: parse_status(&raw_output),
            raw_output,
        })
    }

    /// `false` whenever the status command itself fails.
    pub async fn is_running(&self) -> bool {
        match self.status().await {
            Ok(snapshot) => snapshot.record.service_status == ServiceStatus::Running,
            Err(e) => {
                debug!("Status check failed: {}", e);
                false
            }
        }
    }

    async fn require_running(&self) -> Result<(), ProviderError> {
        if self.is_running().await {
            Ok(())
        } else {
            Err(ProviderError::NotRunning)
        }
    }

    /// Launches `golemsp run` detached; the agent outlives this call.
    pub async fn start(&self) -> Result<StartOutcome, ProviderError> {
        if self.is_running().await {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let process = self
            .runner
            .spawn_detached(
                &self.config.commands.golemsp,
                &["run".to_string()],
                &self.config.paths.agent_output_log,
            )
            .await?;
        let pid = process.id();
        info!("Golem started (pid {:?})", pid);
        Ok(StartOutcome::Started { pid })
    }

    pub async fn stop(&self) -> Result<StopOutcome, ProviderError> {
        if !self.is_running().await {
            return Ok(StopOutcome::NotRunning);
        }
        let output = self.golemsp(&["stop"]).await?;
        info!("Golem stopped");
        Ok(StopOutcome::Stopped { output })
    }

    pub async fn node_identity(&self) -> Result<NodeIdentity, ProviderError> {
        self.require_running().await?;
        let output = self
            .runner
            .run(&self.config.commands.yagna, &["id".to_string(), "show".to_string()])
            .await?;
        let raw_output = output.stdout.trim().to_string();
        match parse_identity(&raw_output) {
            Some(record) => Ok(NodeIdentity { record, raw_output }),
            None => Err(ProviderError::NoIdentity { raw_output }),
        }
    }

    pub async fn settings(&self) -> Result<SettingsRecord, ProviderError> {
        let output = self.golemsp(&["settings", "show"]).await?;
        let record = parse_settings(output.stdout.trim())?;
        if record.presets.is_empty() {
            warn!("No pricing presets found in settings output");
        } else {
            debug!("Settings presets: {}", record.presets.names().collect::<Vec<_>>().join(", "));
        }
        Ok(record)
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<SettingsApplied, ProviderError> {
        if update.is_empty() {
            return Err(ProviderError::NoSettings);
        }

        let mut args = vec!["settings".to_string(), "set".to_string()];
        args.extend(update.to_flags());
        let output = self.runner.run(&self.config.commands.golemsp, &args).await?;
        info!("Settings updated: {}", output.command);
        Ok(SettingsApplied {
            command: output.command,
            output: output.stdout,
        })
    }

    pub async fn uptime(&self) -> Result<Uptime, ProviderError> {
        self.require_running().await?;
        let output = self.runner.run_line(&self.config.commands.process_table).await?;
        let uptime =
            parse_uptime(&output.stdout, &self.config.commands.agent_process).ok_or(ProviderError::ProcessNotFound)?;
        Ok(Uptime {
            seconds: etime_seconds(&uptime),
            uptime,
        })
    }

    pub fn log_path(&self, kind: LogKind) -> &PathBuf {
        match kind {
            LogKind::Golem => &self.config.paths.golem_log,
            LogKind::Provider => &self.config.paths.provider_log,
        }
    }

    /// Last `lines` lines of the agent or provider log.
    pub async fn tail_log(&self, kind: LogKind, lines: usize) -> Result<LogTail, ProviderError> {
        let path = self.log_path(kind);
        let lines = match read_tail(path, lines).await {
            Ok(lines) => lines,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::LogMissing { path: path.clone() })
            }
            Err(source) => return Err(ProviderError::Io { path: path.clone(), source }),
        };

        Ok(LogTail {
            log_file: path.display().to_string(),
            lines,
        })
    }
}

const TAIL_CHUNK: u64 = 8 * 1024;

/// Reads backwards from the end until `lines` complete lines are buffered.
/// Invalid UTF-8 is replaced, never an error.
async fn read_tail(path: &Path, lines: usize) -> std::io::Result<Vec<String>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut pos = file.metadata().await?.len();
    let mut buf: Vec<u8> = Vec::new();

    // One newline more than `lines` so the first kept line is complete
    while pos > 0 && buf.iter().filter(|&&b| b == b'\n').count() <= lines {
        let step = TAIL_CHUNK.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos)).await?;

        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk).await?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    let text = String::from_utf8_lossy(&buf);
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].iter().map(|l| l.to_string()).collect())
}
