//! Command execution for the Golem host
//!
//! Everything this crate does to the host goes through [`CommandRunner`]:
//! - Blocking-style execution with captured stdout/stderr
//! - Detached launches returning a [`BackgroundProcess`] handle
//! - Uniform failure reporting (exit status + captured streams)

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::{Child, Command as AsyncCommand};
use tracing::{debug, info};

/// Captured result of a finished command
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u128,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Command execution errors
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command not found: {command}")]
    NotFound { command: String },
    #[error("`{command}` exited with status {}", describe_status(.exit_code))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("failed to launch `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_status(code: &Option<i32>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string())
}

impl CommandError {
    pub fn stdout(&self) -> &str {
        match self {
            CommandError::Failed { stdout, .. } => stdout,
            _ => "",
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            CommandError::Failed { stderr, .. } => stderr,
            _ => "",
        }
    }

    /// Turns a finished but unsuccessful run into a `Failed` error.
    pub fn from_output(output: CommandOutput) -> Self {
        CommandError::Failed {
            command: output.command,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Handle on a process launched without waiting for it.
///
/// The handle is only polled once by its owner; dropping it leaves the
/// process running.
#[async_trait]
pub trait BackgroundProcess: Send {
    fn id(&self) -> Option<u32>;

    /// `Ok(None)` while the process is still running, the captured output
    /// once it has exited.
    async fn poll_exit(&mut self) -> Result<Option<CommandOutput>, CommandError>;
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A non-zero exit is reported as `CommandError::Failed`.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError>;

    /// Launch in its own process group with stdout and stderr written to `log_path`,
    /// which is truncated first.
    async fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        log_path: &Path,
    ) -> Result<Box<dyn BackgroundProcess>, CommandError>;

    /// Run a configured command line such as `"sudo apt update"`.
    async fn run_line(&self, line: &str) -> Result<CommandOutput, CommandError> {
        let (program, args) = split_command_line(line)?;
        self.run(&program, &args).await
    }
}

/// Splits a configured command line into program and arguments.
pub fn split_command_line(line: &str) -> Result<(String, Vec<String>), CommandError> {
    let mut words = shell_words::split(line).map_err(|e| CommandError::Io {
        command: line.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })?;
    if words.is_empty() {
        return Err(CommandError::NotFound { command: line.to_string() });
    }
    let program = words.remove(0);
    Ok((program, words))
}

pub fn render_command(program: &str, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program);
    parts.extend(args.iter().map(String::as_str));
    shell_words::join(parts)
}

/// Runs commands on the local host with tokio's process API
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

fn launch_error(command: &str, source: std::io::Error) -> CommandError {
    if source.kind() == std::io::ErrorKind::NotFound {
        CommandError::NotFound { command: command.to_string() }
    } else {
        CommandError::Io { command: command.to_string(), source }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let command = render_command(program, args);
        let start_time = Instant::now();
        debug!("Executing command: {}", command);

        let output = AsyncCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| launch_error(&command, e))?;

        let result = CommandOutput {
            command,
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            execution_time_ms: start_time.elapsed().as_millis(),
        };

        if output.status.success() {
            Ok(result)
        } else {
            debug!("Command failed: {} ({:?})", result.command, result.exit_code);
            Err(CommandError::from_output(result))
        }
    }

    async fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        log_path: &Path,
    ) -> Result<Box<dyn BackgroundProcess>, CommandError> {
        let command = render_command(program, args);
        let io_error = |source: std::io::Error| CommandError::Io { command: command.clone(), source };

        if let Some(parent) = log_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let log = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_path)
            .map_err(io_error)?;
        let log_err = log.try_clone().map_err(io_error)?;

        let mut cmd = AsyncCommand::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(false);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| launch_error(&command, e))?;
        info!("Launched `{}` in background (pid {:?}, log {})", command, child.id(), log_path.display());

        Ok(Box::new(DetachedChild {
            command,
            child,
            log_path: log_path.to_path_buf(),
            started: Instant::now(),
        }))
    }
}

struct DetachedChild {
    command: String,
    child: Child,
    log_path: std::path::PathBuf,
    started: Instant,
}

#[async_trait]
impl BackgroundProcess for DetachedChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn poll_exit(&mut self) -> Result<Option<CommandOutput>, CommandError> {
        let status = self.child.try_wait().map_err(|source| CommandError::Io {
            command: self.command.clone(),
            source,
        })?;

        let Some(status) = status else {
            return Ok(None);
        };

        // Both streams went to the log file
        let log = tokio::fs::read(&self.log_path)
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        Ok(Some(CommandOutput {
            command: self.command.clone(),
            exit_code: status.code(),
            stdout: log,
            stderr: String::new(),
            execution_time_ms: self.started.elapsed().as_millis(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let output = SystemCommandRunner::new()
            .run("sh", &args(&["-c", "echo 'Hello World'"]))
            .await
            .unwrap();

        assert!(output.success());
        assert!(output.stdout.contains("Hello World"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_streams() {
        let err = SystemCommandRunner::new()
            .run("sh", &args(&["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap_err();

        match err {
            CommandError::Failed { exit_code, stdout, stderr, .. } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stdout.trim(), "out");
                assert_eq!(stderr.trim(), "err");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = SystemCommandRunner::new()
            .run("definitely-not-a-real-binary-golem", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_detached_process_poll() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("bg.log");
        let runner = SystemCommandRunner::new();

        let mut quick = runner
            .spawn_detached("sh", &args(&["-c", "echo done"]), &log)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let output = quick.poll_exit().await.unwrap().expect("process should have exited");
        assert!(output.success());
        assert!(output.stdout.contains("done"));

        let mut slow = runner
            .spawn_detached("sleep", &args(&["5"]), &dir.path().join("slow.log"))
            .await
            .unwrap();
        assert!(slow.id().is_some());
        assert!(slow.poll_exit().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_detached_log_starts_empty_on_each_launch() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("kvm_install.log");
        std::fs::write(&log, "stale output from a previous install\n").unwrap();
        let runner = SystemCommandRunner::new();

        let mut process = runner
            .spawn_detached("sh", &args(&["-c", "echo fresh"]), &log)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let output = process.poll_exit().await.unwrap().expect("process should have exited");

        assert!(output.stdout.contains("fresh"));
        assert!(!output.stdout.contains("stale"));
    }

    #[test]
    fn test_command_line_round_trip() {
        let (program, rest) = split_command_line("sudo apt install -y expect").unwrap();
        assert_eq!(program, "sudo");
        assert_eq!(rest, args(&["apt", "install", "-y", "expect"]));
        assert_eq!(render_command("golemsp", &args(&["settings", "set", "--account", "0x1 2"])),
                   "golemsp settings set --account '0x1 2'");
    }
}
