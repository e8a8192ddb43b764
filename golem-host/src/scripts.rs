//! Remote provisioning scripts
//!
//! Features:
//! - Download shell scripts over HTTP(S)
//! - Persist them to a uniquely named, executable temp file
//! - Run them with the configured shell, removing the file on every exit path
//! - Hello-world diagnostic with an embedded fallback

use crate::execution::{CommandError, CommandOutput, CommandRunner};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Used by the hello-world diagnostic when the remote copy returns 404
pub const HELLO_WORLD_FALLBACK: &str = r#"#!/bin/bash
echo "Hello World from Local Fallback!"
echo "GitHub file not found, using local test script"
echo "Current time: $(date)"
"#;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("script not found at {url}")]
    NotFound { url: String },
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::NotFound { url }
            | FetchError::Status { url, .. }
            | FetchError::Transport { url, .. } => url,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to download script: {0}")]
    Download(#[from] FetchError),
    #[error("failed to write temporary script: {0}")]
    Write(#[from] std::io::Error),
    #[error("script execution failed: {0}")]
    Execution(#[from] CommandError),
}

#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetches scripts with reqwest
#[derive(Clone)]
pub struct HttpScriptFetcher {
    client: reqwest::Client,
}

impl HttpScriptFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("golem-host/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ScriptFetcher for HttpScriptFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Downloading script from {}", url);
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound { url: url.to_string() });
        }
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }

        response.text().await.map_err(transport)
    }
}

/// Executable script in the temp dir, deleted when dropped
#[derive(Debug)]
pub struct TempScript {
    path: PathBuf,
}

impl TempScript {
    pub async fn write(contents: &str) -> std::io::Result<Self> {
        let filename = format!("golem-script-{}.sh", uuid::Uuid::new_v4());
        let path = std::env::temp_dir().join(filename);
        // Owned from here on so a failed chmod still cleans up
        let script = Self { path };

        tokio::fs::write(&script.path, contents).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&script.path, std::fs::Permissions::from_mode(0o755)).await?;
        }

        Ok(script)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_arg(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

impl Drop for TempScript {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove temporary script {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Downloads `url` and runs it with `shell`, waiting for completion.
pub async fn run_remote_script(
    fetcher: &dyn ScriptFetcher,
    runner: &dyn CommandRunner,
    shell: &str,
    url: &str,
) -> Result<CommandOutput, ScriptError> {
    let contents = fetcher.fetch(url).await?;
    let script = TempScript::write(&contents).await?;
    info!("Running script {} ({} bytes)", url, contents.len());
    let output = runner.run(shell, &[script.path_arg()]).await?;
    Ok(output)
}

#[derive(Debug, Clone, Serialize)]
pub struct HelloWorldRun {
    pub message: String,
    pub script_url: String,
    pub fallback_used: bool,
    pub script_content_preview: String,
    pub stderr: String,
}

fn preview(contents: &str) -> String {
    const LIMIT: usize = 200;
    match contents.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &contents[..cut]),
        None => contents.to_string(),
    }
}

/// Diagnostic round trip: download, run, report. Only a 404 falls back to
/// the embedded script; every other download error is returned.
pub async fn run_hello_world(
    fetcher: &dyn ScriptFetcher,
    runner: &dyn CommandRunner,
    shell: &str,
    url: &str,
) -> Result<HelloWorldRun, ScriptError> {
    let (contents, fallback_used) = match fetcher.fetch(url).await {
        Ok(contents) => (contents, false),
        Err(FetchError::NotFound { .. }) => {
            warn!("Hello-world script not found at {}, using embedded fallback", url);
            (HELLO_WORLD_FALLBACK.to_string(), true)
        }
        Err(e) => return Err(e.into()),
    };

    let script = TempScript::write(&contents).await?;
    let output = runner.run(shell, &[script.path_arg()]).await?;

    Ok(HelloWorldRun {
        message: output.stdout.trim().to_string(),
        script_url: url.to_string(),
        fallback_used,
        script_content_preview: preview(&contents),
        stderr: output.stderr.trim().to_string(),
    })
}
