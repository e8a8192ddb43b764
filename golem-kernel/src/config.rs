use golem_host::HostConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KernelConfig {
    /// ex: "127.0.0.1:8000"; `GOLEM_KERNEL_BIND` wins over this
    pub bind: Option<String>,
    pub host: HostConfig,
}

impl KernelConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let raw = std::env::var("GOLEM_KERNEL_BIND")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        raw.parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {raw:?}: {e}"))
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("GOLEM_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    load_config_from(Path::new(&path)).await
}

/// Absent, empty or invalid file: defaults, so the kernel always starts.
pub async fn load_config_from(path: &Path) -> KernelConfig {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return KernelConfig::default();
    }

    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return KernelConfig::default();
        }
    };
    if txt.trim().is_empty() {
        return KernelConfig::default();
    }

    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!("Invalid config {}: {}", path.display(), e);
        KernelConfig::default()
    })
}
