//! Host configuration
//!
//! Handles:
//! - Remote script locations (bootstrap + diagnostics)
//! - CLI program names and probe / install command lines
//! - Host paths (cpuinfo, KVM device, provider logs)
//! - Bootstrap timings (settle delays, KVM grace interval)
//!
//! Every field has a default so a partial YAML section is enough.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SCRIPT_BASE_URL: &str =
    "https://raw.githubusercontent.com/skillDeCoder/idle-finance-v2/main/automation/golem/scripts";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub scripts: ScriptUrls,
    pub commands: CommandsConfig,
    pub paths: HostPaths,
    pub bootstrap: BootstrapTiming,
    /// Overrides `std::env::consts::OS` for the requirement check
    pub platform: Option<String>,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptUrls {
    pub install_golem: String,
    pub add_golem_path: String,
    pub install_kvm: String,
    pub set_kvm_permissions: String,
    pub hello_world: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub golemsp: String,
    pub yagna: String,
    /// Interpreter used for downloaded scripts
    pub shell: String,
    pub expect_probe: String,
    pub install_expect: Vec<String>,
    pub golem_probe: String,
    pub kvm_probe: String,
    pub process_table: String,
    /// Matched against the process table to find the running agent
    pub agent_process: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPaths {
    pub cpuinfo: PathBuf,
    pub kvm_device: PathBuf,
    pub golem_log: PathBuf,
    pub provider_log: PathBuf,
    /// Where the detached KVM installer writes its output
    pub kvm_install_log: PathBuf,
    /// stdout/stderr of the detached `golemsp run`
    pub agent_output_log: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapTiming {
    pub after_requirements_secs: u64,
    pub after_expect_secs: u64,
    pub after_golem_secs: u64,
    pub after_path_secs: u64,
    pub after_kvm_secs: u64,
    pub kvm_grace_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            scripts: ScriptUrls::default(),
            commands: CommandsConfig::default(),
            paths: HostPaths::default(),
            bootstrap: BootstrapTiming::default(),
            platform: None,
            fetch_timeout_secs: 15,
        }
    }
}

impl ScriptUrls {
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            install_golem: format!("{base}/install-golem.sh"),
            add_golem_path: format!("{base}/add-golem-path.sh"),
            install_kvm: format!("{base}/install-kvm.sh"),
            set_kvm_permissions: format!("{base}/set-kvm-permission.sh"),
            hello_world: format!("{base}/hello-world.sh"),
        }
    }
}

impl Default for ScriptUrls {
    fn default() -> Self {
        Self::from_base(DEFAULT_SCRIPT_BASE_URL)
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            golemsp: "golemsp".to_string(),
            yagna: "yagna".to_string(),
            shell: "bash".to_string(),
            expect_probe: "expect -c exit".to_string(),
            install_expect: vec![
                "sudo apt update".to_string(),
                "sudo apt install -y expect".to_string(),
            ],
            golem_probe: "golemsp --version".to_string(),
            kvm_probe: "kvm-ok".to_string(),
            process_table: "ps -eo etime,args".to_string(),
            agent_process: "golemsp run".to_string(),
        }
    }
}

/// `~/.local/share` on Linux, falling back to the relative path when no home is known
fn data_dir() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".local/share"))
}

impl Default for HostPaths {
    fn default() -> Self {
        let data = data_dir();
        Self {
            cpuinfo: PathBuf::from("/proc/cpuinfo"),
            kvm_device: PathBuf::from("/dev/kvm"),
            golem_log: data.join("yagna").join("yagna_rCURRENT.log"),
            provider_log: data.join("ya-provider").join("ya-provider_rCURRENT.log"),
            kvm_install_log: std::env::temp_dir().join("golem-install-kvm.log"),
            agent_output_log: data.join("golemsp").join("golemsp-run.log"),
        }
    }
}

impl Default for BootstrapTiming {
    fn default() -> Self {
        Self {
            after_requirements_secs: 2,
            after_expect_secs: 2,
            after_golem_secs: 5,
            after_path_secs: 2,
            after_kvm_secs: 5,
            kvm_grace_secs: 5,
        }
    }
}

impl BootstrapTiming {
    /// No pauses at all, for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            after_requirements_secs: 0,
            after_expect_secs: 0,
            after_golem_secs: 0,
            after_path_secs: 0,
            after_kvm_secs: 0,
            kvm_grace_secs: 0,
        }
    }

    pub fn kvm_grace(&self) -> Duration {
        Duration::from_secs(self.kvm_grace_secs)
    }
}

impl HostConfig {
    pub fn platform(&self) -> String {
        self.platform
            .clone()
            .unwrap_or_else(|| std::env::consts::OS.to_string())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert_eq!(config.fetch_timeout_secs, 15);
        assert_eq!(config.bootstrap.kvm_grace_secs, 5);
        assert!(config.scripts.install_kvm.ends_with("/install-kvm.sh"));
        assert!(config.scripts.set_kvm_permissions.ends_with("/set-kvm-permission.sh"));
        assert_eq!(config.commands.install_expect.len(), 2);
    }

    #[test]
    fn test_log_paths() {
        let paths = HostPaths::default();
        assert!(paths.golem_log.to_string_lossy().ends_with("yagna/yagna_rCURRENT.log"));
        assert!(paths.provider_log.to_string_lossy().ends_with("ya-provider/ya-provider_rCURRENT.log"));
    }

    #[test]
    fn test_script_base_trailing_slash() {
        let urls = ScriptUrls::from_base("http://localhost:9000/scripts/");
        assert_eq!(urls.install_golem, "http://localhost:9000/scripts/install-golem.sh");
    }
}
