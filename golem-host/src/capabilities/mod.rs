//! Host capability detection for the Golem provider
//!
//! Detects whether this machine can host a provider:
//! - Platform (Linux only)
//! - Hardware virtualization (vmx/svm CPU flags)
//! - Installed agent binary and KVM device

use crate::config::HostConfig;
use crate::execution::{CommandError, CommandOutput, CommandRunner};
use serde::Serialize;
use tracing::{debug, warn};

pub const REQUIRED_PLATFORM: &str = "linux";

/// Requirement check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRequirements {
    pub platform: String,
    pub virtualization_support: bool,
    pub virtualization_count: u32,
    pub meets_requirements: bool,
}

/// Installation probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationReport {
    pub golem_installed: bool,
    pub golem_path: Option<String>,
    pub kvm_available: bool,
    pub kvm_device: Option<String>,
}

impl InstallationReport {
    pub fn all_systems_go(&self) -> bool {
        self.golem_installed && self.kvm_available
    }
}

/// Checks platform and CPU virtualization flags.
///
/// A failing or unparsable flag count is reported as zero rather than an error.
pub async fn check_requirements(runner: &dyn CommandRunner, config: &HostConfig) -> HostRequirements {
    let platform = config.platform();

    if !platform.eq_ignore_ascii_case(REQUIRED_PLATFORM) {
        debug!("Unsupported platform: {}", platform);
        return HostRequirements {
            platform,
            virtualization_support: false,
            virtualization_count: 0,
            meets_requirements: false,
        };
    }

    let cpuinfo = config.paths.cpuinfo.to_string_lossy().to_string();
    let args = vec!["-Ec".to_string(), "(vmx|svm)".to_string(), cpuinfo];
    let virtualization_count = match runner.run("grep", &args).await {
        Ok(output) => output.stdout.trim().parse::<u32>().unwrap_or(0),
        Err(e) => {
            // grep exits 1 when nothing matched
            debug!("Virtualization probe failed: {}", e);
            0
        }
    };

    let supported = virtualization_count > 0;
    if !supported {
        warn!("No hardware virtualization flags found in {}", config.paths.cpuinfo.display());
    }

    HostRequirements {
        platform,
        virtualization_support: supported,
        virtualization_count,
        meets_requirements: supported,
    }
}

/// `true` when the probe command exits 0.
pub async fn probe(runner: &dyn CommandRunner, command_line: &str) -> bool {
    match runner.run_line(command_line).await {
        Ok(_) => true,
        Err(e) => {
            debug!("Probe `{}` failed: {}", command_line, e);
            false
        }
    }
}

/// Probes the agent binary and the KVM device independently.
pub async fn verify_installation(runner: &dyn CommandRunner, config: &HostConfig) -> InstallationReport {
    let golem_path = trimmed_stdout(runner.run("which", &[config.commands.golemsp.clone()]).await);
    let kvm_device = trimmed_stdout(
        runner
            .run("ls", &["-l".to_string(), config.paths.kvm_device.to_string_lossy().to_string()])
            .await,
    );

    InstallationReport {
        golem_installed: golem_path.is_some(),
        golem_path,
        kvm_available: kvm_device.is_some(),
        kvm_device,
    }
}

fn trimmed_stdout(result: Result<CommandOutput, CommandError>) -> Option<String> {
    result
        .ok()
        .map(|output| output.stdout.trim().to_string())
        .filter(|line| !line.is_empty())
}
