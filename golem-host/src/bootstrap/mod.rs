//! Host bootstrap for the Golem provider
//!
//! Runs the fixed provisioning sequence (requirements → expect → golem →
//! PATH → KVM → KVM permissions). Each step is skipped when its effect is
//! already present, emits exactly one [`BootstrapStep`], and the run stops at
//! the first failure. Nothing is rolled back: partial provisioning is left in
//! place for the operator.

mod report;

pub use report::{BootstrapReport, BootstrapStep, Details, StepOutcome, StepStatus};

use crate::capabilities::{check_requirements, probe};
use crate::config::{BootstrapTiming, HostConfig};
use crate::execution::{CommandError, CommandRunner};
use crate::scripts::{run_remote_script, FetchError, ScriptError, ScriptFetcher, TempScript};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapAction {
    CheckRequirements,
    InstallExpect,
    InstallGolem,
    AddGolemPath,
    InstallKvm,
    SetKvmPermissions,
}

impl BootstrapAction {
    pub const ALL: [BootstrapAction; 6] = [
        BootstrapAction::CheckRequirements,
        BootstrapAction::InstallExpect,
        BootstrapAction::InstallGolem,
        BootstrapAction::AddGolemPath,
        BootstrapAction::InstallKvm,
        BootstrapAction::SetKvmPermissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapAction::CheckRequirements => "check_requirements",
            BootstrapAction::InstallExpect => "install_expect",
            BootstrapAction::InstallGolem => "install_golem",
            BootstrapAction::AddGolemPath => "add_golem_path",
            BootstrapAction::InstallKvm => "install_kvm",
            BootstrapAction::SetKvmPermissions => "set_kvm_permissions",
        }
    }

    /// Pause after this step before the next one starts
    fn settle_delay(&self, timing: &BootstrapTiming) -> Duration {
        let secs = match self {
            BootstrapAction::CheckRequirements => timing.after_requirements_secs,
            BootstrapAction::InstallExpect => timing.after_expect_secs,
            BootstrapAction::InstallGolem => timing.after_golem_secs,
            BootstrapAction::AddGolemPath => timing.after_path_secs,
            BootstrapAction::InstallKvm => timing.after_kvm_secs,
            BootstrapAction::SetKvmPermissions => 0,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for BootstrapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages for a download-and-run step
struct ScriptStep<'a> {
    url: &'a str,
    script_name: &'a str,
    success: &'a str,
    failure: &'a str,
}

pub struct Bootstrapper {
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn ScriptFetcher>,
    config: HostConfig,
}

impl Bootstrapper {
    pub fn new(runner: Arc<dyn CommandRunner>, fetcher: Arc<dyn ScriptFetcher>, config: HostConfig) -> Self {
        Self { runner, fetcher, config }
    }

    /// Runs every step in order and returns the full audit trail.
    pub async fn run(&self) -> BootstrapReport {
        let total = BootstrapAction::ALL.len();
        let mut steps = Vec::with_capacity(total);

        for (index, action) in BootstrapAction::ALL.into_iter().enumerate() {
            let step = index + 1;
            info!("[STEP {}/{}] {}", step, total, action);

            let outcome = self.execute(action).await;
            let error = outcome.error().map(str::to_string);
            let record = BootstrapStep::record(step, action, outcome);
            let skipped = record.skipped();
            steps.push(record);

            if let Some(error) = error {
                warn!("Bootstrap failed at step {} ({}): {}", step, action, error);
                return BootstrapReport::failed(steps, step, error);
            }
            if skipped {
                info!("Step {} skipped: {}", step, action);
            } else {
                info!("Step {} completed: {}", step, action);
            }

            if step < total {
                tokio::time::sleep(action.settle_delay(&self.config.bootstrap)).await;
            }
        }

        info!("Bootstrap process completed successfully");
        BootstrapReport::succeeded(steps)
    }

    async fn execute(&self, action: BootstrapAction) -> StepOutcome {
        let scripts = &self.config.scripts;
        match action {
            BootstrapAction::CheckRequirements => self.check_requirements().await,
            BootstrapAction::InstallExpect => self.install_expect().await,
            BootstrapAction::InstallGolem => {
                if probe(self.runner.as_ref(), &self.config.commands.golem_probe).await {
                    return StepOutcome::skipped("Golem is already installed");
                }
                self.script_step(ScriptStep {
                    url: &scripts.install_golem,
                    script_name: "install-golem",
                    success: "Golem installed successfully",
                    failure: "Failed to install Golem",
                })
                .await
            }
            BootstrapAction::AddGolemPath => {
                self.script_step(ScriptStep {
                    url: &scripts.add_golem_path,
                    script_name: "add-golem-path",
                    success: "Golem path added successfully",
                    failure: "Failed to add Golem path",
                })
                .await
            }
            BootstrapAction::InstallKvm => self.install_kvm().await,
            BootstrapAction::SetKvmPermissions => {
                self.script_step(ScriptStep {
                    url: &scripts.set_kvm_permissions,
                    script_name: "set-kvm-permission",
                    success: "KVM permissions set successfully",
                    failure: "Failed to set KVM permissions",
                })
                .await
            }
        }
    }

    async fn check_requirements(&self) -> StepOutcome {
        let requirements = check_requirements(self.runner.as_ref(), &self.config).await;
        let mut details = Details::new();
        details.insert("requirements".into(), json!(requirements));

        if requirements.meets_requirements {
            StepOutcome::succeeded("Host requirements met", details)
        } else {
            let error = format!(
                "Host requirements not met (platform: {}, virtualization count: {})",
                requirements.platform, requirements.virtualization_count
            );
            StepOutcome::failed("Host requirements not met", error, details)
        }
    }

    async fn install_expect(&self) -> StepOutcome {
        let commands = &self.config.commands;
        if probe(self.runner.as_ref(), &commands.expect_probe).await {
            return StepOutcome::skipped("Expect is already installed");
        }

        let mut last_stdout = String::new();
        for line in &commands.install_expect {
            match self.runner.run_line(line).await {
                Ok(output) => last_stdout = output.stdout,
                Err(e) => return command_failure("Failed to install expect", &e, Details::new()),
            }
        }

        let mut details = Details::new();
        details.insert("output".into(), json!(last_stdout));
        StepOutcome::succeeded("Expect installed successfully", details)
    }

    async fn script_step(&self, step: ScriptStep<'_>) -> StepOutcome {
        let result = run_remote_script(
            self.fetcher.as_ref(),
            self.runner.as_ref(),
            &self.config.commands.shell,
            step.url,
        )
        .await;

        let mut details = Details::new();
        details.insert("script_url".into(), json!(step.url));

        match result {
            Ok(output) => {
                details.insert("output".into(), json!(output.stdout));
                StepOutcome::succeeded(step.success, details)
            }
            Err(ScriptError::Download(e)) => download_failure(step.script_name, &e, details),
            Err(ScriptError::Write(e)) => {
                StepOutcome::failed("Failed to write temporary script", e.to_string(), details)
            }
            Err(ScriptError::Execution(e)) => command_failure(step.failure, &e, details),
        }
    }

    /// Long-running install: launched detached, polled once after the grace interval.
    async fn install_kvm(&self) -> StepOutcome {
        if probe(self.runner.as_ref(), &self.config.commands.kvm_probe).await {
            return StepOutcome::skipped("KVM is already available");
        }

        let url = self.config.scripts.install_kvm.as_str();
        let mut details = Details::new();
        details.insert("script_url".into(), json!(url));

        let contents = match self.fetcher.fetch(url).await {
            Ok(contents) => contents,
            Err(e) => return download_failure("install-kvm", &e, details),
        };
        let script = match TempScript::write(&contents).await {
            Ok(script) => script,
            Err(e) => return StepOutcome::failed("Failed to write temporary script", e.to_string(), details),
        };

        let log_path = &self.config.paths.kvm_install_log;
        let mut process = match self
            .runner
            .spawn_detached(&self.config.commands.shell, &[script.path_arg()], log_path)
            .await
        {
            Ok(process) => process,
            Err(e) => return command_failure("Failed to install KVM", &e, details),
        };

        tokio::time::sleep(self.config.bootstrap.kvm_grace()).await;

        let outcome = match process.poll_exit().await {
            Ok(None) => {
                details.insert("pid".into(), json!(process.id()));
                details.insert("log_file".into(), json!(log_path.display().to_string()));
                details.insert(
                    "note".into(),
                    json!("KVM installation is a long-running process. Use /verify-installation to confirm completion."),
                );
                StepOutcome::succeeded("KVM installation started (running in background)", details)
            }
            Ok(Some(output)) if output.success() => {
                details.insert("output".into(), json!(output.stdout));
                StepOutcome::succeeded("KVM installed successfully", details)
            }
            Ok(Some(output)) => command_failure("Failed to install KVM", &CommandError::from_output(output), details),
            Err(e) => command_failure("Failed to install KVM", &e, details),
        };

        // The installer keeps running on its own; only the script file is ours
        drop(process);
        drop(script);
        outcome
    }
}

fn download_failure(script_name: &str, error: &FetchError, mut details: Details) -> StepOutcome {
    details.insert("script_url".into(), json!(error.url()));
    StepOutcome::failed(
        format!("Failed to download {script_name} script"),
        error.to_string(),
        details,
    )
}

fn command_failure(message: &str, error: &CommandError, mut details: Details) -> StepOutcome {
    details.insert("stdout".into(), json!(error.stdout()));
    details.insert("stderr".into(), json!(error.stderr()));
    StepOutcome::failed(message, error.to_string(), details)
}
