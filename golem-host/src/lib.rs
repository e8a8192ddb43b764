//! Golem Host - host-side control of a Golem provider node
//!
//! Everything that touches the machine lives here:
//! - Command execution (blocking and detached) behind [`execution::CommandRunner`]
//! - Remote provisioning scripts with temp-file cleanup
//! - Parsers for `golemsp` / `yagna` text output
//! - Requirement and installation probes
//! - The bootstrap orchestrator with per-step reporting
//! - Provider lifecycle, settings, identity and log tails

pub mod bootstrap;
pub mod capabilities;
pub mod config;
pub mod execution;
pub mod parser;
pub mod provider;
pub mod scripts;

pub use bootstrap::{BootstrapAction, BootstrapReport, Bootstrapper};
pub use config::HostConfig;
pub use execution::{CommandRunner, SystemCommandRunner};
pub use provider::GolemProvider;
pub use scripts::{HttpScriptFetcher, ScriptFetcher};
