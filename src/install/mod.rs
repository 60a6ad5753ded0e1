//! Installation engine.
//!
//! The [`InstallOrchestrator`] sequences the privilege gate, the artifact
//! fetcher, path resolution and the per-platform integration writers. Host
//! specifics live behind the [`Platform`] trait with one implementation for
//! Linux and one for Windows.

pub mod collaborators;
pub mod console;
pub mod download;
pub mod integration;
pub mod linux;
pub mod orchestration;
pub mod paths;
pub mod platform;
pub mod privilege;
pub mod process;
pub mod prompt;
pub mod windows;

pub use collaborators::{
    ArchiveResources, DirectoryResources, EnglishCatalog, ResourceExtractor, Translate,
};
pub use orchestration::{InstallOrchestrator, InstallOutcome, InstallStage};
pub use paths::{PathResolver, ResolvedPaths};
pub use platform::{ArchTag, HostEnv, OsType, Platform, native_platform};
pub use privilege::{PrivilegeDecision, PrivilegeGate};
pub use prompt::{Prompter, TerminalPrompter};

use crate::config::InstallConfig;

/// Install `config` on the running host with terminal prompts.
pub async fn install(config: InstallConfig) -> InstallOutcome {
    InstallOrchestrator::new(config, HostEnv::capture(), native_platform())
        .install()
        .await
}
