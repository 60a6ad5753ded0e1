//! Installation orchestration.
//!
//! [`InstallOrchestrator::install`] walks the stages
//! `NotStarted → PrivilegeCheck → Downloading → Staging → Integrating → Done`
//! strictly forward. The first mandatory failure ends the run in
//! `Failed(code)`; optional integration steps only log warnings.
//!
//! Nothing on disk is changed before the artifact has been fetched and
//! validated, so a failed run can be repeated safely.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, error, info, warn};

use super::collaborators::{ArchiveResources, EnglishCatalog, ResourceExtractor, Translate};
use super::console::Console;
use super::download::{StagedArtifact, fetch};
use super::integration::file_ops::copy_file_atomic;
use super::paths::PathResolver;
use super::platform::{ArchTag, HostEnv, InstallLayout, IntegrationContext, OsType, Platform, absolute};
use super::privilege::{PROMPT_TIMEOUT, PrivilegeDecision, PrivilegeGate};
use super::prompt::{Prompter, TerminalPrompter};
use crate::config::{ArtifactSource, InstallConfig, InstallMode};
use crate::error::{InstallerError, Result, SourceProblem};

/// Icon shown in the Windows uninstall list.
const UNINSTALL_ICON: &str = "pics/uninstall.ico";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    NotStarted,
    PrivilegeCheck,
    Downloading,
    Staging,
    Integrating,
    Done,
    Failed(i32),
}

impl InstallStage {
    fn rank(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::PrivilegeCheck => 1,
            Self::Downloading => 2,
            Self::Staging => 3,
            Self::Integrating => 4,
            Self::Done | Self::Failed(_) => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// Final result of [`InstallOrchestrator::install`].
#[derive(Debug)]
pub enum InstallOutcome {
    Installed,
    /// An elevated installer was started. The caller should exit.
    Relaunched,
    Failed(InstallerError),
}

impl InstallOutcome {
    /// Process exit code: `0` on success, a negative code otherwise.
    pub fn code(&self) -> i32 {
        match self {
            Self::Installed | Self::Relaunched => 0,
            Self::Failed(e) => e.code(),
        }
    }
}

pub struct InstallOrchestrator {
    config: InstallConfig,
    env: HostEnv,
    platform: Box<dyn Platform>,
    prompter: Box<dyn Prompter>,
    translator: Box<dyn Translate>,
    resources: Option<Box<dyn ResourceExtractor>>,
    relaunch_args: Vec<String>,
    prompt_timeout: Duration,
    stage: InstallStage,
}

impl InstallOrchestrator {
    pub fn new(config: InstallConfig, env: HostEnv, platform: Box<dyn Platform>) -> Self {
        Self {
            config,
            env,
            platform,
            prompter: Box::new(TerminalPrompter),
            translator: Box::new(EnglishCatalog),
            resources: None,
            relaunch_args: std::env::args().skip(1).collect(),
            prompt_timeout: PROMPT_TIMEOUT,
            stage: InstallStage::NotStarted,
        }
    }

    pub fn with_prompter(mut self, prompter: Box<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_translator(mut self, translator: Box<dyn Translate>) -> Self {
        self.translator = translator;
        self
    }

    /// Resource source for icons and fonts. Defaults to the installed
    /// artifact read as a zip archive.
    pub fn with_resources(mut self, resources: Box<dyn ResourceExtractor>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Arguments passed to an elevated relaunch. Defaults to this process's
    /// own arguments.
    pub fn with_relaunch_args(mut self, args: Vec<String>) -> Self {
        self.relaunch_args = args;
        self
    }

    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    pub fn stage(&self) -> InstallStage {
        self.stage
    }

    fn advance(&mut self, next: InstallStage) {
        if next.rank() <= self.stage.rank() {
            debug!("Ignoring stage change {:?} -> {next:?}", self.stage);
            return;
        }
        debug!("Install stage {:?} -> {next:?}", self.stage);
        self.stage = next;
    }

    fn text(&self, key: &str, args: &[&str]) -> String {
        self.translator.translate(key, args)
    }

    fn console(&self) -> Console {
        Console::new(self.config.quiet())
    }

    /// Run the installation. Never panics on I/O or subprocess failures; every
    /// outcome is reported through the returned value.
    pub async fn install(&mut self) -> InstallOutcome {
        if self.stage.is_terminal() {
            warn!("install() called again after {:?}", self.stage);
        }
        match self.run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let code = e.code();
                self.stage = InstallStage::Failed(code);
                if self.config.debug() {
                    error!("Installation failed: {e:?}");
                } else {
                    error!("Installation failed: {e}");
                }
                self.console()
                    .failure(&self.text("install.failed", &[&code.to_string(), &e.to_string()]));
                InstallOutcome::Failed(e)
            }
        }
    }

    async fn run(&mut self) -> Result<InstallOutcome> {
        let identity = self.config.identity();
        self.console()
            .stage(&self.text("install.start", &[&identity.long_name, &identity.version]));

        self.advance(InstallStage::PrivilegeCheck);
        let privileged = match self.check_privilege()? {
            PrivilegeDecision::Granted { privileged } => privileged,
            PrivilegeDecision::Relaunched => return Ok(InstallOutcome::Relaunched),
        };
        let (os, arch, source) = self.validate()?;

        self.advance(InstallStage::Downloading);
        let staged = self.fetch(os, arch, &source).await?;

        self.advance(InstallStage::Staging);
        let layout = self.stage_artifact(os, &staged)?;
        drop(staged);

        self.advance(InstallStage::Integrating);
        self.integrate(os, &layout, privileged)?;

        self.advance(InstallStage::Done);
        self.console()
            .success(&self.text("install.success", &[&self.config.identity().long_name]));
        Ok(InstallOutcome::Installed)
    }

    fn check_privilege(&self) -> Result<PrivilegeDecision> {
        PrivilegeGate {
            platform: self.platform.as_ref(),
            env: &self.env,
            prompter: self.prompter.as_ref(),
            translator: self.translator.as_ref(),
            console: self.console(),
            relaunch_args: &self.relaunch_args,
            timeout: self.prompt_timeout,
        }
        .ensure(&self.config)
    }

    /// Checks that need no side effects: mode, architecture, source.
    fn validate(&self) -> Result<(OsType, ArchTag, ArtifactSource)> {
        let os = self.platform.os();
        info!("{}", self.text("install.platform", &[&format!("{os:?}")]));
        if self.config.mode() == InstallMode::User && os != OsType::Windows {
            return Err(InstallerError::UnsupportedPlatform(
                self.text("install.user_unsupported", &[]),
            ));
        }
        let arch = ArchTag::from_name(&self.env.arch)?;
        let source = self
            .config
            .source()
            .cloned()
            .ok_or_else(|| InstallerError::SourceMissing {
                problem: SourceProblem::NotConfigured,
                detail: "neither a download URL nor an offline file is configured".into(),
            })?;
        Ok((os, arch, source))
    }

    async fn fetch(&self, os: OsType, arch: ArchTag, source: &ArtifactSource) -> Result<StagedArtifact> {
        if let ArtifactSource::Download(spec) = source {
            self.console().info(&self.text("download.start", &[&spec.url]));
        }
        let auth_message = match source {
            ArtifactSource::Download(spec) => self.text("download.auth", &[&spec.url]),
            ArtifactSource::Offline(_) => String::new(),
        };
        let staged = fetch(
            source,
            os,
            arch,
            self.config.quiet(),
            self.prompter.as_ref(),
            &auth_message,
        )
        .await?;
        if matches!(staged, StagedArtifact::Downloaded(_)) {
            self.console().info(&self.text("download.done", &[]));
        }
        Ok(staged)
    }

    /// Create the directories, stop running instances and copy the artifact
    /// into place.
    fn stage_artifact(&self, os: OsType, staged: &StagedArtifact) -> Result<InstallLayout> {
        let mut resolver = PathResolver::new(&self.config, &self.env, self.platform.as_ref());
        if self.config.desktop_entry().is_some() || self.config.uninstall_icon().is_some() {
            resolver.register_program_dir("pics/")?;
        }
        resolver.start_installation();

        let portable_root = match self.config.portable_root() {
            Some(root) => {
                let root = absolute(root);
                fs::create_dir_all(&root).map_err(|e| InstallerError::directory(&root, e))?;
                self.console()
                    .info(&self.text("install.portable", &[&root.display().to_string()]));
                Some(root)
            }
            None => None,
        };

        let app_dir = resolver.application_dir()?.ok_or_else(|| {
            InstallerError::UnsupportedPlatform(format!("no application directory is known for {os:?}"))
        })?;
        let config_dir = match resolver.config_dir()? {
            Some(dir) => dir,
            None => {
                warn!("No configuration directory is known, using {}", app_dir.display());
                app_dir.clone()
            }
        };
        let desktop_dir = match os {
            OsType::Windows => resolver.desktop_dir(),
            _ => None,
        };

        let artifact = app_dir.join(self.config.artifact_file_name());
        if self.config.kill_running_instances() {
            self.platform.kill_running_instances(&artifact);
        }
        self.console().info(&self.text(
            "install.copy",
            &[&staged.path().display().to_string(), &artifact.display().to_string()],
        ));
        let bytes = copy_file_atomic(staged.path(), &artifact).map_err(|e| InstallerError::CopyFailure {
            from: staged.path().to_path_buf(),
            to: artifact.clone(),
            source: e,
        })?;
        debug!("Copied {bytes} bytes to {}", artifact.display());

        Ok(InstallLayout {
            app_dir,
            config_dir,
            desktop_dir,
            artifact,
            portable_root,
        })
    }

    fn integrate(&self, os: OsType, layout: &InstallLayout, privileged: bool) -> Result<()> {
        self.console()
            .stage(&self.text("install.integrating", &[&self.config.identity().long_name]));

        let archive;
        let resources: &dyn ResourceExtractor = match &self.resources {
            Some(resources) => resources.as_ref(),
            None => {
                archive = ArchiveResources::new(&layout.artifact);
                &archive
            }
        };

        if os == OsType::Windows {
            if let Some(icon) = self.config.uninstall_icon() {
                let dest: PathBuf = layout.app_dir.join(UNINSTALL_ICON);
                if !resources.copy(icon, &dest) {
                    warn!("Uninstall icon {icon} could not be extracted");
                }
            }
        }

        let ctx = IntegrationContext {
            config: &self.config,
            env: &self.env,
            layout,
            resources,
            privileged,
        };
        self.platform.integrate(&ctx)?;
        self.platform.install_fonts(&ctx);
        self.platform.create_gui_autostart(&ctx);
        Ok(())
    }
}
