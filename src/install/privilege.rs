//! Privilege gate: decides whether the chosen install mode may proceed with
//! the rights the process holds, and offers an elevated restart otherwise.
//!
//! Portable and user installs never require elevation. A system-wide install
//! without rights either relaunches the installer elevated (after an explicit
//! "yes") or fails with [`InstallerError::PrivilegeDenied`].

use std::time::Duration;

use log::{debug, info, warn};

use super::collaborators::Translate;
use super::console::Console;
use super::platform::{HostEnv, OsType, Platform};
use super::prompt::Prompter;
use crate::config::{InstallConfig, InstallMode};
use crate::error::{DenialReason, InstallerError, Result};

/// Time the user has to answer the elevation question.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of passing the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeDecision {
    /// Installation continues in this process.
    Granted { privileged: bool },
    /// An elevated copy was started. This process should exit.
    Relaunched,
}

/// Whether `mode` needs administrator / root rights.
pub fn requires_elevation(mode: InstallMode) -> bool {
    matches!(mode, InstallMode::SystemWide)
}

pub struct PrivilegeGate<'a> {
    pub platform: &'a dyn Platform,
    pub env: &'a HostEnv,
    pub prompter: &'a dyn Prompter,
    pub translator: &'a dyn Translate,
    pub console: Console,
    /// Arguments handed to the elevated copy.
    pub relaunch_args: &'a [String],
    pub timeout: Duration,
}

impl PrivilegeGate<'_> {
    /// Check the rights for `config`'s mode, prompting and relaunching when
    /// allowed.
    pub fn ensure(&self, config: &InstallConfig) -> Result<PrivilegeDecision> {
        let privileged = self.platform.has_required_privilege(config.identity());
        debug!("Privileged process: {privileged}");
        if privileged || !requires_elevation(config.mode()) {
            return Ok(PrivilegeDecision::Granted { privileged });
        }

        self.console.warn(&self.translator.translate("privilege.required", &[]));

        let interactive = matches!(self.platform.os(), OsType::Windows | OsType::Linux);
        if config.quiet() || !interactive {
            info!("Not prompting for elevation (quiet: {})", config.quiet());
            return Err(InstallerError::PrivilegeDenied(DenialReason::NonInteractive));
        }

        let question = self.translator.translate("privilege.restart", &[]);
        match self.prompter.confirm(&question, self.timeout) {
            Ok(true) => {
                self.platform.relaunch_elevated(self.env, self.relaunch_args)?;
                self.console.info(&self.translator.translate("privilege.relaunched", &[]));
                Ok(PrivilegeDecision::Relaunched)
            }
            Ok(false) => Err(InstallerError::PrivilegeDenied(DenialReason::Declined)),
            Err(e) => {
                warn!("Reading the elevation answer failed: {e}");
                Err(InstallerError::PrivilegeDenied(DenialReason::PromptFailed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::config::{AppIdentity, Credentials};
    use crate::install::collaborators::EnglishCatalog;
    use crate::install::platform::IntegrationContext;

    struct FakePlatform {
        os: OsType,
        privileged: bool,
        relaunch_fails: bool,
        relaunched: Mutex<Vec<Vec<String>>>,
    }

    impl FakePlatform {
        fn new(privileged: bool) -> Self {
            Self {
                os: OsType::Linux,
                privileged,
                relaunch_fails: false,
                relaunched: Mutex::new(Vec::new()),
            }
        }
    }

    impl Platform for FakePlatform {
        fn os(&self) -> OsType {
            self.os
        }
        fn application_dir(&self, _: &HostEnv, _: &AppIdentity) -> Option<PathBuf> {
            None
        }
        fn config_dir(&self, _: &HostEnv, _: &AppIdentity) -> Option<PathBuf> {
            None
        }
        fn desktop_dir(&self, _: &HostEnv) -> Option<PathBuf> {
            None
        }
        fn has_required_privilege(&self, _: &AppIdentity) -> bool {
            self.privileged
        }
        fn relaunch_elevated(&self, _: &HostEnv, args: &[String]) -> Result<()> {
            if self.relaunch_fails {
                return Err(InstallerError::ElevationFailed("no pkexec".into()));
            }
            self.relaunched.lock().unwrap().push(args.to_vec());
            Ok(())
        }
        fn kill_running_instances(&self, _: &std::path::Path) {}
        fn integrate(&self, _: &IntegrationContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    enum Answer {
        Yes,
        No,
        Broken,
        Unexpected,
    }

    struct Scripted(Answer);

    impl Prompter for Scripted {
        fn confirm(&self, _: &str, _: Duration) -> io::Result<bool> {
            match self.0 {
                Answer::Yes => Ok(true),
                Answer::No => Ok(false),
                Answer::Broken => Err(io::Error::other("stdin closed")),
                Answer::Unexpected => panic!("prompted unexpectedly"),
            }
        }
        fn credentials(&self, _: &str, _: &str) -> Result<Credentials> {
            unreachable!()
        }
    }

    fn gate<'a>(platform: &'a FakePlatform, env: &'a HostEnv, prompter: &'a Scripted, args: &'a [String]) -> PrivilegeGate<'a> {
        PrivilegeGate {
            platform,
            env,
            prompter,
            translator: &EnglishCatalog,
            console: Console::new(true),
            relaunch_args: args,
            timeout: PROMPT_TIMEOUT,
        }
    }

    fn system() -> InstallConfig {
        InstallConfig::builder("Acme", "1", "tool", "Tool").build()
    }

    #[test]
    fn portable_and_user_pass_without_rights() {
        let platform = FakePlatform::new(false);
        let env = HostEnv::default();
        let prompter = Scripted(Answer::Unexpected);
        let gate = gate(&platform, &env, &prompter, &[]);

        let portable = InstallConfig::builder("Acme", "1", "tool", "Tool").portable("/tmp/x").build();
        assert_eq!(gate.ensure(&portable).unwrap(), PrivilegeDecision::Granted { privileged: false });
        let user = InstallConfig::builder("Acme", "1", "tool", "Tool").user_installation(true).build();
        assert_eq!(gate.ensure(&user).unwrap(), PrivilegeDecision::Granted { privileged: false });
    }

    #[test]
    fn privileged_process_is_granted() {
        let platform = FakePlatform::new(true);
        let env = HostEnv::default();
        let prompter = Scripted(Answer::Unexpected);
        assert_eq!(
            gate(&platform, &env, &prompter, &[]).ensure(&system()).unwrap(),
            PrivilegeDecision::Granted { privileged: true }
        );
    }

    #[test]
    fn declined_and_timed_out_answers_deny() {
        let platform = FakePlatform::new(false);
        let env = HostEnv::default();
        let prompter = Scripted(Answer::No);
        let err = gate(&platform, &env, &prompter, &[]).ensure(&system()).unwrap_err();
        assert_eq!(err.code(), -2);
        assert!(platform.relaunched.lock().unwrap().is_empty());
    }

    #[test]
    fn broken_prompt_is_distinct() {
        let platform = FakePlatform::new(false);
        let env = HostEnv::default();
        let prompter = Scripted(Answer::Broken);
        let err = gate(&platform, &env, &prompter, &[]).ensure(&system()).unwrap_err();
        assert_eq!(err.code(), -3);
    }

    #[test]
    fn quiet_mode_never_prompts() {
        let platform = FakePlatform::new(false);
        let env = HostEnv::default();
        let prompter = Scripted(Answer::Unexpected);
        let quiet = InstallConfig::builder("Acme", "1", "tool", "Tool").quiet(true).build();
        let err = gate(&platform, &env, &prompter, &[]).ensure(&quiet).unwrap_err();
        assert_eq!(err.code(), -4);
    }

    #[test]
    fn yes_relaunches_with_original_arguments() {
        let platform = FakePlatform::new(false);
        let env = HostEnv::default();
        let prompter = Scripted(Answer::Yes);
        let args = vec!["--config".to_string(), "install.toml".to_string()];
        let decision = gate(&platform, &env, &prompter, &args).ensure(&system()).unwrap();
        assert_eq!(decision, PrivilegeDecision::Relaunched);
        assert_eq!(*platform.relaunched.lock().unwrap(), vec![args]);
    }

    #[test]
    fn failed_relaunch_is_fatal() {
        let platform = FakePlatform {
            relaunch_fails: true,
            ..FakePlatform::new(false)
        };
        let env = HostEnv::default();
        let prompter = Scripted(Answer::Yes);
        let err = gate(&platform, &env, &prompter, &[]).ensure(&system()).unwrap_err();
        assert_eq!(err.code(), -6);
    }

    #[test]
    fn other_systems_are_not_prompted() {
        let platform = FakePlatform {
            os: OsType::MacOs,
            ..FakePlatform::new(false)
        };
        let env = HostEnv::default();
        let prompter = Scripted(Answer::Unexpected);
        let err = gate(&platform, &env, &prompter, &[]).ensure(&system()).unwrap_err();
        assert_eq!(err.code(), -4);
    }
}
