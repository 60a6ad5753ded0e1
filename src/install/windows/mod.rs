//! Windows platform implementation.
//!
//! Registry records, shortcuts and PATH changes are made by generated batch
//! and PowerShell snippets run through `cmd.exe`, each with a timeout.
//!
//! # Module Structure
//!
//! - `privileges` - administrator check and UAC relaunch
//! - `artifacts` - launcher, shortcuts, uninstaller and registry batch
//! - `extras` - fonts and startup-folder autostart

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::info;

use super::platform::{ArchTag, HostEnv, IntegrationContext, OsType, Platform};
use super::process::run_with_timeout;
use crate::config::{AppIdentity, InstallConfig};
use crate::error::Result;

mod artifacts;
mod extras;
mod privileges;

const KILL_TIMEOUT: Duration = Duration::from_secs(5);
const BATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Directory of the PATH shim inside the application directory.
pub(crate) const PATH_SHIM_DIR: &str = "path";

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    /// Program files directory matching the installer's bitness.
    fn program_files(env: &HostEnv) -> Option<PathBuf> {
        let x86 = matches!(ArchTag::from_name(&env.arch), Ok(ArchTag::X86));
        if x86 {
            env.program_files.clone()
        } else {
            env.program_w6432.clone().or_else(|| env.program_files.clone())
        }
    }

    /// Start menu `Programs` folder for the user or for everybody.
    pub(crate) fn start_menu_programs(env: &HostEnv, user: bool) -> Option<PathBuf> {
        let base = if user {
            env.app_data.as_ref()
        } else {
            env.all_users_profile.as_ref()
        };
        base.map(|dir| dir.join(r"Microsoft\Windows\Start Menu\Programs"))
    }
}

/// Run a generated batch file through `cmd.exe`.
pub(crate) fn run_batch(script: &str, purpose: &str) -> bool {
    let file = tempfile::Builder::new()
        .prefix("app-installer-")
        .suffix(".bat")
        .tempfile()
        .and_then(|mut file| {
            use std::io::Write;
            file.write_all(script.as_bytes())?;
            file.flush()?;
            Ok(file.into_temp_path())
        });
    let path = match file {
        Ok(path) => path,
        Err(e) => {
            log::warn!("Failed to write the {purpose} batch file: {e}");
            return false;
        }
    };
    match run_with_timeout(Command::new("cmd").arg("/C").arg(&*path), BATCH_TIMEOUT) {
        Some(output) if output.status.success() => true,
        Some(output) => {
            log::warn!(
                "{purpose} batch failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        None => false,
    }
}

impl Platform for WindowsPlatform {
    fn os(&self) -> OsType {
        OsType::Windows
    }

    fn application_dir(&self, env: &HostEnv, identity: &AppIdentity) -> Option<PathBuf> {
        Self::program_files(env).map(|dir| dir.join(&identity.company).join(&identity.short_name))
    }

    fn user_application_dir(&self, env: &HostEnv, identity: &AppIdentity) -> Option<PathBuf> {
        env.local_app_data
            .as_ref()
            .map(|dir| dir.join(&identity.company).join(&identity.short_name))
    }

    fn config_dir(&self, env: &HostEnv, identity: &AppIdentity) -> Option<PathBuf> {
        env.app_data
            .as_ref()
            .map(|dir| dir.join(&identity.company).join(&identity.short_name))
    }

    fn desktop_dir(&self, env: &HostEnv) -> Option<PathBuf> {
        env.user_profile
            .as_ref()
            .or(env.home.as_ref())
            .map(|dir| dir.join("Desktop"))
    }

    fn required_program_dirs(&self, config: &InstallConfig) -> Vec<String> {
        if config.path_entry() {
            vec![format!("{PATH_SHIM_DIR}/")]
        } else {
            Vec::new()
        }
    }

    fn has_required_privilege(&self, identity: &AppIdentity) -> bool {
        privileges::is_elevated_administrator(identity)
    }

    fn relaunch_elevated(&self, _env: &HostEnv, args: &[String]) -> Result<()> {
        privileges::relaunch_elevated(args)
    }

    fn kill_running_instances(&self, artifact: &Path) {
        let filter = instance_filter(artifact, std::process::id());
        info!("Stopping running instances where {filter}");
        let _ = run_with_timeout(
            Command::new("wmic").args(["process", "where", &filter, "call", "terminate"]),
            KILL_TIMEOUT,
        );
    }

    fn integrate(&self, ctx: &IntegrationContext<'_>) -> Result<()> {
        artifacts::integrate(ctx)
    }

    fn install_fonts(&self, ctx: &IntegrationContext<'_>) {
        extras::install_fonts(ctx);
    }

    fn create_gui_autostart(&self, ctx: &IntegrationContext<'_>) {
        extras::create_gui_autostart(ctx);
    }
}

/// WQL condition selecting running copies of the installed `artifact`: a
/// Java process started on the jar, or the executable itself.
fn instance_filter(artifact: &Path, own_pid: u32) -> String {
    let jar = artifact
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
    let path = artifact.to_string_lossy().replace('\'', "");
    let matcher = if jar {
        format!("Name like '%java%' and CommandLine like '%{}%'", wql_like(&path))
    } else {
        format!("ExecutablePath = '{}'", path.replace('\\', "\\\\"))
    };
    format!("{matcher} and ProcessId <> {own_pid}")
}

/// Escape a literal for a WQL `like` pattern.
fn wql_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '%' | '_' | '[' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}
