//! Linux platform implementation.
//!
//! # Module Structure
//!
//! - `privileges` - root check and elevated relaunch through a terminal
//! - `artifacts` - launcher, desktop entry, uninstaller and unit placement
//! - `service_control` - systemd reload / start / enable
//! - `extras` - fonts and graphical autostart

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::{debug, info};

use super::platform::{HostEnv, IntegrationContext, OsType, Platform};
use super::process::{first_line, run_with_timeout};
use crate::config::AppIdentity;
use crate::error::Result;

mod artifacts;
mod extras;
mod privileges;
mod service_control;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shell snippet printing the XDG desktop directory.
const DESKTOP_PROBE: &str = "test -f \"${XDG_CONFIG_HOME:-$HOME/.config}/user-dirs.dirs\" && \
     . \"${XDG_CONFIG_HOME:-$HOME/.config}/user-dirs.dirs\"; \
     echo \"${XDG_DESKTOP_DIR:-$HOME/Desktop}\"";

/// System locations written by a system-wide install.
#[derive(Debug, Clone)]
pub struct LinuxLayout {
    pub bin_dir: PathBuf,
    pub applications_dir: PathBuf,
    pub share_dir: PathBuf,
    pub unit_dir: PathBuf,
    /// Present only when systemd manages the host.
    pub systemd_runtime_dir: PathBuf,
    pub system_fonts_dir: PathBuf,
    pub passwd: PathBuf,
}

impl Default for LinuxLayout {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("/usr/bin"),
            applications_dir: PathBuf::from("/usr/share/applications"),
            share_dir: PathBuf::from("/usr/share"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            systemd_runtime_dir: PathBuf::from("/run/systemd/system"),
            system_fonts_dir: PathBuf::from("/usr/share/fonts/truetype"),
            passwd: PathBuf::from("/etc/passwd"),
        }
    }
}

impl LinuxLayout {
    /// Every system location below `root`, for scratch installs.
    pub fn rooted_at(root: &Path) -> Self {
        let defaults = Self::default();
        let reroot = |path: &Path| root.join(path.strip_prefix("/").unwrap_or(path));
        Self {
            bin_dir: reroot(&defaults.bin_dir),
            applications_dir: reroot(&defaults.applications_dir),
            share_dir: reroot(&defaults.share_dir),
            unit_dir: reroot(&defaults.unit_dir),
            systemd_runtime_dir: reroot(&defaults.systemd_runtime_dir),
            system_fonts_dir: reroot(&defaults.system_fonts_dir),
            passwd: reroot(&defaults.passwd),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinuxPlatform {
    pub layout: LinuxLayout,
}

impl LinuxPlatform {
    pub fn with_layout(layout: LinuxLayout) -> Self {
        Self { layout }
    }

    pub(crate) fn launcher_path(&self, short_name: &str) -> PathBuf {
        self.layout.bin_dir.join(short_name)
    }

    pub(crate) fn desktop_file(&self, short_name: &str) -> PathBuf {
        self.layout.applications_dir.join(format!("{short_name}.desktop"))
    }

    pub(crate) fn systemd_available(&self) -> bool {
        self.layout.systemd_runtime_dir.is_dir()
    }
}

/// Pick the desktop directory from the XDG probe output.
///
/// The probed path is accepted only when it mentions the user name, anything
/// else falls back to `$HOME/Desktop`.
pub fn choose_desktop_dir(
    probe_output: Option<&str>,
    user_name: Option<&str>,
    home: Option<&Path>,
) -> Option<PathBuf> {
    let fallback = home.map(|home| home.join("Desktop"));
    let (Some(output), Some(user)) = (probe_output, user_name) else {
        return fallback;
    };
    let candidate = output.trim();
    if !candidate.is_empty() && candidate.to_lowercase().contains(&user.to_lowercase()) {
        Some(PathBuf::from(candidate))
    } else {
        debug!("Ignoring desktop directory '{candidate}' of user {user}");
        fallback
    }
}

impl Platform for LinuxPlatform {
    fn os(&self) -> OsType {
        OsType::Linux
    }

    fn application_dir(&self, _env: &HostEnv, identity: &AppIdentity) -> Option<PathBuf> {
        Some(
            self.layout
                .share_dir
                .join(&identity.company)
                .join(&identity.short_name),
        )
    }

    fn config_dir(&self, env: &HostEnv, identity: &AppIdentity) -> Option<PathBuf> {
        env.home.as_ref().map(|home| {
            home.join(".config")
                .join(&identity.company)
                .join(&identity.short_name)
        })
    }

    fn desktop_dir(&self, env: &HostEnv) -> Option<PathBuf> {
        let probe = first_line(Command::new("bash").args(["-c", DESKTOP_PROBE]), PROBE_TIMEOUT);
        choose_desktop_dir(probe.as_deref(), env.user_name.as_deref(), env.home.as_deref())
    }

    fn has_required_privilege(&self, _identity: &AppIdentity) -> bool {
        privileges::is_root()
    }

    fn relaunch_elevated(&self, env: &HostEnv, args: &[String]) -> Result<()> {
        privileges::relaunch_elevated(env, args)
    }

    fn kill_running_instances(&self, artifact: &Path) {
        let pattern = instance_pattern(artifact);
        info!("Stopping running instances matching '{pattern}'");
        let Some(output) = run_with_timeout(Command::new("pgrep").args(["-f", &pattern]), PROBE_TIMEOUT) else {
            return;
        };
        let own = own_process_ids();
        for pid in matching_pids(&String::from_utf8_lossy(&output.stdout), &own) {
            debug!("Killing process {pid}");
            kill_process(pid);
        }
    }

    fn integrate(&self, ctx: &IntegrationContext<'_>) -> Result<()> {
        artifacts::integrate(self, ctx)
    }

    fn install_fonts(&self, ctx: &IntegrationContext<'_>) {
        extras::install_fonts(self, ctx);
    }

    fn create_gui_autostart(&self, ctx: &IntegrationContext<'_>) {
        extras::create_gui_autostart(self, ctx);
    }
}

/// Extended regex matching the installed artifact as a running process: a
/// JVM started with `-jar <artifact>`, or the artifact executed directly.
fn instance_pattern(artifact: &Path) -> String {
    let path = ere_escape(&artifact.to_string_lossy());
    let jar = artifact
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
    if jar {
        format!("java .*-jar {path}( |$)")
    } else {
        format!("^{path}( |$)")
    }
}

fn ere_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// The installer and the process that started it.
fn own_process_ids() -> Vec<u32> {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            vec![std::process::id(), std::os::unix::process::parent_id()]
        } else {
            vec![std::process::id()]
        }
    }
}

fn kill_process(pid: i32) {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            use nix::sys::signal::{Signal, kill};
            if let Err(e) = kill(nix::unistd::Pid::from_raw(pid), Signal::SIGKILL) {
                debug!("Could not kill process {pid}: {e}");
            }
        } else {
            let _ = pid;
        }
    }
}

/// `pgrep` output minus the processes in `own`.
fn matching_pids(pgrep_output: &str, own: &[u32]) -> Vec<i32> {
    pgrep_output
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| !own.contains(pid))
        .filter_map(|pid| i32::try_from(pid).ok())
        .collect()
}
