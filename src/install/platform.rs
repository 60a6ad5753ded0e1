//! Platform probing and the per-OS capability interface.
//!
//! [`OsType`] and [`ArchTag`] are pure detections. [`Platform`] bundles the
//! rules that differ between operating systems: directory layout, privilege
//! checks, elevation, process termination and the integration artifacts.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::collaborators::ResourceExtractor;
use crate::config::{AppIdentity, InstallConfig};
use crate::error::{InstallerError, Result};

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    Windows,
    Linux,
    MacOs,
    Undetermined,
}

impl OsType {
    pub fn detect() -> Self {
        Self::from_name(std::env::consts::OS)
    }

    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.starts_with("windows") {
            Self::Windows
        } else if name.contains("linux") {
            Self::Linux
        } else if name.contains("mac") || name.contains("darwin") {
            Self::MacOs
        } else {
            Self::Undetermined
        }
    }

    /// Component used in versioned download URLs.
    pub fn url_tag(self) -> Option<&'static str> {
        match self {
            Self::Windows => Some("windows"),
            Self::Linux => Some("linux"),
            Self::MacOs => Some("mac"),
            Self::Undetermined => None,
        }
    }
}

/// CPU architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchTag {
    X64,
    X86,
    Arm64,
    Arm32,
}

impl ArchTag {
    /// Classify an architecture name. Anything ending in "64" that is not
    /// otherwise known counts as x64. Unknown names are fatal.
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let tag = if lower.contains("amd64") || lower == "x86_64" || lower == "x64" {
            Self::X64
        } else if lower.contains("aarch64") || lower.contains("arm64") {
            Self::Arm64
        } else if lower.starts_with("arm") {
            Self::Arm32
        } else if lower == "x86" || (lower.starts_with('i') && lower.ends_with("86")) {
            Self::X86
        } else if lower.ends_with("64") {
            Self::X64
        } else {
            return Err(InstallerError::UnsupportedArchitecture(name.to_string()));
        };
        Ok(tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::X86 => "x86",
            Self::Arm64 => "arm64",
            Self::Arm32 => "arm32",
        }
    }
}

/// `<os>_<arch>` as used in versioned download URLs.
pub fn download_tag(os: OsType, arch: ArchTag) -> Result<String> {
    let os_tag = os
        .url_tag()
        .ok_or_else(|| InstallerError::UnsupportedPlatform("undetermined operating system".into()))?;
    Ok(format!("{os_tag}_{}", arch.as_str()))
}

/// Environment-derived facts, captured once.
#[derive(Debug, Clone, Default)]
pub struct HostEnv {
    pub arch: String,
    pub home: Option<PathBuf>,
    pub user_name: Option<String>,
    pub user_profile: Option<PathBuf>,
    pub app_data: Option<PathBuf>,
    pub local_app_data: Option<PathBuf>,
    pub program_files: Option<PathBuf>,
    pub program_w6432: Option<PathBuf>,
    pub public: Option<PathBuf>,
    pub all_users_profile: Option<PathBuf>,
    pub windir: Option<PathBuf>,
    pub display: Option<String>,
    pub xauthority: Option<String>,
}

impl HostEnv {
    pub fn capture() -> Self {
        let var_path = |key: &str| std::env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        let var_string = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        Self {
            arch: std::env::consts::ARCH.to_string(),
            home: dirs::home_dir(),
            user_name: current_user_name(),
            user_profile: var_path("USERPROFILE"),
            app_data: var_path("APPDATA"),
            local_app_data: var_path("LOCALAPPDATA"),
            program_files: var_path("ProgramFiles"),
            program_w6432: var_path("ProgramW6432"),
            public: var_path("PUBLIC"),
            all_users_profile: var_path("ALLUSERSPROFILE"),
            windir: var_path("WINDIR"),
            display: var_string("DISPLAY"),
            xauthority: var_string("XAUTHORITY"),
        }
    }
}

fn current_user_name() -> Option<String> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            users::get_current_username()
                .map(OsString::into_string)
                .and_then(|name| name.ok())
        } else {
            std::env::var_os("USERNAME")
                .or_else(|| std::env::var_os("USER"))
                .map(OsString::into_string)
                .and_then(|name| name.ok())
        }
    }
}

/// Paths of one installation, fixed before the integration stage.
#[derive(Debug, Clone)]
pub struct InstallLayout {
    pub app_dir: PathBuf,
    pub config_dir: PathBuf,
    pub desktop_dir: Option<PathBuf>,
    pub artifact: PathBuf,
    pub portable_root: Option<PathBuf>,
}

/// Everything an integration step needs.
pub struct IntegrationContext<'a> {
    pub config: &'a InstallConfig,
    pub env: &'a HostEnv,
    pub layout: &'a InstallLayout,
    pub resources: &'a dyn ResourceExtractor,
    /// Whether the process holds administrator / root rights.
    pub privileged: bool,
}

/// Operating-system capabilities used by the installer.
pub trait Platform: Send + Sync {
    fn os(&self) -> OsType;

    /// Default application directory for system installs.
    fn application_dir(&self, env: &HostEnv, identity: &AppIdentity) -> Option<PathBuf>;

    /// Application directory for per-user installs.
    fn user_application_dir(&self, _env: &HostEnv, _identity: &AppIdentity) -> Option<PathBuf> {
        None
    }

    fn config_dir(&self, env: &HostEnv, identity: &AppIdentity) -> Option<PathBuf>;

    fn desktop_dir(&self, env: &HostEnv) -> Option<PathBuf>;

    /// Extra program subdirectories this platform needs for `config`.
    fn required_program_dirs(&self, _config: &InstallConfig) -> Vec<String> {
        Vec::new()
    }

    fn has_required_privilege(&self, identity: &AppIdentity) -> bool;

    /// Start an elevated copy of the installer. Returns once the relaunch has
    /// been issued.
    fn relaunch_elevated(&self, env: &HostEnv, args: &[String]) -> Result<()>;

    /// Best-effort termination of running copies of the installed `artifact`.
    /// The installer's own process and its parent are never targeted.
    fn kill_running_instances(&self, artifact: &Path);

    /// Write launcher, shortcuts, uninstaller, unit and registry records.
    /// Only failures of mandatory artifacts are returned.
    fn integrate(&self, ctx: &IntegrationContext<'_>) -> Result<()>;

    fn install_fonts(&self, _ctx: &IntegrationContext<'_>) {}

    fn create_gui_autostart(&self, _ctx: &IntegrationContext<'_>) {}
}

/// Host whose integration is not implemented. Every capability is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedHost {
    os: OsType,
}

impl UnsupportedHost {
    pub fn new(os: OsType) -> Self {
        Self { os }
    }
}

impl Platform for UnsupportedHost {
    fn os(&self) -> OsType {
        self.os
    }

    fn application_dir(&self, _env: &HostEnv, _identity: &AppIdentity) -> Option<PathBuf> {
        None
    }

    fn config_dir(&self, _env: &HostEnv, _identity: &AppIdentity) -> Option<PathBuf> {
        None
    }

    fn desktop_dir(&self, _env: &HostEnv) -> Option<PathBuf> {
        None
    }

    fn has_required_privilege(&self, _identity: &AppIdentity) -> bool {
        true
    }

    fn relaunch_elevated(&self, _env: &HostEnv, _args: &[String]) -> Result<()> {
        Err(InstallerError::ElevationFailed(format!(
            "elevation is not available on {:?}",
            self.os
        )))
    }

    fn kill_running_instances(&self, _artifact: &Path) {
        debug!("Process termination is not implemented on {:?}", self.os);
    }

    fn integrate(&self, _ctx: &IntegrationContext<'_>) -> Result<()> {
        debug!("No platform integration on {:?}", self.os);
        Ok(())
    }
}

/// Platform implementation for the running host.
pub fn native_platform() -> Box<dyn Platform> {
    match OsType::detect() {
        OsType::Linux => Box::new(super::linux::LinuxPlatform::default()),
        OsType::Windows => Box::new(super::windows::WindowsPlatform::default()),
        other => {
            warn!("Operating system {other:?} is not fully supported");
            Box::new(UnsupportedHost::new(other))
        }
    }
}

/// `path` as an absolute path, without touching the file system.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_architectures() {
        let cases = [
            ("x86_64", ArchTag::X64),
            ("amd64", ArchTag::X64),
            ("x86", ArchTag::X86),
            ("i686", ArchTag::X86),
            ("aarch64", ArchTag::Arm64),
            ("arm64", ArchTag::Arm64),
            ("arm", ArchTag::Arm32),
            ("armv7l", ArchTag::Arm32),
            ("powerpc64", ArchTag::X64),
            ("riscv64", ArchTag::X64),
        ];
        for (name, expected) in cases {
            assert_eq!(ArchTag::from_name(name).unwrap(), expected, "{name}");
        }
    }

    #[test]
    fn unknown_architecture_is_fatal() {
        let err = ArchTag::from_name("mips").unwrap_err();
        assert_eq!(err.code(), -8);
    }

    #[test]
    fn os_names() {
        assert_eq!(OsType::from_name("linux"), OsType::Linux);
        assert_eq!(OsType::from_name("Windows 10"), OsType::Windows);
        assert_eq!(OsType::from_name("windows"), OsType::Windows);
        assert_eq!(OsType::from_name("macos"), OsType::MacOs);
        assert_eq!(OsType::from_name("freebsd"), OsType::Undetermined);
    }

    #[test]
    fn download_tags() {
        assert_eq!(download_tag(OsType::Linux, ArchTag::Arm64).unwrap(), "linux_arm64");
        assert_eq!(download_tag(OsType::Windows, ArchTag::X86).unwrap(), "windows_x86");
        assert_eq!(download_tag(OsType::MacOs, ArchTag::X64).unwrap(), "mac_x64");
        assert!(download_tag(OsType::Undetermined, ArchTag::X64).is_err());
    }

    #[test]
    fn unsupported_host_is_a_no_op() {
        let host = UnsupportedHost::new(OsType::MacOs);
        let identity = AppIdentity {
            company: "Acme".into(),
            version: "1".into(),
            short_name: "Tool".into(),
            long_name: "Acme Tool".into(),
        };
        assert!(host.application_dir(&HostEnv::default(), &identity).is_none());
        assert!(host.has_required_privilege(&identity));
        assert_eq!(host.relaunch_elevated(&HostEnv::default(), &[]).unwrap_err().code(), -6);
    }
}
