//! Installation configuration.
//!
//! [`InstallConfig`] is immutable once built. Callers construct it with
//! [`InstallConfig::builder`] or load an [`InstallManifest`] from TOML and
//! convert it into a builder so command line flags can still override it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

/// Smallest heap size (MiB) accepted for the JVM options.
const MIN_HEAP_MB: u32 = 2;

/// Who publishes the application and under which names it is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub company: String,
    pub version: String,
    /// Short name, used for file names, the launcher and registry keys.
    pub short_name: String,
    /// Human readable name shown in menus and the uninstall list.
    pub long_name: String,
}

/// Derived install mode. Portable wins over user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    SystemWide,
    User,
    Portable,
}

/// Basic-auth credential pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the artifact comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    Download(DownloadSpec),
    Offline(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSpec {
    pub url: String,
    /// When set the URL is suffixed with `_<os>_<arch><ending>`.
    pub versioned_ending: Option<String>,
    pub credentials: Option<Credentials>,
    /// Ask for credentials on a `401` when none are configured.
    pub prompt_for_credentials: bool,
}

/// Desktop shortcut declaration. Icon paths point into the packaged archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopEntrySpec {
    pub windows_icon: String,
    pub linux_icon: String,
    pub categories: Option<String>,
    pub keywords: Option<String>,
}

/// Parameters of the generated systemd unit. Every field is optional
/// except the boot-enablement decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceUnitSpec {
    pub start_at_boot: bool,
    pub description: Option<String>,
    pub after: Option<String>,
    pub start_limit_burst: Option<u32>,
    pub start_limit_interval_sec: Option<u32>,
    pub wanted_by: Option<String>,
    pub alias: Option<String>,
    pub exec_start_pre: Vec<String>,
    pub exec_start_post: Vec<String>,
    pub working_directory: Option<String>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub environment: Vec<String>,
    pub exec_start: Vec<String>,
    pub exec_stop: Option<String>,
    pub timeout_sec: Option<u32>,
    #[serde(rename = "type")]
    pub service_type: Option<String>,
    pub restart: Option<String>,
    pub restart_sec: Option<u32>,
}

/// Autostart entry for a graphical session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiAutostartSpec {
    /// Linux only: whose session starts the program. Defaults to the
    /// invoking user.
    pub user: Option<String>,
    /// Extra launcher flags, e.g. `---background`.
    pub flags: String,
}

#[derive(Debug, Clone)]
pub struct InstallConfig {
    identity: AppIdentity,
    portable_root: Option<PathBuf>,
    user_install: bool,
    quiet: bool,
    debug: bool,
    source: Option<ArtifactSource>,
    artifact_file_name: String,
    desktop_entry: Option<DesktopEntrySpec>,
    path_entry: bool,
    uninstall_icon: Option<String>,
    run_in_background: bool,
    max_heap_mb: Option<u32>,
    initial_heap_mb: Option<u32>,
    kill_running_instances: bool,
    service_unit: Option<ServiceUnitSpec>,
    gui_autostart: Option<GuiAutostartSpec>,
    fonts: BTreeMap<String, String>,
    estimated_size_kb: u32,
    program_dirs: Vec<String>,
    config_dirs: Vec<String>,
}

impl InstallConfig {
    pub fn builder(
        company: impl Into<String>,
        version: impl Into<String>,
        short_name: impl Into<String>,
        long_name: impl Into<String>,
    ) -> InstallConfigBuilder {
        InstallConfigBuilder::new(AppIdentity {
            company: company.into(),
            version: version.into(),
            short_name: short_name.into(),
            long_name: long_name.into(),
        })
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub fn mode(&self) -> InstallMode {
        if self.portable_root.is_some() {
            InstallMode::Portable
        } else if self.user_install {
            InstallMode::User
        } else {
            InstallMode::SystemWide
        }
    }

    pub fn portable_root(&self) -> Option<&Path> {
        self.portable_root.as_deref()
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn source(&self) -> Option<&ArtifactSource> {
        self.source.as_ref()
    }

    /// File name of the artifact inside the application directory.
    pub fn artifact_file_name(&self) -> &str {
        &self.artifact_file_name
    }

    pub fn is_jar(&self) -> bool {
        self.artifact_file_name.to_ascii_lowercase().ends_with(".jar")
    }

    pub fn desktop_entry(&self) -> Option<&DesktopEntrySpec> {
        self.desktop_entry.as_ref()
    }

    pub fn path_entry(&self) -> bool {
        self.path_entry
    }

    pub fn uninstall_icon(&self) -> Option<&str> {
        self.uninstall_icon.as_deref()
    }

    pub fn run_in_background(&self) -> bool {
        self.run_in_background
    }

    pub fn max_heap_mb(&self) -> Option<u32> {
        self.max_heap_mb
    }

    pub fn initial_heap_mb(&self) -> Option<u32> {
        self.initial_heap_mb
    }

    pub fn kill_running_instances(&self) -> bool {
        self.kill_running_instances
    }

    pub fn service_unit(&self) -> Option<&ServiceUnitSpec> {
        self.service_unit.as_ref()
    }

    pub fn gui_autostart(&self) -> Option<&GuiAutostartSpec> {
        self.gui_autostart.as_ref()
    }

    /// Font file name (without extension) to path inside the archive.
    pub fn fonts(&self) -> &BTreeMap<String, String> {
        &self.fonts
    }

    pub fn estimated_size_kb(&self) -> u32 {
        self.estimated_size_kb
    }

    /// Subdirectories of the application directory created during staging.
    pub fn program_dirs(&self) -> &[String] {
        &self.program_dirs
    }

    /// Subdirectories of the configuration directory created during staging.
    pub fn config_dirs(&self) -> &[String] {
        &self.config_dirs
    }

    /// Pattern the generated launcher's stop option matches against.
    pub fn process_pattern(&self) -> &str {
        &self.artifact_file_name
    }
}

/// Builder for [`InstallConfig`].
#[derive(Debug, Clone)]
pub struct InstallConfigBuilder {
    config: InstallConfig,
}

impl InstallConfigBuilder {
    fn new(identity: AppIdentity) -> Self {
        let artifact_file_name = format!("{}.jar", identity.short_name);
        Self {
            config: InstallConfig {
                identity,
                portable_root: None,
                user_install: false,
                quiet: false,
                debug: false,
                source: None,
                artifact_file_name,
                desktop_entry: None,
                path_entry: false,
                uninstall_icon: None,
                run_in_background: false,
                max_heap_mb: None,
                initial_heap_mb: None,
                kill_running_instances: true,
                service_unit: None,
                gui_autostart: None,
                fonts: BTreeMap::new(),
                estimated_size_kb: 0,
                program_dirs: Vec::new(),
                config_dirs: Vec::new(),
            },
        }
    }

    pub fn portable(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.portable_root = Some(root.into());
        self
    }

    /// Per-user installation. Only honoured on Windows.
    pub fn user_installation(mut self, user: bool) -> Self {
        self.config.user_install = user;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn download(mut self, spec: DownloadSpec) -> Self {
        self.config.source = Some(ArtifactSource::Download(spec));
        self
    }

    pub fn offline(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source = Some(ArtifactSource::Offline(path.into()));
        self
    }

    pub fn artifact_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.artifact_file_name = name.into();
        self
    }

    pub fn desktop_entry(mut self, spec: DesktopEntrySpec) -> Self {
        self.config.desktop_entry = Some(spec);
        self
    }

    pub fn path_entry(mut self, enabled: bool) -> Self {
        self.config.path_entry = enabled;
        self
    }

    pub fn uninstall_icon(mut self, path_in_archive: impl Into<String>) -> Self {
        self.config.uninstall_icon = Some(path_in_archive.into());
        self
    }

    pub fn run_in_background(mut self, background: bool) -> Self {
        self.config.run_in_background = background;
        self
    }

    pub fn max_heap_mb(mut self, mb: u32) -> Self {
        self.config.max_heap_mb = checked_heap("maximum", mb);
        self
    }

    pub fn initial_heap_mb(mut self, mb: u32) -> Self {
        self.config.initial_heap_mb = checked_heap("initial", mb);
        self
    }

    pub fn kill_running_instances(mut self, kill: bool) -> Self {
        self.config.kill_running_instances = kill;
        self
    }

    pub fn service_unit(mut self, spec: ServiceUnitSpec) -> Self {
        self.config.service_unit = Some(spec);
        self
    }

    pub fn gui_autostart(mut self, spec: GuiAutostartSpec) -> Self {
        self.config.gui_autostart = Some(spec);
        self
    }

    pub fn font(mut self, name: impl Into<String>, path_in_archive: impl Into<String>) -> Self {
        self.config.fonts.insert(name.into(), path_in_archive.into());
        self
    }

    /// Size shown in the Windows uninstall list, in MiB.
    pub fn estimated_size_mb(mut self, mb: f64) -> Self {
        self.config.estimated_size_kb = (mb.max(0.0) * 1024.0).round() as u32;
        self
    }

    pub fn program_dir(mut self, relative: impl Into<String>) -> Self {
        push_unique(&mut self.config.program_dirs, relative.into());
        self
    }

    pub fn config_dir(mut self, relative: impl Into<String>) -> Self {
        push_unique(&mut self.config.config_dirs, relative.into());
        self
    }

    pub fn build(self) -> InstallConfig {
        self.config
    }
}

fn checked_heap(kind: &str, mb: u32) -> Option<u32> {
    if mb < MIN_HEAP_MB {
        warn!("Ignoring {kind} heap size of {mb} MiB, it has to be at least {MIN_HEAP_MB} MiB");
        None
    } else {
        Some(mb)
    }
}

fn push_unique(dirs: &mut Vec<String>, dir: String) {
    if !dirs.contains(&dir) {
        dirs.push(dir);
    }
}

/// On-disk manifest describing what to install.
///
/// ```toml
/// company = "Example Corp"
/// version = "1.4.2"
/// short_name = "Notes"
/// long_name = "Example Notes"
/// run_in_background = true
///
/// [download]
/// url = "https://downloads.example.com/notes"
/// versioned_ending = ".jar"
///
/// [service]
/// start_at_boot = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallManifest {
    pub company: String,
    pub version: String,
    pub short_name: String,
    pub long_name: String,
    pub artifact: Option<String>,
    pub offline: Option<PathBuf>,
    pub download: Option<DownloadManifest>,
    pub desktop_entry: Option<DesktopEntrySpec>,
    #[serde(default)]
    pub path_entry: bool,
    pub uninstall_icon: Option<String>,
    #[serde(default)]
    pub run_in_background: bool,
    pub max_heap_mb: Option<u32>,
    pub initial_heap_mb: Option<u32>,
    #[serde(default = "default_true")]
    pub kill_running_instances: bool,
    pub service: Option<ServiceUnitSpec>,
    pub gui_autostart: Option<GuiAutostartSpec>,
    #[serde(default)]
    pub fonts: BTreeMap<String, String>,
    #[serde(default)]
    pub estimated_size_mb: f64,
    #[serde(default)]
    pub program_dirs: Vec<String>,
    #[serde(default)]
    pub config_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadManifest {
    pub url: String,
    pub versioned_ending: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub ask_for_credentials: bool,
}

fn default_true() -> bool {
    true
}

impl InstallManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read installation manifest {}", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("Invalid installation manifest {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn into_builder(self) -> InstallConfigBuilder {
        let mut builder =
            InstallConfig::builder(self.company, self.version, self.short_name, self.long_name)
                .path_entry(self.path_entry)
                .run_in_background(self.run_in_background)
                .kill_running_instances(self.kill_running_instances)
                .estimated_size_mb(self.estimated_size_mb);

        if let Some(artifact) = self.artifact {
            builder = builder.artifact_file_name(artifact);
        }
        if let Some(download) = self.download {
            let credentials = match (download.username, download.password) {
                (Some(username), Some(password)) => Some(Credentials { username, password }),
                (Some(_), None) | (None, Some(_)) => {
                    warn!("Download credentials need both a username and a password, ignoring them");
                    None
                }
                (None, None) => None,
            };
            builder = builder.download(DownloadSpec {
                url: download.url,
                versioned_ending: download.versioned_ending,
                credentials,
                prompt_for_credentials: download.ask_for_credentials,
            });
        }
        // an explicit offline file wins over the download
        if let Some(offline) = self.offline {
            builder = builder.offline(offline);
        }
        if let Some(entry) = self.desktop_entry {
            builder = builder.desktop_entry(entry);
        }
        if let Some(icon) = self.uninstall_icon {
            builder = builder.uninstall_icon(icon);
        }
        if let Some(mb) = self.max_heap_mb {
            builder = builder.max_heap_mb(mb);
        }
        if let Some(mb) = self.initial_heap_mb {
            builder = builder.initial_heap_mb(mb);
        }
        if let Some(unit) = self.service {
            builder = builder.service_unit(unit);
        }
        if let Some(autostart) = self.gui_autostart {
            builder = builder.gui_autostart(autostart);
        }
        for (name, path) in self.fonts {
            builder = builder.font(name, path);
        }
        for dir in self.program_dirs {
            builder = builder.program_dir(dir);
        }
        for dir in self.config_dirs {
            builder = builder.config_dir(dir);
        }
        builder
    }
}
