//! Resolution and creation of the installation directories.
//!
//! Until [`PathResolver::start_installation`] is called every getter is pure:
//! paths are computed and cached but nothing is created. Afterwards the first
//! resolution of the application or configuration directory creates it along
//! with every registered subdirectory, exactly once.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::platform::{HostEnv, Platform, absolute};
use crate::config::{InstallConfig, InstallMode};
use crate::error::{InstallerError, Result};

/// Subdirectory of a portable root holding the configuration.
pub const PORTABLE_CONFIG_DIR: &str = "Appdata";
/// Subdirectory of a portable root holding the program.
pub const PORTABLE_PROGRAM_DIR: &str = "Programm";

/// Lazily computed directories, cached for the process lifetime.
#[derive(Debug, Default, Clone)]
pub struct ResolvedPaths {
    pub desktop: Option<Option<PathBuf>>,
    pub config: Option<PathBuf>,
    pub application: Option<PathBuf>,
    config_created: bool,
    application_created: bool,
}

/// A root directory plus the subdirectories that belong to it.
#[derive(Debug, Default, Clone)]
struct DirTree {
    subdirs: Vec<String>,
}

impl DirTree {
    fn register(&mut self, relative: &str) -> bool {
        if self.subdirs.iter().any(|d| d == relative) {
            return false;
        }
        self.subdirs.push(relative.to_string());
        true
    }
}

pub struct PathResolver<'a> {
    config: &'a InstallConfig,
    env: &'a HostEnv,
    platform: &'a dyn Platform,
    started: bool,
    program: DirTree,
    configuration: DirTree,
    cache: ResolvedPaths,
}

impl<'a> PathResolver<'a> {
    pub fn new(config: &'a InstallConfig, env: &'a HostEnv, platform: &'a dyn Platform) -> Self {
        let mut resolver = Self {
            config,
            env,
            platform,
            started: false,
            program: DirTree::default(),
            configuration: DirTree::default(),
            cache: ResolvedPaths::default(),
        };
        for dir in config.program_dirs() {
            resolver.program.register(dir);
        }
        for dir in platform.required_program_dirs(config) {
            resolver.program.register(&dir);
        }
        for dir in config.config_dirs() {
            resolver.configuration.register(dir);
        }
        resolver
    }

    /// Permit directory creation from now on.
    pub fn start_installation(&mut self) {
        self.started = true;
    }

    pub fn installation_started(&self) -> bool {
        self.started
    }

    pub fn resolved(&self) -> &ResolvedPaths {
        &self.cache
    }

    /// Register a subdirectory of the application directory. Created right
    /// away when the application directory already exists.
    pub fn register_program_dir(&mut self, relative: &str) -> Result<()> {
        if self.program.register(relative) && self.cache.application_created {
            if let Some(root) = &self.cache.application {
                create_subdir(root, relative)?;
            }
        }
        Ok(())
    }

    /// Register a subdirectory of the configuration directory.
    pub fn register_config_dir(&mut self, relative: &str) -> Result<()> {
        if self.configuration.register(relative) && self.cache.config_created {
            if let Some(root) = &self.cache.config {
                create_subdir(root, relative)?;
            }
        }
        Ok(())
    }

    pub fn desktop_dir(&mut self) -> Option<PathBuf> {
        if self.cache.desktop.is_none() {
            let dir = self.platform.desktop_dir(self.env);
            debug!("Desktop directory: {dir:?}");
            self.cache.desktop = Some(dir);
        }
        self.cache.desktop.clone().flatten()
    }

    /// Application directory, `None` when the platform has no location for
    /// the current mode.
    pub fn application_dir(&mut self) -> Result<Option<PathBuf>> {
        if self.cache.application.is_none() {
            self.cache.application = self.compute_application_dir();
        }
        let Some(dir) = self.cache.application.clone() else {
            return Ok(None);
        };
        if self.started && !self.cache.application_created {
            materialize(&dir, &self.program.subdirs)?;
            self.cache.application_created = true;
        }
        Ok(Some(dir))
    }

    pub fn config_dir(&mut self) -> Result<Option<PathBuf>> {
        if self.cache.config.is_none() {
            self.cache.config = self.compute_config_dir();
        }
        let Some(dir) = self.cache.config.clone() else {
            return Ok(None);
        };
        if self.started && !self.cache.config_created {
            materialize(&dir, &self.configuration.subdirs)?;
            self.cache.config_created = true;
        }
        Ok(Some(dir))
    }

    fn portable_root(&self) -> Option<PathBuf> {
        self.config.portable_root().map(absolute)
    }

    fn compute_application_dir(&self) -> Option<PathBuf> {
        let identity = self.config.identity();
        match self.config.mode() {
            InstallMode::Portable => self.portable_root().map(|root| root.join(PORTABLE_PROGRAM_DIR)),
            InstallMode::User => self
                .platform
                .user_application_dir(self.env, identity)
                .or_else(|| self.platform.application_dir(self.env, identity)),
            InstallMode::SystemWide => self.platform.application_dir(self.env, identity),
        }
    }

    fn compute_config_dir(&self) -> Option<PathBuf> {
        match self.config.mode() {
            InstallMode::Portable => self.portable_root().map(|root| root.join(PORTABLE_CONFIG_DIR)),
            InstallMode::User | InstallMode::SystemWide => {
                self.platform.config_dir(self.env, self.config.identity())
            }
        }
    }
}

/// Create `root` and every subdirectory of it that does not exist yet.
pub fn materialize(root: &Path, subdirs: &[String]) -> Result<()> {
    fs::create_dir_all(root).map_err(|e| InstallerError::directory(root, e))?;
    for relative in subdirs {
        create_subdir(root, relative)?;
    }
    Ok(())
}

fn create_subdir(root: &Path, relative: &str) -> Result<()> {
    let target = root.join(relative);
    if target.is_dir() {
        return Ok(());
    }
    if target.exists() {
        warn!("{} exists but is not a directory, skipping it", target.display());
        return Ok(());
    }
    match fs::create_dir_all(&target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(InstallerError::directory(target, e))
        }
        Err(e) => {
            warn!("Failed to create {}: {e}", target.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppIdentity;
    use crate::install::platform::{IntegrationContext, OsType};

    /// Platform rooted in a scratch directory.
    struct ScratchPlatform {
        root: PathBuf,
    }

    impl Platform for ScratchPlatform {
        fn os(&self) -> OsType {
            OsType::Linux
        }
        fn application_dir(&self, _env: &HostEnv, identity: &AppIdentity) -> Option<PathBuf> {
            Some(self.root.join("share").join(&identity.company).join(&identity.short_name))
        }
        fn config_dir(&self, _env: &HostEnv, identity: &AppIdentity) -> Option<PathBuf> {
            Some(self.root.join("config").join(&identity.short_name))
        }
        fn desktop_dir(&self, _env: &HostEnv) -> Option<PathBuf> {
            Some(self.root.join("Desktop"))
        }
        fn has_required_privilege(&self, _identity: &AppIdentity) -> bool {
            true
        }
        fn relaunch_elevated(&self, _env: &HostEnv, _args: &[String]) -> Result<()> {
            Ok(())
        }
        fn kill_running_instances(&self, _artifact: &Path) {}
        fn integrate(&self, _ctx: &IntegrationContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn config() -> InstallConfig {
        InstallConfig::builder("Acme", "1.0", "Tool", "Acme Tool")
            .program_dir("pics/")
            .program_dir("lib/native/")
            .config_dir("logs/")
            .build()
    }

    #[test]
    fn getters_are_pure_before_start() {
        let scratch = tempfile::tempdir().unwrap();
        let platform = ScratchPlatform {
            root: scratch.path().to_path_buf(),
        };
        let config = config();
        let env = HostEnv::default();
        let mut resolver = PathResolver::new(&config, &env, &platform);

        let app = resolver.application_dir().unwrap().unwrap();
        let conf = resolver.config_dir().unwrap().unwrap();
        assert!(!app.exists());
        assert!(!conf.exists());
        assert!(!resolver.installation_started());
    }

    #[test]
    fn application_dir_is_cached_and_created_once() {
        let scratch = tempfile::tempdir().unwrap();
        let platform = ScratchPlatform {
            root: scratch.path().to_path_buf(),
        };
        let config = config();
        let env = HostEnv::default();
        let mut resolver = PathResolver::new(&config, &env, &platform);
        resolver.start_installation();

        let first = resolver.application_dir().unwrap().unwrap();
        assert!(first.join("pics").is_dir());
        assert!(first.join("lib/native").is_dir());

        // a second resolution must not recreate anything
        fs::remove_dir(first.join("pics")).unwrap();
        let second = resolver.application_dir().unwrap().unwrap();
        assert_eq!(first, second);
        assert!(!second.join("pics").exists());
    }

    #[test]
    fn resolution_before_start_is_materialized_after_start() {
        let scratch = tempfile::tempdir().unwrap();
        let platform = ScratchPlatform {
            root: scratch.path().to_path_buf(),
        };
        let config = config();
        let env = HostEnv::default();
        let mut resolver = PathResolver::new(&config, &env, &platform);

        let before = resolver.config_dir().unwrap().unwrap();
        resolver.start_installation();
        let after = resolver.config_dir().unwrap().unwrap();
        assert_eq!(before, after);
        assert!(after.join("logs").is_dir());
    }

    #[test]
    fn late_registration_creates_immediately() {
        let scratch = tempfile::tempdir().unwrap();
        let platform = ScratchPlatform {
            root: scratch.path().to_path_buf(),
        };
        let config = config();
        let env = HostEnv::default();
        let mut resolver = PathResolver::new(&config, &env, &platform);
        resolver.start_installation();
        let app = resolver.application_dir().unwrap().unwrap();

        resolver.register_program_dir("fonts/").unwrap();
        assert!(app.join("fonts").is_dir());
        resolver.register_program_dir("fonts/").unwrap();
    }

    #[test]
    fn materialize_twice_is_idempotent() {
        let scratch = tempfile::tempdir().unwrap();
        let root = scratch.path().join("app");
        let subdirs = vec!["a/".to_string(), "b/c/".to_string()];
        materialize(&root, &subdirs).unwrap();
        materialize(&root, &subdirs).unwrap();
        let entries = fs::read_dir(&root).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn file_in_place_of_subdir_is_skipped() {
        let scratch = tempfile::tempdir().unwrap();
        let root = scratch.path().join("app");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("pics"), b"not a dir").unwrap();

        materialize(&root, &["pics/".to_string(), "path/".to_string()]).unwrap();
        assert!(root.join("pics").is_file());
        assert!(root.join("path").is_dir());
    }

    #[test]
    fn portable_mode_uses_root_subdirectories() {
        let scratch = tempfile::tempdir().unwrap();
        let platform = ScratchPlatform {
            root: scratch.path().join("system"),
        };
        let config = InstallConfig::builder("Acme", "1.0", "Tool", "Acme Tool")
            .portable(scratch.path().join("stick"))
            .build();
        let env = HostEnv::default();
        let mut resolver = PathResolver::new(&config, &env, &platform);
        resolver.start_installation();

        let app = resolver.application_dir().unwrap().unwrap();
        let conf = resolver.config_dir().unwrap().unwrap();
        assert_eq!(app, scratch.path().join("stick").join(PORTABLE_PROGRAM_DIR));
        assert_eq!(conf, scratch.path().join("stick").join(PORTABLE_CONFIG_DIR));
        assert!(app.is_dir() && conf.is_dir());
        assert!(!scratch.path().join("system").exists());
    }

    #[test]
    fn desktop_dir_is_cached() {
        let scratch = tempfile::tempdir().unwrap();
        let platform = ScratchPlatform {
            root: scratch.path().to_path_buf(),
        };
        let config = config();
        let env = HostEnv::default();
        let mut resolver = PathResolver::new(&config, &env, &platform);
        let desktop = resolver.desktop_dir();
        assert_eq!(desktop, Some(scratch.path().join("Desktop")));
        assert_eq!(resolver.resolved().desktop, Some(desktop));
    }
}
