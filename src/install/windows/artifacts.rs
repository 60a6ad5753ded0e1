//! Placement of the Windows integration artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{PATH_SHIM_DIR, WindowsPlatform, run_batch};
use crate::config::{InstallConfig, InstallMode};
use crate::error::{InstallerError, MarkerKind, Result};
use crate::install::integration::desktop::{Shortcut, create_shortcut};
use crate::install::integration::file_ops::write_file_atomic;
use crate::install::integration::launcher::{LauncherSpec, render_windows, to_crlf, windows_launch_commands};
use crate::install::integration::registry::{
    Registration, app_paths_key, path_remove_commands, render_registration, uninstall_key,
};
use crate::install::integration::template::windows_path;
use crate::install::integration::uninstall::{WindowsUninstall, render_windows as render_uninstaller};
use crate::install::platform::IntegrationContext;

pub(super) const PORTABLE_MARKER: &str = "portable";
pub(super) const USER_MARKER: &str = "userInstallation";
const UNINSTALLER: &str = "uninstall.bat";
pub(super) const UNINSTALL_ICON: &str = "uninstall.ico";

pub(super) fn integrate(ctx: &IntegrationContext<'_>) -> Result<()> {
    match ctx.config.mode() {
        InstallMode::Portable => integrate_portable(ctx),
        InstallMode::User => {
            write_marker(ctx, MarkerKind::User, USER_MARKER)?;
            register(ctx, true);
            Ok(())
        }
        InstallMode::SystemWide => {
            if ctx.privileged {
                register(ctx, false);
            } else {
                info!("Administrator rights are missing, skipping the system registration");
            }
            Ok(())
        }
    }
}

fn optional(step: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("Skipping {step}: {e}");
    }
}

fn write_marker(ctx: &IntegrationContext<'_>, kind: MarkerKind, name: &str) -> Result<()> {
    let path = ctx.layout.app_dir.join(name);
    write_file_atomic(&path, b"").map_err(|e| InstallerError::MarkerFile {
        kind,
        path,
        reason: e.to_string(),
    })
}

fn launcher_path(ctx: &IntegrationContext<'_>) -> PathBuf {
    ctx.layout
        .app_dir
        .join(format!("{}.bat", ctx.config.identity().short_name))
}

fn render_launcher(config: &InstallConfig, artifact: &Path, uninstaller: Option<&Path>) -> String {
    let (launch, launch_background) = windows_launch_commands(config, &windows_path(artifact));
    render_windows(&LauncherSpec {
        name: config.identity().short_name.clone(),
        launch,
        launch_background,
        background_by_default: config.run_in_background(),
        stop_pattern: config.process_pattern().to_string(),
        uninstaller: uninstaller.map(windows_path),
    })
}

/// Extract the shortcut icon into `pics/`.
fn extract_icon(ctx: &IntegrationContext<'_>) -> Option<PathBuf> {
    let entry = ctx.config.desktop_entry()?;
    if entry.windows_icon.is_empty() {
        return None;
    }
    let dest = ctx
        .layout
        .app_dir
        .join("pics")
        .join(format!("{}.ico", ctx.config.identity().short_name));
    ctx.resources.copy(&entry.windows_icon, &dest).then_some(dest)
}

fn shortcut(ctx: &IntegrationContext<'_>, link: &Path, target: &Path, icon: Option<&Path>) -> Result<()> {
    let identity = ctx.config.identity();
    create_shortcut(&Shortcut {
        link,
        target,
        args: "",
        icon,
        working_dir: &ctx.layout.app_dir,
        description: &identity.long_name,
    })
}

fn integrate_portable(ctx: &IntegrationContext<'_>) -> Result<()> {
    write_marker(ctx, MarkerKind::Portable, PORTABLE_MARKER)?;

    let launcher = launcher_path(ctx);
    let script = render_launcher(ctx.config, &ctx.layout.artifact, None);
    write_file_atomic(&launcher, script.as_bytes()).map_err(|e| InstallerError::MarkerFile {
        kind: MarkerKind::Portable,
        path: launcher.clone(),
        reason: e.to_string(),
    })?;

    if ctx.config.desktop_entry().is_some() {
        let icon = extract_icon(ctx);
        let root = ctx
            .layout
            .portable_root
            .clone()
            .unwrap_or_else(|| ctx.layout.app_dir.clone());
        let link = root.join(format!("{}.lnk", ctx.config.identity().short_name));
        optional("portable shortcut", shortcut(ctx, &link, &launcher, icon.as_deref()));
    }
    Ok(())
}

/// Links created for a registered install: start menu and desktop.
struct Links {
    start_menu: Option<PathBuf>,
    desktop: Option<PathBuf>,
}

fn links(ctx: &IntegrationContext<'_>, user: bool) -> Links {
    let identity = ctx.config.identity();
    let file = format!("{}.lnk", identity.short_name);
    let start_menu = WindowsPlatform::start_menu_programs(ctx.env, user)
        .map(|dir| dir.join(&identity.company).join(&file));
    let desktop = if user {
        ctx.layout.desktop_dir.clone()
    } else {
        ctx.env.public.as_ref().map(|public| public.join("Desktop"))
    }
    .map(|dir| dir.join(&file));
    Links { start_menu, desktop }
}

fn register(ctx: &IntegrationContext<'_>, user: bool) {
    let identity = ctx.config.identity();
    let launcher = launcher_path(ctx);
    let uninstaller = ctx.layout.app_dir.join(UNINSTALLER);

    let script = render_launcher(ctx.config, &ctx.layout.artifact, Some(&uninstaller));
    optional(
        "launcher",
        write_file_atomic(&launcher, script.as_bytes())
            .map_err(|e| InstallerError::artifact("launcher", format!("{}: {e}", launcher.display()))),
    );

    let path_dir = ctx.config.path_entry().then(|| ctx.layout.app_dir.join(PATH_SHIM_DIR));
    if let Some(dir) = &path_dir {
        let shim = dir.join(format!("{}.bat", identity.short_name));
        let text = to_crlf(&format!("@ECHO OFF\nCALL \"{}\" %*\n", windows_path(&launcher)));
        optional(
            "PATH shim",
            fs::create_dir_all(dir)
                .and_then(|()| write_file_atomic(&shim, text.as_bytes()))
                .map_err(|e| InstallerError::artifact("PATH shim", format!("{}: {e}", shim.display()))),
        );
    }

    let links = links(ctx, user);
    let icon = extract_icon(ctx);
    if ctx.config.desktop_entry().is_some() {
        for link in [&links.start_menu, &links.desktop].into_iter().flatten() {
            optional("shortcut", shortcut(ctx, link, &launcher, icon.as_deref()));
        }
    }

    let uninstall_icon = ctx.layout.app_dir.join("pics").join(UNINSTALL_ICON);
    let display_icon = if uninstall_icon.is_file() {
        uninstall_icon
    } else {
        icon.unwrap_or_else(|| ctx.layout.artifact.clone())
    };

    let text = render_uninstaller(&WindowsUninstall {
        name: identity.long_name.clone(),
        start_menu_link: links.start_menu.clone().unwrap_or_default(),
        desktop_links: links.desktop.iter().cloned().collect(),
        config_dir: ctx.layout.config_dir.clone(),
        uninstall_key: uninstall_key(user, &identity.short_name),
        app_paths_key: path_dir.as_ref().map(|_| app_paths_key(user, &identity.short_name)),
        path_removal: path_dir.as_deref().map(|dir| path_remove_commands(user, dir)),
        app_dir: ctx.layout.app_dir.clone(),
        stop_pattern: ctx.config.process_pattern().to_string(),
    });
    optional(
        "uninstaller",
        write_file_atomic(&uninstaller, text.as_bytes())
            .map_err(|e| InstallerError::artifact("uninstaller", format!("{}: {e}", uninstaller.display()))),
    );

    let batch = render_registration(&Registration {
        user,
        short_name: &identity.short_name,
        long_name: &identity.long_name,
        version: &identity.version,
        company: &identity.company,
        app_dir: &ctx.layout.app_dir,
        display_icon: &display_icon,
        uninstaller: &uninstaller,
        estimated_size_kb: ctx.config.estimated_size_kb(),
        path_dir: path_dir.as_deref(),
        launcher: &launcher,
    });
    if run_batch(&batch, "registry") {
        info!("Registered {} in the uninstall list", identity.long_name);
    } else {
        warn!("Failed to register {} in the uninstall list", identity.long_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesktopEntrySpec;
    use crate::install::collaborators::DirectoryResources;
    use crate::install::platform::{HostEnv, InstallLayout};

    #[test]
    fn links_depend_on_mode() {
        let config = InstallConfig::builder("Acme", "1", "Tool", "Acme Tool")
            .desktop_entry(DesktopEntrySpec::default())
            .build();
        let env = HostEnv {
            app_data: Some(PathBuf::from("/users/bob/AppData/Roaming")),
            all_users_profile: Some(PathBuf::from("/ProgramData")),
            public: Some(PathBuf::from("/users/Public")),
            ..HostEnv::default()
        };
        let layout = InstallLayout {
            app_dir: PathBuf::from("/app"),
            config_dir: PathBuf::from("/cfg"),
            desktop_dir: Some(PathBuf::from("/users/bob/Desktop")),
            artifact: PathBuf::from("/app/Tool.jar"),
            portable_root: None,
        };
        let resources = DirectoryResources::new("/nowhere");
        let ctx = IntegrationContext {
            config: &config,
            env: &env,
            layout: &layout,
            resources: &resources,
            privileged: true,
        };

        let system = links(&ctx, false);
        assert_eq!(system.desktop, Some(PathBuf::from("/users/Public/Desktop/Tool.lnk")));
        let start = system.start_menu.unwrap();
        assert!(start.starts_with("/ProgramData"));
        assert!(start.ends_with("Acme/Tool.lnk"));

        let user = links(&ctx, true);
        assert_eq!(user.desktop, Some(PathBuf::from("/users/bob/Desktop/Tool.lnk")));
        assert!(user.start_menu.unwrap().starts_with("/users/bob/AppData/Roaming"));
    }

    #[test]
    fn portable_install_writes_marker_and_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("Programm");
        fs::create_dir_all(&app_dir).unwrap();
        let config = InstallConfig::builder("Acme", "1", "Tool", "Acme Tool")
            .portable(dir.path())
            .run_in_background(true)
            .build();
        let env = HostEnv::default();
        let layout = InstallLayout {
            artifact: app_dir.join("Tool.jar"),
            app_dir: app_dir.clone(),
            config_dir: dir.path().join("Appdata"),
            desktop_dir: None,
            portable_root: Some(dir.path().to_path_buf()),
        };
        let resources = DirectoryResources::new(dir.path());
        let ctx = IntegrationContext {
            config: &config,
            env: &env,
            layout: &layout,
            resources: &resources,
            privileged: false,
        };
        integrate(&ctx).unwrap();

        assert!(app_dir.join(PORTABLE_MARKER).is_file());
        let launcher = fs::read_to_string(app_dir.join("Tool.bat")).unwrap();
        assert!(launcher.contains("SET foreground=falseDefault"));
        assert!(!launcher.contains("---uninstall"));
    }

    #[test]
    fn user_marker_failure_has_user_code() {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallConfig::builder("Acme", "1", "Tool", "Acme Tool")
            .user_installation(true)
            .build();
        let env = HostEnv::default();
        let layout = InstallLayout {
            artifact: dir.path().join("missing/Tool.jar"),
            app_dir: dir.path().join("missing"),
            config_dir: dir.path().join("cfg"),
            desktop_dir: None,
            portable_root: None,
        };
        let resources = DirectoryResources::new(dir.path());
        let ctx = IntegrationContext {
            config: &config,
            env: &env,
            layout: &layout,
            resources: &resources,
            privileged: false,
        };
        assert_eq!(integrate(&ctx).unwrap_err().code(), -15);
    }
}
