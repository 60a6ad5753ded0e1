//! Placement of the Linux integration artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{LinuxPlatform, service_control};
use crate::config::{InstallConfig, InstallMode};
use crate::error::{InstallerError, MarkerKind, Result};
use crate::install::integration::desktop::{DesktopEntry, render_desktop_entry};
use crate::install::integration::file_ops::{set_mode, write_file_atomic, write_script};
use crate::install::integration::launcher::{LauncherSpec, render_unix, unix_launch_command};
use crate::install::integration::template::{UnitPaths, shell_quote};
use crate::install::integration::uninstall::{UnixUninstall, render_unix as render_uninstaller};
use crate::install::integration::unit::{render_unit, unit_file_name};
use crate::install::paths::PORTABLE_PROGRAM_DIR;
use crate::install::platform::IntegrationContext;

pub(super) const PORTABLE_MARKER: &str = "portable";
const UNINSTALLER: &str = "uninstall.sh";

pub(super) fn integrate(platform: &LinuxPlatform, ctx: &IntegrationContext<'_>) -> Result<()> {
    match ctx.config.mode() {
        InstallMode::Portable => integrate_portable(ctx),
        InstallMode::User | InstallMode::SystemWide => {
            if ctx.privileged {
                integrate_system(platform, ctx);
            } else {
                info!("Root privileges are missing, skipping the system integration");
            }
            Ok(())
        }
    }
}

/// Log a failed optional step.
fn optional(step: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("Skipping {step}: {e}");
    }
}

fn launcher_spec(config: &InstallConfig, launch: String, uninstaller: Option<&Path>) -> LauncherSpec {
    LauncherSpec {
        name: config.identity().short_name.clone(),
        launch,
        launch_background: String::new(),
        background_by_default: config.run_in_background(),
        stop_pattern: config.process_pattern().to_string(),
        uninstaller: uninstaller.map(|p| p.to_string_lossy().into_owned()),
    }
}

/// Extract the desktop icon into `pics/`. Returns its path when present.
fn extract_icon(ctx: &IntegrationContext<'_>) -> Option<PathBuf> {
    let entry = ctx.config.desktop_entry()?;
    if entry.linux_icon.is_empty() {
        return None;
    }
    let extension = Path::new(&entry.linux_icon)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".into());
    let dest = ctx
        .layout
        .app_dir
        .join("pics")
        .join(format!("{}.{extension}", ctx.config.identity().short_name));
    if ctx.resources.copy(&entry.linux_icon, &dest) {
        let _ = set_mode(&dest, 0o644);
        Some(dest)
    } else {
        None
    }
}

fn write_desktop_file(
    ctx: &IntegrationContext<'_>,
    path: &Path,
    launcher: &Path,
    icon: Option<&Path>,
) -> Result<()> {
    let Some(entry) = ctx.config.desktop_entry() else {
        return Ok(());
    };
    let identity = ctx.config.identity();
    let comment = format!("{} {}", identity.long_name, identity.version);
    let text = render_desktop_entry(&DesktopEntry {
        name: &identity.long_name,
        comment: &comment,
        exec: launcher,
        args: "",
        icon: icon.unwrap_or(Path::new("application-x-executable")),
        categories: entry.categories.as_deref(),
        keywords: entry.keywords.as_deref(),
        autostart: false,
    });
    write_file_atomic(path, text.as_bytes())
        .and_then(|()| set_mode(path, 0o755))
        .map_err(|e| InstallerError::artifact("desktop entry", format!("{}: {e}", path.display())))
}

fn integrate_portable(ctx: &IntegrationContext<'_>) -> Result<()> {
    let identity = ctx.config.identity();
    let marker_error = |path: &Path, e: std::io::Error| InstallerError::MarkerFile {
        kind: MarkerKind::Portable,
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let marker = ctx.layout.app_dir.join(PORTABLE_MARKER);
    write_file_atomic(&marker, b"").map_err(|e| marker_error(&marker, e))?;

    let root = ctx
        .layout
        .portable_root
        .clone()
        .or_else(|| ctx.layout.app_dir.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| ctx.layout.app_dir.clone());
    let artifact = format!(
        "\"$SCRIPT_DIR/{PORTABLE_PROGRAM_DIR}/{}\"",
        ctx.config.artifact_file_name().replace('"', "")
    );
    let launcher = root.join(&identity.short_name);
    let script = render_unix(&launcher_spec(
        ctx.config,
        unix_launch_command(ctx.config, &artifact),
        None,
    ));
    write_script(&launcher, &script).map_err(|e| marker_error(&launcher, e))?;
    info!("Portable launcher written to {}", launcher.display());

    let icon = extract_icon(ctx);
    let desktop = root.join(format!("{}.desktop", identity.short_name));
    optional(
        "portable desktop entry",
        write_desktop_file(ctx, &desktop, &launcher, icon.as_deref()),
    );
    Ok(())
}

fn integrate_system(platform: &LinuxPlatform, ctx: &IntegrationContext<'_>) {
    let identity = ctx.config.identity();
    let launcher = platform.launcher_path(&identity.short_name);
    let uninstaller = ctx.layout.app_dir.join(UNINSTALLER);

    let script = render_unix(&launcher_spec(
        ctx.config,
        unix_launch_command(ctx.config, &shell_quote(&ctx.layout.artifact.to_string_lossy())),
        Some(&uninstaller),
    ));
    optional(
        "launcher",
        fs::create_dir_all(&platform.layout.bin_dir)
            .and_then(|()| write_script(&launcher, &script))
            .map_err(|e| InstallerError::artifact("launcher", format!("{}: {e}", launcher.display()))),
    );

    let mut desktop_files = Vec::new();
    if ctx.config.desktop_entry().is_some() {
        let icon = extract_icon(ctx);
        let desktop = platform.desktop_file(&identity.short_name);
        let result = fs::create_dir_all(&platform.layout.applications_dir)
            .map_err(|e| InstallerError::artifact("desktop entry", e))
            .and_then(|()| write_desktop_file(ctx, &desktop, &launcher, icon.as_deref()));
        optional("desktop entry", result);
        desktop_files.push(desktop);
    }

    let unit = match ctx.config.service_unit() {
        Some(_) if !platform.systemd_available() => {
            info!("systemd is not running, no service unit is created");
            None
        }
        Some(_) => match install_unit(platform, ctx, &launcher) {
            Ok(unit) => Some(unit),
            Err(e) => {
                warn!("Skipping service unit: {e}");
                None
            }
        },
        None => None,
    };

    let text = render_uninstaller(&UnixUninstall {
        name: identity.long_name.clone(),
        company: identity.company.clone(),
        short_name: identity.short_name.clone(),
        launcher: launcher.clone(),
        desktop_files,
        app_dir: ctx.layout.app_dir.clone(),
        unit,
        stop_pattern: ctx.config.process_pattern().to_string(),
        passwd: platform.layout.passwd.clone(),
        require_root: true,
    });
    optional(
        "uninstaller",
        write_script(&uninstaller, &text)
            .map_err(|e| InstallerError::artifact("uninstaller", format!("{}: {e}", uninstaller.display()))),
    );
}

/// Write, reload and start the unit. Returns its path and name.
fn install_unit(
    platform: &LinuxPlatform,
    ctx: &IntegrationContext<'_>,
    launcher: &Path,
) -> Result<(PathBuf, String)> {
    let Some(spec) = ctx.config.service_unit() else {
        return Err(InstallerError::artifact("systemd unit", "no unit configured"));
    };
    let name = unit_file_name(&ctx.config.identity().short_name);
    let path = platform.layout.unit_dir.join(&name);
    let content = render_unit(
        spec,
        &ctx.config.identity().short_name,
        &UnitPaths {
            launch_script: launcher,
            app_dir: &ctx.layout.app_dir,
            config_dir: &ctx.layout.config_dir,
        },
    );

    fs::create_dir_all(&platform.layout.unit_dir)
        .and_then(|()| write_file_atomic(&path, content.as_bytes()))
        .and_then(|()| set_mode(&path, 0o644))
        .map_err(|e| InstallerError::artifact("systemd unit", format!("{}: {e}", path.display())))?;
    info!("Service unit written to {}", path.display());

    // the file stays even when systemd refuses it, so the uninstaller still removes it
    optional("systemd reload", service_control::reload_systemd_daemon());
    optional("service start", service_control::start_systemd_service(&name));
    if spec.start_at_boot {
        optional("service enablement", service_control::enable_systemd_service(&name));
    }
    Ok((path, name))
}
