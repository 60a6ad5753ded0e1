//! Fonts and graphical autostart.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::{info, warn};

use super::LinuxPlatform;
use crate::install::integration::desktop::{DesktopEntry, render_desktop_entry};
use crate::install::integration::file_ops::{set_mode, write_file_atomic};
use crate::install::platform::IntegrationContext;
use crate::install::process::run_succeeded;

const FC_CACHE_TIMEOUT: Duration = Duration::from_secs(60);

fn fonts_dir(platform: &LinuxPlatform, ctx: &IntegrationContext<'_>) -> Option<PathBuf> {
    if ctx.privileged {
        Some(platform.layout.system_fonts_dir.clone())
    } else {
        ctx.env.home.as_ref().map(|home| home.join(".local/share/fonts"))
    }
}

pub(super) fn install_fonts(platform: &LinuxPlatform, ctx: &IntegrationContext<'_>) {
    let fonts = ctx.config.fonts();
    if fonts.is_empty() {
        return;
    }
    let Some(dir) = fonts_dir(platform, ctx) else {
        warn!("No fonts directory available, skipping {} fonts", fonts.len());
        return;
    };
    if let Err(e) = fs::create_dir_all(&dir).and_then(|()| set_mode(&dir, 0o755)) {
        warn!("Failed to prepare {}: {e}", dir.display());
        return;
    }

    let mut installed = 0;
    for (name, path_in_archive) in fonts {
        let dest = dir.join(format!("{name}.ttf"));
        if ctx.resources.copy(path_in_archive, &dest) {
            let _ = set_mode(&dest, 0o644);
            installed += 1;
        }
    }
    info!("Installed {installed} of {} fonts into {}", fonts.len(), dir.display());

    if installed > 0 && !run_succeeded(Command::new("fc-cache").arg("-f").arg(&dir), FC_CACHE_TIMEOUT) {
        warn!("fc-cache failed, new fonts are visible after the next login");
    }
}

/// Home directory of `user`, or of the invoking user.
fn home_of(user: Option<&str>, ctx: &IntegrationContext<'_>) -> Option<(PathBuf, Option<(u32, u32)>)> {
    let Some(user) = user else {
        return ctx.env.home.clone().map(|home| (home, None));
    };
    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            use users::os::unix::UserExt;
            let entry = users::get_user_by_name(user)?;
            Some((entry.home_dir().to_path_buf(), Some((entry.uid(), entry.primary_group_id()))))
        } else {
            let _ = user;
            None
        }
    }
}

fn hand_over(path: &Path, owner: Option<(u32, u32)>) {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            if let Some((uid, gid)) = owner {
                let result = nix::unistd::chown(
                    path,
                    Some(nix::unistd::Uid::from_raw(uid)),
                    Some(nix::unistd::Gid::from_raw(gid)),
                );
                if let Err(e) = result {
                    warn!("Failed to hand {} over to uid {uid}: {e}", path.display());
                }
            }
        } else {
            let _ = (path, owner);
        }
    }
}

pub(super) fn create_gui_autostart(platform: &LinuxPlatform, ctx: &IntegrationContext<'_>) {
    let Some(spec) = ctx.config.gui_autostart() else {
        return;
    };
    let identity = ctx.config.identity();
    let Some((home, owner)) = home_of(spec.user.as_deref(), ctx) else {
        warn!("Unknown autostart user {:?}, skipping the autostart entry", spec.user);
        return;
    };

    let launcher = match ctx.layout.portable_root.as_ref() {
        Some(root) => root.join(&identity.short_name),
        None => platform.launcher_path(&identity.short_name),
    };
    let icon = ctx.layout.app_dir.join("pics").join(format!("{}.png", identity.short_name));
    let text = render_desktop_entry(&DesktopEntry {
        name: &identity.long_name,
        comment: &identity.long_name,
        exec: &launcher,
        args: &spec.flags,
        icon: &icon,
        categories: None,
        keywords: None,
        autostart: true,
    });

    let dir = home.join(".config/autostart");
    let path = dir.join(format!("{}.desktop", identity.short_name));
    let result = fs::create_dir_all(&dir).and_then(|()| write_file_atomic(&path, text.as_bytes()));
    match result {
        Ok(()) => {
            let _ = set_mode(&path, 0o644);
            hand_over(&path, owner);
            info!("Autostart entry written to {}", path.display());
        }
        Err(e) => warn!("Failed to write autostart entry {}: {e}", path.display()),
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::config::{GuiAutostartSpec, InstallConfig};
    use crate::install::collaborators::DirectoryResources;
    use crate::install::linux::LinuxLayout;
    use crate::install::platform::{HostEnv, InstallLayout};

    #[test]
    fn fonts_go_to_user_dir_without_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("res")).unwrap();
        fs::write(dir.path().join("res/mono.ttf"), b"ttf").unwrap();

        let config = InstallConfig::builder("Acme", "1", "tool", "Tool")
            .font("AcmeMono", "mono.ttf")
            .font("Missing", "missing.ttf")
            .build();
        let env = HostEnv {
            home: Some(dir.path().join("home")),
            ..HostEnv::default()
        };
        let layout = InstallLayout {
            app_dir: dir.path().join("app"),
            config_dir: dir.path().join("cfg"),
            desktop_dir: None,
            artifact: dir.path().join("app/tool.jar"),
            portable_root: None,
        };
        let resources = DirectoryResources::new(dir.path().join("res"));
        let ctx = IntegrationContext {
            config: &config,
            env: &env,
            layout: &layout,
            resources: &resources,
            privileged: false,
        };
        let platform = LinuxPlatform::with_layout(LinuxLayout::rooted_at(&dir.path().join("sys")));
        install_fonts(&platform, &ctx);

        assert!(dir.path().join("home/.local/share/fonts/AcmeMono.ttf").is_file());
        assert!(!dir.path().join("home/.local/share/fonts/Missing.ttf").exists());
        assert!(!dir.path().join("sys").exists());
    }

    #[test]
    fn autostart_entry_for_invoking_user() {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallConfig::builder("Acme", "1", "tool", "Acme Tool")
            .gui_autostart(GuiAutostartSpec {
                user: None,
                flags: "---background".into(),
            })
            .build();
        let env = HostEnv {
            home: Some(dir.path().join("home")),
            ..HostEnv::default()
        };
        let layout = InstallLayout {
            app_dir: dir.path().join("app"),
            config_dir: dir.path().join("cfg"),
            desktop_dir: None,
            artifact: dir.path().join("app/tool.jar"),
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
        create_gui_autostart(&LinuxPlatform::default(), &ctx);

        let entry = fs::read_to_string(dir.path().join("home/.config/autostart/tool.desktop")).unwrap();
        assert!(entry.contains("Exec=\"/usr/bin/tool\" ---background"));
    }
}
