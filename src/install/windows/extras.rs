//! Fonts and startup-folder autostart on Windows.

use std::path::PathBuf;

use log::{info, warn};

use super::run_batch;
use crate::install::integration::desktop::{Shortcut, create_shortcut};
use crate::install::integration::registry::font_registration;
use crate::install::platform::{HostEnv, IntegrationContext};

pub(super) fn install_fonts(ctx: &IntegrationContext<'_>) {
    let fonts = ctx.config.fonts();
    if fonts.is_empty() {
        return;
    }
    if !ctx.privileged {
        info!("Fonts need administrator rights, skipping {} fonts", fonts.len());
        return;
    }
    let Some(dir) = ctx.env.windir.as_ref().map(|windir| windir.join("Fonts")) else {
        warn!("WINDIR is not set, skipping fonts");
        return;
    };

    let mut batch = String::from("@ECHO OFF\r\n");
    let mut installed = 0;
    for (name, path_in_archive) in fonts {
        let file = format!("{name}.ttf");
        if ctx.resources.copy(path_in_archive, &dir.join(&file)) {
            batch.push_str(&font_registration(name, &file));
            installed += 1;
        }
    }
    if installed > 0 && !run_batch(&batch, "font registration") {
        warn!("Fonts were copied but could not be registered");
    }
    info!("Installed {installed} of {} fonts", fonts.len());
}

/// Startup folder of the user, or of everybody.
fn startup_dir(env: &HostEnv, user: bool) -> Option<PathBuf> {
    if user {
        env.app_data
            .as_ref()
            .map(|dir| dir.join(r"Microsoft\Windows\Start Menu\Programs\Startup"))
    } else {
        env.all_users_profile
            .as_ref()
            .map(|dir| dir.join(r"Microsoft\Windows\Start Menu\Programs\StartUp"))
    }
}

pub(super) fn create_gui_autostart(ctx: &IntegrationContext<'_>) {
    let Some(spec) = ctx.config.gui_autostart() else {
        return;
    };
    let identity = ctx.config.identity();
    let for_user = spec.user.is_some() || !ctx.privileged;
    let Some(dir) = startup_dir(ctx.env, for_user) else {
        warn!("No startup folder available, skipping the autostart entry");
        return;
    };
    let launcher = ctx.layout.app_dir.join(format!("{}.bat", identity.short_name));
    let link = dir.join(format!("{}.lnk", identity.short_name));
    let result = create_shortcut(&Shortcut {
        link: &link,
        target: &launcher,
        args: &spec.flags,
        icon: None,
        working_dir: &ctx.layout.app_dir,
        description: &identity.long_name,
    });
    match result {
        Ok(()) => info!("Autostart shortcut written to {}", link.display()),
        Err(e) => warn!("Failed to create the autostart shortcut: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_folder_per_scope() {
        let env = HostEnv {
            app_data: Some(PathBuf::from("/users/bob/AppData/Roaming")),
            all_users_profile: Some(PathBuf::from("/ProgramData")),
            ..HostEnv::default()
        };
        assert!(startup_dir(&env, true).unwrap().starts_with("/users/bob/AppData/Roaming"));
        assert!(startup_dir(&env, false).unwrap().starts_with("/ProgramData"));
        assert!(startup_dir(&HostEnv::default(), true).is_none());
    }
}
