//! Desktop entries (freedesktop) and Windows shortcuts.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::template::{ps_quote, render, windows_path};
use crate::error::{InstallerError, Result};
use crate::install::process::run_with_timeout;

const DESKTOP_TEMPLATE: &str = include_str!("../../../templates/app.desktop.template");
const SHORTCUT_TIMEOUT: Duration = Duration::from_secs(15);

/// Contents of a `.desktop` file.
#[derive(Debug, Clone)]
pub struct DesktopEntry<'a> {
    pub name: &'a str,
    pub comment: &'a str,
    pub exec: &'a Path,
    pub args: &'a str,
    pub icon: &'a Path,
    pub categories: Option<&'a str>,
    pub keywords: Option<&'a str>,
    pub autostart: bool,
}

/// Quote an `Exec=` argument per the desktop entry specification.
fn exec_quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('`', "\\`")
        .replace('$', "\\$");
    format!("\"{escaped}\"")
}

/// `a;b` → `a;b;` as required for list values.
fn list_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}

pub fn render_desktop_entry(entry: &DesktopEntry<'_>) -> String {
    let mut exec = exec_quote(&entry.exec.to_string_lossy());
    if !entry.args.trim().is_empty() {
        exec.push(' ');
        exec.push_str(entry.args.trim());
    }

    let mut extra = String::new();
    if let Some(categories) = entry.categories.filter(|c| !c.trim().is_empty()) {
        extra.push_str(&format!("Categories={}\n", list_value(categories)));
    }
    if let Some(keywords) = entry.keywords.filter(|k| !k.trim().is_empty()) {
        extra.push_str(&format!("Keywords={}\n", list_value(keywords)));
    }
    if entry.autostart {
        extra.push_str("X-GNOME-Autostart-enabled=true\n");
    }

    let rendered = render(
        DESKTOP_TEMPLATE,
        &[
            ("NAME", entry.name),
            ("COMMENT", entry.comment),
            ("EXEC", &exec),
            ("ICON", &entry.icon.to_string_lossy()),
            ("EXTRA", &extra),
        ],
    );
    format!("{}\n", rendered.trim_end())
}

/// A Windows `.lnk` shortcut.
#[derive(Debug, Clone)]
pub struct Shortcut<'a> {
    pub link: &'a Path,
    pub target: &'a Path,
    pub args: &'a str,
    pub icon: Option<&'a Path>,
    pub working_dir: &'a Path,
    pub description: &'a str,
}

/// PowerShell script creating `shortcut` through `WScript.Shell`.
pub fn shortcut_script(shortcut: &Shortcut<'_>) -> String {
    let mut script = format!(
        "$shell = New-Object -ComObject WScript.Shell; \
         $link = $shell.CreateShortcut({}); \
         $link.TargetPath = {}; \
         $link.WorkingDirectory = {}; \
         $link.Description = {}; ",
        ps_quote(&windows_path(shortcut.link)),
        ps_quote(&windows_path(shortcut.target)),
        ps_quote(&windows_path(shortcut.working_dir)),
        ps_quote(shortcut.description),
    );
    if !shortcut.args.is_empty() {
        script.push_str(&format!("$link.Arguments = {}; ", ps_quote(shortcut.args)));
    }
    if let Some(icon) = shortcut.icon {
        script.push_str(&format!("$link.IconLocation = {}; ", ps_quote(&windows_path(icon))));
    }
    script.push_str("$link.Save()");
    script
}

/// Create `shortcut` by running PowerShell.
pub fn create_shortcut(shortcut: &Shortcut<'_>) -> Result<()> {
    if let Some(parent) = shortcut.link.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| InstallerError::artifact("shortcut", format!("{}: {e}", parent.display())))?;
    }
    let output = run_with_timeout(
        Command::new("powershell").args([
            "-NoProfile",
            "-NonInteractive",
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
            &shortcut_script(shortcut),
        ]),
        SHORTCUT_TIMEOUT,
    )
    .ok_or_else(|| InstallerError::artifact("shortcut", "powershell did not run"))?;
    if !output.status.success() {
        return Err(InstallerError::artifact(
            "shortcut",
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(())
}
