//! Uninstaller scripts.

use std::path::{Path, PathBuf};

use super::launcher::to_crlf;
use super::template::{render, windows_path};

const UNIX_TEMPLATE: &str = include_str!("../../../templates/uninstall.sh.template");
const WINDOWS_TEMPLATE: &str = include_str!("../../../templates/uninstall.bat.template");

const ROOT_CHECK: &str = "if [ \"$(id -u)\" != \"0\" ]; then\n    \
    echo \"The uninstaller has to be run as root\"\n    \
    exit 1\nfi\n\n";

/// What the Linux uninstaller removes.
#[derive(Debug, Clone)]
pub struct UnixUninstall {
    pub name: String,
    pub company: String,
    pub short_name: String,
    pub launcher: PathBuf,
    pub desktop_files: Vec<PathBuf>,
    pub app_dir: PathBuf,
    /// Unit file and its name, when a unit was installed.
    pub unit: Option<(PathBuf, String)>,
    pub stop_pattern: String,
    /// User database scanned for per-user settings.
    pub passwd: PathBuf,
    pub require_root: bool,
}

fn sh_double_quoted(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('`', "\\`")
}

pub fn render_unix(spec: &UnixUninstall) -> String {
    let unit_removal = match &spec.unit {
        Some((path, name)) => format!(
            "if command -v systemctl > /dev/null 2>&1; then\n    \
             systemctl stop '{name}' > /dev/null 2>&1\n    \
             systemctl disable '{name}' > /dev/null 2>&1\nfi\n\
             rm -f \"{}\"\n\
             if command -v systemctl > /dev/null 2>&1; then\n    \
             systemctl daemon-reload > /dev/null 2>&1\nfi\n",
            sh_double_quoted(path)
        ),
        None => String::new(),
    };
    let desktop_removal: String = spec
        .desktop_files
        .iter()
        .map(|path| format!("rm -f \"{}\"\n", sh_double_quoted(path)))
        .collect();

    render(
        UNIX_TEMPLATE,
        &[
            ("NAME", &spec.name),
            ("INSTALLER_VERSION", env!("CARGO_PKG_VERSION")),
            ("ROOT_CHECK", if spec.require_root { ROOT_CHECK } else { "" }),
            ("STOP_PATTERN", &spec.stop_pattern.replace('\'', "")),
            ("UNIT_REMOVAL", &unit_removal),
            ("LAUNCHER", &sh_double_quoted(&spec.launcher)),
            ("DESKTOP_REMOVAL", &desktop_removal),
            ("PASSWD", &spec.passwd.to_string_lossy().replace('\'', "")),
            ("COMPANY", &spec.company.replace('"', "")),
            ("SHORT_NAME", &spec.short_name.replace('"', "")),
            ("APP_DIR", &sh_double_quoted(&spec.app_dir)),
        ],
    )
}

/// What the Windows uninstaller removes.
#[derive(Debug, Clone)]
pub struct WindowsUninstall {
    pub name: String,
    pub start_menu_link: PathBuf,
    pub desktop_links: Vec<PathBuf>,
    pub config_dir: PathBuf,
    pub uninstall_key: String,
    pub app_paths_key: Option<String>,
    /// PATH removal commands, when a PATH entry was added.
    pub path_removal: Option<String>,
    pub app_dir: PathBuf,
    pub stop_pattern: String,
}

pub fn render_windows(spec: &WindowsUninstall) -> String {
    let desktop_removal: String = spec
        .desktop_links
        .iter()
        .map(|link| format!("DEL /F /Q \"{}\" > NUL 2>&1\n", windows_path(link)))
        .collect();
    let mut path_removal = String::new();
    if let Some(key) = &spec.app_paths_key {
        path_removal.push_str(&format!("REG DELETE \"{key}\" /f > NUL 2>&1\n"));
    }
    if let Some(commands) = &spec.path_removal {
        path_removal.push_str(commands);
    }

    let script = render(
        WINDOWS_TEMPLATE,
        &[
            ("NAME", &spec.name),
            ("INSTALLER_VERSION", env!("CARGO_PKG_VERSION")),
            ("STOP_PATTERN", &spec.stop_pattern.replace('\'', "")),
            ("START_MENU_LINK", &windows_path(&spec.start_menu_link)),
            ("DESKTOP_REMOVAL", &desktop_removal),
            ("CONFIG_DIR", &windows_path(&spec.config_dir)),
            ("UNINSTALL_KEY", &spec.uninstall_key),
            ("PATH_REMOVAL", &path_removal),
            ("APP_DIR", &windows_path(&spec.app_dir)),
        ],
    );
    to_crlf(&script)
}
