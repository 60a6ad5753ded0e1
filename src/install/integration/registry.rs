//! Windows registry records written through a generated batch file.

use std::path::Path;

use super::launcher::to_crlf;
use super::template::{render, windows_path};

const REGISTER_TEMPLATE: &str = include_str!("../../../templates/register.bat.template");

const UNINSTALL_SUBKEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall";
const APP_PATHS_SUBKEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths";
const USER_ENVIRONMENT: &str = r"HKCU\Environment";
const SYSTEM_ENVIRONMENT: &str = r"HKLM\SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

fn hive(user: bool) -> &'static str {
    if user { "HKCU" } else { "HKLM" }
}

pub fn uninstall_key(user: bool, short_name: &str) -> String {
    format!(r"{}\{UNINSTALL_SUBKEY}\{short_name}", hive(user))
}

pub fn app_paths_key(user: bool, short_name: &str) -> String {
    format!(r"{}\{APP_PATHS_SUBKEY}\{short_name}.exe", hive(user))
}

/// Batch lines adding `dir` to PATH. Existing occurrences are cut out of the
/// current value first, so repeated installs never duplicate the entry.
pub fn path_add_commands(user: bool, dir: &Path) -> String {
    let entry = windows_path(dir);
    let (key, machine) = if user {
        (USER_ENVIRONMENT, "")
    } else {
        (SYSTEM_ENVIRONMENT, " /M")
    };
    format!(
        "SETLOCAL ENABLEDELAYEDEXPANSION\n\
         SET \"currentPath=\"\n\
         FOR /F \"skip=2 tokens=2*\" %%A IN ('REG QUERY \"{key}\" /v Path 2^>NUL') DO SET \"currentPath=%%B\"\n\
         SET \"currentPath=;!currentPath!;\"\n\
         SET \"currentPath=!currentPath:;{entry};=;!\"\n\
         SET \"currentPath=!currentPath:~1,-1!\"\n\
         IF \"!currentPath!\"==\"\" (SETX Path \"{entry}\"{machine}) ELSE (SETX Path \"!currentPath!;{entry}\"{machine})\n\
         ENDLOCAL\n"
    )
}

/// Batch lines removing `dir` from PATH again.
pub fn path_remove_commands(user: bool, dir: &Path) -> String {
    let entry = windows_path(dir);
    let (key, machine) = if user {
        (USER_ENVIRONMENT, "")
    } else {
        (SYSTEM_ENVIRONMENT, " /M")
    };
    format!(
        "SETLOCAL ENABLEDELAYEDEXPANSION\n\
         SET \"currentPath=\"\n\
         FOR /F \"skip=2 tokens=2*\" %%A IN ('REG QUERY \"{key}\" /v Path 2^>NUL') DO SET \"currentPath=%%B\"\n\
         SET \"currentPath=;!currentPath!;\"\n\
         SET \"currentPath=!currentPath:;{entry};=;!\"\n\
         SET \"currentPath=!currentPath:~1,-1!\"\n\
         SETX Path \"!currentPath!\"{machine} > NUL 2>&1\n\
         ENDLOCAL\n"
    )
}

/// Values of the uninstall key and optional PATH / App Paths registration.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub user: bool,
    pub short_name: &'a str,
    pub long_name: &'a str,
    pub version: &'a str,
    pub company: &'a str,
    pub app_dir: &'a Path,
    pub display_icon: &'a Path,
    pub uninstaller: &'a Path,
    pub estimated_size_kb: u32,
    /// Directory holding the PATH shim, when a PATH entry is requested.
    pub path_dir: Option<&'a Path>,
    /// Launcher referenced by the App Paths key.
    pub launcher: &'a Path,
}

pub fn render_registration(reg: &Registration<'_>) -> String {
    let key = uninstall_key(reg.user, reg.short_name);
    let mut path_entry = String::new();
    if let Some(dir) = reg.path_dir {
        let app_paths = app_paths_key(reg.user, reg.short_name);
        path_entry.push_str(&format!(
            "REG ADD \"{app_paths}\" /ve /t REG_SZ /d \"{}\" /f\n\
             REG ADD \"{app_paths}\" /v Path /t REG_SZ /d \"{}\" /f\n",
            windows_path(reg.launcher),
            windows_path(reg.app_dir),
        ));
        path_entry.push_str(&path_add_commands(reg.user, dir));
    }
    let script = render(
        REGISTER_TEMPLATE,
        &[
            ("NAME", reg.long_name),
            ("INSTALLER_VERSION", env!("CARGO_PKG_VERSION")),
            ("UNINSTALL_KEY", &key),
            ("DISPLAY_ICON", &windows_path(reg.display_icon)),
            ("LONG_NAME", reg.long_name),
            ("VERSION", reg.version),
            ("ESTIMATED_SIZE", &reg.estimated_size_kb.to_string()),
            ("APP_DIR", &windows_path(reg.app_dir)),
            ("COMPANY", reg.company),
            ("UNINSTALLER", &windows_path(reg.uninstaller)),
            ("PATH_ENTRY", &path_entry),
        ],
    );
    to_crlf(&script)
}

/// Registry value registering a font file.
pub fn font_registration(font_name: &str, file_name: &str) -> String {
    format!(
        "REG ADD \"HKLM\\SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\Fonts\" /v \"{font_name} (TrueType)\" /t REG_SZ /d \"{file_name}\" /f\r\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration<'a>(user: bool, path_dir: Option<&'a Path>) -> Registration<'a> {
        Registration {
            user,
            short_name: "Tool",
            long_name: "Acme Tool",
            version: "1.2.3",
            company: "Acme",
            app_dir: Path::new("C:/Program Files/Acme/Tool"),
            display_icon: Path::new("C:/Program Files/Acme/Tool/pics/uninstall.ico"),
            uninstaller: Path::new("C:/Program Files/Acme/Tool/uninstall.bat"),
            estimated_size_kb: 12_800,
            path_dir,
            launcher: Path::new("C:/Program Files/Acme/Tool/Tool.bat"),
        }
    }

    #[test]
    fn uninstall_key_per_hive() {
        assert_eq!(
            uninstall_key(false, "Tool"),
            r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Tool"
        );
        assert!(uninstall_key(true, "Tool").starts_with(r"HKCU\"));
    }

    #[test]
    fn registration_writes_every_uninstall_value() {
        let script = render_registration(&registration(false, None));
        for value in [
            "DisplayIcon",
            "DisplayName",
            "DisplayVersion",
            "estimatedSize /t REG_DWORD /d 12800",
            r#"InstallLocation /t REG_SZ /d "C:\Program Files\Acme\Tool""#,
            "Publisher /t REG_SZ /d \"Acme\"",
            r#"UninstallString /t REG_SZ /d "\"C:\Program Files\Acme\Tool\uninstall.bat\"""#,
        ] {
            assert!(script.contains(value), "missing {value}\n{script}");
        }
        assert!(!script.contains("SETX"));
        assert!(!script.contains("{{"));
    }

    #[test]
    fn path_entry_replaces_existing_occurrence_before_appending() {
        let dir = Path::new("C:/Program Files/Acme/Tool/path");
        let script = render_registration(&registration(false, Some(dir)));
        assert!(script.contains(r"App Paths\Tool.exe"));
        assert!(script.contains(r"!currentPath:;C:\Program Files\Acme\Tool\path;=;!"));
        assert!(script.contains(r#"SETX Path "!currentPath!;C:\Program Files\Acme\Tool\path" /M"#));

        let user = path_add_commands(true, dir);
        assert!(user.contains(r"HKCU\Environment"));
        assert!(!user.contains("/M"));
    }

    #[test]
    fn path_removal_mirrors_addition() {
        let script = path_remove_commands(false, Path::new("C:/Acme/Tool/path"));
        assert!(script.contains(r"!currentPath:;C:\Acme\Tool\path;=;!"));
        assert!(script.contains("/M"));
    }
}
