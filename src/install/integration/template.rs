//! `{{NAME}}` substitution for the bundled script templates.

use std::path::Path;

/// Replace every `{{KEY}}` in `template` with its value. Keys without a value
/// are left in place.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

/// Placeholders accepted in service unit fields.
pub const LAUNCH_SCRIPT_TOKEN: &str = "#~LaunchScript~#";
pub const APP_PATH_TOKEN: &str = "#~AppPath~#";
pub const CONFIG_PATH_TOKEN: &str = "#~ConfigPath~#";

/// Absolute paths substituted for the unit placeholders.
#[derive(Debug, Clone)]
pub struct UnitPaths<'a> {
    pub launch_script: &'a Path,
    pub app_dir: &'a Path,
    pub config_dir: &'a Path,
}

pub fn substitute_placeholders(value: &str, paths: &UnitPaths<'_>) -> String {
    value
        .replace(LAUNCH_SCRIPT_TOKEN, &paths.launch_script.to_string_lossy())
        .replace(APP_PATH_TOKEN, &paths.app_dir.to_string_lossy())
        .replace(CONFIG_PATH_TOKEN, &paths.config_dir.to_string_lossy())
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Windows spelling of `path`.
pub fn windows_path(path: &Path) -> String {
    path.to_string_lossy().replace('/', "\\")
}

/// Quote `value` as a PowerShell single-quoted string.
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_keys_only() {
        let out = render("{{A}}-{{B}}-{{A}} {{C}}", &[("A", "1"), ("B", "two")]);
        assert_eq!(out, "1-two-1 {{C}}");
    }

    #[test]
    fn placeholders_become_paths() {
        let paths = UnitPaths {
            launch_script: Path::new("/usr/bin/tool"),
            app_dir: Path::new("/usr/share/Acme/tool"),
            config_dir: Path::new("/root/.config/Acme/tool"),
        };
        let out = substitute_placeholders("#~LaunchScript~# ---background --data #~AppPath~#/db #~ConfigPath~#", &paths);
        assert_eq!(
            out,
            "/usr/bin/tool ---background --data /usr/share/Acme/tool/db /root/.config/Acme/tool"
        );
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(ps_quote("O'Brien"), "'O''Brien'");
        assert_eq!(windows_path(Path::new("C:/Program Files/Acme")), r"C:\Program Files\Acme");
    }
}
