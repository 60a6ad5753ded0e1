//! Launcher scripts wrapping the installed artifact.
//!
//! Both variants accept `--f/---foreground`, `--b/---background`,
//! `--s/---stop`, optionally `--u/---uninstall`, and `---help`. Anything else
//! is forwarded to the program and forces a foreground start unless the mode
//! was chosen explicitly.

use super::template::{render, shell_quote};
use crate::config::InstallConfig;

const UNIX_TEMPLATE: &str = include_str!("../../../templates/launcher.sh.template");
const WINDOWS_TEMPLATE: &str = include_str!("../../../templates/launcher.bat.template");

/// Inputs of one launcher script.
#[derive(Debug, Clone)]
pub struct LauncherSpec {
    pub name: String,
    /// Command line starting the program, without program arguments.
    pub launch: String,
    /// Windows only: command used for background starts.
    pub launch_background: String,
    pub background_by_default: bool,
    /// Command-line fragment identifying running instances.
    pub stop_pattern: String,
    /// Uninstaller invoked by `--u`, when one is installed.
    pub uninstaller: Option<String>,
}

impl LauncherSpec {
    fn default_mode(&self) -> &'static str {
        if self.background_by_default {
            "falseDefault"
        } else {
            "trueDefault"
        }
    }

    fn default_markers(&self) -> (&'static str, &'static str) {
        if self.background_by_default {
            ("", " (default)")
        } else {
            (" (default)", "")
        }
    }
}

/// JVM options derived from the configured heap sizes.
fn java_options(config: &InstallConfig) -> String {
    let mut options = String::new();
    if let Some(mb) = config.max_heap_mb() {
        options.push_str(&format!("-Xmx{mb}M "));
    }
    if let Some(mb) = config.initial_heap_mb() {
        options.push_str(&format!("-Xms{mb}M "));
    }
    options
}

/// Unix command starting `artifact`, a shell expression already quoted.
pub fn unix_launch_command(config: &InstallConfig, artifact: &str) -> String {
    if config.is_jar() {
        format!("java {}-jar {artifact}", java_options(config))
    } else {
        artifact.to_string()
    }
}

/// Windows foreground and background commands starting `artifact`.
pub fn windows_launch_commands(config: &InstallConfig, artifact: &str) -> (String, String) {
    let quoted = format!("\"{artifact}\"");
    if config.is_jar() {
        let options = java_options(config);
        (
            format!("java {options}-jar {quoted}"),
            format!("javaw {options}-jar {quoted}"),
        )
    } else {
        (format!("CALL {quoted}"), quoted)
    }
}

pub fn render_unix(spec: &LauncherSpec) -> String {
    let (fg_default, bg_default) = spec.default_markers();
    let (help, case, branch) = match &spec.uninstaller {
        Some(path) => (
            "    echo -e \"    --u   ---uninstall  \\t remove the program\"\n".to_string(),
            "        --u|---uninstall) uninstall=\"true\" ;;\n".to_string(),
            format!(
                "elif [ \"$uninstall\" = \"true\" ]; then\n    {}\n",
                shell_quote(path)
            ),
        ),
        None => (String::new(), String::new(), String::new()),
    };
    render(
        UNIX_TEMPLATE,
        &[
            ("NAME", &spec.name),
            ("INSTALLER_VERSION", env!("CARGO_PKG_VERSION")),
            ("DEFAULT_MODE", spec.default_mode()),
            ("FOREGROUND_DEFAULT", fg_default),
            ("BACKGROUND_DEFAULT", bg_default),
            ("UNINSTALL_HELP", &help),
            ("UNINSTALL_CASE", &case),
            ("UNINSTALL_BRANCH", &branch),
            ("STOP_PATTERN", &spec.stop_pattern.replace('\'', "")),
            ("LAUNCH", &spec.launch),
        ],
    )
}

pub fn render_windows(spec: &LauncherSpec) -> String {
    let (fg_default, bg_default) = spec.default_markers();
    let (help, case, branch) = match &spec.uninstaller {
        Some(path) => (
            "ECHO     --u   ---uninstall     remove the program\r\n".to_string(),
            "IF /I \"%~1\"==\"--u\" ( SET uninstall=true& SET known=1 )\r\n\
             IF /I \"%~1\"==\"---uninstall\" ( SET uninstall=true& SET known=1 )\r\n"
                .to_string(),
            format!("IF \"!uninstall!\"==\"true\" (\r\n    CALL \"{path}\"\r\n    GOTO :EOF\r\n)\r\n"),
        ),
        None => (String::new(), String::new(), String::new()),
    };
    let script = render(
        WINDOWS_TEMPLATE,
        &[
            ("NAME", &spec.name),
            ("INSTALLER_VERSION", env!("CARGO_PKG_VERSION")),
            ("DEFAULT_MODE", spec.default_mode()),
            ("FOREGROUND_DEFAULT", fg_default),
            ("BACKGROUND_DEFAULT", bg_default),
            ("UNINSTALL_HELP", &help),
            ("UNINSTALL_CASE", &case),
            ("UNINSTALL_BRANCH", &branch),
            ("STOP_PATTERN", &spec.stop_pattern.replace('\'', "")),
            ("LAUNCH", &spec.launch),
            ("LAUNCH_BACKGROUND", &spec.launch_background),
        ],
    );
    to_crlf(&script)
}

/// Normalize line endings for cmd.exe.
pub(crate) fn to_crlf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}
