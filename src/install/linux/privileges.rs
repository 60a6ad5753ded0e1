//! Root detection and elevated relaunch for Linux.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::{debug, info};

use crate::error::{InstallerError, Result};
use crate::install::integration::template::shell_quote;
use crate::install::platform::HostEnv;
use crate::install::process::{first_line, spawn_detached};

const ID_TIMEOUT: Duration = Duration::from_secs(5);

/// Terminal emulators tried in order, with the arguments that precede the
/// command to run.
const TERMINALS: &[(&str, &[&str])] = &[
    ("gnome-terminal", &["--"]),
    ("xterm", &["-e"]),
    ("xfce4-terminal", &["-x"]),
    ("tilix", &["-e"]),
    ("konsole", &["-e"]),
    ("x-terminal-emulator", &["-e"]),
    ("wezterm", &["start", "--"]),
    ("alacritty", &["-e"]),
];

/// Parse the output of `id -u`.
pub(super) fn uid_is_root(output: &str) -> bool {
    output.trim() == "0"
}

/// Whether the effective user is root.
pub(super) fn is_root() -> bool {
    match first_line(Command::new("id").arg("-u"), ID_TIMEOUT) {
        Some(line) => uid_is_root(&line),
        None => {
            debug!("id -u unavailable, asking the kernel");
            effective_uid_is_root()
        }
    }
}

fn effective_uid_is_root() -> bool {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            nix::unistd::geteuid().is_root()
        } else {
            false
        }
    }
}

/// How the elevated instance gets its rights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Elevator {
    /// Graphical polkit prompt, carrying the display environment along.
    Pkexec(PathBuf),
    /// Password prompt inside the terminal.
    Sudo,
}

/// Program and arguments opening `terminal` with an elevated installer.
pub(super) fn elevation_command(
    elevator: &Elevator,
    terminal: &Path,
    terminal_args: &[&str],
    exe: &Path,
    args: &[String],
    env: &HostEnv,
) -> (PathBuf, Vec<String>) {
    let mut inner = shell_quote(&exe.to_string_lossy());
    for arg in args {
        inner.push(' ');
        inner.push_str(&shell_quote(arg));
    }
    inner.push_str("; echo; read -r -p 'Press enter to close this window' _");

    let mut command: Vec<String> = Vec::new();
    let program = match elevator {
        Elevator::Pkexec(pkexec) => {
            command.extend(["--user".into(), "root".into(), "env".into()]);
            if let Some(display) = &env.display {
                command.push(format!("DISPLAY={display}"));
            }
            if let Some(xauthority) = &env.xauthority {
                command.push(format!("XAUTHORITY={xauthority}"));
            }
            if let Some(home) = &env.home {
                command.push(format!("HOME={}", home.display()));
            }
            command.push(terminal.to_string_lossy().into_owned());
            command.extend(terminal_args.iter().map(|a| a.to_string()));
            command.extend(["/bin/sh".into(), "-c".into(), inner]);
            pkexec.clone()
        }
        Elevator::Sudo => {
            command.extend(terminal_args.iter().map(|a| a.to_string()));
            command.extend(["sudo".into(), "/bin/sh".into(), "-c".into(), inner]);
            terminal.to_path_buf()
        }
    };
    (program, command)
}

fn find_terminal() -> Option<(PathBuf, &'static [&'static str])> {
    TERMINALS
        .iter()
        .find_map(|(name, args)| which::which(name).ok().map(|path| (path, *args)))
}

/// Reopen the installer as root inside a new terminal window.
pub(super) fn relaunch_elevated(env: &HostEnv, args: &[String]) -> Result<()> {
    let exe = std::env::current_exe()
        .map_err(|e| InstallerError::ElevationFailed(format!("cannot locate the installer: {e}")))?;
    let (terminal, terminal_args) = find_terminal().ok_or_else(|| {
        InstallerError::ElevationFailed(
            "no terminal emulator found, run the installer with sudo instead".into(),
        )
    })?;
    let elevator = match which::which("pkexec") {
        Ok(path) if env.display.is_some() => Elevator::Pkexec(path),
        _ => Elevator::Sudo,
    };
    let (program, command) =
        elevation_command(&elevator, &terminal, terminal_args, &exe, args, env);

    info!("Relaunching through {} with {:?}", program.display(), elevator);
    spawn_detached(Command::new(&program).args(&command)).map_err(|e| {
        InstallerError::ElevationFailed(format!("failed to start {}: {e}", program.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_uid_zero_is_root() {
        assert!(uid_is_root("0\n"));
        assert!(!uid_is_root("1000"));
        assert!(!uid_is_root(""));
        assert!(!uid_is_root("00 1"));
    }

    #[test]
    fn pkexec_command_carries_display() {
        let env = HostEnv {
            display: Some(":0".into()),
            xauthority: Some("/home/alice/.Xauthority".into()),
            home: Some(PathBuf::from("/home/alice")),
            ..HostEnv::default()
        };
        let (program, args) = elevation_command(
            &Elevator::Pkexec(PathBuf::from("/usr/bin/pkexec")),
            Path::new("/usr/bin/xterm"),
            &["-e"],
            Path::new("/tmp/app installer"),
            &["--portable".into(), "it's".into()],
            &env,
        );
        assert_eq!(program, PathBuf::from("/usr/bin/pkexec"));
        assert_eq!(
            &args[..7],
            [
                "--user",
                "root",
                "env",
                "DISPLAY=:0",
                "XAUTHORITY=/home/alice/.Xauthority",
                "HOME=/home/alice",
                "/usr/bin/xterm"
            ]
        );
        assert_eq!(args[7], "-e");
        assert_eq!(args[8..10], ["/bin/sh", "-c"]);
        assert!(args[10].starts_with(r"'/tmp/app installer' '--portable' 'it'\''s';"));
    }

    #[test]
    fn sudo_runs_inside_terminal() {
        let (program, args) = elevation_command(
            &Elevator::Sudo,
            Path::new("/usr/bin/wezterm"),
            &["start", "--"],
            Path::new("/opt/installer"),
            &[],
            &HostEnv::default(),
        );
        assert_eq!(program, PathBuf::from("/usr/bin/wezterm"));
        assert_eq!(args[..5], ["start", "--", "sudo", "/bin/sh", "-c"]);
        assert!(args[5].starts_with("'/opt/installer';"));
    }
}
