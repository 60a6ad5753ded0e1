//! Administrator detection and UAC relaunch.
//!
//! Membership in the local Administrators group alone is not enough: a member
//! running with a filtered token cannot write machine-wide settings. Both the
//! group check and a live write probe against `HKLM` have to pass.

use std::process::Command;
use std::time::Duration;

use log::{debug, info};

use crate::config::AppIdentity;
use crate::error::{InstallerError, Result};
use crate::install::integration::template::ps_quote;
use crate::install::process::{run_succeeded, run_with_timeout, spawn_detached};

/// Well-known SID of `BUILTIN\Administrators`.
const ADMINISTRATORS_SID: &str = "S-1-5-32-544";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether `whoami /groups` output lists the Administrators group.
pub(super) fn lists_administrators(groups: &str) -> bool {
    groups
        .lines()
        .any(|line| line.split_whitespace().any(|field| field == ADMINISTRATORS_SID))
}

fn is_administrators_member() -> bool {
    match run_with_timeout(Command::new("whoami").arg("/groups"), PROBE_TIMEOUT) {
        Some(output) if output.status.success() => {
            lists_administrators(&String::from_utf8_lossy(&output.stdout))
        }
        _ => false,
    }
}

/// Registry value used for the machine-wide write probe.
fn probe_value(identity: &AppIdentity) -> String {
    format!("{}InstallerWriteProbe", identity.short_name)
}

fn can_write_machine_settings(identity: &AppIdentity) -> bool {
    let value = probe_value(identity);
    let written = run_succeeded(
        Command::new("reg").args([
            "add",
            r"HKLM\SOFTWARE",
            "/v",
            &value,
            "/t",
            "REG_SZ",
            "/d",
            "probe",
            "/f",
        ]),
        PROBE_TIMEOUT,
    );
    if written {
        let _ = run_with_timeout(
            Command::new("reg").args(["delete", r"HKLM\SOFTWARE", "/v", &value, "/f"]),
            PROBE_TIMEOUT,
        );
    }
    written
}

pub(super) fn is_elevated_administrator(identity: &AppIdentity) -> bool {
    if !is_administrators_member() {
        debug!("Current user is not a member of the Administrators group");
        return false;
    }
    let writable = can_write_machine_settings(identity);
    if !writable {
        debug!("Administrators member without an elevated token");
    }
    writable
}

/// PowerShell command starting `exe` elevated with `args`.
pub(super) fn elevation_script(exe: &str, args: &[String]) -> String {
    let mut script = format!("Start-Process -FilePath {} -Verb RunAs", ps_quote(exe));
    if !args.is_empty() {
        let list: Vec<String> = args
            .iter()
            .map(|arg| ps_quote(&format!("\"{}\"", arg.replace('"', "\\\""))))
            .collect();
        script.push_str(&format!(" -ArgumentList {}", list.join(",")));
    }
    script
}

pub(super) fn relaunch_elevated(args: &[String]) -> Result<()> {
    let exe = std::env::current_exe()
        .map_err(|e| InstallerError::ElevationFailed(format!("cannot locate the installer: {e}")))?;
    let script = elevation_script(&exe.to_string_lossy(), args);
    info!("Relaunching with administrator rights");
    spawn_detached(Command::new("powershell").args(["-NoProfile", "-Command", &script]))
        .map_err(|e| InstallerError::ElevationFailed(format!("failed to start powershell: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN_GROUPS: &str = "\
GROUP INFORMATION
-----------------

Group Name                             Type             SID          Attributes
====================================== ================ ============ ==================================================
Everyone                               Well-known group S-1-1-0      Mandatory group, Enabled by default, Enabled group
BUILTIN\\Administrators                 Alias            S-1-5-32-544 Group used for deny only
BUILTIN\\Users                          Alias            S-1-5-32-545 Mandatory group, Enabled by default, Enabled group
";

    #[test]
    fn finds_administrators_sid() {
        assert!(lists_administrators(ADMIN_GROUPS));
        assert!(!lists_administrators(&ADMIN_GROUPS.replace("S-1-5-32-544", "S-1-5-32-555")));
        assert!(!lists_administrators("S-1-5-32-5440 Alias"));
    }

    #[test]
    fn elevation_script_quotes_arguments() {
        let script = elevation_script(r"C:\Temp\app installer.exe", &["--portable".into(), r"D:\my stick".into()]);
        assert_eq!(
            script,
            r#"Start-Process -FilePath 'C:\Temp\app installer.exe' -Verb RunAs -ArgumentList '"--portable"','"D:\my stick"'"#
        );
        assert_eq!(
            elevation_script("C:\\i.exe", &[]),
            "Start-Process -FilePath 'C:\\i.exe' -Verb RunAs"
        );
    }
}
