//! Systemd control operations.
//!
//! Each call carries a timeout; failures are reported back to the caller,
//! which treats them as warnings.

use std::process::Command;
use std::time::Duration;

use crate::error::{InstallerError, Result};
use crate::install::process::run_with_timeout;

const SYSTEMCTL_TIMEOUT: Duration = Duration::from_secs(30);

fn systemctl(args: &[&str]) -> Result<()> {
    let output = run_with_timeout(Command::new("systemctl").args(args), SYSTEMCTL_TIMEOUT)
        .ok_or_else(|| {
            InstallerError::artifact("systemd unit", format!("systemctl {} did not run", args.join(" ")))
        })?;

    if !output.status.success() {
        return Err(InstallerError::artifact(
            "systemd unit",
            format!(
                "systemctl {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    Ok(())
}

/// Reload unit files
pub(super) fn reload_systemd_daemon() -> Result<()> {
    systemctl(&["daemon-reload"])
}

/// Start the systemd service
pub(super) fn start_systemd_service(unit: &str) -> Result<()> {
    systemctl(&["start", unit])
}

/// Enable the service at boot
pub(super) fn enable_systemd_service(unit: &str) -> Result<()> {
    systemctl(&["enable", unit])
}
