//! Synchronous subprocess execution with a deadline.

use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Run `command` to completion, killing it once `timeout` elapses.
///
/// Spawn failures and timeouts are logged and yield `None`, callers treat
/// that as "feature unavailable".
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Option<Output> {
    let description = format!("{command:?}");
    let mut child = match command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to run {description}: {e}");
            return None;
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() >= deadline => {
                warn!("{description} did not finish within {timeout:?}, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!("Failed to wait for {description}: {e}");
                return None;
            }
        }
    }

    match child.wait_with_output() {
        Ok(output) => {
            if !output.status.success() {
                debug!(
                    "{description} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Some(output)
        }
        Err(e) => {
            warn!("Failed to collect output of {description}: {e}");
            None
        }
    }
}

/// Run and report whether the command exited successfully.
pub fn run_succeeded(command: &mut Command, timeout: Duration) -> bool {
    run_with_timeout(command, timeout).is_some_and(|output| output.status.success())
}

/// First non-empty stdout line of a successful run.
pub fn first_line(command: &mut Command, timeout: Duration) -> Option<String> {
    let output = run_with_timeout(command, timeout)?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Start a process without waiting for it.
pub fn spawn_detached(command: &mut Command) -> std::io::Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn collects_output() {
        let line = first_line(
            Command::new("sh").args(["-c", "echo; echo hello; echo world"]),
            Duration::from_secs(5),
        );
        assert_eq!(line.as_deref(), Some("hello"));
    }

    #[test]
    fn kills_on_timeout() {
        let started = Instant::now();
        let output = run_with_timeout(
            Command::new("sh").args(["-c", "sleep 5"]),
            Duration::from_millis(200),
        );
        assert!(output.is_none());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_unavailable() {
        assert!(run_with_timeout(
            &mut Command::new("definitely-not-an-installed-program"),
            Duration::from_secs(1)
        )
        .is_none());
    }

    #[test]
    fn failing_command_is_not_success() {
        assert!(!run_succeeded(
            Command::new("sh").args(["-c", "exit 3"]),
            Duration::from_secs(5)
        ));
        assert!(first_line(Command::new("sh").args(["-c", "echo x; exit 1"]), Duration::from_secs(5)).is_none());
    }
}
