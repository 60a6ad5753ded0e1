//! Interactive questions asked during installation.

use std::io::{self, BufRead, BufReader, IsTerminal, Read};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, bounded};
use log::debug;

use crate::config::Credentials;
use crate::error::{InstallerError, Result};

/// Source of user answers. Tests substitute a scripted implementation.
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question. `Ok(false)` covers both "no" and no answer
    /// within `timeout`.
    fn confirm(&self, question: &str, timeout: Duration) -> io::Result<bool>;

    /// Ask for basic-auth credentials for `url`.
    fn credentials(&self, url: &str, message: &str) -> Result<Credentials>;
}

/// Reads answers from the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str, timeout: Duration) -> io::Result<bool> {
        eprint!("{question}");
        read_answer(io::stdin(), timeout)
    }

    fn credentials(&self, url: &str, message: &str) -> Result<Credentials> {
        let auth_error = |reason: String| InstallerError::AuthFailure {
            url: url.to_string(),
            reason,
        };
        if !io::stdin().is_terminal() {
            return Err(auth_error("credentials required but no terminal is attached".into()));
        }
        eprintln!("{message}");
        let username = inquire::Text::new("Username:")
            .prompt()
            .map_err(|e| auth_error(format!("reading the username failed: {e}")))?;
        let password = inquire::Password::new("Password:")
            .without_confirmation()
            .prompt()
            .map_err(|e| auth_error(format!("reading the password failed: {e}")))?;
        Ok(Credentials { username, password })
    }
}

/// Whether a typed answer means "yes".
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim_start().to_lowercase().starts_with('y')
}

/// Read one line from `reader`, giving up after `timeout`.
///
/// The reader thread is left behind on timeout. It stays blocked on its input
/// until the process exits.
pub fn read_answer<R>(reader: R, timeout: Duration) -> io::Result<bool>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name("prompt-reader".into())
        .spawn(move || {
            let mut line = String::new();
            let result = BufReader::new(reader).read_line(&mut line).map(|_| line);
            let _ = tx.send(result);
        })?;

    match rx.recv_timeout(timeout) {
        Ok(answer) => Ok(is_affirmative(&answer?)),
        Err(RecvTimeoutError::Timeout) => {
            debug!("No answer within {timeout:?}, assuming no");
            eprintln!();
            Ok(false)
        }
        Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "prompt reader stopped without an answer",
        )),
    }
}
