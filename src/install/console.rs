//! Colored status lines on the terminal.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Writes user-facing status lines. Quiet mode suppresses everything but
/// failures.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    quiet: bool,
}

impl Console {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn line(&self, color: Option<Color>, bold: bool, text: &str) {
        let mut stdout = StandardStream::stdout(ColorChoice::Auto);
        let _ = stdout.set_color(ColorSpec::new().set_fg(color).set_bold(bold));
        let _ = writeln!(stdout, "{text}");
        let _ = stdout.reset();
    }

    pub fn info(&self, text: &str) {
        if !self.quiet {
            self.line(None, false, text);
        }
    }

    pub fn stage(&self, text: &str) {
        if !self.quiet {
            self.line(Some(Color::Cyan), false, text);
        }
    }

    pub fn warn(&self, text: &str) {
        if !self.quiet {
            self.line(Some(Color::Yellow), false, text);
        }
    }

    pub fn success(&self, text: &str) {
        if !self.quiet {
            self.line(Some(Color::Green), true, text);
        }
    }

    pub fn failure(&self, text: &str) {
        let mut stderr = StandardStream::stderr(ColorChoice::Auto);
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = writeln!(stderr, "{text}");
        let _ = stderr.reset();
    }
}
