use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Install the packaged application on this machine")]
pub struct Args {
    /// Installation manifest (TOML)
    #[arg(long, short = 'c', default_value = "install.toml")]
    pub config: PathBuf,

    /// Install portable into this directory
    #[arg(long, value_name = "DIR")]
    pub portable: Option<PathBuf>,

    /// Install for the current user only (Windows)
    #[arg(long, conflicts_with = "portable")]
    pub user: bool,

    /// Install from a local file instead of downloading
    #[arg(long, value_name = "FILE")]
    pub offline: Option<PathBuf>,

    /// No prompts and no progress output
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Verbose logging with full error details
    #[arg(long)]
    pub debug: bool,

    /// Leave running instances of the program alone
    #[arg(long)]
    pub no_kill: bool,
}

impl Args {
    /// Arguments to hand to an elevated copy of the installer. The manifest
    /// path is made absolute because the copy may start in another directory.
    pub fn relaunch_args(&self) -> Vec<String> {
        let mut args = vec![
            "--config".to_string(),
            absolute(&self.config).to_string_lossy().into_owned(),
        ];
        if let Some(dir) = &self.portable {
            args.push("--portable".into());
            args.push(absolute(dir).to_string_lossy().into_owned());
        }
        if self.user {
            args.push("--user".into());
        }
        if let Some(file) = &self.offline {
            args.push("--offline".into());
            args.push(absolute(file).to_string_lossy().into_owned());
        }
        if self.debug {
            args.push("--debug".into());
        }
        if self.no_kill {
            args.push("--no-kill".into());
        }
        args
    }
}

fn absolute(path: &std::path::Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
