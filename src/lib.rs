//! Cross-platform application installer.
//!
//! Installs a packaged application system-wide, for the current user
//! (Windows) or portable into a directory of the caller's choice. It fetches
//! the artifact, copies it into place and writes the launcher, desktop
//! entries, service unit, uninstaller and registry records the host expects.
//!
//! ```no_run
//! use app_installer::config::{DownloadSpec, InstallConfig};
//!
//! # async fn run() {
//! let config = InstallConfig::builder("Acme", "2.1", "notes", "Acme Notes")
//!     .download(DownloadSpec {
//!         url: "https://downloads.example.com/notes.jar".into(),
//!         versioned_ending: None,
//!         credentials: None,
//!         prompt_for_credentials: true,
//!     })
//!     .build();
//! let outcome = app_installer::install::install(config).await;
//! std::process::exit(outcome.code());
//! # }
//! ```

pub mod config;
pub mod error;
pub mod install;

pub use config::{InstallConfig, InstallConfigBuilder, InstallManifest};
pub use error::{InstallerError, Result};
pub use install::{InstallOrchestrator, InstallOutcome, InstallStage};
