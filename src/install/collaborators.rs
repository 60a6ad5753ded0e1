//! Narrow interfaces to the services the installer consumes: text lookup and
//! resource extraction.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use once_cell::sync::Lazy;

/// Key to user-facing text, with `{0}`, `{1}`... positional arguments.
pub trait Translate: Send + Sync {
    fn translate(&self, key: &str, args: &[&str]) -> String;
}

static ENGLISH: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "privilege.required",
            "Administrator / root privileges are required to install this program.\n\
             Without them the program can only be installed portable, or on Windows for the current user.",
        ),
        (
            "privilege.restart",
            "If you own these privileges the installer can restart itself with them.\n\
             Restart with administrator privileges (Y/N)? ",
        ),
        ("privilege.relaunched", "The installer was restarted with elevated privileges."),
        ("install.start", "Installing {0} version {1}"),
        ("install.platform", "Detected platform: {0}"),
        ("install.portable", "Installing portable into {0}"),
        ("install.user_unsupported", "A user installation is only available on Windows"),
        ("install.copy", "Copying {0} to {1}"),
        ("install.integrating", "Registering {0} with the operating system"),
        ("install.success", "Installation of {0} completed successfully"),
        ("install.failed", "Installation failed ({0}): {1}"),
        ("download.start", "Downloading {0}"),
        ("download.done", "Download completed"),
        ("download.auth", "{0} requires a username and password"),
    ])
});

/// Built-in English catalog. Unknown keys translate to themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishCatalog;

impl Translate for EnglishCatalog {
    fn translate(&self, key: &str, args: &[&str]) -> String {
        let Some(template) = ENGLISH.get(key) else {
            debug!("No translation for '{key}'");
            return key.to_string();
        };
        substitute_args(template, args)
    }
}

/// Replace `{N}` with `args[N]` in one pass. Unknown indices stay literal.
fn substitute_args(template: &str, args: &[&str]) -> String {
    let mut text = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let arg = after.find('}').and_then(|close| {
            let index: usize = after[..close].parse().ok()?;
            args.get(index).map(|arg| (*arg, close))
        });
        match arg {
            Some((arg, close)) => {
                text.push_str(arg);
                rest = &after[close + 1..];
            }
            None => {
                text.push('{');
                rest = after;
            }
        }
    }
    text.push_str(rest);
    text
}

/// Copies files bundled with the application to the file system.
pub trait ResourceExtractor: Send + Sync {
    /// Returns whether `dest` was written.
    fn copy(&self, path_in_archive: &str, dest: &Path) -> bool;
}

/// Reads resources from the installed zip / jar archive.
#[derive(Debug, Clone)]
pub struct ArchiveResources {
    archive: PathBuf,
}

impl ArchiveResources {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
        }
    }

    fn extract(&self, path_in_archive: &str, dest: &Path) -> io::Result<()> {
        let file = fs::File::open(&self.archive)?;
        let mut archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
        let mut entry = archive
            .by_name(path_in_archive.trim_start_matches('/'))
            .map_err(io::Error::other)?;
        create_parent(dest)?;
        let mut out = fs::File::create(dest)?;
        io::copy(&mut entry, &mut out)?;
        Ok(())
    }
}

impl ResourceExtractor for ArchiveResources {
    fn copy(&self, path_in_archive: &str, dest: &Path) -> bool {
        match self.extract(path_in_archive, dest) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to extract '{path_in_archive}' from {} to {}: {e}",
                    self.archive.display(),
                    dest.display()
                );
                false
            }
        }
    }
}

/// Serves resources from a plain directory.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceExtractor for DirectoryResources {
    fn copy(&self, path_in_archive: &str, dest: &Path) -> bool {
        let source = self.root.join(path_in_archive.trim_start_matches('/'));
        let result = create_parent(dest).and_then(|()| fs::copy(&source, dest));
        match result {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to copy {} to {}: {e}", source.display(), dest.display());
                false
            }
        }
    }
}

fn create_parent(dest: &Path) -> io::Result<()> {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
