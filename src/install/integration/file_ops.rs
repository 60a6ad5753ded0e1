//! Atomic file placement.
//!
//! Every generated artifact and the installed program itself are written to a
//! sibling temporary file first and renamed into place, so an interrupted
//! install never leaves a half-written file behind.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use log::debug;

fn temp_sibling(path: &Path) -> io::Result<tempfile::NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".app-installer-")
        .tempfile_in(dir)
}

/// Write `content` to `path` atomically.
pub fn write_file_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut temp = temp_sibling(path)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Copy `from` to `to` atomically.
pub fn copy_file_atomic(from: &Path, to: &Path) -> io::Result<u64> {
    let mut source = fs::File::open(from)?;
    let mut temp = temp_sibling(to)?;
    let copied = io::copy(&mut source, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(to).map_err(|e| e.error)?;
    debug!("Copied {} bytes from {} to {}", copied, from.display(), to.display());
    Ok(copied)
}

/// Set unix permission bits. No-op elsewhere.
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

/// Write an executable script.
pub fn write_script(path: &Path, content: &str) -> io::Result<()> {
    write_file_atomic(path, content.as_bytes())?;
    set_mode(path, 0o755)
}
