//! File system-related utilities.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::Error;

/// Canonicalize the given path if it exists. If it does not exist, returns
/// `Ok(None)`.
pub fn maybe_canonicalize<P>(path: P) -> Result<Option<PathBuf>, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if path.exists() {
        let canonical = path
            .canonicalize()
            .map_err(|e| Error::Io(format!("while canonicalizing {}", path.display()), e))?;
        Ok(Some(canonical))
    } else {
        Ok(None)
    }
}

/// Creates the parent directory of the given path, if necessary.
pub fn ensure_parent_path_exists(path: &Path) -> Result<(), Error> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_path_exists(parent),
        _ => Ok(()),
    }
}

/// Creates the given directory (and all of its parents), if necessary.
pub fn ensure_path_exists(path: &Path) -> Result<(), Error> {
    if !path.is_dir() {
        fs::create_dir_all(path)
            .map_err(|e| Error::Io(format!("while creating {}", path.display()), e))?;
        debug!("Created path: {}", path.display());
    }
    Ok(())
}
