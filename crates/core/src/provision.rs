//! Classification of a service working directory as found on disk.

use crate::git::GitCheckout;
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a service working directory currently came to exist.
///
/// Always computed from the filesystem; it can change out-of-band between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningState {
    /// Nothing exists at the path.
    Absent,
    /// The path is a symlink; holds its literal target.
    SymlinkedTo(PathBuf),
    /// The path is a git checkout; holds the `origin` remote URL.
    ClonedFrom(String),
}

/// Inspect `path` and report how it was provisioned.
///
/// Anything that is neither a symlink nor a git working directory is an
/// error. It is never removed automatically.
pub fn resolve(path: &Path) -> Result<ProvisioningState> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ProvisioningState::Absent),
        Err(e) => return Err(e.into()),
    };

    if metadata.file_type().is_symlink() {
        return Ok(ProvisioningState::SymlinkedTo(fs::read_link(path)?));
    }

    if !metadata.is_dir() {
        return Err(Error::InvalidProvisioningState {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let checkout = GitCheckout::open(path)?;
    Ok(ProvisioningState::ClonedFrom(checkout.origin_url()?))
}

/// Remove whatever is at `path`: a symlink is unlinked, a directory removed recursively.
pub fn remove_entry(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    debug!("Removing existing service directory at {:?}", path);
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}
