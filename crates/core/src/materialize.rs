//! Reconcile a service working directory with its configured source.
//!
//! The on-disk state is resolved first. If its kind or target differs from
//! the configuration it is removed, then the directory is cloned, fetched or
//! symlinked as needed. Re-running with an unchanged source leaves the
//! directory in place; git checkouts are still fetched on every run.

use crate::config::{GitSource, Source};
use crate::git::GitCheckout;
use crate::provision::{self, ProvisioningState};
use crate::service::ServiceName;
use crate::Result;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bring `workdir` in line with `source`.
pub fn materialize(service: ServiceName, source: &Source, workdir: &Path) -> Result<()> {
    let state = provision::resolve(workdir)?;
    debug!("[{}] current provisioning state: {:?}", service, state);

    match source {
        Source::External(url) => {
            info!("[{}] hosted at {}, nothing to materialize", service, url);
            provision::remove_entry(workdir)
        }
        Source::Git(git) => materialize_git(service, git, &state, workdir),
        Source::Local(path) => materialize_local(service, path, &state, workdir),
    }
}

fn materialize_git(
    service: ServiceName,
    source: &GitSource,
    state: &ProvisioningState,
    workdir: &Path,
) -> Result<()> {
    let up_to_date = matches!(state, ProvisioningState::ClonedFrom(url) if *url == source.url);

    let checkout = if up_to_date {
        let checkout = GitCheckout::open(workdir)?;
        checkout.fetch_origin()?;
        checkout
    } else {
        if *state != ProvisioningState::Absent {
            info!("[{}] source changed, replacing {:?}", service, workdir);
            provision::remove_entry(workdir)?;
        }
        GitCheckout::clone_remote(&source.url, workdir)?
    };

    checkout.checkout(source.reference.as_deref())
}

fn materialize_local(
    service: ServiceName,
    path: &Path,
    state: &ProvisioningState,
    workdir: &Path,
) -> Result<()> {
    let wanted = std::path::absolute(path)?;

    let up_to_date = match state {
        ProvisioningState::SymlinkedTo(target) => link_target(workdir, target)? == wanted,
        _ => false,
    };
    if up_to_date {
        debug!("[{}] already linked to {:?}", service, wanted);
        return Ok(());
    }

    if *state != ProvisioningState::Absent {
        info!("[{}] source changed, replacing {:?}", service, workdir);
        provision::remove_entry(workdir)?;
    }

    info!("[{}] linking {:?} -> {:?}", service, workdir, wanted);
    symlink(&wanted, workdir)?;
    Ok(())
}

/// Absolute form of a symlink target, relative targets being taken from the link's parent.
fn link_target(link: &Path, target: &Path) -> Result<PathBuf> {
    let target = match link.parent() {
        Some(parent) if target.is_relative() => parent.join(target),
        _ => target.to_path_buf(),
    };
    Ok(std::path::absolute(target)?)
}
