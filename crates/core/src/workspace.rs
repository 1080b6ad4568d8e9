//! The directory tree holding one working directory per service.

use crate::config::{ServiceConfig, Source};
use crate::materialize::materialize;
use crate::service::ServiceName;
use crate::{install, Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task;
use url::Url;

/// Outcome of preparing a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// Source materialized and dependencies installed in this directory.
    Local(PathBuf),
    /// Hosted elsewhere; no local directory.
    External(Url),
}

/// Root directory under which services are materialized.
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at `root`, resolved against the current directory.
    pub fn new(root: &Path) -> Result<Self> {
        Ok(Self {
            root: std::path::absolute(root)?,
        })
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory of `service`.
    pub fn workdir(&self, service: ServiceName) -> PathBuf {
        self.root.join(service.as_str())
    }

    /// Materialize the service's source. Does not install dependencies.
    pub async fn materialize(&self, service: ServiceName, config: &ServiceConfig) -> Result<()> {
        if !config.source.is_external() {
            fs::create_dir_all(&self.root)?;
        }

        let source = config.source.clone();
        let workdir = self.workdir(service);
        // libgit2 blocks; keep it off the runtime threads
        task::spawn_blocking(move || materialize(service, &source, &workdir))
            .await
            .map_err(|e| Error::Other(format!("materialize task failed: {}", e)))?
    }

    /// Materialize the service's source and install its dependencies.
    ///
    /// Externally hosted services only have their stale directory removed.
    pub async fn prepare(&self, service: ServiceName, config: &ServiceConfig) -> Result<Prepared> {
        self.materialize(service, config).await?;

        match &config.source {
            Source::External(url) => Ok(Prepared::External(url.clone())),
            Source::Git(_) | Source::Local(_) => {
                let workdir = self.workdir(service);
                install::install(&workdir).await?;
                Ok(Prepared::Local(workdir))
            }
        }
    }
}
