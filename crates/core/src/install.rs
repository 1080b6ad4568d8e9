//! Installing a service's runtime dependencies.

use crate::lifecycle::PACKAGE_MANAGER;
use crate::process;
use crate::Result;
use std::path::Path;
use tokio::process::Command;
use tracing::info;

/// Run `npm install` in `workdir`. Failure is returned as-is, never retried.
pub async fn install(workdir: &Path) -> Result<()> {
    install_with(PACKAGE_MANAGER, workdir).await
}

pub(crate) async fn install_with(program: &str, workdir: &Path) -> Result<()> {
    process::ensure_tool(program)?;

    info!("Installing dependencies in {:?}", workdir);
    let mut cmd = Command::new(program);
    cmd.arg("install").current_dir(workdir);
    process::run_checked(cmd).await
}
