//! Subprocess helpers and the registry of running services.

use crate::service::ServiceName;
use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Check that `tool` is on PATH.
pub fn ensure_tool(tool: &str) -> Result<PathBuf> {
    which::which(tool).map_err(|_| Error::ToolNotFound(tool.to_string()))
}

/// Human-readable form of a command, for logs and errors.
pub fn describe(cmd: &Command) -> String {
    let cmd = cmd.as_std();
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `cmd` to completion with its output forwarded to ours.
pub async fn run_forwarded(mut cmd: Command) -> Result<ExitStatus> {
    let command = describe(&cmd);
    debug!("Running `{}`", command);

    let status = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await?;
    Ok(status)
}

/// Run `cmd` with forwarded output; a non-zero exit is an error.
pub async fn run_checked(cmd: Command) -> Result<()> {
    let command = describe(&cmd);
    let status = run_forwarded(cmd).await?;
    if !status.success() {
        return Err(Error::CommandFailed { command, status });
    }
    Ok(())
}

/// A long-running service process, leader of its own process group.
#[derive(Debug)]
pub struct RunningService {
    /// Process group id (equal to the leader's pid)
    pub pgid: u32,
    pub child: Child,
}

/// Services started by one command invocation.
///
/// Written by the lifecycle runner and read by the shutdown path, both from
/// the command's own task.
#[derive(Debug, Default)]
pub struct RunningServices {
    services: RefCell<BTreeMap<ServiceName, RunningService>>,
}

impl RunningServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly spawned service. Returns its process group id.
    pub fn register(&self, name: ServiceName, child: Child) -> Result<u32> {
        let pgid = child
            .id()
            .ok_or_else(|| Error::Other(format!("[{}] exited before it could be tracked", name)))?;
        self.services
            .borrow_mut()
            .insert(name, RunningService { pgid, child });
        Ok(pgid)
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self, name: ServiceName) -> bool {
        self.services.borrow().contains_key(&name)
    }

    /// Get names of all registered services.
    #[cfg(test)]
    pub(crate) fn running_services(&self) -> Vec<ServiceName> {
        self.services.borrow().keys().copied().collect()
    }

    #[cfg(test)]
    pub(crate) fn pgid(&self, name: ServiceName) -> Option<u32> {
        self.services.borrow().get(&name).map(|service| service.pgid)
    }

    /// Remove a service from the registry, handing back its process.
    #[cfg(test)]
    pub(crate) fn take(&self, name: ServiceName) -> Option<RunningService> {
        self.services.borrow_mut().remove(&name)
    }

    /// Send SIGTERM to every registered process group.
    ///
    /// Services never started are skipped. Returns the services signalled.
    pub fn terminate_all(&self) -> Vec<ServiceName> {
        let services = self.services.borrow();
        let mut signalled = Vec::new();

        for name in ServiceName::ALL {
            let Some(service) = services.get(&name) else {
                continue;
            };
            if kill_group(service.pgid) {
                info!("[{}] sent SIGTERM to process group {}", name, service.pgid);
                signalled.push(name);
            } else {
                warn!(
                    "[{}] failed to signal process group {}: {}",
                    name,
                    service.pgid,
                    std::io::Error::last_os_error()
                );
            }
        }

        signalled
    }
}

/// Send SIGTERM to a process group.
fn kill_group(pgid: u32) -> bool {
    unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGTERM) == 0 }
}
