//! Starting the long-running development servers.
//!
//! Each service reads the resolved URLs of its peers at startup, so the
//! arguments differ per service. Servers run detached in their own process
//! group with output forwarded live; they are registered in
//! [`RunningServices`] and never awaited here.

use crate::deployment::{Deployments, PRIVATE_TOKEN_ISSUER_DIRECTORY, TOKEN_REQUEST_PATH};
use crate::process::{self, RunningServices};
use crate::service::ServiceName;
use crate::Result;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Package manager used to run the services.
pub const PACKAGE_MANAGER: &str = "npm";

/// Delay between starting the issuer and asking it to rotate keys.
pub const ISSUER_WARMUP: Duration = Duration::from_secs(5);

/// Path of the issuer's administrative key-rotation endpoint.
pub const ROTATE_PATH: &str = "/admin/rotate";

/// Arguments passed to `npm` to run `service` in development mode.
pub fn dev_args(service: ServiceName, deployments: &Deployments) -> Vec<String> {
    let own = deployments.get(service);
    let issuer = deployments.get(ServiceName::Issuer);

    let mut args: Vec<String> = ["run", "dev", "--", "--port"]
        .into_iter()
        .map(String::from)
        .collect();
    args.push(own.port.to_string());

    let vars = match service {
        ServiceName::Attester => vec![
            format!(
                "ISSUER_DIRECTORY_URL:{}",
                issuer.endpoint(PRIVATE_TOKEN_ISSUER_DIRECTORY)
            ),
            format!("ISSUER_REQUEST_URL:{}", issuer.endpoint(TOKEN_REQUEST_PATH)),
        ],
        ServiceName::Issuer => Vec::new(),
        ServiceName::Origin => vec![
            format!("ISSUER_URL:{}", issuer.base_url()),
            format!("ORIGIN_NAME:{}", own.host()),
        ],
    };
    for var in vars {
        args.push("--var".to_string());
        args.push(var);
    }
    args
}

/// Start `service` from `workdir` and register it. Returns its process group id.
///
/// For the issuer this waits [`ISSUER_WARMUP`] and then triggers key rotation
/// without waiting for the response.
pub async fn start(
    service: ServiceName,
    deployments: &Deployments,
    workdir: &Path,
    running: &RunningServices,
) -> Result<u32> {
    launch(PACKAGE_MANAGER, ISSUER_WARMUP, service, deployments, workdir, running).await
}

async fn launch(
    program: &str,
    warmup: Duration,
    service: ServiceName,
    deployments: &Deployments,
    workdir: &Path,
    running: &RunningServices,
) -> Result<u32> {
    info!("Service {}: initialisation", service);
    process::ensure_tool(program)?;

    let mut cmd = Command::new(program);
    cmd.args(dev_args(service, deployments))
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .process_group(0);
    debug!("Spawning `{}` in {:?}", process::describe(&cmd), workdir);

    let child = cmd.spawn()?;
    let pgid = running.register(service, child)?;

    if service == ServiceName::Issuer {
        tokio::time::sleep(warmup).await;
        trigger_key_rotation(deployments.get(ServiceName::Issuer).endpoint(ROTATE_PATH));
    }

    info!("Service {}: initialised", service);
    Ok(pgid)
}

/// Fire-and-forget `POST` to the issuer's rotation endpoint.
///
/// Not retried; the outcome is only logged. The handle is returned for
/// callers that want to observe completion, and may be dropped.
pub fn trigger_key_rotation(url: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        match reqwest::Client::new().post(&url).send().await {
            Ok(resp) => debug!("Key rotation request to {} returned {}", url, resp.status()),
            Err(e) => debug!("Key rotation request to {} failed: {}", url, e),
        }
    })
}
