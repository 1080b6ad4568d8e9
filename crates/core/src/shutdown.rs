//! Stopping every started service when the orchestrator is interrupted.

use crate::process::RunningServices;
use crate::service::ServiceName;
use tokio::signal;
use tracing::{error, info};

/// Resolve once Ctrl+C or SIGTERM is received.
pub async fn interrupted() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C");
        }
        () = terminate => {
            info!("Received SIGTERM");
        }
    }
}

/// Signal every registered process group. No draining, no timeout.
pub fn shutdown(running: &RunningServices) -> Vec<ServiceName> {
    let signalled = running.terminate_all();
    info!("Stopped {} service(s)", signalled.len());
    signalled
}
