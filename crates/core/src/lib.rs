//! privacypass-config core library
//!
//! Provisioning and lifecycle management for the attester, issuer and origin
//! services of a Privacy Pass deployment: materializing each service's source
//! on disk, resolving the ports and URLs services use to reach each other,
//! and running, deploying and testing them.

pub mod config;
pub mod deploy;
pub mod deployment;
pub mod e2e;
pub mod error;
pub mod git;
pub mod install;
pub mod lifecycle;
pub mod materialize;
pub mod process;
pub mod provision;
pub mod service;
pub mod shutdown;
pub mod workspace;

// Re-exports for convenience
pub use config::{AppConfig, ServiceConfig, Source};
pub use deploy::DeployPlan;
pub use deployment::{Deployments, ResolvedDeployment};
pub use e2e::TestPlan;
pub use error::{Error, Result};
pub use process::RunningServices;
pub use provision::ProvisioningState;
pub use service::ServiceName;
pub use workspace::{Prepared, Workspace};
