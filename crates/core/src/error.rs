//! Error types for the privacypass-config core library.

use crate::service::ServiceName;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Core error type for provisioning and lifecycle operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A service entry does not declare exactly one source, or a field is malformed.
    #[error("[{service}] invalid service configuration: {reason}")]
    InvalidServiceConfig { service: String, reason: String },

    /// The service directory exists but is neither a symlink nor a git checkout.
    #[error("Unrecognized contents at {}: {reason}", path.display())]
    InvalidProvisioningState { path: PathBuf, reason: String },

    /// `deploy` was requested for a service without a `deploy` section.
    #[error("[{0}] should define a 'deploy' section")]
    MissingDeployConfig(ServiceName),

    /// `test` was requested for a service without a `test` section.
    #[error("[{0}] should define a 'test' section")]
    MissingTestConfig(ServiceName),

    /// Service name is not one of the known services.
    #[error("Unknown service '{0}' (expected one of: attester, issuer, origin)")]
    UnknownService(String),

    /// Service is known but absent from the configuration file.
    #[error("[{0}] is not declared in the configuration")]
    ServiceNotConfigured(ServiceName),

    /// End-to-end test command exited unsuccessfully.
    #[error("[{0}] end-to-end test failed")]
    E2ETestFailed(ServiceName),

    /// A subprocess exited with a non-zero status.
    #[error("Command `{command}` failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },

    /// A required executable is not on PATH.
    #[error("{0} not found on PATH. Install Node.js (https://nodejs.org) to get npm and npx.")]
    ToolNotFound(String),

    /// Configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// A dotenv file could not be read or parsed.
    #[error("Failed to load env file {}: {reason}", path.display())]
    EnvFile { path: PathBuf, reason: String },

    /// Git operation failed.
    #[error("Git operation failed: {0}")]
    GitError(#[from] git2::Error),

    /// IO operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing failed.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
