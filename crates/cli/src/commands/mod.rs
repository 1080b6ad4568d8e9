pub mod deploy;
pub mod dev;
pub mod e2e;

use clap::{Parser, Subcommand, ValueEnum};
use privacypass_config_core::config::DEFAULT_CONFIG_FILE;
use privacypass_config_core::ServiceName;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "privacypass-config")]
#[command(
    author,
    version,
    about = "Orchestrate the development and deployment of Privacy Pass services",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start development server
    Dev(DevArgs),

    /// Deploy the application
    Deploy(ServiceArgs),

    /// Test the application end-to-end
    Test(ServiceArgs),
}

#[derive(Parser)]
pub struct DevArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

#[derive(Parser)]
pub struct ServiceArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Name of the service(s) to act on. By default, all services
    #[arg(long = "service", value_name = "NAME", value_enum, num_args = 1..)]
    pub services: Vec<ServiceArg>,
}

impl ServiceArgs {
    /// Requested services in the order given, or every known service.
    pub fn selected(&self) -> Vec<ServiceName> {
        if self.services.is_empty() {
            return ServiceName::ALL.to_vec();
        }
        let mut selected = Vec::new();
        for service in &self.services {
            let name = ServiceName::from(*service);
            if !selected.contains(&name) {
                selected.push(name);
            }
        }
        selected
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServiceArg {
    Attester,
    Issuer,
    Origin,
}

impl From<ServiceArg> for ServiceName {
    fn from(arg: ServiceArg) -> Self {
        match arg {
            ServiceArg::Attester => ServiceName::Attester,
            ServiceArg::Issuer => ServiceName::Issuer,
            ServiceArg::Origin => ServiceName::Origin,
        }
    }
}
