//! Running a service's end-to-end test suite against a deployed hostname.

use crate::config::ServiceConfig;
use crate::lifecycle::PACKAGE_MANAGER;
use crate::process;
use crate::service::ServiceName;
use crate::{Error, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

/// Validated end-to-end test invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    pub service: ServiceName,
    /// Runner invoked with `args`, `npm` unless overridden
    pub program: String,
    /// `None` when the service has no suite.
    pub args: Option<Vec<String>>,
}

impl TestPlan {
    /// Check the `deploy` and `test` sections and build the test invocation.
    ///
    /// Only the issuer ships an end-to-end suite.
    pub fn new(service: ServiceName, config: &ServiceConfig) -> Result<Self> {
        if config.deploy.is_none() {
            return Err(Error::MissingDeployConfig(service));
        }
        let test = config
            .test
            .as_ref()
            .ok_or(Error::MissingTestConfig(service))?;

        if service != ServiceName::Issuer {
            return Ok(Self {
                service,
                program: PACKAGE_MANAGER.to_string(),
                args: None,
            });
        }

        let mut args: Vec<String> = ["run", "test:e2e", "--"].map(String::from).to_vec();
        if let Some(tls) = &test.tls_config {
            args.push("--cert".to_string());
            args.push(std::path::absolute(&tls.cert)?.display().to_string());
            args.push("--key".to_string());
            args.push(std::path::absolute(&tls.key)?.display().to_string());
        }
        args.push(test.hostname.clone());

        Ok(Self {
            service,
            program: PACKAGE_MANAGER.to_string(),
            args: Some(args),
        })
    }

    /// Run the suite in `workdir`. A failing suite is [`Error::E2ETestFailed`].
    pub async fn run(&self, workdir: &Path) -> Result<()> {
        let Some(args) = &self.args else {
            warn!("[{}] does not support end-to-end test.", self.service);
            return Ok(());
        };
        process::ensure_tool(&self.program)?;

        info!("[{}] running end-to-end tests from {:?}", self.service, workdir);
        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(workdir);

        let status = process::run_forwarded(cmd).await?;
        if !status.success() {
            return Err(Error::E2ETestFailed(self.service));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployConfig, Source, TestConfig, TlsConfig};
    use crate::process::test_support::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn service_config(with_deploy: bool, test: Option<TestConfig>) -> ServiceConfig {
        ServiceConfig {
            source: Source::Local(PathBuf::from("../issuer")),
            port: None,
            deploy: with_deploy.then(|| DeployConfig {
                wrangler: PathBuf::from("wrangler.toml"),
                environment: None,
                env_file: None,
                immediate_deployment: None,
            }),
            test,
        }
    }

    fn test_config(tls: Option<TlsConfig>) -> TestConfig {
        TestConfig {
            hostname: "issuer.example.com".to_string(),
            tls_config: tls,
        }
    }

    #[test]
    fn test_requires_deploy_section() {
        let config = service_config(false, Some(test_config(None)));
        let err = TestPlan::new(ServiceName::Issuer, &config).unwrap_err();
        assert!(matches!(err, Error::MissingDeployConfig(ServiceName::Issuer)));
    }

    #[test]
    fn test_requires_test_section() {
        let config = service_config(true, None);
        let err = TestPlan::new(ServiceName::Issuer, &config).unwrap_err();
        assert!(matches!(err, Error::MissingTestConfig(ServiceName::Issuer)));
    }

    #[test]
    fn test_issuer_args_without_tls() {
        let config = service_config(true, Some(test_config(None)));
        let plan = TestPlan::new(ServiceName::Issuer, &config).unwrap();
        assert_eq!(
            plan.args.unwrap(),
            vec!["run", "test:e2e", "--", "issuer.example.com"]
        );
    }

    #[test]
    fn test_issuer_args_with_tls_are_absolute() {
        let config = service_config(
            true,
            Some(test_config(Some(TlsConfig {
                key: PathBuf::from("certs/client.key"),
                cert: PathBuf::from("certs/client.crt"),
            }))),
        );
        let args = TestPlan::new(ServiceName::Issuer, &config).unwrap().args.unwrap();

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(args[3], "--cert");
        assert_eq!(args[4], cwd.join("certs/client.crt").display().to_string());
        assert_eq!(args[5], "--key");
        assert_eq!(args[6], cwd.join("certs/client.key").display().to_string());
        assert_eq!(args[7], "issuer.example.com");
    }

    #[tokio::test]
    async fn test_other_services_are_skipped() {
        let config = service_config(true, Some(test_config(None)));
        let plan = TestPlan::new(ServiceName::Origin, &config).unwrap();
        assert_eq!(plan.args, None);
        plan.run(Path::new("/nonexistent")).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_passes_hostname_to_suite() {
        let temp_dir = TempDir::new().unwrap();
        let record = temp_dir.path().join("record");
        let npm = write_script(temp_dir.path(), "npm", &record_invocation(&record));

        let config = service_config(true, Some(test_config(None)));
        let mut plan = TestPlan::new(ServiceName::Issuer, &config).unwrap();
        plan.program = npm.display().to_string();
        plan.run(temp_dir.path()).await.unwrap();

        let content = fs::read_to_string(&record).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(PathBuf::from(lines[0]), temp_dir.path().canonicalize().unwrap());
        assert_eq!(&lines[1..], ["run", "test:e2e", "--", "issuer.example.com"]);
    }

    #[tokio::test]
    async fn test_failing_suite_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let npm = write_script(temp_dir.path(), "npm", "exit 1");

        let config = service_config(true, Some(test_config(None)));
        let mut plan = TestPlan::new(ServiceName::Issuer, &config).unwrap();
        plan.program = npm.display().to_string();

        let err = plan.run(temp_dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::E2ETestFailed(ServiceName::Issuer)));
    }
}
