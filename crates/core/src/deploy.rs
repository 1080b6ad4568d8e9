//! Pushing a service to Cloudflare Workers with wrangler.

use crate::config::ServiceConfig;
use crate::process;
use crate::provision;
use crate::service::ServiceName;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Runner used to invoke wrangler.
pub const DEPLOY_TOOL: &str = "npx";

/// Name of the wrangler configuration inside a service working directory.
pub const WRANGLER_CONFIG_FILE: &str = "wrangler.toml";

/// Env file variable holding the cron schedule for key rotation.
pub const ROTATION_CRON_VAR: &str = "ROTATION_CRON_STRING";

/// Everything needed to deploy one service, resolved before any subprocess runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub service: ServiceName,
    /// Absolute path of the wrangler configuration to link into the working directory
    pub wrangler_config: PathBuf,
    /// Variables merged over the ambient environment
    pub env: BTreeMap<String, String>,
    /// Runner invoked with `args`, `npx` unless overridden
    pub program: String,
    pub args: Vec<String>,
}

impl DeployPlan {
    /// Validate the `deploy` section and build the wrangler invocation.
    pub fn new(service: ServiceName, config: &ServiceConfig) -> Result<Self> {
        let deploy = config
            .deploy
            .as_ref()
            .ok_or(Error::MissingDeployConfig(service))?;

        let env = match &deploy.env_file {
            Some(path) => load_env_file(path)?,
            None => BTreeMap::new(),
        };

        let mut args = vec!["wrangler".to_string()];
        if deploy.immediate() {
            args.push("deploy".to_string());
        } else {
            args.extend(["versions", "upload", "--experimental-versions"].map(String::from));
        }
        args.push("--config".to_string());
        args.push(format!("./{}", WRANGLER_CONFIG_FILE));
        if let Some(environment) = &deploy.environment {
            args.push("--env".to_string());
            args.push(environment.clone());
        }
        if let Some(cron) = env.get(ROTATION_CRON_VAR).filter(|cron| !cron.is_empty()) {
            args.push("--triggers".to_string());
            args.push(cron.clone());
        }

        Ok(Self {
            service,
            wrangler_config: std::path::absolute(&deploy.wrangler)?,
            env,
            program: DEPLOY_TOOL.to_string(),
            args,
        })
    }

    /// Link the wrangler configuration into `workdir` and run the deployment.
    pub async fn run(&self, workdir: &Path) -> Result<()> {
        process::ensure_tool(&self.program)?;

        link_file(&self.wrangler_config, &workdir.join(WRANGLER_CONFIG_FILE))?;
        info!("[{}] deploying from {:?}", self.service, workdir);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env).current_dir(workdir);
        process::run_checked(cmd).await
    }
}

/// Load variables from a dotenv file.
///
/// Values are taken literally: `$NAME` is not expanded.
pub fn load_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let env_file_error = |reason: String| Error::EnvFile {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read_to_string(path).map_err(|e| env_file_error(e.to_string()))?;
    let env = dotenv_parser::parse_dotenv(&content).map_err(|e| env_file_error(e.to_string()))?;
    debug!("Loaded {} variable(s) from {:?}", env.len(), path);
    Ok(env)
}

/// Point `link` at `target`, replacing whatever `link` was before.
pub fn link_file(target: &Path, link: &Path) -> Result<()> {
    provision::remove_entry(link)?;
    symlink(target, link)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeployConfig, Source};
    use crate::process::test_support::*;
    use tempfile::TempDir;

    fn service_config(deploy: Option<DeployConfig>) -> ServiceConfig {
        ServiceConfig {
            source: Source::Local(PathBuf::from("../issuer")),
            port: None,
            deploy,
            test: None,
        }
    }

    fn deploy_config(wrangler: &Path) -> DeployConfig {
        DeployConfig {
            wrangler: wrangler.to_path_buf(),
            environment: None,
            env_file: None,
            immediate_deployment: None,
        }
    }

    #[test]
    fn test_missing_deploy_section() {
        let err = DeployPlan::new(ServiceName::Origin, &service_config(None)).unwrap_err();
        assert!(matches!(err, Error::MissingDeployConfig(ServiceName::Origin)));
    }

    #[test]
    fn test_immediate_deployment_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let wrangler = temp_dir.path().join("issuer.toml");
        let plan = DeployPlan::new(
            ServiceName::Issuer,
            &service_config(Some(deploy_config(&wrangler))),
        )
        .unwrap();

        assert_eq!(plan.args, vec!["wrangler", "deploy", "--config", "./wrangler.toml"]);
        assert_eq!(plan.wrangler_config, wrangler);
        assert!(plan.env.is_empty());
    }

    #[test]
    fn test_staged_deployment_with_env_and_cron() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join("issuer.env");
        fs::write(
            &env_file,
            "CLOUDFLARE_ACCOUNT_ID=abc123\nROTATION_CRON_STRING=\"0 0 * * *\"\n",
        )
        .unwrap();

        let mut deploy = deploy_config(&temp_dir.path().join("issuer.toml"));
        deploy.environment = Some("production".to_string());
        deploy.env_file = Some(env_file);
        deploy.immediate_deployment = Some(false);

        let plan = DeployPlan::new(ServiceName::Issuer, &service_config(Some(deploy))).unwrap();

        assert_eq!(
            plan.args,
            vec![
                "wrangler",
                "versions",
                "upload",
                "--experimental-versions",
                "--config",
                "./wrangler.toml",
                "--env",
                "production",
                "--triggers",
                "0 0 * * *",
            ]
        );
        assert_eq!(plan.env.get("CLOUDFLARE_ACCOUNT_ID").map(String::as_str), Some("abc123"));
    }

    #[test]
    fn test_env_file_values_are_literal() {
        let temp_dir = TempDir::new().unwrap();
        let env_file = temp_dir.path().join("issuer.env");
        fs::write(&env_file, "API_TOKEN=abc$def123\nQUOTED=\"p@ss$word\"\n").unwrap();

        let env = load_env_file(&env_file).unwrap();
        assert_eq!(env.get("API_TOKEN").map(String::as_str), Some("abc$def123"));
        assert_eq!(env.get("QUOTED").map(String::as_str), Some("p@ss$word"));
    }

    #[test]
    fn test_missing_env_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut deploy = deploy_config(&temp_dir.path().join("issuer.toml"));
        deploy.env_file = Some(temp_dir.path().join("missing.env"));

        let err = DeployPlan::new(ServiceName::Issuer, &service_config(Some(deploy))).unwrap_err();
        assert!(matches!(err, Error::EnvFile { .. }));
    }

    #[test]
    fn test_link_file_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first.toml");
        let second = temp_dir.path().join("second.toml");
        fs::write(&first, "name = \"first\"").unwrap();
        fs::write(&second, "name = \"second\"").unwrap();
        let link = temp_dir.path().join("wrangler.toml");

        fs::write(&link, "stale copy").unwrap();
        link_file(&first, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), first);

        link_file(&second, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), second);
        assert!(first.exists());
    }

    #[tokio::test]
    async fn test_run_links_config_and_passes_env() {
        let temp_dir = TempDir::new().unwrap();
        let workdir = temp_dir.path().join("issuer");
        fs::create_dir(&workdir).unwrap();
        fs::write(workdir.join(WRANGLER_CONFIG_FILE), "stale copy").unwrap();
        let wrangler = temp_dir.path().join("issuer.toml");
        fs::write(&wrangler, "name = \"issuer\"").unwrap();
        let env_file = temp_dir.path().join("issuer.env");
        fs::write(&env_file, "CLOUDFLARE_ACCOUNT_ID=abc123\n").unwrap();

        let env_record = temp_dir.path().join("env");
        let record = temp_dir.path().join("record");
        let npx = write_script(
            temp_dir.path(),
            "npx",
            &format!(
                "echo \"$CLOUDFLARE_ACCOUNT_ID\" > '{}'\n{}",
                env_record.display(),
                record_invocation(&record)
            ),
        );

        let mut deploy = deploy_config(&wrangler);
        deploy.env_file = Some(env_file);
        let mut plan = DeployPlan::new(ServiceName::Issuer, &service_config(Some(deploy))).unwrap();
        plan.program = npx.display().to_string();
        plan.run(&workdir).await.unwrap();

        assert_eq!(fs::read_link(workdir.join(WRANGLER_CONFIG_FILE)).unwrap(), wrangler);
        assert_eq!(fs::read_to_string(&env_record).unwrap(), "abc123\n");

        let content = fs::read_to_string(&record).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(PathBuf::from(lines[0]), workdir.canonicalize().unwrap());
        assert_eq!(&lines[1..], ["wrangler", "deploy", "--config", "./wrangler.toml"]);
    }

    #[tokio::test]
    async fn test_run_propagates_failure() {
        let temp_dir = TempDir::new().unwrap();
        let workdir = temp_dir.path().join("issuer");
        fs::create_dir(&workdir).unwrap();
        let npx = write_script(temp_dir.path(), "npx", "exit 3");

        let wrangler = temp_dir.path().join("issuer.toml");
        let mut plan = DeployPlan::new(
            ServiceName::Issuer,
            &service_config(Some(deploy_config(&wrangler))),
        )
        .unwrap();
        plan.program = npx.display().to_string();

        let err = plan.run(&workdir).await.unwrap_err();
        assert!(matches!(
            err,
            Error::CommandFailed { status, .. } if status.code() == Some(3)
        ));
    }
}
