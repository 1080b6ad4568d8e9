//! Configuration file loading.
//!
//! The YAML file is read into a loose shape mirroring its keys and then
//! converted into typed configuration, so that a service with zero or several
//! sources is rejected before anything touches the filesystem.

use crate::service::ServiceName;
use crate::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Default configuration file name, relative to the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Deployments go live at once unless the configuration opts into staged versions.
pub const DEFAULT_IMMEDIATE_DEPLOYMENT: bool = true;

/// Where a service's code comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Cloned from a git remote, optionally pinned to a ref.
    Git(GitSource),
    /// Symlinked from a local checkout.
    Local(PathBuf),
    /// Hosted elsewhere; nothing is materialized locally.
    External(Url),
}

impl Source {
    /// Build a source from the three mutually exclusive config fields.
    ///
    /// Empty strings count as absent. Exactly one field must remain.
    pub fn from_fields(
        git: Option<&str>,
        file: Option<&str>,
        url: Option<&str>,
    ) -> std::result::Result<Self, String> {
        let git = git.filter(|s| !s.is_empty());
        let file = file.filter(|s| !s.is_empty());
        let url = url.filter(|s| !s.is_empty());

        match (git, file, url) {
            (Some(git), None, None) => GitSource::parse(git).map(Source::Git),
            (None, Some(file), None) => Ok(Source::Local(PathBuf::from(file))),
            (None, None, Some(url)) => Url::parse(url)
                .map(Source::External)
                .map_err(|e| format!("invalid url '{}': {}", url, e)),
            _ => Err("should define one and only one of 'git', 'file', or 'url'".to_string()),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Source::External(_))
    }
}

/// A git remote with an optional `#ref` suffix split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    /// Remote URL without the ref suffix.
    pub url: String,
    /// Branch, tag or commit to check out instead of `origin/main`.
    pub reference: Option<String>,
}

impl GitSource {
    pub fn parse(spec: &str) -> std::result::Result<Self, String> {
        let parts: Vec<&str> = spec.split('#').collect();
        match parts.as_slice() {
            [url] => Ok(Self {
                url: url.to_string(),
                reference: None,
            }),
            [url, reference] if !reference.is_empty() => Ok(Self {
                url: url.to_string(),
                reference: Some(reference.to_string()),
            }),
            [_, _] => Err(format!("invalid git URL '{}': empty ref after '#'", spec)),
            _ => Err(format!("invalid git URL '{}': more than one '#'", spec)),
        }
    }
}

/// `deploy` section of a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Path to the wrangler configuration used for this deployment
    pub wrangler: PathBuf,
    /// Wrangler environment name (`--env`)
    pub environment: Option<String>,
    /// Dotenv file merged over the ambient environment
    pub env_file: Option<PathBuf>,
    /// Deploy at once rather than uploading a version for manual promotion
    pub immediate_deployment: Option<bool>,
}

impl DeployConfig {
    pub fn immediate(&self) -> bool {
        self.immediate_deployment.unwrap_or(DEFAULT_IMMEDIATE_DEPLOYMENT)
    }
}

/// `test` section of a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    /// Hostname the end-to-end suite runs against
    pub hostname: String,
    /// Client certificate used to reach the hostname
    pub tls_config: Option<TlsConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TlsConfig {
    pub key: PathBuf,
    pub cert: PathBuf,
}

/// Validated configuration of a single service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub source: Source,
    /// Port override
    pub port: Option<u16>,
    pub deploy: Option<DeployConfig>,
    pub test: Option<TestConfig>,
}

/// Validated configuration file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root under which each service gets its own working directory
    pub directory: PathBuf,
    /// Services in declaration order
    services: Vec<(ServiceName, ServiceConfig)>,
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawAppConfig = serde_yaml::from_str(content)?;

        let mut services = Vec::with_capacity(raw.services.len());
        for (key, value) in raw.services {
            let name = match key.as_str() {
                Some(name) => name.parse::<ServiceName>()?,
                None => return Err(Error::UnknownService(format!("{:?}", key))),
            };
            if services.iter().any(|(existing, _)| *existing == name) {
                return Err(Error::InvalidServiceConfig {
                    service: name.to_string(),
                    reason: "declared more than once".to_string(),
                });
            }

            let raw_service: RawServiceConfig = if value.is_null() {
                RawServiceConfig::default()
            } else {
                serde_yaml::from_value(value)?
            };
            let service = raw_service
                .validate()
                .map_err(|reason| Error::InvalidServiceConfig {
                    service: name.to_string(),
                    reason,
                })?;
            services.push((name, service));
        }

        Ok(Self {
            directory: raw.config.directory,
            services,
        })
    }

    /// Iterate over declared services in declaration order.
    pub fn services(&self) -> impl Iterator<Item = (ServiceName, &ServiceConfig)> {
        self.services.iter().map(|(name, config)| (*name, config))
    }

    /// Look up a service, if declared.
    pub fn service(&self, name: ServiceName) -> Option<&ServiceConfig> {
        self.services
            .iter()
            .find(|(declared, _)| *declared == name)
            .map(|(_, config)| config)
    }

    /// Look up a service that a command cannot do without.
    pub fn require(&self, name: ServiceName) -> Result<&ServiceConfig> {
        self.service(name).ok_or(Error::ServiceNotConfigured(name))
    }
}

#[derive(Deserialize)]
struct RawAppConfig {
    #[serde(default)]
    services: serde_yaml::Mapping,
    config: RawDirectoryConfig,
}

#[derive(Deserialize)]
struct RawDirectoryConfig {
    directory: PathBuf,
}

#[derive(Default, Deserialize)]
struct RawServiceConfig {
    git: Option<String>,
    file: Option<String>,
    url: Option<String>,
    port: Option<RawPort>,
    deploy: Option<DeployConfig>,
    test: Option<TestConfig>,
}

/// Ports may be written as `8787` or `"8787"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u64),
    Text(String),
}

impl RawPort {
    fn to_port(&self) -> std::result::Result<u16, String> {
        let port = match self {
            RawPort::Number(n) => u16::try_from(*n).ok(),
            RawPort::Text(s) => s.trim().parse::<u16>().ok(),
        };
        match port {
            Some(port) if port != 0 => Ok(port),
            _ => Err(match self {
                RawPort::Number(n) => format!("invalid port {}", n),
                RawPort::Text(s) => format!("invalid port '{}'", s),
            }),
        }
    }
}

impl RawServiceConfig {
    fn validate(self) -> std::result::Result<ServiceConfig, String> {
        let source = Source::from_fields(
            self.git.as_deref(),
            self.file.as_deref(),
            self.url.as_deref(),
        )?;
        let port = self.port.as_ref().map(RawPort::to_port).transpose()?;

        Ok(ServiceConfig {
            source,
            port,
            deploy: self.deploy,
            test: self.test,
        })
    }
}
