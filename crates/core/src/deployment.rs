//! Effective port and URL of each service for one command invocation.

use crate::config::{AppConfig, Source};
use crate::service::{ServiceName, DEFAULT_HOST, DEFAULT_SCHEME};
use crate::{Error, Result};
use std::collections::BTreeMap;
use url::Url;

/// Path at which an issuer publishes its token directory.
pub const PRIVATE_TOKEN_ISSUER_DIRECTORY: &str = "/.well-known/private-token-issuer-directory";

/// Path of the issuer's token request endpoint.
pub const TOKEN_REQUEST_PATH: &str = "/token-request";

/// Port and URL a service is reachable at, after overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDeployment {
    pub port: u16,
    pub url: Url,
}

impl ResolvedDeployment {
    /// URL without a trailing slash, suitable for appending paths.
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }

    /// Absolute URL of `path` on this service.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Host of the URL, with the port when it is not the scheme default.
    pub fn host(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

/// Resolved deployments of every known service, built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployments(BTreeMap<ServiceName, ResolvedDeployment>);

impl Deployments {
    /// Resolve all known services against the configuration.
    ///
    /// A service absent from the configuration gets its defaults.
    pub fn resolve_all(config: &AppConfig) -> Result<Self> {
        let mut resolved = BTreeMap::new();
        for name in ServiceName::ALL {
            let port = config
                .service(name)
                .and_then(|service| service.port)
                .unwrap_or_else(|| name.default_port());
            let url = match config.service(name).map(|service| &service.source) {
                Some(Source::External(url)) => url.clone(),
                _ => default_url(port).map_err(|e| Error::InvalidServiceConfig {
                    service: name.to_string(),
                    reason: e,
                })?,
            };
            resolved.insert(name, ResolvedDeployment { port, url });
        }
        Ok(Self(resolved))
    }

    pub fn get(&self, name: ServiceName) -> &ResolvedDeployment {
        // resolve_all inserts every known service
        &self.0[&name]
    }
}

fn default_url(port: u16) -> std::result::Result<Url, String> {
    let raw = format!("{}://{}:{}", DEFAULT_SCHEME, DEFAULT_HOST, port);
    Url::parse(&raw).map_err(|e| format!("invalid default url '{}': {}", raw, e))
}
