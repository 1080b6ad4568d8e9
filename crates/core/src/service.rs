//! The fixed set of services this tool knows how to orchestrate.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default scheme and host used to build a service's local URL.
pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_HOST: &str = "localhost";

/// Names of the services that make up a Privacy Pass deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    Attester,
    Issuer,
    Origin,
}

impl ServiceName {
    /// All known services, in their canonical order.
    pub const ALL: [ServiceName; 3] = [
        ServiceName::Attester,
        ServiceName::Issuer,
        ServiceName::Origin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Attester => "attester",
            ServiceName::Issuer => "issuer",
            ServiceName::Origin => "origin",
        }
    }

    /// Port the service listens on when the configuration does not override it.
    pub fn default_port(&self) -> u16 {
        match self {
            ServiceName::Attester => 8788,
            ServiceName::Issuer => 8787,
            ServiceName::Origin => 8789,
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::UnknownService(s.to_string()))
    }
}
