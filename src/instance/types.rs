//! Instance-related type definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::service::ServiceStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    /// Environment argument understood by the shared scripts.
    pub fn script_arg(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "develop",
        }
    }
}

/// Fields parsed from the descriptor file. Any may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceMetadata {
    pub port: Option<u16>,
    pub domain: Option<String>,
    pub database: Option<String>,
    pub service_name: Option<String>,
}

/// One deployed environment, as seen on the last registry query.
///
/// Only the registry builds these.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct Instance {
    pub name: String,
    pub environment: Environment,
    pub path: PathBuf,
    pub status: ServiceStatus,
    pub port: Option<u16>,
    pub domain: Option<String>,
    pub database: Option<String>,
    pub service_name: Option<String>,
}

/// An instance plus the verbose service-manager status.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceDetail {
    #[serde(flatten)]
    pub instance: Instance,
    /// `None` only when no service is configured.
    pub service_details: Option<String>,
}
