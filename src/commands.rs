use std::sync::Arc;

use serde::Serialize;

use crate::config::OrchestratorConfig;
use crate::error::{AppError, Result};
use crate::instance::{InstanceRegistry, OperationLauncher};
use crate::logs::LogAggregator;
use crate::process::OperationTracker;

/// Components wired once at startup around a single configuration.
pub struct AppState {
    pub config: Arc<OrchestratorConfig>,
    pub registry: Arc<InstanceRegistry>,
    pub launcher: OperationLauncher,
    pub logs: LogAggregator,
}

impl AppState {
    pub fn new(config: OrchestratorConfig) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(InstanceRegistry::new(Arc::clone(&config)));
        let tracker = Arc::new(OperationTracker::new());

        Self {
            launcher: OperationLauncher::new(
                Arc::clone(&config),
                Arc::clone(&registry),
                tracker,
            ),
            logs: LogAggregator::new(Arc::clone(&config), Arc::clone(&registry)),
            registry,
            config,
        }
    }
}

/// `{"success": true, "data": ...}` or `{"success": false, "error": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(flatten)]
    pub detail: AppError,
}

impl<T: Serialize> From<Result<T>> for Envelope<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(ErrorBody {
                    message: err.to_string(),
                    detail: err,
                }),
            },
        }
    }
}

impl<T: Serialize> Envelope<T> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope() {
        let env: Envelope<u32> = Ok(7).into();
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], 7);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_envelope_flattens_error() {
        let env: Envelope<u32> = Err(AppError::instance_not_found("dev-x")).into();
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], 1001);
        assert_eq!(value["error"]["payload"]["instance"], "dev-x");
        assert!(value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("InstanceNotFound"));
    }
}
