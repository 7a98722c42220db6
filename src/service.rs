//! systemd queries: run state, verbose status and restart.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::config::OrchestratorConfig;
use crate::error::{AppError, Result};
use crate::process::run_with_timeout;

/// Normalized run state of a managed service.
///
/// `failed` is reported as `Inactive`: callers only distinguish running from
/// not running. Failure detail is available through [`ServiceManager::details`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Active,
    Inactive,
    Unknown,
}

impl ServiceStatus {
    /// Map raw `systemctl is-active` output.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "active" => Self::Active,
            "inactive" | "failed" => Self::Inactive,
            _ => Self::Unknown,
        }
    }
}

pub struct ServiceManager {
    config: Arc<OrchestratorConfig>,
}

impl ServiceManager {
    pub fn new(config: Arc<OrchestratorConfig>) -> Self {
        Self { config }
    }

    fn systemctl(&self) -> Command {
        Command::new(&self.config.commands.systemctl)
    }

    async fn query_state(&self, unit: &str) -> Result<String> {
        let mut cmd = self.systemctl();
        cmd.args(["is-active", "--", unit]);

        // is-active exits non-zero for anything but "active"; stdout still
        // carries the state word.
        let output = run_with_timeout(cmd, "systemctl is-active", self.config.timeouts.probe())
            .await
            .map_err(|e| AppError::probe_failure(unit, e.to_string()))?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Probe the run state of `unit`. Never fails: anomalies yield `Unknown`.
    pub async fn probe(&self, unit: &str) -> ServiceStatus {
        match self.query_state(unit).await {
            Ok(raw) => {
                let status = ServiceStatus::from_raw(&raw);
                log::debug!("Service check: {} -> '{}' ({:?})", unit, raw, status);
                if status == ServiceStatus::Unknown {
                    log::warn!("Unknown status '{}' for service {}", raw, unit);
                }
                status
            }
            Err(e) => {
                log::error!("Error checking service status for {}: {}", unit, e);
                ServiceStatus::Unknown
            }
        }
    }

    /// Verbose `systemctl status` text, whatever the unit state.
    pub async fn details(&self, unit: &str) -> Result<String> {
        let mut cmd = self.systemctl();
        cmd.args(["status", "--", unit]);
        let output = run_with_timeout(cmd, "systemctl status", self.config.timeouts.probe()).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Restart `unit`, optionally through sudo. Fails on non-zero exit.
    pub async fn restart(&self, unit: &str) -> Result<()> {
        let commands = &self.config.commands;
        let mut cmd = match &commands.sudo {
            Some(sudo) => {
                let mut cmd = Command::new(sudo);
                cmd.arg(&commands.systemctl);
                cmd
            }
            None => self.systemctl(),
        };
        cmd.args(["restart", "--", unit]);

        log::info!("Restarting service {}", unit);
        let output =
            run_with_timeout(cmd, "systemctl restart", self.config.timeouts.restart()).await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        log::error!("Restart of {} failed: {}", unit, stderr);
        Err(
            AppError::non_zero_exit("systemctl restart", output.status.code(), stderr)
                .with("unit", unit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_states_collapse_to_tri_state() {
        assert_eq!(ServiceStatus::from_raw("active"), ServiceStatus::Active);
        assert_eq!(ServiceStatus::from_raw("active\n"), ServiceStatus::Active);
        assert_eq!(ServiceStatus::from_raw("inactive"), ServiceStatus::Inactive);
        assert_eq!(ServiceStatus::from_raw("failed"), ServiceStatus::Inactive);
        assert_eq!(ServiceStatus::from_raw("activating"), ServiceStatus::Unknown);
        assert_eq!(ServiceStatus::from_raw(""), ServiceStatus::Unknown);
    }

    #[tokio::test]
    async fn missing_systemctl_yields_unknown() {
        let mut config = OrchestratorConfig::default();
        config.commands.systemctl = "/nonexistent/systemctl".into();
        let manager = ServiceManager::new(Arc::new(config));

        assert_eq!(manager.probe("odoo-foo").await, ServiceStatus::Unknown);
        assert!(manager.details("odoo-foo").await.is_err());
    }
}
