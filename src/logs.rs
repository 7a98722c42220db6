//! Tail-windowed log retrieval from journald, odoo.log and nginx.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio::process::Command;

use crate::config::OrchestratorConfig;
use crate::error::{AppError, Result};
use crate::instance::{Instance, InstanceRegistry};
use crate::paths::instance_log_path;
use crate::process::{run_tail_window, run_with_timeout};
use crate::validation::validate_line_count;

const NO_INSTANCE_LOGS: &str = "No logs available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogSource {
    #[serde(rename = "systemd")]
    Journal,
    #[serde(rename = "odoo")]
    InstanceFile,
    #[serde(rename = "nginx-access")]
    NginxAccess,
    #[serde(rename = "nginx-error")]
    NginxError,
}

impl LogSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Journal => "systemd",
            Self::InstanceFile => "odoo",
            Self::NginxAccess => "nginx-access",
            Self::NginxError => "nginx-error",
        }
    }
}

impl FromStr for LogSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "systemd" | "journal" => Ok(Self::Journal),
            "odoo" | "instance" => Ok(Self::InstanceFile),
            "nginx-access" => Ok(Self::NginxAccess),
            "nginx-error" => Ok(Self::NginxError),
            other => Err(AppError::invalid_request(format!(
                "Unsupported log type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogQueryResult {
    pub logs: String,
    /// Requested window size.
    pub line_count: usize,
    pub source_type: LogSource,
}

pub struct LogAggregator {
    config: Arc<OrchestratorConfig>,
    registry: Arc<InstanceRegistry>,
}

impl LogAggregator {
    pub fn new(config: Arc<OrchestratorConfig>, registry: Arc<InstanceRegistry>) -> Self {
        Self { config, registry }
    }

    /// Last `lines` lines of `source` for instance `name`.
    ///
    /// The source is validated before the instance is resolved, so a bad
    /// identifier never reaches any backend.
    pub async fn get_instance_logs(
        &self,
        name: &str,
        lines: usize,
        source: &str,
    ) -> Result<LogQueryResult> {
        let source: LogSource = source.parse()?;
        validate_line_count(lines)?;

        let instance = self
            .registry
            .get_instance(name)
            .await
            .ok_or_else(|| AppError::instance_not_found(name))?;

        let logs = match source {
            LogSource::Journal => self.journal(&instance, lines).await?,
            LogSource::InstanceFile => self.instance_file(&instance, lines).await?,
            LogSource::NginxAccess => {
                self.nginx(&instance, &self.config.nginx.access_log, "access", lines)
                    .await?
            }
            LogSource::NginxError => {
                self.nginx(&instance, &self.config.nginx.error_log, "error", lines)
                    .await?
            }
        };

        Ok(LogQueryResult {
            logs,
            line_count: lines,
            source_type: source,
        })
    }

    async fn journal(&self, instance: &Instance, lines: usize) -> Result<String> {
        let unit = instance
            .service_name
            .as_deref()
            .ok_or_else(|| AppError::resource_not_found(&instance.name, "service"))?;

        let mut cmd = Command::new(&self.config.commands.journalctl);
        cmd.arg("-u")
            .arg(unit)
            .arg("-n")
            .arg(lines.to_string())
            .arg("--no-pager");
        let output = run_with_timeout(cmd, "journalctl", self.config.timeouts.query()).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AppError::non_zero_exit("journalctl", output.status.code(), stderr)
                .with("unit", unit));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn instance_file(&self, instance: &Instance, lines: usize) -> Result<String> {
        let log_file = instance_log_path(&instance.path);
        if !log_file.is_file() {
            return Err(AppError::resource_not_found(&instance.name, "odoo.log"));
        }

        let mut cmd = Command::new(&self.config.commands.tail);
        cmd.arg("-n").arg(lines.to_string()).arg(&log_file);
        let output = run_with_timeout(cmd, "tail", self.config.timeouts.query()).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AppError::non_zero_exit("tail", output.status.code(), stderr)
                .with("log_file", log_file.display().to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            Ok(NO_INSTANCE_LOGS.to_string())
        } else {
            Ok(text)
        }
    }

    /// grep the shared nginx log for the instance domain, keep the tail.
    ///
    /// The shared log can be huge, so matches are streamed through a
    /// bounded window instead of being collected.
    async fn nginx(
        &self,
        instance: &Instance,
        log_file: &Path,
        kind: &str,
        lines: usize,
    ) -> Result<String> {
        let domain = instance
            .domain
            .as_deref()
            .ok_or_else(|| AppError::resource_not_found(&instance.name, "domain"))?;

        let mut cmd = Command::new(&self.config.commands.grep);
        cmd.arg("-F").arg("--").arg(domain).arg(log_file);
        let output = run_tail_window(cmd, "grep", self.config.timeouts.query(), lines).await?;

        let no_matches = || format!("No {} logs for domain {}", kind, domain);
        match output.status.code() {
            Some(0) if output.tail.is_empty() => Ok(no_matches()),
            Some(0) => Ok(output.tail),
            // grep exits 1 when nothing matched
            Some(1) => Ok(no_matches()),
            code => {
                let stderr = output.stderr.trim().to_string();
                log::warn!("grep on {:?} failed: {}", log_file, stderr);
                Err(AppError::non_zero_exit("grep", code, stderr)
                    .with("log_file", log_file.display().to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_identifiers() {
        assert_eq!("systemd".parse::<LogSource>().unwrap(), LogSource::Journal);
        assert_eq!("journal".parse::<LogSource>().unwrap(), LogSource::Journal);
        assert_eq!("odoo".parse::<LogSource>().unwrap(), LogSource::InstanceFile);
        assert_eq!(
            "nginx-access".parse::<LogSource>().unwrap(),
            LogSource::NginxAccess
        );
        assert_eq!(
            "nginx-error".parse::<LogSource>().unwrap(),
            LogSource::NginxError
        );
    }

    #[test]
    fn rejects_unknown_source() {
        let err = "bogus".parse::<LogSource>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRequest);
    }

    #[test]
    fn serializes_original_identifiers() {
        for source in [
            LogSource::Journal,
            LogSource::InstanceFile,
            LogSource::NginxAccess,
            LogSource::NginxError,
        ] {
            assert_eq!(
                serde_json::to_value(source).unwrap(),
                serde_json::Value::String(source.as_str().to_string())
            );
        }
    }
}
