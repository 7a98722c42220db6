//! Orchestrator configuration.
//!
//! Loaded once at startup and shared by `Arc` with the registry, launcher and
//! log aggregator. There is no process-wide cache; callers own the value.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::paths::default_config_path;

/// Environment variable that overrides the default config location.
pub const CONFIG_ENV: &str = "ODOO_ORCHESTRATOR_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Root holding one subdirectory per production instance.
    pub prod_root: PathBuf,
    /// Root holding one subdirectory per development instance.
    pub dev_root: PathBuf,
    /// Shared scripts directory (create/delete live under `odoo/`).
    pub scripts_path: PathBuf,
    /// Centralized asset regeneration script.
    pub regenerate_assets_script: PathBuf,
    /// Where per-operation log files are written.
    pub log_dir: PathBuf,
    /// Interpreter used to run operation scripts.
    pub shell: PathBuf,
    pub commands: CommandPaths,
    pub nginx: NginxLogs,
    pub timeouts: Timeouts,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            prod_root: PathBuf::from("/home/go/apps/production/odoo"),
            dev_root: PathBuf::from("/home/go/apps/develop/odoo"),
            scripts_path: PathBuf::from("/home/go/scripts"),
            regenerate_assets_script: PathBuf::from(
                "/home/go/api-dev/scripts/odoo/regenerate-assets.sh",
            ),
            log_dir: PathBuf::from("/tmp"),
            shell: PathBuf::from("/bin/bash"),
            commands: CommandPaths::default(),
            nginx: NginxLogs::default(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Absolute paths of the external tools the orchestrator invokes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandPaths {
    pub systemctl: PathBuf,
    pub journalctl: PathBuf,
    pub tail: PathBuf,
    pub grep: PathBuf,
    /// Privilege wrapper for `systemctl restart`. `None` runs systemctl directly.
    pub sudo: Option<PathBuf>,
}

impl Default for CommandPaths {
    fn default() -> Self {
        Self {
            systemctl: PathBuf::from("/usr/bin/systemctl"),
            journalctl: PathBuf::from("/usr/bin/journalctl"),
            tail: PathBuf::from("/usr/bin/tail"),
            grep: PathBuf::from("/usr/bin/grep"),
            sudo: Some(PathBuf::from("/usr/bin/sudo")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NginxLogs {
    pub access_log: PathBuf,
    pub error_log: PathBuf,
}

impl Default for NginxLogs {
    fn default() -> Self {
        Self {
            access_log: PathBuf::from("/var/log/nginx/access.log"),
            error_log: PathBuf::from("/var/log/nginx/error.log"),
        }
    }
}

/// Hard ceilings, in seconds, for every external invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// `systemctl is-active` / `systemctl status`
    pub probe: u64,
    /// journalctl, tail and grep
    pub query: u64,
    pub restart: u64,
    pub delete: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe: 5,
            query: 10,
            restart: 30,
            delete: 300,
        }
    }
}

impl Timeouts {
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe)
    }

    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query)
    }

    pub fn restart(&self) -> Duration {
        Duration::from_secs(self.restart)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete)
    }
}

impl OrchestratorConfig {
    /// Parse a config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Resolve and load the configuration.
    ///
    /// An explicit path must exist. Without one, the default location is used
    /// when present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                log::debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: OrchestratorConfig = toml::from_str(
            r#"
            dev_root = "/srv/dev"

            [timeouts]
            delete = 20

            [commands]
            grep = "/bin/grep"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.dev_root, PathBuf::from("/srv/dev"));
        assert_eq!(cfg.prod_root, PathBuf::from("/home/go/apps/production/odoo"));
        assert_eq!(cfg.timeouts.delete(), Duration::from_secs(20));
        assert_eq!(cfg.timeouts.probe, 5);
        assert_eq!(cfg.commands.grep, PathBuf::from("/bin/grep"));
        assert_eq!(cfg.commands.systemctl, PathBuf::from("/usr/bin/systemctl"));
    }

    #[test]
    fn explicit_missing_file_is_config_error() {
        let err = OrchestratorConfig::load(Some(Path::new("/nonexistent/odoo.toml"))).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_dir = \"/var/tmp\"\n").unwrap();

        let cfg = OrchestratorConfig::from_file(&path).unwrap();
        assert_eq!(cfg.log_dir, PathBuf::from("/var/tmp"));
    }
}
