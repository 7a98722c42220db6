//! Centralized path conventions for instances, scripts and operation logs.

use std::path::{Path, PathBuf};

use crate::config::OrchestratorConfig;

/// Descriptor written by the provisioning scripts into every instance.
pub const DESCRIPTOR_FILE: &str = "info-instancia.txt";

/// Odoo's own log file inside the instance directory.
pub const INSTANCE_LOG_FILE: &str = "odoo.log";

/// Default config file (~/.config/odoo-orchestrator/config.toml).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("odoo-orchestrator").join("config.toml"))
}

pub fn descriptor_path(instance_dir: &Path) -> PathBuf {
    instance_dir.join(DESCRIPTOR_FILE)
}

pub fn instance_log_path(instance_dir: &Path) -> PathBuf {
    instance_dir.join(INSTANCE_LOG_FILE)
}

/// Shared script for creating development instances.
pub fn create_script(config: &OrchestratorConfig) -> PathBuf {
    config.scripts_path.join("odoo").join("create-dev-instance.sh")
}

/// Shared script for removing development instances.
pub fn delete_script(config: &OrchestratorConfig) -> PathBuf {
    config.scripts_path.join("odoo").join("remove-dev-instance.sh")
}

/// Script living in the instance's own directory (update-db.sh and friends).
pub fn instance_script(instance_dir: &Path, file_name: &str) -> PathBuf {
    instance_dir.join(file_name)
}

/// Deterministic log file for an operation: `<log_dir>/odoo-<slug>-<instance>.log`.
pub fn operation_log_path(config: &OrchestratorConfig, slug: &str, instance: &str) -> PathBuf {
    config.log_dir.join(format!("odoo-{}-{}.log", slug, instance))
}
