//! Instance discovery: filesystem + descriptor + live service state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::metadata::read_metadata;
use super::types::{Environment, Instance, InstanceDetail};
use crate::config::OrchestratorConfig;
use crate::service::{ServiceManager, ServiceStatus};

/// A directory found under one of the roots, not yet enriched.
struct Discovered {
    name: String,
    environment: Environment,
    path: PathBuf,
}

/// The only place `Instance` values are built. Nothing is cached: every
/// query rescans both roots and re-probes services.
pub struct InstanceRegistry {
    config: Arc<OrchestratorConfig>,
    services: ServiceManager,
}

impl InstanceRegistry {
    pub fn new(config: Arc<OrchestratorConfig>) -> Self {
        let services = ServiceManager::new(Arc::clone(&config));
        Self { config, services }
    }

    pub fn services(&self) -> &ServiceManager {
        &self.services
    }

    fn roots(&self) -> [(&Path, Environment); 2] {
        [
            (self.config.prod_root.as_path(), Environment::Production),
            (self.config.dev_root.as_path(), Environment::Development),
        ]
    }

    /// Immediate subdirectories of both roots, production first.
    fn discover(&self) -> Vec<Discovered> {
        let mut found = Vec::new();

        for (root, environment) in self.roots() {
            let entries = match std::fs::read_dir(root) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("Instance root {:?} does not exist", root);
                    continue;
                }
                Err(e) => {
                    log::warn!("Failed to list instance root {:?}: {}", root, e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    log::warn!("Skipping non UTF-8 instance directory {:?}", path);
                    continue;
                };
                found.push(Discovered {
                    name,
                    environment,
                    path,
                });
            }
        }

        found
    }

    async fn materialize(&self, found: Discovered) -> Instance {
        let meta = read_metadata(&found.path);

        let status = match meta.service_name.as_deref() {
            Some(unit) => self.services.probe(unit).await,
            None => ServiceStatus::Unknown,
        };

        Instance {
            name: found.name,
            environment: found.environment,
            path: found.path,
            status,
            port: meta.port,
            domain: meta.domain,
            database: meta.database,
            service_name: meta.service_name,
        }
    }

    /// Every instance in both environments, in directory-listing order.
    pub async fn list_instances(&self) -> Vec<Instance> {
        let mut instances = Vec::new();
        for found in self.discover() {
            instances.push(self.materialize(found).await);
        }
        instances
    }

    /// First exact name match across both environments.
    ///
    /// Names are only unique per environment; on a collision the production
    /// instance wins.
    pub async fn get_instance(&self, name: &str) -> Option<Instance> {
        let found = self.discover().into_iter().find(|d| d.name == name)?;
        Some(self.materialize(found).await)
    }

    /// Exact match restricted to one environment.
    pub async fn find_in(&self, environment: Environment, name: &str) -> Option<Instance> {
        let found = self
            .discover()
            .into_iter()
            .find(|d| d.environment == environment && d.name == name)?;
        Some(self.materialize(found).await)
    }

    /// Match in `preferred` first, then in any environment.
    pub async fn resolve_preferring(&self, preferred: Environment, name: &str) -> Option<Instance> {
        let mut candidates: Vec<Discovered> = self
            .discover()
            .into_iter()
            .filter(|d| d.name == name)
            .collect();
        let index = candidates
            .iter()
            .position(|d| d.environment == preferred)
            .unwrap_or(0);
        if candidates.is_empty() {
            return None;
        }
        Some(self.materialize(candidates.swap_remove(index)).await)
    }

    /// Environment holding `name`, preferring `preferred` on a collision.
    /// Looks at the filesystem only; no service is probed.
    pub fn locate(&self, preferred: Environment, name: &str) -> Option<Environment> {
        let mut fallback = None;
        for found in self.discover().into_iter().filter(|d| d.name == name) {
            if found.environment == preferred {
                return Some(preferred);
            }
            fallback.get_or_insert(found.environment);
        }
        fallback
    }

    /// Instance plus verbose `systemctl status` output.
    pub async fn get_instance_status(&self, name: &str) -> Option<InstanceDetail> {
        let instance = self.get_instance(name).await?;

        let service_details = match instance.service_name.as_deref() {
            Some(unit) => Some(match self.services.details(unit).await {
                Ok(text) => text,
                Err(e) => format!("Error: {}", e),
            }),
            None => None,
        };

        Some(InstanceDetail {
            instance,
            service_details,
        })
    }
}
