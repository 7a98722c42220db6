#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};

use odoo_orchestrator_lib::instance::Environment;
use odoo_orchestrator_lib::{AppState, OrchestratorConfig};
use tempfile::TempDir;

/// systemctl stand-in: `is-active -- <unit>`, `status -- <unit>`, `restart -- <unit>`.
pub const SYSTEMCTL_STUB: &str = r#"#!/bin/sh
case "$1" in
  is-active)
    case "$3" in
      odoo-up) echo active ;;
      odoo-down) echo inactive; exit 3 ;;
      odoo-failed) echo failed; exit 3 ;;
      odoo-slow) sleep 5; echo active ;;
      *) echo activating; exit 3 ;;
    esac
    ;;
  status)
    echo "* $3.service - Odoo"
    echo "   Active: inactive (dead)"
    exit 3
    ;;
  restart)
    if [ "$3" = odoo-up ]; then exit 0; fi
    echo "Job for $3.service failed" >&2
    exit 1
    ;;
esac
exit 4
"#;

/// Temporary host layout with stubbed external tools.
pub struct Fixture {
    pub dir: TempDir,
    pub config: OrchestratorConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        for sub in ["prod", "dev", "scripts/odoo", "logs", "bin", "nginx"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }

        let mut config = OrchestratorConfig {
            prod_root: root.join("prod"),
            dev_root: root.join("dev"),
            scripts_path: root.join("scripts"),
            regenerate_assets_script: root.join("scripts/odoo/regenerate-assets.sh"),
            log_dir: root.join("logs"),
            shell: PathBuf::from("/bin/sh"),
            ..OrchestratorConfig::default()
        };
        config.commands.systemctl = root.join("bin/systemctl");
        config.commands.sudo = None;
        config.nginx.access_log = root.join("nginx/access.log");
        config.nginx.error_log = root.join("nginx/error.log");
        config.timeouts.probe = 1;
        config.timeouts.query = 5;
        config.timeouts.restart = 5;
        config.timeouts.delete = 10;

        let fixture = Self { dir, config };
        fixture.write_executable(&fixture.config.commands.systemctl, SYSTEMCTL_STUB);
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.config.clone())
    }

    pub fn add_instance(
        &self,
        environment: Environment,
        name: &str,
        descriptor: Option<&str>,
    ) -> PathBuf {
        let root = match environment {
            Environment::Production => &self.config.prod_root,
            Environment::Development => &self.config.dev_root,
        };
        let path = root.join(name);
        fs::create_dir_all(&path).unwrap();
        if let Some(content) = descriptor {
            fs::write(path.join("info-instancia.txt"), content).unwrap();
        }
        path
    }

    pub fn write_executable(&self, path: &Path, body: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Install a stub for one of the tools in `[commands]`.
    pub fn stub_tool(&self, name: &str, body: &str) -> PathBuf {
        let path = self.root().join("bin").join(name);
        self.write_executable(&path, body);
        path
    }

    pub fn log_file(&self, slug: &str, instance: &str) -> PathBuf {
        self.config
            .log_dir
            .join(format!("odoo-{}-{}.log", slug, instance))
    }
}

pub fn descriptor(port: u16, domain: &str, service: &str) -> String {
    format!(
        "Instancia creada\nPuerto: {}\nDominio: https://{}\nBase de datos: {}_db\nServicio systemd: {}\n",
        port, domain, service, service
    )
}

/// Wait until `path` contains `needle`, up to ~5s.
pub async fn wait_for_content(path: &Path, needle: &str) -> String {
    for _ in 0..50 {
        if let Ok(content) = fs::read_to_string(path) {
            if content.contains(needle) {
                return content;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    fs::read_to_string(path).unwrap_or_default()
}
