//! Descriptor file parsing.
//!
//! The provisioning scripts write `info-instancia.txt` with lines such as:
//!
//! ```text
//! Puerto: 8069
//! Dominio: https://foo.example.com
//! Base de datos: foo_prod
//! Servicio systemd: odoo-foo
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::types::InstanceMetadata;
use crate::paths::descriptor_path;

#[allow(clippy::expect_used)]
static PORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Puerto:\s*(\S*)").expect("valid port regex"));

#[allow(clippy::expect_used)]
static DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Dominio:\s*(\S*)").expect("valid domain regex"));

#[allow(clippy::expect_used)]
static HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://([^\s/:?#]+)").expect("valid host regex"));

#[allow(clippy::expect_used)]
static DATABASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Base de datos:\s*(\S*)").expect("valid database regex"));

#[allow(clippy::expect_used)]
static SERVICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Servicio systemd:\s*(\S*)").expect("valid service regex"));

/// Value following `re`'s label on `line`, possibly empty.
fn labeled<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Descriptor fields plus the lines whose label matched but whose value
/// could not be used.
#[derive(Debug, Default)]
pub struct DescriptorScan {
    pub metadata: InstanceMetadata,
    pub malformed: Vec<String>,
}

/// Extract every field independently; the first usable line per field wins.
pub fn scan_descriptor(content: &str) -> DescriptorScan {
    let mut scan = DescriptorScan::default();
    let meta = &mut scan.metadata;
    let malformed = &mut scan.malformed;

    for line in content.lines() {
        if meta.port.is_none() {
            if let Some(raw) = labeled(&PORT_RE, line) {
                let digits = raw.split(|c: char| !c.is_ascii_digit()).next().unwrap_or("");
                match digits.parse::<u16>() {
                    Ok(port) => meta.port = Some(port),
                    Err(_) => malformed.push(line.trim().to_string()),
                }
            }
        }
        if meta.domain.is_none() {
            if let Some(raw) = labeled(&DOMAIN_RE, line) {
                match labeled(&HOST_RE, raw) {
                    Some(host) => meta.domain = Some(host.to_string()),
                    None => malformed.push(line.trim().to_string()),
                }
            }
        }
        if meta.database.is_none() {
            match labeled(&DATABASE_RE, line) {
                Some("") => malformed.push(line.trim().to_string()),
                Some(name) => meta.database = Some(name.to_string()),
                None => {}
            }
        }
        if meta.service_name.is_none() {
            match labeled(&SERVICE_RE, line) {
                Some("") => malformed.push(line.trim().to_string()),
                Some(unit) => meta.service_name = Some(unit.to_string()),
                None => {}
            }
        }
    }

    scan
}

/// Parse descriptor text, logging any malformed field.
pub fn parse_descriptor(content: &str) -> InstanceMetadata {
    let scan = scan_descriptor(content);
    for line in &scan.malformed {
        log::warn!("Ignoring malformed descriptor line: {:?}", line);
    }
    scan.metadata
}

/// Read the descriptor in `instance_dir`.
///
/// A missing file is normal for instances still being provisioned. Read
/// errors are logged and produce an empty record; invalid UTF-8 is decoded
/// lossily so the remaining fields still parse.
pub fn read_metadata(instance_dir: &Path) -> InstanceMetadata {
    let path = descriptor_path(instance_dir);
    match std::fs::read(&path) {
        Ok(bytes) => {
            let scan = scan_descriptor(&String::from_utf8_lossy(&bytes));
            for line in &scan.malformed {
                log::warn!("Malformed line in {:?}: {:?}", path, line);
            }
            scan.metadata
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => InstanceMetadata::default(),
        Err(e) => {
            log::warn!("Error reading descriptor {:?}: {}", path, e);
            InstanceMetadata::default()
        }
    }
}
