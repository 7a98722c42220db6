//! Orchestration of Odoo production and development instances on one host.
//!
//! The registry merges the filesystem, per-instance descriptors and systemd
//! state into [`instance::Instance`] values; the launcher drives the
//! interactive maintenance scripts; the log aggregator tails journald,
//! odoo.log and nginx logs.

pub mod commands;
pub mod config;
pub mod error;
pub mod instance;
pub mod logs;
pub mod paths;
pub mod process;
pub mod service;
pub mod validation;

pub use commands::{AppState, Envelope};
pub use config::OrchestratorConfig;
pub use error::{AppError, ErrorKind, Result};
pub use instance::{InstanceRegistry, OperationLauncher};
pub use logs::LogAggregator;
