//! Odoo instances: discovery, descriptors and maintenance operations.
//!
//! Layout consumed:
//! - {prod_root}/{name}/ and {dev_root}/{name}/ - one directory per instance
//! - {instance}/info-instancia.txt - descriptor written at provisioning time
//! - {instance}/update-db.sh, update-files.sh, sync-filestore.sh - dev only
//! - {scripts_path}/odoo/create-dev-instance.sh, remove-dev-instance.sh

mod lifecycle;
mod metadata;
mod protocol;
mod registry;
mod types;

// Re-export types
pub use types::{Environment, Instance, InstanceDetail, InstanceMetadata};

// Re-export descriptor parsing
pub use metadata::{parse_descriptor, read_metadata, scan_descriptor, DescriptorScan};

// Re-export answer-script protocol
pub use protocol::{
    bare_name, Answer, AnswerScript, ExecutionMode, Operation, CONFIRM_TOKEN, DECLINE_TOKEN,
    DELETE_KEYWORD, DEV_PREFIX,
};

// Re-export registry
pub use registry::InstanceRegistry;

// Re-export lifecycle
pub use lifecycle::{LaunchState, OperationLauncher, OperationProgress, OperationRecord};
