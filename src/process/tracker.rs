//! Per-instance advisory locks and last-known operation state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Child;

use crate::error::{AppError, Result};
use crate::instance::{Environment, Operation};

/// What this process knows about an operation on an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationState {
    Running,
    Finished { exit_code: Option<i32> },
    /// Never launched by this process (or superseded); only the log can tell.
    Unknown,
}

/// Instance names are only unique within an environment.
type InstanceKey = (Environment, String);

#[derive(Debug, Clone)]
struct TrackedOperation {
    operation: Operation,
    state: OperationState,
    started_at: DateTime<Utc>,
}

/// Tracks mutating operations keyed by environment and instance name.
///
/// At most one operation per instance may be `Running`; further requests
/// are rejected until the holder's guard is released.
pub struct OperationTracker {
    entries: RwLock<HashMap<InstanceKey, TrackedOperation>>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn lookup<T>(
        &self,
        environment: Environment,
        instance: &str,
        f: impl FnOnce(Option<&TrackedOperation>) -> T,
    ) -> T {
        let key = (environment, instance.to_string());
        f(self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key))
    }

    /// Take the advisory lock for `instance` in `environment`.
    pub fn begin(
        self: &Arc<Self>,
        environment: Environment,
        instance: &str,
        operation: Operation,
    ) -> Result<OperationGuard> {
        let key = (environment, instance.to_string());
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = entries.get(&key) {
            if current.state == OperationState::Running {
                let running = current.operation;
                drop(entries);
                log::warn!(
                    "Rejecting {} on {} ({:?}): {} already in progress",
                    operation,
                    instance,
                    environment,
                    running
                );
                return Err(AppError::operation_in_progress(instance, running.as_str()));
            }
        }

        entries.insert(
            key.clone(),
            TrackedOperation {
                operation,
                state: OperationState::Running,
                started_at: Utc::now(),
            },
        );
        drop(entries);

        Ok(OperationGuard {
            tracker: Arc::clone(self),
            key,
            exit_code: None,
        })
    }

    pub fn state_of(
        &self,
        environment: Environment,
        instance: &str,
        operation: Operation,
    ) -> OperationState {
        self.lookup(environment, instance, |entry| {
            entry
                .filter(|entry| entry.operation == operation)
                .map_or(OperationState::Unknown, |entry| entry.state)
        })
    }

    /// Start time of the latest operation recorded for `instance`.
    pub fn started_at(&self, environment: Environment, instance: &str) -> Option<DateTime<Utc>> {
        self.lookup(environment, instance, |entry| {
            entry.map(|entry| entry.started_at)
        })
    }

    pub fn is_busy(&self, environment: Environment, instance: &str) -> bool {
        self.lookup(environment, instance, |entry| {
            entry.is_some_and(|entry| entry.state == OperationState::Running)
        })
    }

    fn complete(&self, key: &InstanceKey, exit_code: Option<i32>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(key) {
            entry.state = OperationState::Finished { exit_code };
        }
    }
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the advisory lock; releasing it records the operation as finished.
pub struct OperationGuard {
    tracker: Arc<OperationTracker>,
    key: InstanceKey,
    exit_code: Option<i32>,
}

impl OperationGuard {
    pub fn finish(mut self, exit_code: Option<i32>) {
        self.exit_code = exit_code;
    }

    /// Keep the lock until a detached child exits, without making the caller wait.
    pub fn release_on_exit(mut self, mut child: Child) {
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    self.exit_code = status.code();
                    log::info!(
                        "Detached operation on {} exited with {:?}",
                        self.key.1,
                        self.exit_code
                    );
                }
                Err(e) => {
                    log::warn!("Lost track of detached child for {}: {}", self.key.1, e);
                }
            }
        });
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.tracker.complete(&self.key, self.exit_code);
    }
}
