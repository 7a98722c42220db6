//! Maintenance operations driven through the instances' interactive scripts.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::{Child, Command};
use uuid::Uuid;

use super::protocol::{AnswerScript, ExecutionMode, Operation};
use super::registry::InstanceRegistry;
use super::types::Environment;
use crate::config::OrchestratorConfig;
use crate::error::{AppError, Result};
use crate::paths::{create_script, delete_script, instance_script, operation_log_path};
use crate::process::{
    apply_new_session, feed_stdin, open_operation_log, read_log_lossy, tail_lines,
    OperationGuard, OperationState, OperationTracker,
};
use crate::validation::{validate_email, validate_instance_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    /// Detached child started; outcome unknown until polled.
    Launched,
    /// Attached operation ran to a successful end.
    Completed,
}

/// Result of a successful launch.
#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub operation: Operation,
    pub instance: String,
    pub state: LaunchState,
    pub message: String,
    pub log_file: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neutralize: Option<bool>,
}

impl OperationRecord {
    fn new(operation: Operation, instance: &str, message: String, log_file: Option<PathBuf>) -> Self {
        let state = match operation.mode() {
            ExecutionMode::Detached => LaunchState::Launched,
            ExecutionMode::Attached => LaunchState::Completed,
        };
        Self {
            id: Uuid::new_v4(),
            operation,
            instance: instance.to_string(),
            state,
            message,
            log_file,
            started_at: Utc::now(),
            exit_code: None,
            neutralize: None,
        }
    }
}

/// Snapshot returned by [`OperationLauncher::poll_operation`].
#[derive(Debug, Clone, Serialize)]
pub struct OperationProgress {
    pub operation: Operation,
    pub instance: String,
    #[serde(flatten)]
    pub state: OperationState,
    pub started_at: Option<DateTime<Utc>>,
    pub log_file: Option<PathBuf>,
    pub log_exists: bool,
    pub tail: String,
}

/// Everything needed to start one script.
struct ScriptLaunch<'a> {
    operation: Operation,
    instance: &'a str,
    script: PathBuf,
    args: Vec<String>,
    cwd: Option<&'a Path>,
    answers: Option<AnswerScript>,
}

pub struct OperationLauncher {
    config: Arc<OrchestratorConfig>,
    registry: Arc<InstanceRegistry>,
    tracker: Arc<OperationTracker>,
}

impl OperationLauncher {
    pub fn new(
        config: Arc<OrchestratorConfig>,
        registry: Arc<InstanceRegistry>,
        tracker: Arc<OperationTracker>,
    ) -> Self {
        Self {
            config,
            registry,
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<OperationTracker> {
        &self.tracker
    }

    fn log_path(&self, operation: Operation, instance: &str) -> PathBuf {
        operation_log_path(&self.config, operation.log_slug(), instance)
    }

    /// Spawn the script in its own session with output going to its log file.
    fn spawn_script(&self, launch: &ScriptLaunch<'_>) -> Result<(PathBuf, Child)> {
        let log_file = self.log_path(launch.operation, launch.instance);
        let (stdout, stderr) = open_operation_log(&log_file)
            .map_err(|e| launch_context(e, launch, &log_file))?;

        let mut cmd = Command::new(&self.config.shell);
        cmd.arg(&launch.script)
            .args(&launch.args)
            .stdout(stdout)
            .stderr(stderr)
            .stdin(if launch.answers.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(dir) = launch.cwd {
            cmd.current_dir(dir);
        }
        apply_new_session(&mut cmd);

        let child = cmd.spawn().map_err(|e| {
            launch_context(
                AppError::io(format!("Failed to start {}: {}", launch.operation, e)),
                launch,
                &log_file,
            )
        })?;

        log::info!(
            "Started {} for {} (pid: {:?}, log: {:?})",
            launch.operation,
            launch.instance,
            child.id(),
            log_file
        );

        Ok((log_file, child))
    }

    /// Spawn the script and write its answer script.
    ///
    /// Once spawned the child runs whether or not its answers got through,
    /// so a failed write hands the lock to the child instead of releasing it.
    async fn start_script(
        &self,
        launch: &ScriptLaunch<'_>,
        guard: OperationGuard,
    ) -> Result<(PathBuf, Child, OperationGuard)> {
        let (log_file, mut child) = self.spawn_script(launch)?;

        if let Some(answers) = &launch.answers {
            if let Err(e) = feed_stdin(&mut child, answers.render().as_bytes()).await {
                log::error!(
                    "Could not answer {} for {}, script left running: {}",
                    launch.operation,
                    launch.instance,
                    e
                );
                guard.release_on_exit(child);
                return Err(launch_context(e, launch, &log_file));
            }
        }

        Ok((log_file, child, guard))
    }

    /// Fire-and-forget launch. The guard stays held in the background until
    /// the child exits; the caller gets control back as soon as stdin is closed.
    async fn launch_detached(
        &self,
        launch: ScriptLaunch<'_>,
        guard: OperationGuard,
    ) -> Result<PathBuf> {
        let (log_file, child, guard) = self.start_script(&launch, guard).await?;
        guard.release_on_exit(child);
        Ok(log_file)
    }

    /// Environment whose lock an operation on `name` takes, resolved the same
    /// way the operation resolves its target.
    fn tracked_environment(&self, operation: Operation, name: &str) -> Environment {
        match operation {
            Operation::Restart => self
                .registry
                .locate(Environment::Production, name)
                .unwrap_or(Environment::Production),
            Operation::RegenerateAssets => self
                .registry
                .locate(Environment::Development, name)
                .unwrap_or(Environment::Development),
            _ => Environment::Development,
        }
    }

    fn ensure_script(script: &Path, instance: &str) -> Result<()> {
        if script.is_file() {
            Ok(())
        } else {
            log::error!("Script {:?} not found for {}", script, instance);
            Err(AppError::script_missing(script, instance))
        }
    }

    async fn development_instance(&self, name: &str) -> Result<PathBuf> {
        validate_instance_name(name)?;
        self.registry
            .find_in(Environment::Development, name)
            .await
            .map(|instance| instance.path)
            .ok_or_else(|| AppError::instance_not_found(name))
    }

    /// Run one of the scripts that live in a development instance directory.
    async fn launch_instance_script(
        &self,
        operation: Operation,
        name: &str,
        file_name: &str,
        answers: AnswerScript,
    ) -> Result<PathBuf> {
        let instance_dir = self.development_instance(name).await?;
        let script = instance_script(&instance_dir, file_name);
        Self::ensure_script(&script, name)?;

        let guard = self.tracker.begin(Environment::Development, name, operation)?;
        self.launch_detached(
            ScriptLaunch {
                operation,
                instance: name,
                script,
                args: Vec::new(),
                cwd: Some(&instance_dir),
                answers: Some(answers),
            },
            guard,
        )
        .await
    }

    /// Create a development instance through the shared creation script.
    pub async fn create_dev_instance(
        &self,
        name: &str,
        notification_email: Option<&str>,
    ) -> Result<OperationRecord> {
        validate_instance_name(name)?;
        if let Some(email) = notification_email {
            validate_email(email)?;
        }

        let script = create_script(&self.config);
        Self::ensure_script(&script, name)?;

        let mut args = vec![name.to_string()];
        args.extend(notification_email.map(str::to_string));

        let guard = self
            .tracker
            .begin(Environment::Development, name, Operation::Create)?;
        let log_file = self
            .launch_detached(
                ScriptLaunch {
                    operation: Operation::Create,
                    instance: name,
                    script,
                    args,
                    cwd: None,
                    answers: Some(AnswerScript::create()),
                },
                guard,
            )
            .await?;

        Ok(OperationRecord::new(
            Operation::Create,
            name,
            format!(
                "Creation of instance {} started. See log: {}",
                name,
                log_file.display()
            ),
            Some(log_file),
        ))
    }

    /// Delete a development instance, waiting for the removal script.
    pub async fn delete_instance(&self, name: &str) -> Result<OperationRecord> {
        self.development_instance(name).await?;

        let script = delete_script(&self.config);
        Self::ensure_script(&script, name)?;

        let guard = self
            .tracker
            .begin(Environment::Development, name, Operation::Delete)?;
        let launch = ScriptLaunch {
            operation: Operation::Delete,
            instance: name,
            script,
            args: Vec::new(),
            cwd: None,
            answers: Some(AnswerScript::delete(name)),
        };
        let (log_file, mut child, guard) = self.start_script(&launch, guard).await?;

        let timeout = self.config.timeouts.delete();
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(AppError::io(format!("Failed to wait for removal script: {}", e))
                    .with("instance", name)
                    .with("log_file", log_file.display().to_string()));
            }
            Err(_) => {
                log::error!(
                    "Deletion of {} exceeded {}s, leaving script running",
                    name,
                    timeout.as_secs()
                );
                // The instance stays locked until the orphan finishes.
                guard.release_on_exit(child);
                return Err(AppError::timeout(
                    &launch.script.display().to_string(),
                    timeout.as_secs(),
                )
                .with("instance", name)
                .with("log_file", log_file.display().to_string())
                .with("log", read_log_lossy(&log_file)));
            }
        };

        guard.finish(status.code());

        if !status.success() {
            log::error!("Deletion of {} failed with {:?}", name, status.code());
            return Err(AppError::non_zero_exit(
                &launch.script.display().to_string(),
                status.code(),
                format!(
                    "Deletion of {} failed. See log: {}",
                    name,
                    log_file.display()
                ),
            )
            .with("instance", name)
            .with("log_file", log_file.display().to_string())
            .with("log", read_log_lossy(&log_file)));
        }

        log::info!("Instance {} deleted", name);
        let mut record = OperationRecord::new(
            Operation::Delete,
            name,
            format!("Instance {} deleted", name),
            Some(log_file),
        );
        record.exit_code = status.code();
        Ok(record)
    }

    /// Refresh a development database from production.
    pub async fn update_database(&self, name: &str, neutralize: bool) -> Result<OperationRecord> {
        let log_file = self
            .launch_instance_script(
                Operation::UpdateDatabase,
                name,
                "update-db.sh",
                AnswerScript::update_database(neutralize),
            )
            .await?;

        let mode = if neutralize {
            "with neutralization"
        } else {
            "without neutralization"
        };
        let mut record = OperationRecord::new(
            Operation::UpdateDatabase,
            name,
            format!(
                "Database update started ({}). See log: {}",
                mode,
                log_file.display()
            ),
            Some(log_file),
        );
        record.neutralize = Some(neutralize);
        Ok(record)
    }

    pub async fn update_files(&self, name: &str) -> Result<OperationRecord> {
        let log_file = self
            .launch_instance_script(
                Operation::UpdateFiles,
                name,
                "update-files.sh",
                AnswerScript::confirm_only(),
            )
            .await?;

        Ok(OperationRecord::new(
            Operation::UpdateFiles,
            name,
            format!("File update started. See log: {}", log_file.display()),
            Some(log_file),
        ))
    }

    /// Copy the production filestore into a development instance.
    pub async fn sync_filestore(&self, name: &str) -> Result<OperationRecord> {
        let log_file = self
            .launch_instance_script(
                Operation::SyncFilestore,
                name,
                "sync-filestore.sh",
                AnswerScript::confirm_only(),
            )
            .await?;

        Ok(OperationRecord::new(
            Operation::SyncFilestore,
            name,
            format!("Filestore sync started. See log: {}", log_file.display()),
            Some(log_file),
        ))
    }

    /// Restart the instance's systemd unit. Blocks up to the restart timeout.
    pub async fn restart_instance(&self, name: &str) -> Result<OperationRecord> {
        validate_instance_name(name)?;
        let instance = self
            .registry
            .get_instance(name)
            .await
            .ok_or_else(|| AppError::instance_not_found(name))?;
        let unit = instance
            .service_name
            .as_deref()
            .ok_or_else(|| AppError::resource_not_found(name, "service"))?;

        let guard = self
            .tracker
            .begin(instance.environment, name, Operation::Restart)?;
        self.registry
            .services()
            .restart(unit)
            .await
            .map_err(|e| e.with("instance", name))?;
        guard.finish(Some(0));

        let mut record = OperationRecord::new(
            Operation::Restart,
            name,
            format!("Instance {} restarted", name),
            None,
        );
        record.exit_code = Some(0);
        Ok(record)
    }

    /// Rebuild web assets with the centralized script. Development instances
    /// take precedence over production ones of the same name.
    pub async fn regenerate_assets(&self, name: &str) -> Result<OperationRecord> {
        validate_instance_name(name)?;
        let instance = self
            .registry
            .resolve_preferring(Environment::Development, name)
            .await
            .ok_or_else(|| AppError::instance_not_found(name))?;

        let script = self.config.regenerate_assets_script.clone();
        Self::ensure_script(&script, name)?;

        let guard = self
            .tracker
            .begin(instance.environment, name, Operation::RegenerateAssets)?;
        let log_file = self
            .launch_detached(
                ScriptLaunch {
                    operation: Operation::RegenerateAssets,
                    instance: name,
                    script,
                    args: vec![
                        "--force".to_string(),
                        name.to_string(),
                        instance.environment.script_arg().to_string(),
                    ],
                    cwd: None,
                    answers: None,
                },
                guard,
            )
            .await?;

        Ok(OperationRecord::new(
            Operation::RegenerateAssets,
            name,
            format!(
                "Asset regeneration started. See log: {}",
                log_file.display()
            ),
            Some(log_file),
        ))
    }

    /// Inspect an operation through its log file and the in-process tracker.
    pub fn poll_operation(
        &self,
        operation: Operation,
        name: &str,
        lines: usize,
    ) -> Result<OperationProgress> {
        validate_instance_name(name)?;

        let environment = self.tracked_environment(operation, name);
        let state = self.tracker.state_of(environment, name, operation);
        let started_at = match state {
            OperationState::Unknown => None,
            _ => self.tracker.started_at(environment, name),
        };

        let log_file = operation.has_log().then(|| self.log_path(operation, name));
        let log_exists = log_file.as_deref().is_some_and(Path::is_file);
        let tail = match log_file.as_deref() {
            Some(path) if log_exists => tail_lines(&read_log_lossy(path), lines),
            _ => String::new(),
        };

        Ok(OperationProgress {
            operation,
            instance: name.to_string(),
            state,
            started_at,
            log_file,
            log_exists,
            tail,
        })
    }
}

fn launch_context(err: AppError, launch: &ScriptLaunch<'_>, log_file: &Path) -> AppError {
    err.with("script", launch.script.display().to_string())
        .with("instance", launch.instance)
        .with("log_file", log_file.display().to_string())
}
