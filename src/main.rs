use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use odoo_orchestrator_lib::config::CONFIG_ENV;
use odoo_orchestrator_lib::instance::Operation;
use odoo_orchestrator_lib::{AppError, AppState, Envelope, OrchestratorConfig, Result};

#[derive(Parser)]
#[command(name = "odoo-orchestrator", version, about = "Manage Odoo instances on this host")]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List production and development instances
    List,
    /// Show one instance with verbose service status
    Status { name: String },
    /// Create a development instance
    Create {
        name: String,
        /// Notification address for the TLS certificate
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete a development instance (waits for completion)
    Delete { name: String },
    /// Refresh a development database from production
    UpdateDb {
        name: String,
        /// Keep production data as-is instead of neutralizing it
        #[arg(long)]
        no_neutralize: bool,
    },
    /// Update the files of a development instance
    UpdateFiles { name: String },
    /// Copy the production filestore into a development instance
    SyncFilestore { name: String },
    /// Restart the instance's systemd unit
    Restart { name: String },
    /// Rebuild web assets
    RegenerateAssets { name: String },
    /// Tail instance logs
    Logs {
        name: String,
        #[arg(long, default_value_t = 100)]
        lines: usize,
        /// systemd, odoo, nginx-access or nginx-error
        #[arg(long, default_value = "systemd")]
        source: String,
    },
    /// Check on a launched operation
    Poll {
        operation: Operation,
        name: String,
        #[arg(long, default_value_t = 50)]
        lines: usize,
    },
}

fn emit<T: Serialize>(result: Result<T>) -> ExitCode {
    let envelope: Envelope<T> = result.into();
    let code = if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };
    match envelope.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Failed to serialize response: {}", e);
            return ExitCode::FAILURE;
        }
    }
    code
}

async fn dispatch(state: &AppState, command: Commands) -> ExitCode {
    match command {
        Commands::List => emit(Ok(state.registry.list_instances().await)),
        Commands::Status { name } => emit(
            state
                .registry
                .get_instance_status(&name)
                .await
                .ok_or_else(|| AppError::instance_not_found(&name)),
        ),
        Commands::Create { name, email } => emit(
            state
                .launcher
                .create_dev_instance(&name, email.as_deref())
                .await,
        ),
        Commands::Delete { name } => emit(state.launcher.delete_instance(&name).await),
        Commands::UpdateDb {
            name,
            no_neutralize,
        } => emit(state.launcher.update_database(&name, !no_neutralize).await),
        Commands::UpdateFiles { name } => emit(state.launcher.update_files(&name).await),
        Commands::SyncFilestore { name } => emit(state.launcher.sync_filestore(&name).await),
        Commands::Restart { name } => emit(state.launcher.restart_instance(&name).await),
        Commands::RegenerateAssets { name } => {
            emit(state.launcher.regenerate_assets(&name).await)
        }
        Commands::Logs {
            name,
            lines,
            source,
        } => emit(state.logs.get_instance_logs(&name, lines, &source).await),
        Commands::Poll {
            operation,
            name,
            lines,
        } => emit(state.launcher.poll_operation(operation, &name, lines)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let config = match OrchestratorConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return emit::<()>(Err(e)),
    };
    log::debug!(
        "Using roots prod={:?} dev={:?}",
        config.prod_root,
        config.dev_root
    );

    let state = AppState::new(config);
    dispatch(&state, cli.command).await
}
