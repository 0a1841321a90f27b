use std::sync::Arc;

use clap::Parser as _;
use dotenvy::dotenv;
use oracle_node::cli::{Cli, Commands, RunCmd};
use oracle_node::core::config::Config;
use oracle_node::services::head_tracker::HeadTracker;
use oracle_node::services::run_executor::RunExecutor;
use oracle_node::services::store::Store;
use oracle_node::types::params::NodeParams;
use oracle_node::utils::logging::init_logging;
use oracle_node::utils::ticker::Ticker;
use oracle_node::{NodeError, NodeResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Start the node
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging()?;
    info!("Starting oracle node");
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { run_command } => {
            info!("Executing run command with args: {:?}", run_command);
            if let Err(e) = run_node(run_command).await {
                error!(error = %e, error_chain = ?e, "Oracle node stopped with an error");
                return Err(e.into());
            }
            info!("Oracle node shut down");
        }
    }
    Ok(())
}

async fn run_node(run_cmd: &RunCmd) -> NodeResult<()> {
    let params = NodeParams::try_from(run_cmd)?;
    let head_poll_interval = params.head_poll_interval;
    let config = Arc::new(Config::setup(params).await?);
    debug!("Configuration initialized");

    let store = Store::new(config.clone());
    if let Err(e) = store.start().await {
        let _ = store.close().await;
        return Err(e.into());
    }

    let executor = Arc::new(RunExecutor::new(config.clone()));
    let head_tracker = Arc::new(HeadTracker::new(config, executor));
    let cancel = CancellationToken::new();
    let tracker = tokio::spawn(head_tracker.run(Ticker::every(head_poll_interval), cancel.clone()));
    info!("Oracle node started");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| NodeError::SetupCommandError(format!("Failed to listen for ctrl+c: {e}")))?;

    info!("Shutting down");
    cancel.cancel();
    if let Err(e) = tracker.await {
        error!(error = %e, "Head tracker task failed");
    }
    store.close().await?;
    Ok(())
}
