use clap::Parser;
use hyperraft_node::{bootstrap, Config, NodeConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "hyperraftd", about = "HyperRAFT++ replica node")]
struct Args {
    /// Path to the node's YAML configuration file.
    #[clap(long, short = 'c')]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = NodeConfig::load(&args.config)?;
    std::fs::create_dir_all(&config.data_dir)?;

    let node_id = config.node_id.clone();
    let handles = bootstrap(config).await?;
    tracing::info!(%node_id, "hyperraftd running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    handles.shutdown();

    Ok(())
}
