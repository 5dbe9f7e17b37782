use ossie_nodebooter::{Config, NodeBooter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let booter = NodeBooter::boot(&config).await?;
    tracing::info!(
        domain = %config.domain.name,
        nodes = booter.nodes().len(),
        devices = booter.domain().devices().len(),
        applications = booter.applications().len(),
        "domain up, waiting for ctrl-c"
    );

    let signal = tokio::signal::ctrl_c().await;
    booter.shutdown().await;
    signal?;
    Ok(())
}
