use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use stash::{Config, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_telemetry()?;

    let server = Server::bind(&config).await?;
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        strict_filenames = config.strict_filenames,
        "server running"
    );

    server
        .serve(stash::app(config.uploads()))
        .shutdown_on(stash::shutdown_signal())
        .await
        .context("server did not shut down cleanly")
}

fn init_telemetry() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid RUST_LOG filter")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("failed to install the tracing subscriber")
}
