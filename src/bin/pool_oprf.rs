use anyhow::{Context, Result};
use clap::Parser;
use pool_oprf::cli_utils::PoolArgs;
use pool_oprf::demo::run;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pool_oprf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = PoolArgs::parse();

    tracing::debug!(?args, "arguments");

    run(args).with_context(|| "Failed to run the protocol.")?;

    Ok(())
}
