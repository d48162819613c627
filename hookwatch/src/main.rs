use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
use cli::Cli;

fn main() -> Result<()> {
    // Parse CLI arguments first to get verbosity level
    let cli = Cli::parse_normalized();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(cli::execute(&cli.config, cli.check))
}
