use anyhow::Result;
use clap::Parser;

use tablesync::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    log::debug!("tablesync {} starting", env!("CARGO_PKG_VERSION"));

    cli::run(cli).await
}
