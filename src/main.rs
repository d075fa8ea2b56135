use anyhow::{Context, Result};
use clap::Parser;

use chunk_tally::config::Cli;
use chunk_tally::logging::init_logging;
use chunk_tally::timing::Stopwatch;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let total = Stopwatch::start("Total time");
    let config = cli.into_config();

    chunk_tally::run(&config)
        .await
        .with_context(|| format!("counting {} failed", config.path.display()))?;

    total.finish();
    Ok(())
}
