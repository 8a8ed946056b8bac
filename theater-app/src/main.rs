use anyhow::Result;
use clap::Parser;
use theater_app::cli::{load_config, run, Cli};
use theater_common::observability::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (env wins)
    let config = load_config(cli.config.as_deref())?;

    // 2) Logging from the loaded config
    init_logging(config.logging.to_log_config("theater"))?;

    run(cli.command, config).await
}
