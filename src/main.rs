use anyhow::{Context, Result};
use clap::Parser;
use forkwatch::cli::{self, Cli, Commands};
use forkwatch::monitor::ForkChecker;
use tracing::info;

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple, shutdown_signal};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Validate => {
            init_logging_simple();
            let config = cli::load_config(&cli.config)?;
            cli::validate_config(&config)?;
        }
        Commands::Height => {
            init_logging_simple();
            let config = cli::load_config(&cli.config)?;
            cli::show_height(&config).await?;
        }
        Commands::Run => {
            let config = cli::load_config(&cli.config)
                .with_context(|| format!("failed to load config from {}", cli.config))?;
            init_logging(&config.logging);
            info!("Loaded configuration from {}", cli.config);

            let mut checker = ForkChecker::from_config(&config)
                .await
                .context("failed to start fork checker")?;
            checker.run(shutdown_signal()).await?;
        }
    }

    Ok(())
}
