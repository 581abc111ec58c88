use clap::{Parser, Subcommand};
use std::time::Duration;

use crate::adapters::{ChainClient, RestChainClient};
use crate::config::AppConfig;
use crate::domain::parse_nodes;
use crate::error::{ForkwatchError, Result};

#[derive(Parser)]
#[command(name = "forkwatch")]
#[command(version = "0.1.0")]
#[command(about = "Blockchain fork and sync monitor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path (TOML or JSON)
    #[arg(short, long, default_value = "config/default.toml", env = "FORKWATCH_CONFIG")]
    pub config: String,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the fork checker (default)
    Run,
    /// Load and validate the config file, then exit
    Validate,
    /// Print the current chain height reported by the API URLs
    Height,
}

/// Load a config file and fail on any validation problem
pub fn load_config(path: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(path)?;
    config.validate().map_err(ForkwatchError::InvalidConfig)?;
    Ok(config)
}

/// Print a short summary of a validated config
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let nodes = parse_nodes(&config.nodes)?;
    let thresholds = config.alerts.thresholds();

    println!("Configuration OK");
    println!("  nodes:                 {}", nodes.len());
    for node in &nodes {
        println!("    {}", node.label());
    }
    println!("  api urls:              {}", config.api_urls.join(", "));
    println!(
        "  checkpoint:            {}",
        if config.checkpoint == 0 {
            "chain height".to_string()
        } else {
            config.checkpoint.to_string()
        }
    );
    println!("  height check interval: {}", config.height_check_interval);
    println!("  notify:                {}", config.notify);
    println!(
        "  offline:               > {} cycles, repeat every {}",
        thresholds.offline_consecutive_threshold,
        humantime::format_duration(thresholds.offline_alert_repeat_interval)
    );
    println!(
        "  stuck:                 after {}",
        humantime::format_duration(thresholds.stuck_duration_threshold)
    );
    println!(
        "  out-of-sync:           {} nodes >= {} blocks behind, repeat every {}",
        thresholds.out_of_sync_critical_nodes_threshold,
        thresholds.out_of_sync_blocks_threshold,
        humantime::format_duration(thresholds.sync_alert_repeat_interval)
    );

    Ok(())
}

/// Print the chain height from the first responsive API URL
pub async fn show_height(config: &AppConfig) -> Result<()> {
    let chain = RestChainClient::connect(
        &config.api_urls,
        Duration::from_secs(config.pool.request_timeout_secs),
    )
    .await?;
    let height = chain.blockchain_height().await?;
    println!("{}", height);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_and_config() {
        let cli = Cli::parse_from(["forkwatch"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, "config/default.toml");
    }

    #[test]
    fn test_subcommands() {
        let cli = Cli::parse_from(["forkwatch", "--config", "prod.json", "validate"]);
        assert_eq!(cli.command, Some(Commands::Validate));
        assert_eq!(cli.config, "prod.json");
    }

    #[test]
    fn test_load_missing_config_fails() {
        assert!(load_config("does/not/exist.toml").is_err());
    }
}
