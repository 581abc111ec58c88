use crate::alerting::AlertThresholds;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Average block time, used to turn an offline duration into a cycle count
pub const AVG_SECONDS_PER_BLOCK: Duration = Duration::from_secs(15);

pub const DEFAULT_OFFLINE_ALERT_REPEAT_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
pub const DEFAULT_OFFLINE_DURATION_THRESHOLD: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SYNC_ALERT_REPEAT_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
pub const DEFAULT_STUCK_DURATION_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Nodes whose height and block hash are compared
    pub nodes: Vec<NodeConfig>,
    /// REST API URLs used to read the chain height, tried in order
    pub api_urls: Vec<String>,
    /// Starting height; 0 means "current chain height"
    #[serde(default)]
    pub checkpoint: u64,
    /// Blocks between two checkpoints
    #[serde(default = "default_height_check_interval")]
    pub height_check_interval: u64,
    /// Send alerts to Telegram
    #[serde(default)]
    pub notify: bool,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_height_check_interval() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub endpoint: String,
    #[serde(alias = "IdentityKey")]
    pub identity_key: String,
    #[serde(default)]
    pub friendly_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_api_key: String,
    #[serde(default)]
    pub chat_id: i64,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Upper bound for a single sendMessage call
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_send_timeout() -> u64 {
    10
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_api_key: String::new(),
            chat_id: 0,
            api_base: default_telegram_api_base(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Alert tuning. Durations are human strings such as "12h" or "10m".
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_offline_alert_repeat_interval")]
    pub offline_alert_repeat_interval: String,
    #[serde(default = "default_offline_duration_threshold")]
    pub offline_duration_threshold: String,
    /// Consecutive offline cycles tolerated before alerting.
    /// Derived from `offline_duration_threshold` when unset.
    #[serde(default)]
    pub offline_consecutive_threshold: Option<u32>,
    #[serde(default = "default_sync_alert_repeat_interval")]
    pub sync_alert_repeat_interval: String,
    #[serde(default = "default_stuck_duration_threshold")]
    pub stuck_duration_threshold: String,
    #[serde(default = "default_out_of_sync_blocks_threshold")]
    pub out_of_sync_blocks_threshold: u64,
    #[serde(default = "default_out_of_sync_critical_nodes_threshold")]
    pub out_of_sync_critical_nodes_threshold: usize,
}

fn default_offline_alert_repeat_interval() -> String {
    "12h".to_string()
}

fn default_offline_duration_threshold() -> String {
    "5m".to_string()
}

fn default_sync_alert_repeat_interval() -> String {
    "6h".to_string()
}

fn default_stuck_duration_threshold() -> String {
    "10m".to_string()
}

fn default_out_of_sync_blocks_threshold() -> u64 {
    5
}

fn default_out_of_sync_critical_nodes_threshold() -> usize {
    5
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            offline_alert_repeat_interval: default_offline_alert_repeat_interval(),
            offline_duration_threshold: default_offline_duration_threshold(),
            offline_consecutive_threshold: None,
            sync_alert_repeat_interval: default_sync_alert_repeat_interval(),
            stuck_duration_threshold: default_stuck_duration_threshold(),
            out_of_sync_blocks_threshold: default_out_of_sync_blocks_threshold(),
            out_of_sync_critical_nodes_threshold: default_out_of_sync_critical_nodes_threshold(),
        }
    }
}

/// Parse a duration string, falling back to `default` with a warning
fn parse_duration_or(name: &str, value: &str, default: Duration) -> Duration {
    match humantime::parse_duration(value.trim()) {
        Ok(d) => d,
        Err(e) => {
            warn!(
                "Error parsing {} '{}': {}, using default {}",
                name,
                value,
                e,
                humantime::format_duration(default)
            );
            default
        }
    }
}

impl AlertConfig {
    pub fn offline_alert_repeat_interval(&self) -> Duration {
        parse_duration_or(
            "offline alert repeat interval",
            &self.offline_alert_repeat_interval,
            DEFAULT_OFFLINE_ALERT_REPEAT_INTERVAL,
        )
    }

    pub fn offline_duration_threshold(&self) -> Duration {
        parse_duration_or(
            "offline duration threshold",
            &self.offline_duration_threshold,
            DEFAULT_OFFLINE_DURATION_THRESHOLD,
        )
    }

    pub fn sync_alert_repeat_interval(&self) -> Duration {
        parse_duration_or(
            "sync alert repeat interval",
            &self.sync_alert_repeat_interval,
            DEFAULT_SYNC_ALERT_REPEAT_INTERVAL,
        )
    }

    pub fn stuck_duration_threshold(&self) -> Duration {
        parse_duration_or(
            "stuck duration threshold",
            &self.stuck_duration_threshold,
            DEFAULT_STUCK_DURATION_THRESHOLD,
        )
    }

    /// Explicit threshold, or the offline duration expressed in blocks
    pub fn offline_consecutive_threshold(&self) -> u32 {
        self.offline_consecutive_threshold.unwrap_or_else(|| {
            let blocks =
                self.offline_duration_threshold().as_secs() / AVG_SECONDS_PER_BLOCK.as_secs();
            u32::try_from(blocks).unwrap_or(u32::MAX)
        })
    }

    /// Resolve into the values the alert manager works with
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            offline_consecutive_threshold: self.offline_consecutive_threshold(),
            offline_alert_repeat_interval: self.offline_alert_repeat_interval(),
            sync_alert_repeat_interval: self.sync_alert_repeat_interval(),
            stuck_duration_threshold: self.stuck_duration_threshold(),
            out_of_sync_blocks_threshold: self.out_of_sync_blocks_threshold,
            out_of_sync_critical_nodes_threshold: self.out_of_sync_critical_nodes_threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Timeout for a single node request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Interval between height polls while waiting for a checkpoint
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Give up waiting for lagging nodes after this long
    #[serde(default = "default_wait_height_timeout")]
    pub wait_height_timeout_secs: u64,
    /// Back-off after a failed cycle
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    15
}

fn default_wait_height_timeout() -> u64 {
    300
}

fn default_retry_delay() -> u64 {
    5
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            poll_interval_secs: default_poll_interval(),
            wait_height_timeout_secs: default_wait_height_timeout(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a file (TOML or JSON by extension) and environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Self::builder_with_defaults()?
            .add_source(File::from(path.as_ref()))
            // Override with environment variables (FORKWATCH_TELEGRAM__CHAT_ID, etc.)
            .add_source(
                Environment::with_prefix("FORKWATCH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load configuration from an in-memory TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::builder_with_defaults()?
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn builder_with_defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("height_check_interval", 1)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.nodes.is_empty() {
            errors.push("nodes cannot be empty".to_string());
        }

        if self.api_urls.is_empty() {
            errors.push("API url cannot be empty".to_string());
        }

        if self.height_check_interval == 0 {
            errors.push("height_check_interval must be positive".to_string());
        }

        if self.notify {
            if self.telegram.bot_api_key.trim().is_empty() {
                errors.push("telegram.bot_api_key cannot be empty".to_string());
            }

            if self.telegram.chat_id == 0 {
                errors.push("telegram.chat_id cannot be empty".to_string());
            }
        }

        if self.pool.poll_interval_secs == 0 {
            errors.push("pool.poll_interval_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
