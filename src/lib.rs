pub mod adapters;
pub mod alerting;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod monitor;

pub use alerting::{Alert, AlertKind, AlertManager, AlertThresholds, AlertTransport, Notifier};
pub use config::AppConfig;
pub use domain::{BlockHash, IdentityKey, NodeInfo};
pub use error::{ForkwatchError, Result};
pub use monitor::{ForkChecker, NodePool};
