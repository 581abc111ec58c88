//! Alert decision engine
//!
//! - `alert`: alert kinds and message rendering
//! - `manager`: dedup, threshold and escalation state
//! - `notifier`: delivery through an external transport

pub mod alert;
pub mod manager;
pub mod notifier;

pub use alert::{Alert, AlertKind};
pub use manager::{AlertManager, AlertThresholds, NodeStatus};
pub use notifier::{AlertTransport, Notifier, SendOutcome};
