//! Alert Manager
//!
//! Owns all dedup, threshold and escalation state. The monitoring loop calls
//! one `handle_*` entry point per observation kind each cycle; the manager
//! decides whether to emit and forwards the alert to the notifier.
//!
//! Nothing here returns an error. A failed send is logged and leaves the
//! dedup timestamps untouched, so the next qualifying cycle tries again.

use super::alert::{Alert, AlertKind};
use super::notifier::{Notifier, SendOutcome};
use crate::domain::{BlockHash, IdentityKey, NodeInfo};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tuning values consumed by the alert manager, already validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertThresholds {
    /// Offline cycles tolerated before a node can trigger an alert
    pub offline_consecutive_threshold: u32,
    /// Minimum time between two offline alerts for the same node
    pub offline_alert_repeat_interval: Duration,
    /// Minimum time between two sync alerts
    pub sync_alert_repeat_interval: Duration,
    /// How long the chain may sit at one checkpoint before a stuck alert
    pub stuck_duration_threshold: Duration,
    /// Lag (in blocks) at which a node counts as critically out of sync
    pub out_of_sync_blocks_threshold: u64,
    /// Critically lagging nodes needed for an out-of-sync alert
    pub out_of_sync_critical_nodes_threshold: usize,
}

/// Offline bookkeeping for one node. Exists only while the node is offline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStatus {
    pub consecutive_offline_count: u32,
    pub last_offline_alert_time: Option<DateTime<Utc>>,
}

/// First observation of the chain stuck at a checkpoint
#[derive(Debug, Clone, Copy)]
struct StuckState {
    height: u64,
    since: DateTime<Utc>,
    /// A stuck alert for this height has been delivered
    alerted: bool,
}

/// `true` when `interval` has passed since `last`. Never sent and a zero
/// interval always pass.
fn elapsed_at_least(last: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    let Some(last) = last else {
        return true;
    };
    if interval.is_zero() {
        return true;
    }

    match chrono::Duration::from_std(interval) {
        Ok(interval) => now.signed_duration_since(last) >= interval,
        Err(_) => false,
    }
}

pub struct AlertManager {
    thresholds: AlertThresholds,
    node_infos: Vec<NodeInfo>,
    notifier: Notifier,
    last_alert_times: HashMap<AlertKind, DateTime<Utc>>,
    offline_node_stats: HashMap<IdentityKey, NodeStatus>,
    stuck: Option<StuckState>,
}

impl AlertManager {
    pub fn new(thresholds: AlertThresholds, node_infos: Vec<NodeInfo>, notifier: Notifier) -> Self {
        info!(
            "Creating alert manager for {} nodes with thresholds: {:?}",
            node_infos.len(),
            thresholds
        );
        Self {
            thresholds,
            node_infos,
            notifier,
            last_alert_times: HashMap::new(),
            offline_node_stats: HashMap::new(),
            stuck: None,
        }
    }

    pub fn node_infos(&self) -> &[NodeInfo] {
        &self.node_infos
    }

    /// Offline bookkeeping for a node, `None` while it is reachable
    pub fn offline_status(&self, key: &IdentityKey) -> Option<&NodeStatus> {
        self.offline_node_stats.get(key)
    }

    pub fn last_alert_time(&self, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.last_alert_times.get(&kind).copied()
    }

    /// Checkpoint the chain was last seen stuck at, and since when
    pub fn stuck_since(&self) -> Option<(u64, DateTime<Utc>)> {
        self.stuck.map(|s| (s.height, s.since))
    }

    /// Evaluate this cycle's unreachable nodes
    pub async fn handle_offline_alert(&mut self, failed: &HashMap<IdentityKey, NodeInfo>) {
        self.handle_offline_alert_at(failed, Utc::now()).await
    }

    pub async fn handle_offline_alert_at(
        &mut self,
        failed: &HashMap<IdentityKey, NodeInfo>,
        now: DateTime<Utc>,
    ) {
        let configured: HashSet<IdentityKey> =
            self.node_infos.iter().map(|n| n.identity_key).collect();
        for (key, node) in failed {
            if !configured.contains(key) {
                warn!("Skipping unreachable node {} ({}): not configured", key, node.endpoint);
            }
        }

        let threshold = self.thresholds.offline_consecutive_threshold;
        let repeat = self.thresholds.offline_alert_repeat_interval;
        let mut should_alert = false;
        let mut not_connected = Vec::new();

        for info in &self.node_infos {
            let key = info.identity_key;

            if failed.contains_key(&key) {
                let status = self.offline_node_stats.entry(key).or_default();
                status.consecutive_offline_count = status.consecutive_offline_count.saturating_add(1);
                debug!(
                    "Node {} offline for {} consecutive cycles",
                    info.label(),
                    status.consecutive_offline_count
                );

                if status.consecutive_offline_count > threshold
                    && elapsed_at_least(status.last_offline_alert_time, now, repeat)
                {
                    should_alert = true;
                }
                not_connected.push(info.clone());
            } else if let Some(status) = self.offline_node_stats.remove(&key) {
                info!(
                    "Node {} back online after {} offline cycles",
                    info.label(),
                    status.consecutive_offline_count
                );
            }
        }

        if !should_alert {
            return;
        }

        let alerted: Vec<IdentityKey> = not_connected.iter().map(|n| n.identity_key).collect();
        let alert = Alert::Offline { not_connected };
        if self.dispatch(&alert, now).await {
            for key in &alerted {
                if let Some(status) = self.offline_node_stats.get_mut(key) {
                    status.last_offline_alert_time = Some(now);
                }
            }
        }
    }

    /// Evaluate heights observed against `checkpoint`
    pub async fn handle_sync_alert(
        &mut self,
        checkpoint: u64,
        not_reached: &HashMap<NodeInfo, u64>,
        reached: &HashMap<NodeInfo, u64>,
    ) {
        self.handle_sync_alert_at(checkpoint, not_reached, reached, Utc::now())
            .await
    }

    pub async fn handle_sync_alert_at(
        &mut self,
        checkpoint: u64,
        not_reached: &HashMap<NodeInfo, u64>,
        reached: &HashMap<NodeInfo, u64>,
        now: DateTime<Utc>,
    ) {
        let not_reached = well_formed(not_reached);
        let reached = well_formed(reached);

        if not_reached.is_empty() {
            return;
        }

        let stuck = reached.is_empty();
        let condition = if stuck {
            self.stuck_duration_reached(checkpoint, now)
        } else {
            self.out_of_sync_nodes_critical(checkpoint, &not_reached)
        };

        if !condition {
            return;
        }

        if !elapsed_at_least(
            self.last_alert_time(AlertKind::Sync),
            now,
            self.thresholds.sync_alert_repeat_interval,
        ) {
            debug!("Sync alert at {} suppressed by repeat interval", checkpoint);
            return;
        }

        let alert = Alert::Sync {
            checkpoint,
            not_reached,
            reached,
        };
        if self.dispatch(&alert, now).await && stuck {
            if let Some(state) = self.stuck.as_mut() {
                state.alerted = true;
            }
        }
    }

    /// Report inconsistent block hashes. Always sent, forks are never debounced.
    pub async fn handle_hash_alert(&mut self, checkpoint: u64, hashes: &HashMap<String, BlockHash>) {
        self.handle_hash_alert_at(checkpoint, hashes, Utc::now())
            .await
    }

    pub async fn handle_hash_alert_at(
        &mut self,
        checkpoint: u64,
        hashes: &HashMap<String, BlockHash>,
        now: DateTime<Utc>,
    ) {
        if hashes.is_empty() {
            warn!("Hash alert at {} without any hashes, ignoring", checkpoint);
            return;
        }

        let alert = Alert::Hash {
            checkpoint,
            hashes: hashes.clone(),
        };
        self.dispatch(&alert, now).await;
    }

    /// Stuck tracking only moves when the checkpoint changes. The first cycle
    /// at a new checkpoint arms the timer and never alerts.
    fn stuck_duration_reached(&mut self, checkpoint: u64, now: DateTime<Utc>) -> bool {
        match self.stuck {
            Some(state) if state.height == checkpoint => {
                !state.alerted
                    && elapsed_at_least(Some(state.since), now, self.thresholds.stuck_duration_threshold)
            }
            _ => {
                info!("No node reached checkpoint {}, tracking stuck chain", checkpoint);
                self.stuck = Some(StuckState {
                    height: checkpoint,
                    since: now,
                    alerted: false,
                });
                false
            }
        }
    }

    fn out_of_sync_nodes_critical(&self, checkpoint: u64, not_reached: &HashMap<NodeInfo, u64>) -> bool {
        let lagging: HashMap<IdentityKey, u64> = not_reached
            .iter()
            .map(|(node, height)| (node.identity_key, *height))
            .collect();

        let critical = self
            .node_infos
            .iter()
            .filter_map(|info| lagging.get(&info.identity_key))
            .filter(|height| {
                checkpoint.saturating_sub(**height) >= self.thresholds.out_of_sync_blocks_threshold
            })
            .count();

        debug!(
            "{} configured nodes lag {} by at least {} blocks (threshold {})",
            critical,
            checkpoint,
            self.thresholds.out_of_sync_blocks_threshold,
            self.thresholds.out_of_sync_critical_nodes_threshold
        );

        critical >= self.thresholds.out_of_sync_critical_nodes_threshold
    }

    /// Send through the notifier; `true` only when the alert was delivered
    async fn dispatch(&mut self, alert: &Alert, now: DateTime<Utc>) -> bool {
        let kind = alert.kind();
        warn!("Raising {} alert", kind);

        match self.notifier.send(alert).await {
            Ok(SendOutcome::Delivered) => {
                self.last_alert_times.insert(kind, now);
                true
            }
            Ok(SendOutcome::Disabled) => false,
            Err(e) => {
                error!("Failed to send {} alert: {}", kind, e);
                false
            }
        }
    }
}

/// Drop observations without an endpoint, they cannot be rendered
fn well_formed(observations: &HashMap<NodeInfo, u64>) -> HashMap<NodeInfo, u64> {
    observations
        .iter()
        .filter(|(node, _)| {
            let ok = !node.endpoint.trim().is_empty();
            if !ok {
                warn!("Skipping observation for node {} without endpoint", node.identity_key);
            }
            ok
        })
        .map(|(node, height)| (node.clone(), *height))
        .collect()
}
