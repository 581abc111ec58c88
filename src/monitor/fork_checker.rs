//! Fork checker
//!
//! Drives the alert manager once per cycle:
//! 1. connect to nodes and report unreachable ones
//! 2. wait for the checkpoint height and report lagging nodes
//! 3. compare block hashes at the checkpoint and report forks
//! 4. advance the checkpoint

use super::pool::{HashComparison, NodePool};
use crate::adapters::{ChainClient, RestChainClient, RestNodePool, TelegramNotifier};
use crate::alerting::{AlertManager, Notifier};
use crate::config::AppConfig;
use crate::domain::parse_nodes;
use crate::error::{ForkwatchError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What a single cycle did with the checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Hashes compared, checkpoint moved to the contained height
    Advanced(u64),
    /// No node reached the checkpoint; it stays in place
    Stuck,
    /// An observation failed; retry after a back-off
    Skipped,
}

pub struct ForkChecker {
    pool: Box<dyn NodePool>,
    alert_manager: AlertManager,
    checkpoint: u64,
    height_check_interval: u64,
    retry_delay: Duration,
}

impl ForkChecker {
    pub fn new(
        pool: Box<dyn NodePool>,
        alert_manager: AlertManager,
        checkpoint: u64,
        height_check_interval: u64,
        retry_delay: Duration,
    ) -> Self {
        Self {
            pool,
            alert_manager,
            checkpoint,
            height_check_interval,
            retry_delay,
        }
    }

    /// Wire up the REST node pool, Telegram notifier and starting checkpoint
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let node_infos = parse_nodes(&config.nodes)?;

        let notifier = if config.notify {
            Notifier::new(Arc::new(TelegramNotifier::new(&config.telegram)?))
        } else {
            warn!("Notifications disabled, alerts will only be logged");
            Notifier::disabled()
        };
        let alert_manager = AlertManager::new(config.alerts.thresholds(), node_infos, notifier);

        let chain = RestChainClient::connect(
            &config.api_urls,
            Duration::from_secs(config.pool.request_timeout_secs),
        )
        .await?;
        let checkpoint = init_checkpoint(config.checkpoint, &chain).await?;

        Ok(Self::new(
            Box::new(RestNodePool::new(&config.pool)?),
            alert_manager,
            checkpoint,
            config.height_check_interval,
            Duration::from_secs(config.pool.retry_delay_secs),
        ))
    }

    pub fn checkpoint(&self) -> u64 {
        self.checkpoint
    }

    pub fn alert_manager(&self) -> &AlertManager {
        &self.alert_manager
    }

    /// Run cycles until `shutdown` resolves
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Fork checker started at checkpoint {}", self.checkpoint);

        loop {
            let outcome = tokio::select! {
                _ = &mut shutdown => break,
                outcome = self.run_cycle() => outcome,
            };

            if outcome == CycleOutcome::Skipped {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        info!("Fork checker stopped at checkpoint {}", self.checkpoint);
        Ok(())
    }

    /// One monitoring cycle
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let nodes = self.alert_manager.node_infos().to_vec();
        let failed = match self.pool.connect_to_nodes(&nodes).await {
            Ok(failed) => failed,
            Err(e) => {
                error!("error connecting to nodes: {}", e);
                return CycleOutcome::Skipped;
            }
        };

        self.alert_manager.handle_offline_alert(&failed).await;

        let (not_reached, reached) = match self.pool.wait_height(self.checkpoint).await {
            Ok(split) => split,
            Err(e) => {
                error!(
                    "error waiting for connected nodes to reach {} height: {}",
                    self.checkpoint, e
                );
                return CycleOutcome::Skipped;
            }
        };

        self.alert_manager
            .handle_sync_alert(self.checkpoint, &not_reached, &reached)
            .await;

        if reached.is_empty() {
            warn!("Chain is stuck! No nodes reached height: {}", self.checkpoint);
            return CycleOutcome::Stuck;
        }

        info!("Checking block hash at {} height", self.checkpoint);
        match self.pool.compare_hashes(self.checkpoint).await {
            Ok(HashComparison::Consistent(_)) => {}
            Ok(HashComparison::Inconsistent(hashes)) => {
                warn!(
                    "hashes are not the same at {} height: {:?}",
                    self.checkpoint, hashes
                );
                self.alert_manager
                    .handle_hash_alert(self.checkpoint, &hashes)
                    .await;
            }
            Err(ForkwatchError::NoConnectedPeers) => {
                warn!(
                    "error comparing hashes for connected nodes at {} height: no connected peers",
                    self.checkpoint
                );
                return CycleOutcome::Skipped;
            }
            Err(e) => {
                error!(
                    "unexpected error when comparing hashes at {} height: {}",
                    self.checkpoint, e
                );
                return CycleOutcome::Skipped;
            }
        }

        self.checkpoint = self.checkpoint.saturating_add(self.height_check_interval);
        CycleOutcome::Advanced(self.checkpoint)
    }
}

/// Configured checkpoint, or the current chain height when it is zero
pub async fn init_checkpoint(configured: u64, chain: &dyn ChainClient) -> Result<u64> {
    let checkpoint = if configured != 0 {
        configured
    } else {
        chain
            .blockchain_height()
            .await
            .map_err(|e| ForkwatchError::Rpc(format!("error getting blockchain height: {}", e)))?
    };

    info!("Initialized checkpoint: {}", checkpoint);
    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::chain::MockChainClient;
    use crate::alerting::notifier::MockAlertTransport;
    use crate::alerting::{AlertKind, AlertThresholds, Notifier};
    use crate::domain::{BlockHash, NodeInfo};
    use crate::monitor::pool::MockNodePool;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn nodes() -> Vec<NodeInfo> {
        (1..=3u8)
            .map(|i| {
                NodeInfo::new(
                    &format!("{:02X}", i).repeat(32),
                    &format!("peer-{}.example.io:7900", i),
                    "",
                )
                .unwrap()
            })
            .collect()
    }

    fn thresholds() -> AlertThresholds {
        AlertThresholds {
            offline_consecutive_threshold: 5,
            offline_alert_repeat_interval: Duration::from_secs(3600),
            sync_alert_repeat_interval: Duration::from_secs(3600),
            stuck_duration_threshold: Duration::from_secs(600),
            out_of_sync_blocks_threshold: 5,
            out_of_sync_critical_nodes_threshold: 2,
        }
    }

    fn checker(pool: MockNodePool, transport: MockAlertTransport) -> ForkChecker {
        let manager = AlertManager::new(thresholds(), nodes(), Notifier::new(Arc::new(transport)));
        ForkChecker::new(Box::new(pool), manager, 100, 10, Duration::from_millis(1))
    }

    fn all_reached(height: u64) -> (HashMap<NodeInfo, u64>, HashMap<NodeInfo, u64>) {
        (HashMap::new(), nodes().into_iter().map(|n| (n, height)).collect())
    }

    #[tokio::test]
    async fn test_cycle_advances_checkpoint_on_consistent_hashes() {
        let mut pool = MockNodePool::new();
        pool.expect_connect_to_nodes().returning(|_| Ok(HashMap::new()));
        pool.expect_wait_height().returning(|h| Ok(all_reached(h)));
        pool.expect_compare_hashes()
            .returning(|_| Ok(HashComparison::Consistent(HashMap::new())));

        let mut transport = MockAlertTransport::new();
        transport.expect_send_message().times(0);

        let mut checker = checker(pool, transport);
        assert_eq!(checker.run_cycle().await, CycleOutcome::Advanced(110));
        assert_eq!(checker.checkpoint(), 110);
    }

    #[tokio::test]
    async fn test_cycle_sends_hash_alert_on_fork() {
        let mut pool = MockNodePool::new();
        pool.expect_connect_to_nodes().returning(|_| Ok(HashMap::new()));
        pool.expect_wait_height().returning(|h| Ok(all_reached(h)));
        pool.expect_compare_hashes().returning(|_| {
            let mut hashes = HashMap::new();
            hashes.insert("peer-1:7900".to_string(), BlockHash::new([1; 32]));
            hashes.insert("peer-2:7900".to_string(), BlockHash::new([2; 32]));
            Ok(HashComparison::Inconsistent(hashes))
        });

        let mut transport = MockAlertTransport::new();
        transport
            .expect_send_message()
            .withf(|text: &str| text.contains("Fork Alert"))
            .times(1)
            .returning(|_| Ok(()));

        let mut checker = checker(pool, transport);
        assert_eq!(checker.run_cycle().await, CycleOutcome::Advanced(110));
        assert!(checker.alert_manager().last_alert_time(AlertKind::Hash).is_some());
    }

    #[tokio::test]
    async fn test_stuck_cycle_keeps_checkpoint() {
        let mut pool = MockNodePool::new();
        pool.expect_connect_to_nodes().returning(|_| Ok(HashMap::new()));
        pool.expect_wait_height().returning(|_| {
            Ok((nodes().into_iter().map(|n| (n, 90)).collect(), HashMap::new()))
        });
        pool.expect_compare_hashes().times(0);

        let mut transport = MockAlertTransport::new();
        transport.expect_send_message().times(0);

        let mut checker = checker(pool, transport);
        assert_eq!(checker.run_cycle().await, CycleOutcome::Stuck);
        assert_eq!(checker.checkpoint(), 100);
        assert_eq!(checker.alert_manager().stuck_since().map(|(h, _)| h), Some(100));
    }

    #[tokio::test]
    async fn test_cycle_skips_when_no_peers_answer_hashes() {
        let mut pool = MockNodePool::new();
        pool.expect_connect_to_nodes().returning(|_| Ok(HashMap::new()));
        pool.expect_wait_height().returning(|h| Ok(all_reached(h)));
        pool.expect_compare_hashes()
            .returning(|_| Err(ForkwatchError::NoConnectedPeers));

        let mut transport = MockAlertTransport::new();
        transport.expect_send_message().times(0);

        let mut checker = checker(pool, transport);
        assert_eq!(checker.run_cycle().await, CycleOutcome::Skipped);
        assert_eq!(checker.checkpoint(), 100);
    }

    #[tokio::test]
    async fn test_connect_error_skips_cycle() {
        let mut pool = MockNodePool::new();
        pool.expect_connect_to_nodes()
            .returning(|_| Err(ForkwatchError::Rpc("pool unavailable".to_string())));
        pool.expect_wait_height().times(0);

        let mut checker = checker(pool, MockAlertTransport::new());
        assert_eq!(checker.run_cycle().await, CycleOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_offline_nodes_are_counted_each_cycle() {
        let failed_node = nodes()[0].clone();
        let mut pool = MockNodePool::new();
        pool.expect_connect_to_nodes().returning(move |_| {
            let mut failed = HashMap::new();
            failed.insert(failed_node.identity_key, failed_node.clone());
            Ok(failed)
        });
        pool.expect_wait_height().returning(|h| Ok(all_reached(h)));
        pool.expect_compare_hashes()
            .returning(|_| Ok(HashComparison::Consistent(HashMap::new())));

        let mut checker = checker(pool, MockAlertTransport::new());
        checker.run_cycle().await;
        checker.run_cycle().await;

        let key = nodes()[0].identity_key;
        assert_eq!(
            checker
                .alert_manager()
                .offline_status(&key)
                .unwrap()
                .consecutive_offline_count,
            2
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut pool = MockNodePool::new();
        pool.expect_connect_to_nodes()
            .returning(|_| Err(ForkwatchError::Rpc("down".to_string())));

        let mut checker = checker(pool, MockAlertTransport::new());
        let shutdown = tokio::time::sleep(Duration::from_millis(20));
        assert!(checker.run(shutdown).await.is_ok());
    }

    #[tokio::test]
    async fn test_init_checkpoint() {
        let mut chain = MockChainClient::new();
        chain.expect_blockchain_height().times(1).returning(|| Ok(9876));

        assert_eq!(init_checkpoint(0, &chain).await.unwrap(), 9876);
        assert_eq!(init_checkpoint(9876543, &chain).await.unwrap(), 9876543);
    }
}
