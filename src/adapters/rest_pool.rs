//! Node pool backed by each node's REST gateway
//!
//! Every probe is an HTTP request; probes for all nodes run concurrently and
//! are joined before results are returned, so callers always see a complete
//! snapshot for the cycle.

use crate::adapters::chain::{base_url, fetch_chain_height};
use crate::config::PoolConfig;
use crate::domain::{BlockHash, IdentityKey, NodeInfo};
use crate::error::{ForkwatchError, Result};
use crate::monitor::{HashComparison, HeightSplit, NodePool};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct RestNodePool {
    client: Client,
    poll_interval: Duration,
    wait_timeout: Duration,
    /// Nodes reachable in the last `connect_to_nodes`, with their height
    connected: HashMap<NodeInfo, u64>,
}

impl RestNodePool {
    pub fn new(config: &PoolConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ForkwatchError::Rpc(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            wait_timeout: Duration::from_secs(config.wait_height_timeout_secs),
            connected: HashMap::new(),
        })
    }

    async fn probe_heights<'a>(
        &self,
        nodes: impl Iterator<Item = &'a NodeInfo>,
    ) -> Vec<(&'a NodeInfo, Result<u64>)> {
        let probes = nodes.map(|node| async move {
            let height = fetch_chain_height(&self.client, &base_url(&node.endpoint)).await;
            (node, height)
        });
        join_all(probes).await
    }

    async fn fetch_block_hash(&self, node: &NodeInfo, height: u64) -> Result<BlockHash> {
        let body: Value = self
            .client
            .get(format!("{}/block/{}", base_url(&node.endpoint), height))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body["meta"]["hash"]
            .as_str()
            .ok_or_else(|| ForkwatchError::Rpc(format!("{}: block {} has no hash", node.endpoint, height)))?
            .parse()
    }
}

/// Split heights relative to `checkpoint`
fn split_heights(heights: &HashMap<NodeInfo, u64>, checkpoint: u64) -> HeightSplit {
    let mut not_reached = HashMap::new();
    let mut reached = HashMap::new();
    for (node, height) in heights {
        if *height >= checkpoint {
            reached.insert(node.clone(), *height);
        } else {
            not_reached.insert(node.clone(), *height);
        }
    }
    (not_reached, reached)
}

#[async_trait]
impl NodePool for RestNodePool {
    async fn connect_to_nodes(
        &mut self,
        nodes: &[NodeInfo],
    ) -> Result<HashMap<IdentityKey, NodeInfo>> {
        let results = self.probe_heights(nodes.iter()).await;

        let mut failed = HashMap::new();
        let mut connected = HashMap::new();
        for (node, result) in results {
            match result {
                Ok(height) => {
                    connected.insert(node.clone(), height);
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", node.label(), e);
                    failed.insert(node.identity_key, node.clone());
                }
            }
        }

        info!(
            "Connected to {}/{} nodes",
            connected.len(),
            nodes.len()
        );
        self.connected = connected;
        Ok(failed)
    }

    async fn wait_height(&self, checkpoint: u64) -> Result<HeightSplit> {
        if self.connected.is_empty() {
            return Err(ForkwatchError::NoConnectedPeers);
        }

        let started = Instant::now();
        let mut heights = self.connected.clone();

        loop {
            let (not_reached, reached) = split_heights(&heights, checkpoint);
            if not_reached.is_empty() || started.elapsed() >= self.wait_timeout {
                return Ok((not_reached, reached));
            }

            debug!(
                "{} nodes below {}, polling again in {:?}",
                not_reached.len(),
                checkpoint,
                self.poll_interval
            );
            tokio::time::sleep(self.poll_interval).await;

            // A failed poll keeps the last known height
            for (node, result) in self.probe_heights(not_reached.keys()).await {
                match result {
                    Ok(height) => {
                        heights.insert(node.clone(), height);
                    }
                    Err(e) => debug!("Height poll failed for {}: {}", node.label(), e),
                }
            }
        }
    }

    async fn compare_hashes(&self, checkpoint: u64) -> Result<HashComparison> {
        let probes = self.connected.keys().map(|node| async move {
            (node, self.fetch_block_hash(node, checkpoint).await)
        });

        let mut hashes = HashMap::new();
        for (node, result) in join_all(probes).await {
            match result {
                Ok(hash) => {
                    hashes.insert(node.endpoint.clone(), hash);
                }
                Err(e) => debug!("No block hash at {} from {}: {}", checkpoint, node.label(), e),
            }
        }

        if hashes.is_empty() {
            return Err(ForkwatchError::NoConnectedPeers);
        }

        Ok(HashComparison::from_hashes(hashes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(byte: u8) -> NodeInfo {
        NodeInfo::new(&format!("{:02X}", byte).repeat(32), &format!("n{}.example.io:3000", byte), "")
            .unwrap()
    }

    #[test]
    fn test_split_heights() {
        let mut heights = HashMap::new();
        heights.insert(node(1), 999);
        heights.insert(node(2), 1000);
        heights.insert(node(3), 1001);

        let (not_reached, reached) = split_heights(&heights, 1000);
        assert_eq!(not_reached.len(), 1);
        assert_eq!(not_reached[&node(1)], 999);
        assert_eq!(reached.len(), 2);
    }

    #[tokio::test]
    async fn test_wait_height_without_connections() {
        let pool = RestNodePool::new(&PoolConfig::default()).unwrap();
        assert!(matches!(
            pool.wait_height(10).await,
            Err(ForkwatchError::NoConnectedPeers)
        ));
        assert!(matches!(
            pool.compare_hashes(10).await,
            Err(ForkwatchError::NoConnectedPeers)
        ));
    }
}
