//! Observation source for the fork checker

use crate::domain::{BlockHash, IdentityKey, NodeInfo};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Heights split relative to a checkpoint: `(not_reached, reached)`
pub type HeightSplit = (HashMap<NodeInfo, u64>, HashMap<NodeInfo, u64>);

/// Block hashes reported at one height, keyed by endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashComparison {
    Consistent(HashMap<String, BlockHash>),
    Inconsistent(HashMap<String, BlockHash>),
}

impl HashComparison {
    pub fn from_hashes(hashes: HashMap<String, BlockHash>) -> Self {
        let mut values = hashes.values();
        let consistent = match values.next() {
            Some(first) => values.all(|h| h == first),
            None => true,
        };

        if consistent {
            HashComparison::Consistent(hashes)
        } else {
            HashComparison::Inconsistent(hashes)
        }
    }
}

/// Connects to the monitored nodes and reports heights and hashes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodePool: Send + Sync {
    /// Connect to `nodes`, returning the ones that could not be reached
    async fn connect_to_nodes(&mut self, nodes: &[NodeInfo])
        -> Result<HashMap<IdentityKey, NodeInfo>>;

    /// Wait for connected nodes to reach `checkpoint`
    async fn wait_height(&self, checkpoint: u64) -> Result<HeightSplit>;

    /// Compare block hashes at `checkpoint` across connected nodes.
    /// Fails with `NoConnectedPeers` when no node can answer.
    async fn compare_hashes(&self, checkpoint: u64) -> Result<HashComparison>;
}
