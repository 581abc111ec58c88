//! Monitoring loop and its observation source

pub mod fork_checker;
pub mod pool;

pub use fork_checker::{init_checkpoint, CycleOutcome, ForkChecker};
pub use pool::{HashComparison, HeightSplit, NodePool};
