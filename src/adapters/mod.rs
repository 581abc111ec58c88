pub mod chain;
pub mod rest_pool;
pub mod telegram;

pub use chain::{ChainClient, RestChainClient};
pub use rest_pool::RestNodePool;
pub use telegram::TelegramNotifier;
