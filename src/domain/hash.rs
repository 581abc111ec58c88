use crate::error::{ForkwatchError, Result};
use std::fmt;
use std::str::FromStr;

/// 32-byte block hash as reported by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for BlockHash {
    type Err = ForkwatchError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s.trim()).map_err(|e| ForkwatchError::InvalidHash(format!("{}: {}", s, e)))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ForkwatchError::InvalidHash(format!("{}: expected 32 bytes", s)))?;
        Ok(Self(hash))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}
