//! REST client for the chain API gateway
//!
//! Only used to read the current chain height when no starting checkpoint is
//! configured.

use crate::error::{ForkwatchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// Source of the current chain height
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn blockchain_height(&self) -> Result<u64>;
}

/// Decode a height DTO: a number, a numeric string, or a `[lower, higher]`
/// pair of u32 words.
pub fn parse_height(value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ForkwatchError::Rpc(format!("height is not an unsigned integer: {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| ForkwatchError::Rpc(format!("invalid height '{}': {}", s, e))),
        Value::Array(words) if words.len() == 2 => {
            let word = |v: &Value| {
                v.as_u64()
                    .filter(|w| *w <= u64::from(u32::MAX))
                    .ok_or_else(|| ForkwatchError::Rpc(format!("invalid height word: {}", v)))
            };
            let lower = word(&words[0])?;
            let higher = word(&words[1])?;
            Ok((higher << 32) | lower)
        }
        other => Err(ForkwatchError::Rpc(format!("unexpected height value: {}", other))),
    }
}

/// Base URL for a node or gateway, defaulting to plain HTTP
pub fn base_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// `GET <base>/chain/height`
pub async fn fetch_chain_height(client: &Client, base: &str) -> Result<u64> {
    let body: Value = client
        .get(format!("{}/chain/height", base))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    parse_height(&body["height"])
}

pub struct RestChainClient {
    client: Client,
    base_url: String,
}

impl RestChainClient {
    /// Use the first API URL that answers a height request
    pub async fn connect(urls: &[String], timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForkwatchError::Rpc(format!("Failed to create HTTP client: {}", e)))?;

        let mut last_error = None;
        for url in urls {
            let base = base_url(url);
            match fetch_chain_height(&client, &base).await {
                Ok(_) => {
                    info!("Initialized client on URL: {}", url);
                    return Ok(Self {
                        client,
                        base_url: base,
                    });
                }
                Err(e) => {
                    warn!("API URL {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(ForkwatchError::Rpc(format!(
            "all provided URLs failed: {}",
            last_error.map(|e| e.to_string()).unwrap_or_else(|| "no URLs configured".to_string())
        )))
    }
}

#[async_trait]
impl ChainClient for RestChainClient {
    async fn blockchain_height(&self) -> Result<u64> {
        fetch_chain_height(&self.client, &self.base_url).await
    }
}
