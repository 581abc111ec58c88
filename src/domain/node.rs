//! Node identity, endpoint abbreviation and display labels

use crate::config::NodeConfig;
use crate::error::{ForkwatchError, Result};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Node public key, the stable identity of a monitored node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey([u8; 32]);

impl FromStr for IdentityKey {
    type Err = ForkwatchError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| ForkwatchError::InvalidNode(format!("identity key '{}': {}", s, e)))?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            ForkwatchError::InvalidNode(format!(
                "identity key '{}' must be 32 bytes, got {}",
                s,
                b.len()
            ))
        })?;
        Ok(Self(key))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

/// A configured node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeInfo {
    pub identity_key: IdentityKey,
    /// host:port, DNS name or IP
    pub endpoint: String,
    /// Optional display label, may be empty
    pub friendly_name: String,
}

impl NodeInfo {
    pub fn new(identity_key: &str, endpoint: &str, friendly_name: &str) -> Result<Self> {
        let identity_key = identity_key.parse::<IdentityKey>()?;
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(ForkwatchError::InvalidNode(format!(
                "node {} has an empty endpoint",
                identity_key
            )));
        }

        Ok(Self {
            identity_key,
            endpoint: endpoint.to_string(),
            friendly_name: friendly_name.trim().to_string(),
        })
    }

    /// Human readable label used in alert messages
    pub fn label(&self) -> String {
        display_label(&self.friendly_name, &self.endpoint)
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identity_key, self.endpoint)
    }
}

/// Parse configured nodes, failing on the first invalid entry
pub fn parse_nodes(nodes: &[NodeConfig]) -> Result<Vec<NodeInfo>> {
    let mut seen = HashSet::with_capacity(nodes.len());
    let mut infos = Vec::with_capacity(nodes.len());

    for node in nodes {
        let info = NodeInfo::new(&node.identity_key, &node.endpoint, &node.friendly_name)?;
        if !seen.insert(info.identity_key) {
            return Err(ForkwatchError::InvalidNode(format!(
                "duplicate identity key {}",
                info.identity_key
            )));
        }
        infos.push(info);
    }

    Ok(infos)
}

/// Split `host:port` or `[v6]:port`. Returns `None` when there is no port.
fn split_host_port(address: &str) -> Option<(&str, &str)> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        return Some((host, port));
    }

    let (host, port) = address.rsplit_once(':')?;
    if host.contains(':') {
        // bare IPv6 literal
        return None;
    }
    Some((host, port))
}

/// Shorten a DNS endpoint to its first label, keeping the port.
///
/// `peer1.sirius.example.io:7900` becomes `peer1:7900`. IP literals are left
/// unchanged.
pub fn abbreviate_endpoint(address: &str) -> String {
    let address = address.trim();
    let (host, port) = match split_host_port(address) {
        Some((host, port)) => (host, Some(port)),
        None => (address, None),
    };

    if host.parse::<IpAddr>().is_ok() {
        return address.to_string();
    }

    let short = host.split('.').next().unwrap_or(host);
    match port {
        Some(port) if !port.is_empty() => format!("{}:{}", short, port),
        _ => short.to_string(),
    }
}

/// `friendly(abbrev)` when the friendly name adds information, else `abbrev`
pub fn display_label(friendly_name: &str, endpoint: &str) -> String {
    let host = abbreviate_endpoint(endpoint);
    let friendly = friendly_name.trim();

    if !friendly.is_empty() && !friendly.eq_ignore_ascii_case(host.trim()) {
        format!("{}({})", friendly, host)
    } else {
        host
    }
}

/// Split a label into lines of at most `width` characters
pub fn wrap_label(input: &str, width: usize) -> Vec<String> {
    if width == 0 || input.chars().count() <= width {
        return vec![input.to_string()];
    }

    let chars: Vec<char> = input.chars().collect();
    chars.chunks(width).map(|line| line.iter().collect()).collect()
}
