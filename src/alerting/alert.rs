//! Alert payloads and their Telegram (HTML) rendering
//!
//! Rendering is deterministic: every list is sorted before it is written, so
//! the same observations always produce the same message.

use crate::domain::{wrap_label, BlockHash, NodeInfo};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};

/// Out-of-sync rows at or below this count use the narrow label column
const NARROW_TABLE_ROWS: usize = 5;
const NARROW_LABEL_WIDTH: usize = 23;
const WIDE_LABEL_WIDTH: usize = 28;

/// Alert kinds, deduplicated independently of each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertKind {
    Offline,
    Sync,
    Hash,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Offline => "offline",
            AlertKind::Sync => "sync",
            AlertKind::Hash => "hash",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert payload, one variant per kind
#[derive(Debug, Clone)]
pub enum Alert {
    /// Configured nodes that could not be reached this cycle
    Offline { not_connected: Vec<NodeInfo> },
    /// Nodes lagging behind the checkpoint, or nobody reaching it
    Sync {
        checkpoint: u64,
        not_reached: HashMap<NodeInfo, u64>,
        reached: HashMap<NodeInfo, u64>,
    },
    /// Nodes disagreeing on the block hash at the checkpoint, keyed by endpoint
    Hash {
        checkpoint: u64,
        hashes: HashMap<String, BlockHash>,
    },
}

impl Alert {
    pub fn kind(&self) -> AlertKind {
        match self {
            Alert::Offline { .. } => AlertKind::Offline,
            Alert::Sync { .. } => AlertKind::Sync,
            Alert::Hash { .. } => AlertKind::Hash,
        }
    }

    /// Render the message body (Telegram HTML parse mode)
    pub fn render(&self) -> String {
        match self {
            Alert::Offline { not_connected } => render_offline(not_connected),
            Alert::Sync {
                checkpoint,
                not_reached,
                reached,
            } => render_sync(*checkpoint, not_reached, reached),
            Alert::Hash { checkpoint, hashes } => render_hash(*checkpoint, hashes),
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Labels sorted for display, ties broken by endpoint
fn sorted_labels<'a>(nodes: impl Iterator<Item = &'a NodeInfo>) -> Vec<String> {
    let mut rows: Vec<(String, &str)> = nodes.map(|n| (n.label(), n.endpoint.as_str())).collect();
    rows.sort();
    rows.into_iter().map(|(label, _)| escape_html(&label)).collect()
}

fn render_offline(not_connected: &[NodeInfo]) -> String {
    let mut buf = String::new();
    buf.push_str("<b>⚠️ Warning - Offline nodes </b>");
    let _ = write!(buf, "\n\nFailed connection  ({}):", not_connected.len());

    buf.push_str("<pre>");
    for label in sorted_labels(not_connected.iter()) {
        let _ = writeln!(buf, "{}", label);
    }
    buf.push_str("</pre>");

    buf
}

fn render_sync(
    checkpoint: u64,
    not_reached: &HashMap<NodeInfo, u64>,
    reached: &HashMap<NodeInfo, u64>,
) -> String {
    let mut buf = String::new();

    if reached.is_empty() {
        buf.push_str("<b>❗ Stuck Alert </b>");
    } else {
        buf.push_str("<b>⚠️ Warning </b>");
    }

    write_synced(&mut buf, checkpoint, reached);
    write_out_of_sync(&mut buf, checkpoint, not_reached);

    buf
}

fn write_synced(buf: &mut String, checkpoint: u64, reached: &HashMap<NodeInfo, u64>) {
    let _ = write!(buf, "\n\nSynced at <b>{}</b> ({}):", checkpoint, reached.len());
    if reached.is_empty() {
        return;
    }

    buf.push_str("<pre>");
    for label in sorted_labels(reached.keys()) {
        let _ = writeln!(buf, "{}", label);
    }
    buf.push_str("</pre>");
}

fn write_out_of_sync(buf: &mut String, checkpoint: u64, not_reached: &HashMap<NodeInfo, u64>) {
    let _ = write!(buf, "\n\nOut-of-sync ({}):", not_reached.len());
    if not_reached.is_empty() {
        return;
    }

    let width = if not_reached.len() <= NARROW_TABLE_ROWS {
        NARROW_LABEL_WIDTH
    } else {
        WIDE_LABEL_WIDTH
    };

    let mut rows: Vec<(String, &str, u64)> = not_reached
        .iter()
        .map(|(node, height)| (node.label(), node.endpoint.as_str(), *height))
        .collect();
    rows.sort();

    buf.push_str("<pre>");
    for (label, _, height) in rows {
        // Long labels continue on their own lines below the height column
        let mut lines = wrap_label(&label, width).into_iter();
        let first = lines.next().unwrap_or_default();
        let pad = width.saturating_sub(first.chars().count());
        let lag = checkpoint.saturating_sub(height);
        let _ = writeln!(
            buf,
            "{}{} {:>8} (-{})",
            escape_html(&first),
            " ".repeat(pad),
            height,
            lag
        );
        for line in lines {
            let _ = writeln!(buf, "{}", escape_html(&line));
        }
    }
    buf.push_str("</pre>");
}

fn render_hash(checkpoint: u64, hashes: &HashMap<String, BlockHash>) -> String {
    let mut groups: BTreeMap<BlockHash, Vec<&str>> = BTreeMap::new();
    for (endpoint, hash) in hashes {
        groups.entry(*hash).or_default().push(endpoint.as_str());
    }

    let mut buf = String::new();
    buf.push_str("<b>❗Fork Alert </b>\n\n");
    let _ = writeln!(buf, "Inconsistent block hash at:  <b>{}</b>", checkpoint);

    buf.push_str("<pre>");
    for (hash, mut endpoints) in groups {
        let _ = write!(buf, "{}:\n\n", hash);
        endpoints.sort_unstable();
        for endpoint in endpoints {
            let _ = writeln!(buf, "{}", escape_html(endpoint));
        }
        buf.push_str("\n\n");
    }
    buf.push_str("</pre>");

    buf
}
