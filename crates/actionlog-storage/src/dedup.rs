//! Composite dedup key for action records.
//!
//! A record is identified by (node id, node type, stream type). The key is
//! normalised before use so that cosmetic differences in the incoming
//! values do not split one entity across several records.

use std::fmt;

use serde::Serialize;

use actionlog_core::types::{NodeId, StreamType};

/// The (node id, node type, stream) triple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DedupKey {
    pub node_id: NodeId,
    pub node_type: String,
    pub stream_type: StreamType,
}

impl DedupKey {
    pub fn new(node_id: &NodeId, node_type: &str, stream_type: StreamType) -> Self {
        Self {
            node_id: NodeId::new(sanitize_term(node_id.as_str())),
            node_type: sanitize_term(node_type),
            stream_type,
        }
    }

    /// Stable string form stored in the unique `dedup_key` column.
    pub fn encode(&self) -> String {
        serde_json::json!([
            self.stream_type.to_string(),
            self.node_type,
            self.node_id.as_str()
        ])
        .to_string()
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.stream_type, self.node_type, self.node_id)
    }
}

/// Normalise a tag term: drop control characters, collapse runs of
/// whitespace, trim.
pub fn sanitize_term(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
