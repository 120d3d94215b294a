//! Query-side and pipeline-side types. The producer-side data model
//! (chunks, edge kinds) lives in `defgraph-extract` and is re-exported from
//! the crate root.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Traversal direction for a graph query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Outbound edges: what the symbol uses.
    Uses,
    /// Inbound edges: what uses the symbol.
    UsedBy,
}

/// Counterpart filter for a graph query, by symbol universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolFilter {
    /// Keep only counterparts without the `xml:` prefix.
    Code,
    /// Keep only counterparts with the `xml:` prefix.
    Xml,
}

impl SymbolFilter {
    /// Parse a user-supplied filter; `all`/empty mean no filter.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "code" => Some(Self::Code),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    pub fn keeps(self, symbol_id: &str) -> bool {
        match self {
            Self::Code => !defgraph_extract::is_xml_id(symbol_id),
            Self::Xml => defgraph_extract::is_xml_id(symbol_id),
        }
    }
}

/// One scored result group of a graph query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    /// The counterpart symbol on the other end of the edges.
    pub symbol_id: String,
    /// Edge kind shared by the group, as a stable name.
    pub edge_kind: String,
    /// How many parallel edges the group collapsed.
    pub duplicate_count: usize,
    pub score: f64,
    /// PageRank of the counterpart, for display.
    pub pagerank: f64,
}

/// A page of query results plus the pre-pagination total.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryPage {
    pub results: Vec<QueryHit>,
    pub total_count: usize,
}

/// Counters reported by a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub chunks: usize,
    pub code_edges: usize,
    pub xml_code_edges: usize,
    pub xml_def_edges: usize,
    pub reverse_edges: usize,
    pub nodes: usize,
    pub edges: usize,
    pub pagerank_iterations: u32,
    pub embedded_chunks: usize,
    pub duration: Duration,
}
