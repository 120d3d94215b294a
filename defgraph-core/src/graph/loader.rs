//! One-shot loader for the four on-disk artefacts.
//!
//! Reads everything at process start, verifies the views agree with the
//! node table, and exposes the read-only accessors the query engine needs.
//! Everything here is immutable after load and freely shared across
//! concurrent queries.

use std::collections::HashMap;

use tracing::info;

use super::builder::ArtifactPaths;
use super::format::{self, CSC_MAGIC, CSR_MAGIC, SparseMatrix};
use crate::error::ArtifactError;

/// The loaded knowledge graph: node table, both matrix views, PageRank.
#[derive(Debug)]
pub struct GraphArtifacts {
    nodes: Vec<String>,
    node_index: HashMap<String, u32>,
    csr: SparseMatrix,
    csc: SparseMatrix,
    pagerank: HashMap<String, f64>,
}

impl GraphArtifacts {
    /// Load and cross-validate all four artefacts. Any mismatch is fatal.
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactError> {
        let nodes = format::read_nodes_tsv(&paths.nodes())?;
        let csr = SparseMatrix::read(&paths.csr(), CSR_MAGIC)?;
        let csc = SparseMatrix::read(&paths.csc(), CSC_MAGIC)?;
        let pagerank = format::read_pagerank_tsv(&paths.pagerank())?;

        if csr.node_count() != nodes.len() || csc.node_count() != nodes.len() {
            return Err(ArtifactError::Truncated {
                path: paths.nodes().display().to_string(),
                message: format!(
                    "node table has {} entries but CSR/CSC declare {}/{}",
                    nodes.len(),
                    csr.node_count(),
                    csc.node_count()
                ),
            });
        }
        if csr.edge_count() != csc.edge_count() {
            return Err(ArtifactError::Truncated {
                path: paths.csr().display().to_string(),
                message: format!(
                    "CSR has {} edges but CSC has {}",
                    csr.edge_count(),
                    csc.edge_count()
                ),
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let node_index: HashMap<String, u32> = nodes
            .iter()
            .enumerate()
            .map(|(index, id)| (id.clone(), index as u32))
            .collect();

        info!(
            nodes = nodes.len(),
            edges = csr.edge_count(),
            scores = pagerank.len(),
            "Loaded graph artefacts"
        );

        Ok(Self {
            nodes,
            node_index,
            csr,
            csc,
            pagerank,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.csr.edge_count()
    }

    /// Symbol ID of a node index.
    pub fn symbol_of(&self, index: usize) -> Option<&str> {
        self.nodes.get(index).map(String::as_str)
    }

    /// Node index of a symbol ID.
    pub fn index_of(&self, symbol_id: &str) -> Option<usize> {
        self.node_index.get(symbol_id).map(|&i| i as usize)
    }

    /// All symbol IDs, in node-index order.
    pub fn symbols(&self) -> &[String] {
        &self.nodes
    }

    /// Outbound `(target_index, kind_byte)` pairs of a node.
    pub fn out_neighbors(&self, index: usize) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.csr.neighbors(index)
    }

    /// Inbound `(source_index, kind_byte)` pairs of a node.
    pub fn in_neighbors(&self, index: usize) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.csc.neighbors(index)
    }

    /// PageRank score of a symbol; 0 when absent.
    pub fn score(&self, symbol_id: &str) -> f64 {
        self.pagerank.get(symbol_id).copied().unwrap_or(0.0)
    }
}

// ── Tests ──────────────────────────────────────────────────────────
