//! PageRank over the packed CSR/CSC pair.
//!
//! Classic power method: CSC enumerates incoming neighbours, CSR row
//! pointers give out-degrees, dangling mass is redistributed uniformly.
//! Edge kinds play no role here.

// Score math intentionally casts counts to floats.
#![allow(clippy::cast_precision_loss)]

use tracing::info;

use super::format::SparseMatrix;

/// Tunables for the power iteration.
#[derive(Debug, Clone, Copy)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: u32,
    /// L1 distance between successive score vectors that counts as
    /// converged.
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// Scores plus the iteration count the computation took.
#[derive(Debug, Clone)]
pub struct PageRankResult {
    pub scores: Vec<f64>,
    pub iterations: u32,
}

/// Run the power iteration. An empty graph yields an empty score vector.
pub fn compute_pagerank(
    csr: &SparseMatrix,
    csc: &SparseMatrix,
    config: &PageRankConfig,
) -> PageRankResult {
    let n = csr.node_count();
    if n == 0 {
        return PageRankResult {
            scores: Vec::new(),
            iterations: 0,
        };
    }

    let n_f = n as f64;
    let d = config.damping;
    let out_degrees: Vec<usize> = (0..n).map(|i| csr.degree(i)).collect();

    let mut scores = vec![1.0 / n_f; n];
    let mut iterations = 0;

    for _ in 0..config.max_iterations {
        iterations += 1;

        let dangling_mass: f64 = out_degrees
            .iter()
            .zip(&scores)
            .filter(|&(&degree, _)| degree == 0)
            .map(|(_, &score)| score)
            .sum();

        let base = (1.0 - d) / n_f + d * dangling_mass / n_f;
        let mut next = vec![base; n];
        for (node, slot) in next.iter_mut().enumerate() {
            let incoming: f64 = csc
                .neighbors(node)
                .map(|(source, _)| scores[source] / out_degrees[source] as f64)
                .sum();
            *slot += d * incoming;
        }

        let diff: f64 = next
            .iter()
            .zip(&scores)
            .map(|(a, b)| (a - b).abs())
            .sum();
        scores = next;

        if diff < config.tolerance {
            break;
        }
    }

    info!(nodes = n, iterations, "PageRank converged");
    PageRankResult { scores, iterations }
}

/// Pair node scores with their symbol IDs and sort for the TSV artefact:
/// score descending, symbol ID ascending as the stable tiebreak.
pub fn ranked_entries(nodes: &[String], scores: &[f64]) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = nodes
        .iter()
        .cloned()
        .zip(scores.iter().copied())
        .collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    entries
}

// ── Tests ──────────────────────────────────────────────────────────
