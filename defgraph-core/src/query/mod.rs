//! Query engine — reference resolution, ranked single-hop traversal, and
//! pagination. Shared by the CLI `query` command and the MCP tools.
//!
//! Everything here reads the loaded [`GraphArtifacts`] only; queries are
//! stateless and freely concurrent.

pub mod fuzzy;

use std::collections::BTreeMap;

use defgraph_extract::{EdgeKind, kind_weight};

use crate::graph::loader::GraphArtifacts;
use crate::types::{Direction, QueryHit, QueryPage, SymbolFilter};

/// Multiplier that lifts PageRank scores into a usable magnitude before the
/// edge-weight and similarity factors are applied.
const PAGERANK_SCALE: f64 = 1e7;

/// Resolve a user-supplied reference to a canonical symbol ID.
///
/// `#<n>` is a node index; otherwise an exact node-table key; otherwise the
/// fuzzy resolver has a go. `None` means the reference names nothing in
/// this graph.
pub fn resolve_reference(graph: &GraphArtifacts, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if let Some(digits) = reference.strip_prefix('#') {
        if let Ok(index) = digits.parse::<usize>() {
            return graph.symbol_of(index).map(ToString::to_string);
        }
    }
    if graph.index_of(reference).is_some() {
        return Some(reference.to_string());
    }
    fuzzy::fuzzy_resolve(reference, graph.symbols()).map(ToString::to_string)
}

/// Single-hop graph query: resolve, walk, filter, group, score, paginate.
///
/// `page` is 1-based; out-of-range pages return an empty slice with the
/// true `total_count`. An unresolvable reference returns an empty page.
pub fn query(
    graph: &GraphArtifacts,
    reference: &str,
    direction: Direction,
    filter: Option<SymbolFilter>,
    page: usize,
    page_size: usize,
) -> QueryPage {
    let Some(symbol_id) = resolve_reference(graph, reference) else {
        return QueryPage::default();
    };
    let Some(index) = graph.index_of(&symbol_id) else {
        return QueryPage::default();
    };

    // CodeUsedByDef is a synthetic reverse edge: it is dropped from Uses
    // walks, and a used-by walk picks it up from the outbound side as well.
    let reverse_kind = EdgeKind::CodeUsedByDef.as_byte();
    let mut raw: Vec<(usize, u8)> = Vec::new();
    match direction {
        Direction::Uses => {
            raw.extend(graph.out_neighbors(index).filter(|&(_, kind)| kind != reverse_kind));
        }
        Direction::UsedBy => {
            raw.extend(graph.in_neighbors(index));
            raw.extend(graph.out_neighbors(index).filter(|&(_, kind)| kind == reverse_kind));
        }
    }

    // Group surviving edges by (counterpart, kind); the group size is the
    // duplicate count. BTreeMap keeps grouping order deterministic.
    let mut groups: BTreeMap<(String, u8), usize> = BTreeMap::new();
    for (counterpart, kind) in raw {
        if counterpart == index {
            continue;
        }
        let Some(counterpart_id) = graph.symbol_of(counterpart) else {
            continue;
        };
        if let Some(filter) = filter {
            if !filter.keeps(counterpart_id) {
                continue;
            }
        }
        *groups.entry((counterpart_id.to_string(), kind)).or_insert(0) += 1;
    }

    let mut results: Vec<QueryHit> = groups
        .into_iter()
        .map(|((counterpart_id, kind), duplicate_count)| {
            let pagerank = graph.score(&counterpart_id);
            let scaled_pr = pagerank * PAGERANK_SCALE;
            let edge_weight = kind_weight(kind);
            #[allow(clippy::cast_precision_loss)]
            let multiplicity = (duplicate_count as f64).sqrt();
            let lexical_bonus = strsim::jaro_winkler(&symbol_id, &counterpart_id);
            QueryHit {
                symbol_id: counterpart_id,
                edge_kind: EdgeKind::from_byte(kind)
                    .map_or_else(|| format!("kind_{kind}"), |k| k.as_str().to_string()),
                duplicate_count,
                score: scaled_pr * edge_weight * multiplicity * lexical_bonus,
                pagerank,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol_id.cmp(&b.symbol_id))
            .then_with(|| a.edge_kind.cmp(&b.edge_kind))
    });

    let total_count = results.len();
    let page = page.max(1);
    let start = (page - 1).saturating_mul(page_size).min(total_count);
    let end = start.saturating_add(page_size).min(total_count);

    QueryPage {
        results: results[start..end].to_vec(),
        total_count,
    }
}

// ── Tests ──────────────────────────────────────────────────────────
