//! Two-phase sparse graph build: intern every symbol ID to a dense index,
//! then pack the edge multiset into paired CSR and CSC views.
//!
//! Node indices are assigned chunk IDs first, in input order, then any edge
//! endpoint not seen before, in edge-list order. Given the same chunk and
//! edge sequences the build is fully deterministic, including the on-disk
//! bytes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::info;

use defgraph_extract::{ChunkRecord, SymbolEdge};

use super::format::{self, CSC_MAGIC, CSR_MAGIC, SparseMatrix};
use crate::error::ArtifactError;

/// File paths of the four artefacts sharing one `<base>`.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    base: PathBuf,
}

impl ArtifactPaths {
    /// `dir/base` becomes the `<base>` prefix of all four files.
    pub fn new(dir: &Path, base: &str) -> Self {
        Self {
            base: dir.join(base),
        }
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.base.file_name().map_or_else(
            || std::ffi::OsString::from("graph"),
            std::ffi::OsStr::to_os_string,
        );
        name.push(suffix);
        self.base.with_file_name(name)
    }

    pub fn nodes(&self) -> PathBuf {
        self.with_suffix(".nodes.tsv")
    }

    pub fn csr(&self) -> PathBuf {
        self.with_suffix(".csr.bin")
    }

    pub fn csc(&self) -> PathBuf {
        self.with_suffix(".csc.bin")
    }

    pub fn pagerank(&self) -> PathBuf {
        self.with_suffix(".pagerank.tsv")
    }

    /// Whether all four artefacts exist.
    pub fn all_present(&self) -> bool {
        self.nodes().exists() && self.csr().exists() && self.csc().exists() && self.pagerank().exists()
    }
}

/// The in-memory product of a graph build.
#[derive(Debug)]
pub struct GraphBuild {
    pub nodes: Vec<String>,
    pub node_index: HashMap<String, u32>,
    pub csr: SparseMatrix,
    pub csc: SparseMatrix,
}

impl GraphBuild {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.csr.edge_count()
    }

    /// Persist the node table and both matrix views (PageRank is computed
    /// and persisted separately).
    pub fn persist(&self, paths: &ArtifactPaths) -> Result<(), ArtifactError> {
        format::write_nodes_tsv(&paths.nodes(), &self.nodes)?;
        self.csr.write(&paths.csr(), CSR_MAGIC)?;
        self.csc.write(&paths.csc(), CSC_MAGIC)?;
        Ok(())
    }
}

/// Build the graph from the chunk list and the full edge multiset.
pub fn build_graph(chunks: &[ChunkRecord], edges: &[SymbolEdge]) -> GraphBuild {
    let mut nodes: Vec<String> = Vec::new();
    let mut node_index: HashMap<String, u32> = HashMap::new();

    #[allow(clippy::cast_possible_truncation)]
    let intern = |id: &str, nodes: &mut Vec<String>, index: &mut HashMap<String, u32>| -> u32 {
        if let Some(&existing) = index.get(id) {
            return existing;
        }
        let assigned = nodes.len() as u32;
        nodes.push(id.to_string());
        index.insert(id.to_string(), assigned);
        assigned
    };

    for chunk in chunks {
        intern(&chunk.id, &mut nodes, &mut node_index);
    }

    let mut triples: Vec<(u32, u32, u8)> = Vec::with_capacity(edges.len());
    for edge in edges {
        if edge.source == edge.target {
            continue; // the walker rejects self-loops
        }
        let src = intern(&edge.source, &mut nodes, &mut node_index);
        let dst = intern(&edge.target, &mut nodes, &mut node_index);
        triples.push((src, dst, edge.kind.as_byte()));
    }

    let csr = pack(&triples, nodes.len(), |t| (t.0, t.1, t.2));
    let csc = pack(&triples, nodes.len(), |t| (t.1, t.0, t.2));

    info!(
        nodes = nodes.len(),
        edges = triples.len(),
        "Packed knowledge graph"
    );

    GraphBuild {
        nodes,
        node_index,
        csr,
        csc,
    }
}

/// Group triples by a key node, ordering each group by (other, kind).
fn pack(
    triples: &[(u32, u32, u8)],
    node_count: usize,
    project: impl Fn(&(u32, u32, u8)) -> (u32, u32, u8),
) -> SparseMatrix {
    let mut sorted: Vec<(u32, u32, u8)> = triples.iter().map(&project).collect();
    sorted.sort_unstable();

    let mut pointers = vec![0u32; node_count + 1];
    for &(key, _, _) in &sorted {
        pointers[key as usize + 1] += 1;
    }
    for i in 0..node_count {
        pointers[i + 1] += pointers[i];
    }

    SparseMatrix {
        pointers,
        indices: sorted.iter().map(|&(_, other, _)| other).collect(),
        kinds: sorted.iter().map(|&(_, _, kind)| kind).collect(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use defgraph_extract::{ChunkLanguage, EdgeKind};
    use proptest::prelude::*;

    fn chunk(id: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            language: if id.starts_with("xml:") {
                ChunkLanguage::Xml
            } else {
                ChunkLanguage::Code
            },
            text: String::new(),
            symbol_name: id.rsplit(['.', ':']).next().unwrap_or(id).to_string(),
            def_type: None,
            span_start: 0,
            span_end: 0,
            path: std::path::PathBuf::from("x"),
        }
    }

    fn edge(source: &str, target: &str, kind: EdgeKind) -> SymbolEdge {
        SymbolEdge::new(source, target, kind)
    }

    #[test]
    fn chunk_ids_interned_first_in_order() {
        let chunks = vec![chunk("B"), chunk("A")];
        let edges = vec![edge("A", "C", EdgeKind::Calls)];
        let build = build_graph(&chunks, &edges);

        assert_eq!(build.nodes, vec!["B", "A", "C"]);
        assert_eq!(build.node_index["C"], 2);
    }

    #[test]
    fn round_trip_every_edge_in_both_views() {
        let chunks = vec![chunk("A"), chunk("B"), chunk("C")];
        let edges = vec![
            edge("A", "B", EdgeKind::Calls),
            edge("A", "B", EdgeKind::Calls), // duplicate survives
            edge("A", "C", EdgeKind::References),
            edge("C", "B", EdgeKind::Inherits),
        ];
        let build = build_graph(&chunks, &edges);
        assert_eq!(build.edge_count(), 4);

        let out_a: Vec<(usize, u8)> = build.csr.neighbors(0).collect();
        assert_eq!(out_a, vec![(1, 1), (1, 1), (2, 2)]);

        let in_b: Vec<(usize, u8)> = build.csc.neighbors(1).collect();
        assert_eq!(in_b, vec![(0, 1), (0, 1), (2, 3)]);
    }

    #[test]
    fn self_loops_dropped() {
        let build = build_graph(&[chunk("A")], &[edge("A", "A", EdgeKind::Calls)]);
        assert_eq!(build.edge_count(), 0);
        assert_eq!(build.node_count(), 1);
    }

    #[test]
    fn rows_sorted_by_target_then_kind() {
        let chunks = vec![chunk("S"), chunk("T"), chunk("U")];
        let edges = vec![
            edge("S", "U", EdgeKind::References),
            edge("S", "T", EdgeKind::Inherits),
            edge("S", "T", EdgeKind::Calls),
        ];
        let build = build_graph(&chunks, &edges);
        let row: Vec<(usize, u8)> = build.csr.neighbors(0).collect();
        assert_eq!(row, vec![(1, 1), (1, 3), (2, 2)]);
    }

    #[test]
    fn deterministic_given_same_input() {
        let chunks = vec![chunk("A"), chunk("B")];
        let edges = vec![
            edge("A", "B", EdgeKind::Calls),
            edge("B", "Z", EdgeKind::References),
        ];
        let first = build_graph(&chunks, &edges);
        let second = build_graph(&chunks, &edges);
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.csr, second.csr);
        assert_eq!(first.csc, second.csc);
    }

    #[test]
    fn empty_input_builds_empty_graph() {
        let build = build_graph(&[], &[]);
        assert_eq!(build.node_count(), 0);
        assert_eq!(build.edge_count(), 0);
        assert_eq!(build.csr.pointers, vec![0]);
    }

    #[test]
    fn persist_writes_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path(), "graph");
        let build = build_graph(&[chunk("A"), chunk("B")], &[edge("A", "B", EdgeKind::Calls)]);
        build.persist(&paths).unwrap();

        assert!(paths.nodes().exists());
        assert!(paths.csr().exists());
        assert!(paths.csc().exists());

        let csr = SparseMatrix::read(&paths.csr(), CSR_MAGIC).unwrap();
        assert_eq!(csr, build.csr);
        let csc = SparseMatrix::read(&paths.csc(), CSC_MAGIC).unwrap();
        assert_eq!(csc, build.csc);
    }

    proptest! {
        /// Round-trip invariant: every emitted edge appears in CSR and CSC
        /// with its kind, and both views describe the same multiset.
        #[test]
        fn csr_csc_describe_same_multiset(
            raw_edges in proptest::collection::vec((0u32..20, 0u32..20, 1u8..31), 0..200)
        ) {
            let edges: Vec<SymbolEdge> = raw_edges
                .iter()
                .filter(|(s, t, _)| s != t)
                .map(|&(s, t, k)| SymbolEdge::new(
                    format!("N{s}"),
                    format!("N{t}"),
                    EdgeKind::from_byte(if k == 30 { 30 } else { 1 + (k % 5) }).unwrap_or(EdgeKind::Calls),
                ))
                .collect();
            let build = build_graph(&[], &edges);

            let mut from_csr: Vec<(u32, u32, u8)> = Vec::new();
            for src in 0..build.node_count() {
                for (dst, kind) in build.csr.neighbors(src) {
                    from_csr.push((src as u32, dst as u32, kind));
                }
            }
            let mut from_csc: Vec<(u32, u32, u8)> = Vec::new();
            for dst in 0..build.node_count() {
                for (src, kind) in build.csc.neighbors(dst) {
                    from_csc.push((src as u32, dst as u32, kind));
                }
            }
            let mut from_edges: Vec<(u32, u32, u8)> = edges
                .iter()
                .map(|e| (build.node_index[&e.source], build.node_index[&e.target], e.kind.as_byte()))
                .collect();

            from_csr.sort_unstable();
            from_csc.sort_unstable();
            from_edges.sort_unstable();
            prop_assert_eq!(&from_csr, &from_csc);
            prop_assert_eq!(&from_csr, &from_edges);
        }
    }
}
