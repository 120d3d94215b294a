//! Build pipeline: walk a mod directory, chunk it, run the four extraction
//! phases, pack and persist the graph, then PageRank it.
//!
//! One linear progression — chunk → phase1 → phase2 → phase3 → phase4 →
//! write → pagerank — with a hard failure aborting the build. Writers go
//! through temp-and-rename, so a failed run never leaves a torn artefact.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use defgraph_extract::chunker::{chunk_csharp_file, chunk_xml_file};
use defgraph_extract::code::extract_code_edges;
use defgraph_extract::symbols::SymbolTable;
use defgraph_extract::xml_code::extract_xml_code_edges;
use defgraph_extract::xml_defs::{extract_xml_def_edges, reverse_code_bindings};
use defgraph_extract::{ChunkRecord, SymbolEdge};

use crate::config::{DefGraphConfig, IndexSection};
use crate::embed::EmbeddingClient;
use crate::error::ConfigError;
use crate::graph::builder::{ArtifactPaths, build_graph};
use crate::graph::format::write_pagerank_tsv;
use crate::graph::pagerank::{PageRankConfig, compute_pagerank, ranked_entries};
use crate::store::ChunkStore;
use crate::types::BuildStats;

/// Longest chunk-text prefix sent to the embedding service.
const EMBED_TEXT_CAP: usize = 8_000;

/// Orchestrates a full index build for one mod directory.
#[derive(Debug)]
pub struct BuildPipeline {
    source_dir: PathBuf,
    index_dir: PathBuf,
}

impl BuildPipeline {
    pub fn new(source_dir: &Path, index_dir: &Path) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            index_dir: index_dir.to_path_buf(),
        }
    }

    /// Artefact paths this pipeline writes.
    pub fn artifact_paths(&self, config: &DefGraphConfig) -> ArtifactPaths {
        ArtifactPaths::new(&self.index_dir, &config.graph.artifact_base)
    }

    /// Run the whole build. The graph is rebuilt wholesale; the previous
    /// artefacts stay readable until the final rename.
    pub async fn run(
        &self,
        store: &dyn ChunkStore,
        config: &DefGraphConfig,
    ) -> crate::error::Result<BuildStats> {
        let start = Instant::now();
        let mut stats = BuildStats::default();

        std::fs::create_dir_all(&self.index_dir).map_err(defgraph_extract::ExtractError::Io)?;

        // ── Chunk ──────────────────────────────────────────────────
        let files = walk_file_tree(&self.source_dir, &config.index);
        stats.files_scanned = files.len();
        info!(files = files.len(), root = %self.source_dir.display(), "Scanning mod sources");

        let mut chunks: Vec<ChunkRecord> = Vec::new();
        for path in &files {
            match chunk_file(path) {
                Ok(mut file_chunks) => chunks.append(&mut file_chunks),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to chunk file");
                    stats.files_skipped += 1;
                }
            }
        }
        stats.chunks = chunks.len();
        info!(chunks = chunks.len(), "Chunking complete");

        store.clear_chunks().await?;
        store.upsert_chunks_batch(&chunks).await?;

        // ── Extract (four phases, parallel fan-out per phase) ──────
        let edges = self.extract_edges(&chunks, config, &mut stats)?;

        // ── Pack & persist ─────────────────────────────────────────
        let build = build_graph(&chunks, &edges);
        stats.nodes = build.node_count();
        stats.edges = build.edge_count();

        let paths = self.artifact_paths(config);
        build.persist(&paths)?;

        // ── PageRank ───────────────────────────────────────────────
        let pr_config = PageRankConfig {
            damping: config.graph.damping,
            max_iterations: config.graph.max_iterations,
            tolerance: config.graph.tolerance,
        };
        let result = compute_pagerank(&build.csr, &build.csc, &pr_config);
        stats.pagerank_iterations = result.iterations;
        write_pagerank_tsv(&paths.pagerank(), &ranked_entries(&build.nodes, &result.scores))?;

        // ── Optional embedding enrichment ──────────────────────────
        if let Some(client) = EmbeddingClient::from_config(&config.embedding) {
            stats.embedded_chunks = embed_chunks(store, &client, &chunks, config).await?;
        }

        store.set_meta("built_at", &chrono::Utc::now().to_rfc3339()).await?;
        store
            .set_meta("source_dir", &self.source_dir.to_string_lossy())
            .await?;

        stats.duration = start.elapsed();
        info!(
            nodes = stats.nodes,
            edges = stats.edges,
            chunks = stats.chunks,
            duration = ?stats.duration,
            "Build complete"
        );
        Ok(stats)
    }

    /// Phases 1–4, joined sequentially; each phase fans out over chunks.
    fn extract_edges(
        &self,
        chunks: &[ChunkRecord],
        config: &DefGraphConfig,
        stats: &mut BuildStats,
    ) -> crate::error::Result<Vec<SymbolEdge>> {
        let run = || {
            let table = SymbolTable::build(chunks);
            info!(symbols = table.len(), "Symbol table built");

            let code = extract_code_edges(chunks, &table, config.extract.code_resolution);
            let xml_code = extract_xml_code_edges(chunks, &table, &config.extract.xml_link);
            let xml_defs = extract_xml_def_edges(chunks);
            let reverse = reverse_code_bindings(&xml_code);
            (code, xml_code, xml_defs, reverse)
        };

        let (code, xml_code, xml_defs, reverse) = if config.index.parallelism > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.index.parallelism)
                .build()
                .map_err(|e| ConfigError::Invalid(format!("worker pool: {e}")))?;
            pool.install(run)
        } else {
            run()
        };

        stats.code_edges = code.len();
        stats.xml_code_edges = xml_code.len();
        stats.xml_def_edges = xml_defs.len();
        stats.reverse_edges = reverse.len();
        info!(
            code = code.len(),
            xml_code = xml_code.len(),
            xml_defs = xml_defs.len(),
            reverse = reverse.len(),
            "Edge extraction complete"
        );

        let mut edges = code;
        edges.extend(xml_code);
        edges.extend(xml_defs);
        edges.extend(reverse);
        Ok(edges)
    }
}

/// Chunk one file by extension; anything else yields nothing.
fn chunk_file(path: &Path) -> defgraph_extract::Result<Vec<ChunkRecord>> {
    let source = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("cs") => chunk_csharp_file(path, &source),
        Some("xml") => chunk_xml_file(path, &source),
        _ => Ok(Vec::new()),
    }
}

/// Glob the include patterns under `root`, drop excluded paths, and return
/// a sorted, deduplicated list — the deterministic chunk iteration order.
fn walk_file_tree(root: &Path, section: &IndexSection) -> Vec<PathBuf> {
    let mut matched = Vec::new();
    for pattern in &section.include_patterns {
        let full_pattern = root.join(pattern).to_string_lossy().to_string();
        match glob::glob(&full_pattern) {
            Ok(paths) => {
                for entry in paths.flatten() {
                    if entry.is_file() && !is_excluded(&entry, root, &section.exclude_patterns) {
                        matched.push(entry);
                    }
                }
            }
            Err(e) => warn!(pattern = %full_pattern, error = %e, "Bad include pattern"),
        }
    }
    matched.sort();
    matched.dedup();
    matched
}

fn is_excluded(path: &Path, root: &Path, exclude_patterns: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    exclude_patterns.iter().any(|pattern| {
        glob::Pattern::new(pattern)
            .map(|p| p.matches_path(relative))
            .unwrap_or(false)
    })
}

/// Embed chunk texts in batches and store the vectors.
async fn embed_chunks(
    store: &dyn ChunkStore,
    client: &EmbeddingClient,
    chunks: &[ChunkRecord],
    config: &DefGraphConfig,
) -> crate::error::Result<usize> {
    let mut embedded = 0;
    for batch in chunks.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| clip(&c.text)).collect();
        let vectors = client.embed(&texts).await?;
        for (chunk, vector) in batch.iter().zip(vectors) {
            store.store_embedding(&chunk.id, &vector).await?;
            embedded += 1;
        }
    }
    info!(embedded, "Embedding enrichment complete");
    Ok(embedded)
}

fn clip(text: &str) -> String {
    if text.len() <= EMBED_TEXT_CAP {
        return text.to_string();
    }
    let mut end = EMBED_TEXT_CAP;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::loader::GraphArtifacts;
    use crate::query;
    use crate::store::sqlite::SqliteStore;
    use crate::types::Direction;

    fn write_fixture(root: &Path) {
        let src = root.join("Source");
        let defs = root.join("Defs");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&defs).unwrap();

        std::fs::write(
            src.join("Comps.cs"),
            "namespace Verse {\n    public class ThingComp {\n    }\n}\n\
             namespace RimWorld {\n    public class CompExplosive : Verse.ThingComp {\n        public void Detonate() {}\n    }\n}\n",
        )
        .unwrap();
        std::fs::write(
            defs.join("Things.xml"),
            "<Defs>\n  <ThingDef>\n    <defName>Shell</defName>\n    <thingClass>RimWorld.CompExplosive</thingClass>\n  </ThingDef>\n</Defs>\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn end_to_end_build_produces_queryable_graph() {
        let source = tempfile::tempdir().unwrap();
        let index = tempfile::tempdir().unwrap();
        write_fixture(source.path());

        let store = SqliteStore::in_memory().unwrap();
        let config = DefGraphConfig::default();
        let pipeline = BuildPipeline::new(source.path(), index.path());
        let stats = pipeline.run(&store, &config).await.unwrap();

        assert_eq!(stats.files_scanned, 2);
        assert!(stats.chunks >= 3, "classes + method + def, got {}", stats.chunks);
        assert!(stats.xml_code_edges >= 1);
        assert_eq!(stats.reverse_edges, stats.xml_code_edges);

        let graph = GraphArtifacts::load(&pipeline.artifact_paths(&config)).unwrap();
        assert!(graph.node_count() > 0);

        // The Def binds the comp class; the comp is used by the Def.
        let used_by = query::query(
            &graph,
            "RimWorld.CompExplosive",
            Direction::UsedBy,
            None,
            1,
            10,
        );
        assert!(
            used_by
                .results
                .iter()
                .any(|hit| hit.symbol_id == "xml:ThingDef:Shell"),
            "got {used_by:?}"
        );

        // Chunk text is retrievable through the store.
        let chunk = store.get_chunk("RimWorld.CompExplosive").await.unwrap().unwrap();
        assert!(chunk.text.contains("Detonate"));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_but_valid_artifacts() {
        let source = tempfile::tempdir().unwrap();
        let index = tempfile::tempdir().unwrap();

        let store = SqliteStore::in_memory().unwrap();
        let config = DefGraphConfig::default();
        let pipeline = BuildPipeline::new(source.path(), index.path());
        let stats = pipeline.run(&store, &config).await.unwrap();

        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.edges, 0);

        let paths = pipeline.artifact_paths(&config);
        let graph = GraphArtifacts::load(&paths).unwrap();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(std::fs::read_to_string(paths.pagerank()).unwrap(), "");

        let page = query::query(&graph, "anything", Direction::Uses, None, 1, 10);
        assert_eq!(page.total_count, 0);
    }

    #[tokio::test]
    async fn broken_file_skipped_build_continues() {
        let source = tempfile::tempdir().unwrap();
        let index = tempfile::tempdir().unwrap();
        write_fixture(source.path());
        std::fs::write(source.path().join("Defs/Broken.xml"), "<Defs><ThingDef></Defs>").unwrap();

        let store = SqliteStore::in_memory().unwrap();
        let config = DefGraphConfig::default();
        let pipeline = BuildPipeline::new(source.path(), index.path());
        let stats = pipeline.run(&store, &config).await.unwrap();

        assert_eq!(stats.files_skipped, 1);
        assert!(stats.chunks >= 3);
    }

    #[tokio::test]
    async fn bounded_parallelism_is_deterministic() {
        let source = tempfile::tempdir().unwrap();
        write_fixture(source.path());

        let mut config = DefGraphConfig::default();
        config.index.parallelism = 2;

        let index_a = tempfile::tempdir().unwrap();
        let store_a = SqliteStore::in_memory().unwrap();
        let pipeline_a = BuildPipeline::new(source.path(), index_a.path());
        pipeline_a.run(&store_a, &config).await.unwrap();

        let index_b = tempfile::tempdir().unwrap();
        let store_b = SqliteStore::in_memory().unwrap();
        let pipeline_b = BuildPipeline::new(source.path(), index_b.path());
        pipeline_b.run(&store_b, &config).await.unwrap();

        let paths_a = pipeline_a.artifact_paths(&config);
        let paths_b = pipeline_b.artifact_paths(&config);
        assert_eq!(
            std::fs::read(paths_a.csr()).unwrap(),
            std::fs::read(paths_b.csr()).unwrap()
        );
        assert_eq!(
            std::fs::read(paths_a.csc()).unwrap(),
            std::fs::read(paths_b.csc()).unwrap()
        );
        assert_eq!(
            std::fs::read_to_string(paths_a.nodes()).unwrap(),
            std::fs::read_to_string(paths_b.nodes()).unwrap()
        );
    }

    #[test]
    fn exclusion_patterns_apply_to_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("obj");
        std::fs::create_dir_all(&obj).unwrap();
        std::fs::write(obj.join("Generated.cs"), "class G {}").unwrap();
        std::fs::write(dir.path().join("Real.cs"), "class R {}").unwrap();

        let files = walk_file_tree(dir.path(), &IndexSection::default());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("Real.cs"));
    }

    #[test]
    fn clip_respects_char_boundaries() {
        let text = "é".repeat(EMBED_TEXT_CAP);
        let clipped = clip(&text);
        assert!(clipped.len() <= EMBED_TEXT_CAP);
        assert!(clipped.chars().all(|c| c == 'é'));
    }
}
