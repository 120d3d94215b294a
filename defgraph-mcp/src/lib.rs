// defgraph MCP server — exposes the mod-corpus knowledge graph as MCP tools.
//
// Tools:
//   get_item    — fetch the source behind a symbol ID (or #n node index)
//   get_uses    — paginated outbound edges of a symbol
//   get_used_by — paginated inbound edges of a symbol
//   find_defs   — lexical search over chunks, embedding re-rank when enabled

use std::path::Path;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, ServiceExt, schemars, tool, tool_router};
use serde::Deserialize;
use tracing::info;

use defgraph_core::config::DefGraphConfig;
use defgraph_core::embed::{EmbeddingClient, rank_by_similarity};
use defgraph_core::graph::builder::ArtifactPaths;
use defgraph_core::graph::loader::GraphArtifacts;
use defgraph_core::query;
use defgraph_core::store::ChunkStore;
use defgraph_core::store::sqlite::SqliteStore;
use defgraph_core::types::{Direction, SymbolFilter};

/// Default page size for the edge tools.
const DEFAULT_PAGE_SIZE: u32 = 10;
/// Hard cap, so one call can't dump the whole graph.
const MAX_PAGE_SIZE: u32 = 100;
/// Default line cap for `get_item`.
const DEFAULT_MAX_LINES: u32 = 200;

// ── Tool parameter types ──────────────────────────────────────────

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetItemParams {
    /// Symbol ID or node-index reference
    #[schemars(description = "Symbol ID (code or xml:-prefixed Def) or #n node index")]
    pub symbol: String,
    /// Max source lines to return
    #[schemars(description = "Maximum source lines to return (default: 200)")]
    pub max_lines: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct EdgeQueryParams {
    /// Symbol ID or node-index reference
    #[schemars(description = "Symbol ID (code or xml:-prefixed Def) or #n node index")]
    pub symbol: String,
    /// Counterpart universe filter
    #[schemars(description = "Counterpart filter: code, xml, or all (default: all)")]
    pub kind: Option<String>,
    /// 1-based page number
    #[schemars(description = "1-based page number (default: 1)")]
    pub page: Option<u32>,
    /// Results per page
    #[schemars(description = "Results per page (default: 10, max: 100)")]
    pub page_size: Option<u32>,
    /// Accepted for forward compatibility; traversal is single-hop
    #[schemars(description = "Reserved; traversal is currently single-hop")]
    pub max_depth: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FindDefsParams {
    /// Substring to search for
    #[schemars(description = "Substring to search for in symbol IDs and names")]
    pub query: String,
    /// Max results
    #[schemars(description = "Maximum results to return (default: 10)")]
    pub limit: Option<u32>,
}

// ── Server struct ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct DefGraphMcpServer {
    store: Arc<SqliteStore>,
    graph: Arc<GraphArtifacts>,
    embedder: Option<Arc<EmbeddingClient>>,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for DefGraphMcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefGraphMcpServer")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .finish_non_exhaustive()
    }
}

impl DefGraphMcpServer {
    /// Open the store and load the graph artefacts once.
    pub fn new(
        db_path: &Path,
        paths: &ArtifactPaths,
        config: &DefGraphConfig,
    ) -> Result<Self, String> {
        let store =
            SqliteStore::open(db_path).map_err(|e| format!("Failed to open database: {e}"))?;
        let graph =
            GraphArtifacts::load(paths).map_err(|e| format!("Failed to load graph: {e}"))?;
        Ok(Self {
            store: Arc::new(store),
            graph: Arc::new(graph),
            embedder: EmbeddingClient::from_config(&config.embedding).map(Arc::new),
            tool_router: Self::tool_router(),
        })
    }

    /// Create from loaded parts (for testing).
    pub fn from_parts(store: SqliteStore, graph: GraphArtifacts) -> Self {
        Self {
            store: Arc::new(store),
            graph: Arc::new(graph),
            embedder: None,
            tool_router: Self::tool_router(),
        }
    }
}

// ── Tool implementations ──────────────────────────────────────────

#[tool_router]
impl DefGraphMcpServer {
    #[tool(
        name = "get_item",
        description = "Fetch the source text and metadata behind a symbol ID (code symbol or xml:-prefixed Def). Accepts #n node-index references."
    )]
    async fn get_item(&self, Parameters(params): Parameters<GetItemParams>) -> String {
        match self.do_get_item(params).await {
            Ok(s) => s,
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(
        name = "get_uses",
        description = "What a symbol uses: its outbound knowledge-graph edges, ranked by PageRank, edge weight, and name similarity. Paginated."
    )]
    async fn get_uses(&self, Parameters(params): Parameters<EdgeQueryParams>) -> String {
        match self.do_edge_query(params, Direction::Uses).await {
            Ok(s) => s,
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(
        name = "get_used_by",
        description = "What uses a symbol: its inbound knowledge-graph edges (including Defs binding the class), ranked and paginated."
    )]
    async fn get_used_by(&self, Parameters(params): Parameters<EdgeQueryParams>) -> String {
        match self.do_edge_query(params, Direction::UsedBy).await {
            Ok(s) => s,
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(
        name = "find_defs",
        description = "Search symbols and Defs by substring. Use when a reference doesn't resolve exactly."
    )]
    async fn find_defs(&self, Parameters(params): Parameters<FindDefsParams>) -> String {
        match self.do_find_defs(params).await {
            Ok(s) => s,
            Err(e) => format!("Error: {e}"),
        }
    }
}

impl ServerHandler for DefGraphMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "defgraph MCP server — knowledge-graph retrieval over a game-modding \
                 corpus (C# code plus XML Defs). Use get_item to fetch a symbol's \
                 source, get_uses / get_used_by to walk its edges, and find_defs to \
                 search when an exact reference is unknown."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ── Tool logic (separated for testability) ────────────────────────

impl DefGraphMcpServer {
    async fn do_get_item(&self, params: GetItemParams) -> Result<String, String> {
        let reference = params.symbol.trim();
        if !is_valid_reference(reference) {
            return error_payload(&format!("Invalid symbol reference: {reference:?}"));
        }

        let Some(symbol_id) = query::resolve_reference(&self.graph, reference) else {
            return unresolved_payload(reference);
        };

        let chunk = self
            .store
            .get_chunk(&symbol_id)
            .await
            .map_err(|e| format!("Store error: {e}"))?;

        let mut entry = serde_json::json!({
            "symbol": symbol_id,
            "node_index": self.graph.index_of(&symbol_id),
            "pagerank": self.graph.score(&symbol_id),
        });

        if let Some(chunk) = chunk {
            let max_lines = params.max_lines.unwrap_or(DEFAULT_MAX_LINES) as usize;
            let total_lines = chunk.text.lines().count();
            let text: String = chunk
                .text
                .lines()
                .take(max_lines)
                .collect::<Vec<_>>()
                .join("\n");

            entry["language"] = serde_json::json!(chunk.language.as_str());
            entry["path"] = serde_json::json!(chunk.path.to_string_lossy());
            entry["def_type"] = serde_json::json!(chunk.def_type);
            entry["total_lines"] = serde_json::json!(total_lines);
            entry["truncated"] = serde_json::json!(total_lines > max_lines);
            entry["text"] = serde_json::json!(text);
        } else {
            entry["note"] = serde_json::json!(
                "Symbol exists in the graph but has no stored source (edge-only node)."
            );
        }

        serde_json::to_string_pretty(&entry).map_err(|e| format!("JSON error: {e}"))
    }

    async fn do_edge_query(
        &self,
        params: EdgeQueryParams,
        direction: Direction,
    ) -> Result<String, String> {
        let reference = params.symbol.trim();
        if !is_valid_reference(reference) {
            return error_payload(&format!("Invalid symbol reference: {reference:?}"));
        }

        let filter = match params.kind.as_deref() {
            None | Some("all" | "") => None,
            Some(other) => match SymbolFilter::parse(other) {
                Some(filter) => Some(filter),
                None => {
                    return error_payload(&format!(
                        "Unknown kind filter {other:?}. Use: code, xml, all"
                    ));
                }
            },
        };

        let Some(symbol_id) = query::resolve_reference(&self.graph, reference) else {
            return unresolved_payload(reference);
        };

        let page = params.page.unwrap_or(1).max(1) as usize;
        let page_size = params
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE) as usize;

        let result = query::query(&self.graph, &symbol_id, direction, filter, page, page_size);

        let results: Vec<serde_json::Value> = result
            .results
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "symbol": hit.symbol_id,
                    "edge_kind": hit.edge_kind,
                    "duplicates": hit.duplicate_count,
                    "score": hit.score,
                    "pagerank": hit.pagerank,
                })
            })
            .collect();

        serde_json::to_string_pretty(&serde_json::json!({
            "symbol": symbol_id,
            "direction": match direction {
                Direction::Uses => "uses",
                Direction::UsedBy => "used_by",
            },
            "page": page,
            "page_size": page_size,
            "total_count": result.total_count,
            "results": results,
        }))
        .map_err(|e| format!("JSON error: {e}"))
    }

    async fn do_find_defs(&self, params: FindDefsParams) -> Result<String, String> {
        let needle = params.query.trim();
        if needle.is_empty() {
            return error_payload("Empty search query");
        }
        let limit = params.limit.unwrap_or(10).clamp(1, 100) as usize;

        let mut hits = self
            .store
            .search_chunks(needle, limit)
            .await
            .map_err(|e| format!("Store error: {e}"))?;

        // With an embedding service configured, re-rank the lexical
        // candidates by cosine similarity to the query.
        if let Some(embedder) = &self.embedder {
            if let Ok(mut vectors) = embedder.embed(&[needle.to_string()]).await {
                if let Some(query_vector) = vectors.pop() {
                    let stored = self
                        .store
                        .all_embeddings()
                        .await
                        .map_err(|e| format!("Store error: {e}"))?;
                    let by_id: std::collections::HashMap<&str, &Vec<f32>> =
                        stored.iter().map(|(id, v)| (id.as_str(), v)).collect();
                    let candidates: Vec<(String, Vec<f32>)> = hits
                        .iter()
                        .filter_map(|c| {
                            by_id.get(c.id.as_str()).map(|v| (c.id.clone(), (*v).clone()))
                        })
                        .collect();
                    if !candidates.is_empty() {
                        let ranked = rank_by_similarity(&query_vector, &candidates);
                        hits.sort_by_key(|chunk| {
                            ranked
                                .iter()
                                .position(|(id, _)| *id == chunk.id)
                                .unwrap_or(usize::MAX)
                        });
                    }
                }
            }
        }

        let results: Vec<serde_json::Value> = hits
            .iter()
            .map(|chunk| {
                serde_json::json!({
                    "symbol": chunk.id,
                    "name": chunk.symbol_name,
                    "language": chunk.language.as_str(),
                    "def_type": chunk.def_type,
                    "path": chunk.path.to_string_lossy(),
                })
            })
            .collect();

        serde_json::to_string_pretty(&serde_json::json!({
            "count": results.len(),
            "results": results,
        }))
        .map_err(|e| format!("JSON error: {e}"))
    }
}

// ── Helpers ───────────────────────────────────────────────────────

/// Accept `#<digits>`, `xml:`-prefixed Def IDs, and code IDs (including
/// method signatures and fuzzy multi-part references).
fn is_valid_reference(reference: &str) -> bool {
    if reference.is_empty() {
        return false;
    }
    if let Some(digits) = reference.strip_prefix('#') {
        return !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    }
    if let Some(rest) = reference.strip_prefix("xml:") {
        return rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    }
    reference
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_.()`, <>".contains(c))
}

fn error_payload(message: &str) -> Result<String, String> {
    serde_json::to_string_pretty(&serde_json::json!({ "error": message }))
        .map_err(|e| format!("JSON error: {e}"))
}

fn unresolved_payload(reference: &str) -> Result<String, String> {
    serde_json::to_string_pretty(&serde_json::json!({
        "total_count": 0,
        "results": [],
        "note": format!(
            "No symbol matching '{reference}'. Try the find_defs tool to search the corpus."
        ),
    }))
    .map_err(|e| format!("JSON error: {e}"))
}

/// Start the MCP server on stdio transport.
pub async fn serve_stdio(
    db_path: &Path,
    paths: &ArtifactPaths,
    config: &DefGraphConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = DefGraphMcpServer::new(db_path, paths, config)?;
    info!("Starting defgraph MCP server (stdio transport)");

    let transport = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
    let service = server.serve(transport).await?;
    service.waiting().await?;

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────
