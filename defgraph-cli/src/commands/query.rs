use std::path::PathBuf;

use clap::Args;

use defgraph_core::graph::loader::GraphArtifacts;
use defgraph_core::query;
use defgraph_core::store::ChunkStore;
use defgraph_core::store::sqlite::SqliteStore;
use defgraph_core::types::{Direction, SymbolFilter};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Symbol ID, `#n` node index, or fuzzy reference
    pub symbol: String,
    /// Walk inbound edges (what uses the symbol) instead of outbound
    #[arg(long)]
    pub used_by: bool,
    /// Counterpart filter: code, xml, or all
    #[arg(long, default_value = "all", value_parser = ["code", "xml", "all"])]
    pub kind: String,
    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    /// Results per page
    #[arg(long, default_value_t = 10)]
    pub page_size: u32,
    /// Print the symbol's stored source instead of walking edges
    #[arg(long)]
    pub item: bool,
    /// Path to the mod directory (default: current directory)
    #[arg(long, default_value = ".")]
    pub path: PathBuf,
}

pub async fn run(args: QueryArgs) -> anyhow::Result<()> {
    let (root, _config, paths) = super::require_built(&args.path)?;

    let graph = GraphArtifacts::load(&paths)
        .map_err(|e| anyhow::anyhow!("Artefact error: {e}"))?;

    let Some(symbol_id) = query::resolve_reference(&graph, &args.symbol) else {
        println!("No symbol matching '{}'. Try a substring with `defgraph query --item` or the MCP find_defs tool.", args.symbol);
        return Ok(());
    };

    if args.item {
        let store = SqliteStore::open(&super::db_path(&root))
            .map_err(|e| anyhow::anyhow!("Cannot open database: {e}"))?;
        match store
            .get_chunk(&symbol_id)
            .await
            .map_err(|e| anyhow::anyhow!("Store error: {e}"))?
        {
            Some(chunk) => {
                println!("// {} ({})", symbol_id, chunk.path.display());
                println!("{}", chunk.text);
            }
            None => println!("{symbol_id}: no stored source (edge-only node)"),
        }
        return Ok(());
    }

    let direction = if args.used_by {
        Direction::UsedBy
    } else {
        Direction::Uses
    };
    let filter = SymbolFilter::parse(&args.kind);

    let page = query::query(
        &graph,
        &symbol_id,
        direction,
        filter,
        args.page as usize,
        args.page_size as usize,
    );

    let label = if args.used_by { "used by" } else { "uses" };
    println!(
        "{symbol_id} {label} {} counterpart(s) (page {} of {})",
        page.total_count,
        args.page,
        page.total_count.div_ceil((args.page_size as usize).max(1)).max(1)
    );
    for hit in &page.results {
        println!(
            "  {:<50} {:<18} x{:<3} score {:.1}",
            hit.symbol_id, hit.edge_kind, hit.duplicate_count, hit.score
        );
    }

    Ok(())
}
