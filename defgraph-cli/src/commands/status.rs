use std::path::PathBuf;

use clap::Args;

use defgraph_core::graph::loader::GraphArtifacts;
use defgraph_core::store::ChunkStore;
use defgraph_core::store::sqlite::SqliteStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Path to the mod directory (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

pub async fn run(args: StatusArgs) -> anyhow::Result<()> {
    let (root, _config, paths) = super::require_built(&args.path)?;

    let graph = GraphArtifacts::load(&paths)
        .map_err(|e| anyhow::anyhow!("Artefact error: {e}"))?;
    let store = SqliteStore::open(&super::db_path(&root))
        .map_err(|e| anyhow::anyhow!("Cannot open database: {e}"))?;

    println!("Index at {}", super::index_dir(&root).display());
    println!("  chunks: {}", store.count_chunks().await.map_err(|e| anyhow::anyhow!("{e}"))?);
    println!("  nodes: {}", graph.node_count());
    println!("  edges: {}", graph.edge_count());

    if let Ok(Some(built_at)) = store.get_meta("built_at").await {
        println!("  built: {built_at}");
    }
    if let Ok(Some(source)) = store.get_meta("source_dir").await {
        println!("  source: {source}");
    }

    Ok(())
}
