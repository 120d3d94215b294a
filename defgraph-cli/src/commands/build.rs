use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use defgraph_core::pipeline::BuildPipeline;
use defgraph_core::store::sqlite::SqliteStore;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the mod directory (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let root = std::fs::canonicalize(&args.path)
        .with_context(|| format!("Cannot resolve path: {}", args.path.display()))?;
    let config = super::load_config(&root)?;

    let index_dir = super::index_dir(&root);
    std::fs::create_dir_all(&index_dir)
        .with_context(|| format!("Cannot create index dir {}", index_dir.display()))?;

    let store = SqliteStore::open(&super::db_path(&root))
        .map_err(|e| anyhow::anyhow!("Cannot open database: {e}"))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Indexing {}", root.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let pipeline = BuildPipeline::new(&root, &index_dir);
    let stats = pipeline
        .run(&store, &config)
        .await
        .map_err(|e| anyhow::anyhow!("Build failed: {e}"))?;

    spinner.finish_and_clear();

    println!("Indexed {}", root.display());
    println!(
        "  files: {} scanned, {} skipped",
        stats.files_scanned, stats.files_skipped
    );
    println!("  chunks: {}", stats.chunks);
    println!(
        "  edges: {} code, {} xml→code, {} xml→xml, {} reverse",
        stats.code_edges, stats.xml_code_edges, stats.xml_def_edges, stats.reverse_edges
    );
    println!("  graph: {} nodes, {} edges", stats.nodes, stats.edges);
    println!(
        "  pagerank: {} iterations in {:.2}s total",
        stats.pagerank_iterations,
        stats.duration.as_secs_f64()
    );
    if stats.embedded_chunks > 0 {
        println!("  embeddings: {} chunks", stats.embedded_chunks);
    }

    Ok(())
}
