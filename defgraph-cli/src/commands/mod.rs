pub mod build;
pub mod query;
pub mod serve;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use defgraph_core::config::DefGraphConfig;
use defgraph_core::graph::builder::ArtifactPaths;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index a mod directory: chunk, extract edges, build the graph
    Build(build::BuildArgs),
    /// Show the state of the index and its artefacts
    Status(status::StatusArgs),
    /// Query the knowledge graph for a symbol
    Query(query::QueryArgs),
    /// Start the MCP server for AI agent integration
    Serve(serve::ServeArgs),
}

pub async fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Build(args) => build::run(args).await,
        Command::Status(args) => status::run(args).await,
        Command::Query(args) => query::run(args).await,
        Command::Serve(args) => serve::run(args).await,
    }
}

/// The index directory inside a mod root.
pub fn index_dir(root: &Path) -> PathBuf {
    root.join(".defgraph")
}

/// The chunk-store database path inside a mod root.
pub fn db_path(root: &Path) -> PathBuf {
    index_dir(root).join("defgraph.db")
}

/// Load `defgraph.toml` from the mod root; defaults when absent.
pub fn load_config(root: &Path) -> anyhow::Result<DefGraphConfig> {
    DefGraphConfig::load(&root.join("defgraph.toml"))
        .with_context(|| format!("Cannot load config from {}", root.display()))
}

/// Resolve a mod root and require a built index in it.
pub fn require_built(path: &Path) -> anyhow::Result<(PathBuf, DefGraphConfig, ArtifactPaths)> {
    let root = std::fs::canonicalize(path)
        .with_context(|| format!("Cannot resolve path: {}", path.display()))?;
    let config = load_config(&root)?;
    let paths = ArtifactPaths::new(&index_dir(&root), &config.graph.artifact_base);
    anyhow::ensure!(
        paths.all_present() && db_path(&root).exists(),
        "Index is not built in {}. Run `defgraph build` first.",
        root.display()
    );
    Ok((root, config, paths))
}
