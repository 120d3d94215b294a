use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Transport type (only stdio is supported)
    #[arg(long, value_parser = ["stdio"])]
    pub transport: Option<String>,
    /// Path to the mod directory (default: current directory)
    #[arg(long, default_value = ".")]
    pub path: PathBuf,
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let (root, config, paths) = super::require_built(&args.path)?;

    match args.transport.as_deref().unwrap_or("stdio") {
        "stdio" => {
            defgraph_mcp::serve_stdio(&super::db_path(&root), &paths, &config)
                .await
                .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
        }
        other => {
            anyhow::bail!("Unsupported transport: {other}. Supported transport: stdio");
        }
    }

    Ok(())
}
