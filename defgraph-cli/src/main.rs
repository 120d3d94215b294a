use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "defgraph",
    version,
    about = "Index a game-modding corpus (C# + XML Defs) into a queryable knowledge graph"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Classify an error into an exit code.
///
/// Exit codes:
///   0 — success
///   1 — general/unknown error
///   2 — configuration error
///   3 — index not found / not built
///   4 — database error
///   5 — artefact error (bad magic, truncation, version)
///   8 — MCP server error
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("not built") || msg.contains("cannot resolve path") {
        3
    } else if msg.contains("config") {
        2
    } else if msg.contains("database") || msg.contains("sqlite") {
        4
    } else if msg.contains("artefact") || msg.contains("bad magic") || msg.contains("truncated") {
        5
    } else if msg.contains("mcp") {
        8
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::run(cli.command)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_not_built() {
        let err = anyhow::anyhow!("Index is not built in /mods/foo. Run `defgraph build` first.");
        assert_eq!(classify_exit_code(&err), 3);
    }

    #[test]
    fn exit_code_config() {
        let err = anyhow::anyhow!("Cannot parse config: bad toml");
        assert_eq!(classify_exit_code(&err), 2);
    }

    #[test]
    fn exit_code_database() {
        let err = anyhow::anyhow!("SQLite error: unable to open database file");
        assert_eq!(classify_exit_code(&err), 4);
    }

    #[test]
    fn exit_code_artifact() {
        let err = anyhow::anyhow!("graph.csr.bin: bad magic (expected [67, 83, 82, 49], ...)");
        assert_eq!(classify_exit_code(&err), 5);
    }

    #[test]
    fn exit_code_mcp() {
        let err = anyhow::anyhow!("MCP server error: broken pipe");
        assert_eq!(classify_exit_code(&err), 8);
    }

    #[test]
    fn exit_code_general() {
        let err = anyhow::anyhow!("Something unexpected happened");
        assert_eq!(classify_exit_code(&err), 1);
    }
}
