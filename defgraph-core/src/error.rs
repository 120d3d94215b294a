/// Top-level defgraph error type.
#[derive(thiserror::Error, Debug)]
pub enum DefGraphError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Extraction error: {0}")]
    Extract(#[from] defgraph_extract::ExtractError),

    #[error("Graph artefact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Chunk not found: {0}")]
    ChunkNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors reading or writing the on-disk graph artefacts. All of these are
/// fatal for the load that hits them.
#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    #[error("{path}: bad magic (expected {expected:?}, found {found:?})")]
    BadMagic {
        path: String,
        expected: [u8; 4],
        found: [u8; 4],
    },

    #[error("{path}: unsupported version {found} (expected {expected})")]
    VersionMismatch { path: String, expected: i32, found: i32 },

    #[error("{path}: truncated or oversized artefact: {message}")]
    Truncated { path: String, message: String },

    #[error("{path}: kinds length {kinds_len} does not match edge count {edge_count}")]
    LengthMismatch {
        path: String,
        kinds_len: i32,
        edge_count: i32,
    },

    #[error("{path}: malformed line {line}: {message}")]
    Malformed {
        path: String,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(thiserror::Error, Debug)]
pub enum EmbedError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DefGraphError>;
