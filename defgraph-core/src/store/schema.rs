/// Current schema version, stored in `defgraph_meta`.
pub const SCHEMA_VERSION: &str = "1";

/// Chunk-store schema. `rowid` preserves insertion order for `all_chunks`.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id          TEXT PRIMARY KEY,
    language    TEXT NOT NULL,
    symbol_name TEXT NOT NULL,
    def_type    TEXT,
    path        TEXT NOT NULL,
    span_start  INTEGER NOT NULL,
    span_end    INTEGER NOT NULL,
    text        TEXT NOT NULL,
    indexed_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_symbol_name ON chunks (symbol_name);

CREATE TABLE IF NOT EXISTS embeddings (
    chunk_id TEXT PRIMARY KEY REFERENCES chunks (id) ON DELETE CASCADE,
    vector   BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS defgraph_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";
