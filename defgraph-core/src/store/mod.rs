pub mod schema;
pub mod sqlite;

use defgraph_extract::ChunkRecord;

/// The chunk store abstraction — the lexical side of the index. The graph
/// artefacts hold topology; the store holds the source text behind each
/// symbol ID, plus optional embedding vectors.
#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    /// Replace-or-insert a batch of chunks within one transaction.
    async fn upsert_chunks_batch(&self, chunks: &[ChunkRecord]) -> crate::error::Result<()>;

    /// Get a chunk by its canonical symbol ID.
    async fn get_chunk(&self, id: &str) -> crate::error::Result<Option<ChunkRecord>>;

    /// Case-insensitive substring search over symbol IDs and short names.
    async fn search_chunks(
        &self,
        needle: &str,
        limit: usize,
    ) -> crate::error::Result<Vec<ChunkRecord>>;

    /// All chunks, in insertion order.
    async fn all_chunks(&self) -> crate::error::Result<Vec<ChunkRecord>>;

    async fn count_chunks(&self) -> crate::error::Result<u64>;

    /// Remove every chunk (a build starts from a clean slate).
    async fn clear_chunks(&self) -> crate::error::Result<()>;

    /// Store an embedding vector for a chunk.
    async fn store_embedding(&self, chunk_id: &str, vector: &[f32]) -> crate::error::Result<()>;

    /// All stored embeddings as `(chunk_id, vector)` pairs.
    async fn all_embeddings(&self) -> crate::error::Result<Vec<(String, Vec<f32>)>>;

    /// Read a build-metadata value.
    async fn get_meta(&self, key: &str) -> crate::error::Result<Option<String>>;

    /// Write a build-metadata value.
    async fn set_meta(&self, key: &str, value: &str) -> crate::error::Result<()>;
}
