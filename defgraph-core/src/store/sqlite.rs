use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use defgraph_extract::{ChunkLanguage, ChunkRecord};

use super::{ChunkStore, schema};
use crate::error::StoreError;

/// SQLite-backed implementation of [`ChunkStore`].
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> crate::error::Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(StoreError::Sqlite)?;

        // Try WAL mode — silently ignored for in-memory
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");

        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(StoreError::Sqlite)?;

        conn.execute(
            "INSERT OR IGNORE INTO defgraph_meta (key, value) VALUES ('schema_version', ?1)",
            params![schema::SCHEMA_VERSION],
        )
        .map_err(StoreError::Sqlite)?;

        Ok(())
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
        let language: String = row.get("language")?;
        let path: String = row.get("path")?;
        let span_start: i64 = row.get("span_start")?;
        let span_end: i64 = row.get("span_end")?;

        #[allow(clippy::cast_sign_loss)]
        Ok(ChunkRecord {
            id: row.get("id")?,
            language: if language == "xml" {
                ChunkLanguage::Xml
            } else {
                ChunkLanguage::Code
            },
            text: row.get("text")?,
            symbol_name: row.get("symbol_name")?,
            def_type: row.get("def_type")?,
            span_start: span_start as usize,
            span_end: span_end as usize,
            path: PathBuf::from(path),
        })
    }
}

#[async_trait::async_trait]
impl ChunkStore for SqliteStore {
    async fn upsert_chunks_batch(&self, chunks: &[ChunkRecord]) -> crate::error::Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO chunks
                     (id, language, symbol_name, def_type, path, span_start, span_end, text, indexed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT (id) DO UPDATE SET
                         language = excluded.language,
                         symbol_name = excluded.symbol_name,
                         def_type = excluded.def_type,
                         path = excluded.path,
                         span_start = excluded.span_start,
                         span_end = excluded.span_end,
                         text = excluded.text,
                         indexed_at = excluded.indexed_at",
                )
                .map_err(StoreError::Sqlite)?;
            for chunk in chunks {
                #[allow(clippy::cast_possible_wrap)]
                stmt.execute(params![
                    chunk.id,
                    chunk.language.as_str(),
                    chunk.symbol_name,
                    chunk.def_type,
                    chunk.path.to_string_lossy(),
                    chunk.span_start as i64,
                    chunk.span_end as i64,
                    chunk.text,
                    now,
                ])
                .map_err(StoreError::Sqlite)?;
            }
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn get_chunk(&self, id: &str) -> crate::error::Result<Option<ChunkRecord>> {
        let conn = self.conn.lock().unwrap();
        let chunk = conn
            .query_row(
                "SELECT * FROM chunks WHERE id = ?1",
                params![id],
                Self::row_to_chunk,
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        Ok(chunk)
    }

    async fn search_chunks(
        &self,
        needle: &str,
        limit: usize,
    ) -> crate::error::Result<Vec<ChunkRecord>> {
        let conn = self.conn.lock().unwrap();
        // Escape LIKE wildcards so user input stays a plain substring.
        let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM chunks
                 WHERE id LIKE ?1 ESCAPE '\\' OR symbol_name LIKE ?1 ESCAPE '\\'
                 ORDER BY length(id) ASC, id ASC
                 LIMIT ?2",
            )
            .map_err(StoreError::Sqlite)?;
        #[allow(clippy::cast_possible_wrap)]
        let rows = stmt
            .query_map(params![pattern, limit as i64], Self::row_to_chunk)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    async fn all_chunks(&self) -> crate::error::Result<Vec<ChunkRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM chunks ORDER BY rowid")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([], Self::row_to_chunk)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    async fn count_chunks(&self) -> crate::error::Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(StoreError::Sqlite)?;
        #[allow(clippy::cast_sign_loss)]
        Ok(count as u64)
    }

    async fn clear_chunks(&self) -> crate::error::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM chunks", [])
            .map_err(StoreError::Sqlite)?;
        conn.execute("DELETE FROM embeddings", [])
            .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn store_embedding(&self, chunk_id: &str, vector: &[f32]) -> crate::error::Result<()> {
        let mut bytes = Vec::with_capacity(vector.len() * 4);
        for value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO embeddings (chunk_id, vector) VALUES (?1, ?2)
             ON CONFLICT (chunk_id) DO UPDATE SET vector = excluded.vector",
            params![chunk_id, bytes],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn all_embeddings(&self) -> crate::error::Result<Vec<(String, Vec<f32>)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached("SELECT chunk_id, vector FROM embeddings ORDER BY chunk_id")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                let vector = bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                Ok((id, vector))
            })
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(rows)
    }

    async fn get_meta(&self, key: &str) -> crate::error::Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM defgraph_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        Ok(value)
    }

    async fn set_meta(&self, key: &str, value: &str) -> crate::error::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO defgraph_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────
