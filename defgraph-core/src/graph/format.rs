//! On-disk artefact formats: the `CSR1`/`CSC1` binary sparse matrices and
//! the two TSV tables. Layouts are byte-exact contracts:
//!
//! ```text
//! bytes  0..3   : ASCII magic ("CSR1" or "CSC1")
//! bytes  4..7   : i32 version = 1
//! bytes  8..11  : i32 node_count
//! bytes 12..15  : i32 edge_count
//! next (node_count+1) i32 : pointers
//! next edge_count i32     : indices
//! next 1 i32              : kinds_length (== edge_count)
//! next edge_count u8      : kind bytes
//! ```
//!
//! All integers little-endian. Writers emit to a sibling temp path and
//! rename, so a failed build never leaves a partial artefact under the
//! final name.

// Packed i32 on disk ↔ u32 in memory; counts are range-checked before casts.
#![allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::ArtifactError;

pub const CSR_MAGIC: [u8; 4] = *b"CSR1";
pub const CSC_MAGIC: [u8; 4] = *b"CSC1";
pub const FORMAT_VERSION: i32 = 1;

/// A compressed sparse matrix: CSR when pointers index sources, CSC when
/// they index targets. Same shape either way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMatrix {
    /// `pointers[i]..pointers[i+1]` is node `i`'s slice of `indices`/`kinds`.
    pub pointers: Vec<u32>,
    pub indices: Vec<u32>,
    pub kinds: Vec<u8>,
}

impl SparseMatrix {
    pub fn node_count(&self) -> usize {
        self.pointers.len().saturating_sub(1)
    }

    pub fn edge_count(&self) -> usize {
        self.indices.len()
    }

    /// Degree of a node (row/column population).
    pub fn degree(&self, node: usize) -> usize {
        (self.pointers[node + 1] - self.pointers[node]) as usize
    }

    /// Neighbours of a node as `(other_index, kind_byte)` pairs.
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, u8)> + '_ {
        let start = self.pointers[node] as usize;
        let end = self.pointers[node + 1] as usize;
        self.indices[start..end]
            .iter()
            .zip(&self.kinds[start..end])
            .map(|(&index, &kind)| (index as usize, kind))
    }

    /// Serialise to the binary layout with the given magic.
    pub fn write(&self, path: &Path, magic: [u8; 4]) -> Result<(), ArtifactError> {
        let node_count = to_i32(self.node_count(), path, "node count")?;
        let edge_count = to_i32(self.edge_count(), path, "edge count")?;

        let mut buf = Vec::with_capacity(16 + self.pointers.len() * 4 + self.indices.len() * 5 + 4);
        buf.extend_from_slice(&magic);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&node_count.to_le_bytes());
        buf.extend_from_slice(&edge_count.to_le_bytes());
        for pointer in &self.pointers {
            buf.extend_from_slice(&(*pointer as i32).to_le_bytes());
        }
        for index in &self.indices {
            buf.extend_from_slice(&(*index as i32).to_le_bytes());
        }
        buf.extend_from_slice(&edge_count.to_le_bytes());
        buf.extend_from_slice(&self.kinds);

        write_atomic(path, &buf)
    }

    /// Deserialise, validating magic, version, and every length field.
    pub fn read(path: &Path, magic: [u8; 4]) -> Result<Self, ArtifactError> {
        let display = path.display().to_string();
        let bytes = fs::read(path)?;

        if bytes.len() < 16 {
            return Err(ArtifactError::Truncated {
                path: display,
                message: format!("header needs 16 bytes, file has {}", bytes.len()),
            });
        }

        let found_magic: [u8; 4] = bytes[0..4].try_into().unwrap_or_default();
        if found_magic != magic {
            return Err(ArtifactError::BadMagic {
                path: display,
                expected: magic,
                found: found_magic,
            });
        }

        let version = read_i32(&bytes, 4);
        if version != FORMAT_VERSION {
            return Err(ArtifactError::VersionMismatch {
                path: display,
                expected: FORMAT_VERSION,
                found: version,
            });
        }

        let node_count = read_i32(&bytes, 8);
        let edge_count = read_i32(&bytes, 12);
        if node_count < 0 || edge_count < 0 {
            return Err(ArtifactError::Truncated {
                path: display,
                message: format!("negative counts ({node_count}, {edge_count})"),
            });
        }
        #[allow(clippy::cast_sign_loss)]
        let (n, m) = (node_count as usize, edge_count as usize);

        let expected_len = 16 + (n + 1) * 4 + m * 4 + 4 + m;
        if bytes.len() != expected_len {
            return Err(ArtifactError::Truncated {
                path: display,
                message: format!("expected {expected_len} bytes, found {}", bytes.len()),
            });
        }

        let mut offset = 16;
        let mut pointers = Vec::with_capacity(n + 1);
        for _ in 0..=n {
            pointers.push(read_u32(&bytes, offset, &display)?);
            offset += 4;
        }
        let mut indices = Vec::with_capacity(m);
        for _ in 0..m {
            indices.push(read_u32(&bytes, offset, &display)?);
            offset += 4;
        }

        let kinds_len = read_i32(&bytes, offset);
        if kinds_len != edge_count {
            return Err(ArtifactError::LengthMismatch {
                path: display,
                kinds_len,
                edge_count,
            });
        }
        offset += 4;
        let kinds = bytes[offset..offset + m].to_vec();

        let matrix = Self {
            pointers,
            indices,
            kinds,
        };
        matrix.validate(&display)?;
        Ok(matrix)
    }

    fn validate(&self, path: &str) -> Result<(), ArtifactError> {
        let m = self.edge_count() as u32;
        if self.pointers.first() != Some(&0) || self.pointers.last() != Some(&m) {
            return Err(ArtifactError::Truncated {
                path: path.to_string(),
                message: "pointer array does not span the edge list".to_string(),
            });
        }
        if self.pointers.windows(2).any(|w| w[0] > w[1]) {
            return Err(ArtifactError::Truncated {
                path: path.to_string(),
                message: "pointer array is not monotonic".to_string(),
            });
        }
        let n = self.node_count() as u32;
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= n) {
            return Err(ArtifactError::Truncated {
                path: path.to_string(),
                message: format!("index {bad} out of range for {n} nodes"),
            });
        }
        Ok(())
    }
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap_or_default())
}

fn read_u32(bytes: &[u8], offset: usize, path: &str) -> Result<u32, ArtifactError> {
    let value = read_i32(bytes, offset);
    u32::try_from(value).map_err(|_| ArtifactError::Truncated {
        path: path.to_string(),
        message: format!("negative array entry {value} at byte {offset}"),
    })
}

fn to_i32(value: usize, path: &Path, what: &str) -> Result<i32, ArtifactError> {
    i32::try_from(value).map_err(|_| ArtifactError::Truncated {
        path: path.display().to_string(),
        message: format!("{what} {value} exceeds i32"),
    })
}

/// Write bytes to a sibling temp path, then rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let tmp = temp_sibling(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(
        || std::ffi::OsString::from("artifact"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(".tmp");
    path.with_file_name(name)
}

// ── Node table ─────────────────────────────────────────────────────

/// Write `<base>.nodes.tsv`: `index<TAB>symbol_id` lines, no header.
pub fn write_nodes_tsv(path: &Path, nodes: &[String]) -> Result<(), ArtifactError> {
    let mut out = String::new();
    for (index, id) in nodes.iter().enumerate() {
        out.push_str(&format!("{index}\t{id}\n"));
    }
    write_atomic(path, out.as_bytes())
}

/// Read the node table, checking indices are dense and in order.
pub fn read_nodes_tsv(path: &Path) -> Result<Vec<String>, ArtifactError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path)?;
    let mut nodes = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let Some((index, id)) = line.split_once('\t') else {
            return Err(ArtifactError::Malformed {
                path: display,
                line: line_no + 1,
                message: "expected two tab-separated fields".to_string(),
            });
        };
        let parsed: usize = index.parse().map_err(|_| ArtifactError::Malformed {
            path: display.clone(),
            line: line_no + 1,
            message: format!("bad node index {index:?}"),
        })?;
        if parsed != nodes.len() {
            return Err(ArtifactError::Malformed {
                path: display,
                line: line_no + 1,
                message: format!("node index {parsed} out of order"),
            });
        }
        nodes.push(id.to_string());
    }
    Ok(nodes)
}

// ── PageRank table ─────────────────────────────────────────────────

/// Write `<base>.pagerank.tsv`: `symbol_id<TAB>score`, six fractional
/// digits, already sorted by the caller.
pub fn write_pagerank_tsv(path: &Path, entries: &[(String, f64)]) -> Result<(), ArtifactError> {
    let mut out = String::new();
    for (id, score) in entries {
        out.push_str(&format!("{id}\t{score:.6}\n"));
    }
    write_atomic(path, out.as_bytes())
}

/// Load the whole PageRank table into a map.
pub fn read_pagerank_tsv(path: &Path) -> Result<HashMap<String, f64>, ArtifactError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path)?;
    let mut scores = HashMap::new();

    for (line_no, line) in text.lines().enumerate() {
        let Some((id, score)) = line.split_once('\t') else {
            return Err(ArtifactError::Malformed {
                path: display,
                line: line_no + 1,
                message: "expected two tab-separated fields".to_string(),
            });
        };
        let parsed: f64 = score.parse().map_err(|_| ArtifactError::Malformed {
            path: display.clone(),
            line: line_no + 1,
            message: format!("bad score {score:?}"),
        })?;
        scores.insert(id.to_string(), parsed);
    }
    Ok(scores)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix {
        // 3 nodes: 0 → 1 (kind 1), 0 → 2 (kind 2), 2 → 1 (kind 3)
        SparseMatrix {
            pointers: vec![0, 2, 2, 3],
            indices: vec![1, 2, 1],
            kinds: vec![1, 2, 3],
        }
    }

    #[test]
    fn binary_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.csr.bin");
        let matrix = sample();
        matrix.write(&path, CSR_MAGIC).unwrap();

        let back = SparseMatrix::read(&path, CSR_MAGIC).unwrap();
        assert_eq!(back, matrix);

        // Writing again produces identical bytes.
        let first = std::fs::read(&path).unwrap();
        matrix.write(&path, CSR_MAGIC).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[test]
    fn header_layout_is_byte_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.csr.bin");
        sample().write(&path, CSR_MAGIC).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"CSR1");
        assert_eq!(i32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);
        assert_eq!(i32::from_le_bytes(bytes[8..12].try_into().unwrap()), 3);
        assert_eq!(i32::from_le_bytes(bytes[12..16].try_into().unwrap()), 3);
        // 16 header + 4 pointers + 3 indices + kinds_length + 3 kind bytes
        assert_eq!(bytes.len(), 16 + 4 * 4 + 3 * 4 + 4 + 3);
        assert_eq!(&bytes[bytes.len() - 3..], &[1, 2, 3]);
    }

    #[test]
    fn wrong_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.csc.bin");
        sample().write(&path, CSR_MAGIC).unwrap();

        let err = SparseMatrix::read(&path, CSC_MAGIC).unwrap_err();
        assert!(matches!(err, ArtifactError::BadMagic { .. }), "{err}");
    }

    #[test]
    fn tampered_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.csr.bin");
        sample().write(&path, CSR_MAGIC).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[4] = 9;
        std::fs::write(&path, &bytes).unwrap();
        let err = SparseMatrix::read(&path, CSR_MAGIC).unwrap_err();
        assert!(matches!(err, ArtifactError::VersionMismatch { found: 9, .. }), "{err}");
    }

    #[test]
    fn truncation_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.csr.bin");
        sample().write(&path, CSR_MAGIC).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();
        let err = SparseMatrix::read(&path, CSR_MAGIC).unwrap_err();
        assert!(matches!(err, ArtifactError::Truncated { .. }), "{err}");
    }

    #[test]
    fn kinds_length_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.csr.bin");
        let matrix = sample();
        matrix.write(&path, CSR_MAGIC).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        // kinds_length sits right before the kind bytes.
        let offset = bytes.len() - matrix.kinds.len() - 4;
        bytes[offset..offset + 4].copy_from_slice(&7i32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        let err = SparseMatrix::read(&path, CSR_MAGIC).unwrap_err();
        assert!(matches!(err, ArtifactError::LengthMismatch { kinds_len: 7, .. }), "{err}");
    }

    #[test]
    fn empty_matrix_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.csr.bin");
        let empty = SparseMatrix {
            pointers: vec![0],
            indices: vec![],
            kinds: vec![],
        };
        empty.write(&path, CSR_MAGIC).unwrap();
        let back = SparseMatrix::read(&path, CSR_MAGIC).unwrap();
        assert_eq!(back.node_count(), 0);
        assert_eq!(back.edge_count(), 0);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.csr.bin");
        sample().write(&path, CSR_MAGIC).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn nodes_tsv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.nodes.tsv");
        let nodes = vec!["RimWorld.Thing".to_string(), "xml:ThingDef:Steel".to_string()];
        write_nodes_tsv(&path, &nodes).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "0\tRimWorld.Thing\n1\txml:ThingDef:Steel\n");
        assert_eq!(read_nodes_tsv(&path).unwrap(), nodes);
    }

    #[test]
    fn nodes_tsv_out_of_order_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.nodes.tsv");
        std::fs::write(&path, "1\tB\n0\tA\n").unwrap();
        assert!(matches!(
            read_nodes_tsv(&path).unwrap_err(),
            ArtifactError::Malformed { line: 1, .. }
        ));
    }

    #[test]
    fn pagerank_tsv_formats_six_digits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.pagerank.tsv");
        write_pagerank_tsv(
            &path,
            &[("A".to_string(), 0.5), ("B".to_string(), 0.128973444)],
        )
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "A\t0.500000\nB\t0.128973\n");

        let map = read_pagerank_tsv(&path).unwrap();
        assert!((map["A"] - 0.5).abs() < 1e-9);
        assert!((map["B"] - 0.128973).abs() < 1e-9);
    }
}
