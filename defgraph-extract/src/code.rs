//! Phase 1: code → code edges.
//!
//! Each code chunk is parsed in isolation and its whole tree walked (chunk
//! spans are chunk-relative, so the walk always covers the full chunk). Two
//! resolution modes share the walker and differ only in how a textual
//! reference becomes target symbol IDs:
//!
//! * `Semantic` — single best declaration from the project-wide
//!   [`SymbolTable`], same-namespace candidates preferred. Unresolved names
//!   are external symbols and produce no edge.
//! * `Syntactic` — the fallback ladder: exact short-name match emits one
//!   edge per match; dotted references fall back to an ID-suffix match;
//!   anything else is dropped. Resolutions are cached per worker.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::helpers::{child_by_field, is_type_decl, node_text, parse_csharp, simple_type_name, type_text};
use crate::symbols::{DeclKind, SymbolTable};
use crate::{ChunkLanguage, ChunkRecord, EdgeKind, SymbolEdge};

/// How phase 1 resolves textual references to declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeResolution {
    #[default]
    Semantic,
    Syntactic,
}

/// Extract code → code edges from every code chunk, in parallel.
pub fn extract_code_edges(
    chunks: &[ChunkRecord],
    table: &SymbolTable,
    mode: CodeResolution,
) -> Vec<SymbolEdge> {
    chunks
        .par_iter()
        .filter(|c| c.language == ChunkLanguage::Code)
        .flat_map_iter(|chunk| extract_chunk_code_edges(chunk, table, mode))
        .collect()
}

/// Extract edges from a single code chunk. Parse failures are logged and
/// yield no edges.
pub fn extract_chunk_code_edges(
    chunk: &ChunkRecord,
    table: &SymbolTable,
    mode: CodeResolution,
) -> Vec<SymbolEdge> {
    let tree = match parse_csharp(&chunk.text, &chunk.id) {
        Ok(tree) => tree,
        Err(e) => {
            warn!(chunk = %chunk.id, error = %e, "Skipping unparseable code chunk");
            return Vec::new();
        }
    };

    let mut walker = CodeWalker {
        source_id: &chunk.id,
        namespace: chunk_namespace(chunk),
        table,
        mode,
        cache: HashMap::new(),
        consumed: HashSet::new(),
        edges: Vec::new(),
    };
    walker.walk(tree.root_node(), &chunk.text);
    walker.edges
}

/// Namespace context of a chunk, for same-namespace candidate preference.
fn chunk_namespace(chunk: &ChunkRecord) -> String {
    let head = chunk.id.split('(').next().unwrap_or(&chunk.id);
    let mut parts: Vec<&str> = head.split('.').collect();
    parts.pop();
    if chunk.id.ends_with(')') {
        parts.pop();
    }
    parts.join(".")
}

struct CodeWalker<'a> {
    source_id: &'a str,
    namespace: String,
    table: &'a SymbolTable,
    mode: CodeResolution,
    /// Syntactic-mode resolution cache: reference text → target IDs.
    cache: HashMap<String, Vec<String>>,
    /// Node IDs already claimed by a more specific construct.
    consumed: HashSet<usize>,
    edges: Vec<SymbolEdge>,
}

impl CodeWalker<'_> {
    fn walk(&mut self, node: tree_sitter::Node<'_>, source: &str) {
        if self.consumed.contains(&node.id()) {
            return;
        }

        match node.kind() {
            "using_directive" => return,
            kind if is_type_decl(kind) => {
                self.consume_name(node);
                self.base_edges(node, source);
            }
            "method_declaration"
            | "constructor_declaration"
            | "local_function_statement"
            | "property_declaration"
            | "variable_declarator"
            | "parameter"
            | "type_parameter"
            | "enum_member_declaration" => {
                self.consume_name(node);
            }
            "invocation_expression" => {
                self.invocation(node, source);
            }
            "member_access_expression" => {
                // The name may already be claimed as an invocation callee.
                if let Some(name) = child_by_field(node, "name") {
                    if self.consumed.insert(name.id()) {
                        self.reference(node_text(name, source), EdgeKind::References, None);
                    }
                }
            }
            "object_creation_expression" => {
                if let Some(ty) = child_by_field(node, "type") {
                    self.consume_subtree(ty);
                    self.reference(&type_text(ty, source), EdgeKind::References, None);
                }
            }
            "qualified_name" => {
                self.consume_subtree(node);
                self.reference(&type_text(node, source), EdgeKind::References, None);
                return;
            }
            "generic_name" => {
                self.consume_subtree(node);
                self.reference(&type_text(node, source), EdgeKind::References, None);
                return;
            }
            "identifier" => {
                self.reference(node_text(node, source), EdgeKind::References, None);
                return;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source);
        }
    }

    /// Base-list entries become Inherits/Implements; nothing else in the
    /// base list is walked as a plain reference.
    fn base_edges(&mut self, node: tree_sitter::Node<'_>, source: &str) {
        let Some(bases) = child_by_field(node, "bases") else {
            return;
        };
        self.consume_subtree(bases);
        let mut cursor = bases.walk();
        for child in bases.children(&mut cursor) {
            match child.kind() {
                "identifier" | "qualified_name" | "generic_name" => {
                    self.base_edge(&type_text(child, source));
                }
                _ => {}
            }
        }
    }

    fn base_edge(&mut self, reference: &str) {
        for target in self.resolve(reference, None) {
            let kind = match self.table.get(&target).map(|d| d.kind) {
                Some(DeclKind::Interface) => EdgeKind::Implements,
                _ => EdgeKind::Inherits,
            };
            self.push(target, kind);
        }
    }

    /// The callee of an invocation becomes a Calls edge; the object part of
    /// a `receiver.Method()` access is left to the general walk so it can
    /// still produce References.
    fn invocation(&mut self, node: tree_sitter::Node<'_>, source: &str) {
        let Some(func) = child_by_field(node, "function") else {
            return;
        };
        match func.kind() {
            "member_access_expression" => {
                if let Some(name) = child_by_field(func, "name") {
                    self.consumed.insert(name.id());
                    self.reference(
                        node_text(name, source),
                        EdgeKind::Calls,
                        Some(DeclKind::Method),
                    );
                }
            }
            "identifier" => {
                self.consumed.insert(func.id());
                self.reference(
                    node_text(func, source),
                    EdgeKind::Calls,
                    Some(DeclKind::Method),
                );
            }
            "generic_name" => {
                self.consume_subtree(func);
                self.reference(
                    &type_text(func, source),
                    EdgeKind::Calls,
                    Some(DeclKind::Method),
                );
            }
            _ => {}
        }
    }

    /// Resolve a reference and emit one edge per target.
    fn reference(&mut self, reference: &str, kind: EdgeKind, decl_pref: Option<DeclKind>) {
        for target in self.resolve(reference, decl_pref) {
            self.push(target, kind);
        }
    }

    /// Targets for a reference under the active mode.
    fn resolve(&mut self, reference: &str, decl_pref: Option<DeclKind>) -> Vec<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Vec::new();
        }
        match self.mode {
            CodeResolution::Semantic => self
                .table
                .resolve(reference, &self.namespace, decl_pref)
                .map(|d| vec![d.id.clone()])
                .unwrap_or_default(),
            CodeResolution::Syntactic => {
                if let Some(hit) = self.cache.get(reference) {
                    return hit.clone();
                }
                let mut targets: Vec<String> = self
                    .table
                    .candidates(simple_type_name(reference))
                    .iter()
                    .map(|d| d.id.clone())
                    .collect();
                if targets.is_empty() && reference.contains('.') {
                    let suffix = format!(".{reference}");
                    targets = self
                        .table
                        .decls()
                        .iter()
                        .filter(|d| d.id.ends_with(&suffix))
                        .map(|d| d.id.clone())
                        .collect();
                }
                self.cache.insert(reference.to_string(), targets.clone());
                targets
            }
        }
    }

    fn push(&mut self, target: String, kind: EdgeKind) {
        if target == self.source_id {
            return; // no self-loops
        }
        self.edges.push(SymbolEdge {
            source: self.source_id.to_string(),
            target,
            kind,
        });
    }

    fn consume_name(&mut self, node: tree_sitter::Node<'_>) {
        if let Some(name) = child_by_field(node, "name") {
            self.consumed.insert(name.id());
        }
    }

    fn consume_subtree(&mut self, node: tree_sitter::Node<'_>) {
        self.consumed.insert(node.id());
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.consume_subtree(child);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
