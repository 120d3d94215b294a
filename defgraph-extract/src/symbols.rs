//! Project-wide symbol table built from code chunks.
//!
//! One pass over the corpus parses every type chunk and records all
//! declarations with their canonical IDs. The table is the resolution
//! substrate for both extraction modes: semantic mode asks it for a single
//! best declaration; the syntactic fallback asks it for every short-name
//! match. It is read-only after construction and shared across workers.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::helpers::{
    child_by_field, is_public, is_type_decl, node_text, param_signature, parse_csharp,
    simple_type_name, type_decl_name, type_text,
};
use crate::{ChunkLanguage, ChunkRecord};

/// What kind of declaration a symbol-table entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Class,
    Interface,
    Struct,
    Enum,
    Method,
    Property,
    Field,
}

impl DeclKind {
    /// Whether this declaration introduces a type.
    pub fn is_type(self) -> bool {
        matches!(self, Self::Class | Self::Interface | Self::Struct | Self::Enum)
    }
}

/// A public field of a type, kept for linkable-field discovery.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    /// Declared type as written (`Type`, `List<VerbProperties>`, …).
    pub type_name: String,
}

/// One declaration in the corpus.
#[derive(Debug, Clone)]
pub struct SymbolDecl {
    /// Canonical symbol ID.
    pub id: String,
    /// Unqualified name (arity-stripped for generics).
    pub short_name: String,
    /// Enclosing namespace (or namespace + outer types for members).
    pub namespace: String,
    pub kind: DeclKind,
    /// Base-list entries as written, for types.
    pub bases: Vec<String>,
    /// Public fields, for types.
    pub fields: Vec<FieldDecl>,
}

/// The symbol table: all declarations with `id` and short-name indices.
#[derive(Debug, Default)]
pub struct SymbolTable {
    decls: Vec<SymbolDecl>,
    by_id: HashMap<String, usize>,
    by_short: HashMap<String, Vec<usize>>,
}

impl SymbolTable {
    /// Build the table from every code chunk in the corpus.
    ///
    /// Type chunks are parsed in full (members declared inside them are
    /// registered too); method chunks only backstop their own ID, since the
    /// enclosing type chunk already covers them. Chunks that fail to parse
    /// are logged and skipped.
    pub fn build(chunks: &[ChunkRecord]) -> Self {
        let mut table = Self::default();

        for chunk in chunks {
            if chunk.language != ChunkLanguage::Code {
                continue;
            }
            if chunk.id.ends_with(')') {
                table.register_method_chunk(chunk);
                continue;
            }
            if let Err(e) = table.register_type_chunk(chunk) {
                warn!(chunk = %chunk.id, error = %e, "Skipping unparseable code chunk");
            }
        }

        table
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Exact lookup by canonical ID.
    pub fn get(&self, id: &str) -> Option<&SymbolDecl> {
        self.by_id.get(id).map(|&i| &self.decls[i])
    }

    /// Every declaration sharing a short name, in registration order.
    pub fn candidates(&self, short_name: &str) -> Vec<&SymbolDecl> {
        self.by_short
            .get(short_name)
            .map(|ids| ids.iter().map(|&i| &self.decls[i]).collect())
            .unwrap_or_default()
    }

    /// All declarations, in registration order.
    pub fn decls(&self) -> &[SymbolDecl] {
        &self.decls
    }

    /// Resolve a reference to a single best declaration (semantic mode).
    ///
    /// Dotted references try an exact ID, then a `.suffix` match. Bare names
    /// go through the short-name index. Same-namespace candidates win; ties
    /// break on the lexicographically first ID. `kind_filter` narrows the
    /// candidate set (e.g. methods for an invocation) but falls back to the
    /// unfiltered set when nothing of that kind matches.
    pub fn resolve(
        &self,
        reference: &str,
        namespace: &str,
        kind_filter: Option<DeclKind>,
    ) -> Option<&SymbolDecl> {
        if reference.contains('.') {
            if let Some(decl) = self.get(reference) {
                return Some(decl);
            }
            let suffix = format!(".{reference}");
            let mut matches: Vec<&SymbolDecl> = self
                .decls
                .iter()
                .filter(|d| d.id.ends_with(&suffix))
                .collect();
            matches.sort_by(|a, b| a.id.cmp(&b.id));
            return matches.first().copied();
        }

        let candidates = self.candidates(simple_type_name(reference));
        if candidates.is_empty() {
            return None;
        }

        let filtered: Vec<&SymbolDecl> = match kind_filter {
            Some(kind) => {
                let of_kind: Vec<&SymbolDecl> =
                    candidates.iter().copied().filter(|d| d.kind == kind).collect();
                if of_kind.is_empty() { candidates } else { of_kind }
            }
            None => candidates,
        };

        let mut best: Vec<&SymbolDecl> = filtered
            .iter()
            .copied()
            .filter(|d| d.namespace == namespace)
            .collect();
        if best.is_empty() {
            best = filtered;
        }
        best.sort_by(|a, b| a.id.cmp(&b.id));
        best.first().copied()
    }

    /// Whether `type_id` transitively inherits (by short base name) from any
    /// name in `roots`. Follows bases through the table; unresolved bases are
    /// matched by name only.
    pub fn inherits_any(&self, type_id: &str, roots: &HashSet<String>) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![type_id.to_string()];

        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(decl) = self.get(&id) else { continue };
            for base in &decl.bases {
                let short = simple_type_name(base);
                if roots.contains(short) {
                    return true;
                }
                if let Some(parent) = self.resolve(short, &decl.namespace, None) {
                    if parent.kind.is_type() {
                        stack.push(parent.id.clone());
                    }
                }
            }
        }
        false
    }

    // ── Registration ───────────────────────────────────────────────

    fn register(&mut self, decl: SymbolDecl) {
        if self.by_id.contains_key(&decl.id) {
            return;
        }
        let index = self.decls.len();
        self.by_id.insert(decl.id.clone(), index);
        self.by_short
            .entry(decl.short_name.clone())
            .or_default()
            .push(index);
        self.decls.push(decl);
    }

    fn register_method_chunk(&mut self, chunk: &ChunkRecord) {
        let head = chunk.id.split('(').next().unwrap_or(&chunk.id);
        let namespace = head.rsplit_once('.').map_or(String::new(), |(ns, _)| ns.to_string());
        self.register(SymbolDecl {
            id: chunk.id.clone(),
            short_name: chunk.symbol_name.clone(),
            namespace,
            kind: DeclKind::Method,
            bases: Vec::new(),
            fields: Vec::new(),
        });
    }

    fn register_type_chunk(&mut self, chunk: &ChunkRecord) -> crate::Result<()> {
        let tree = parse_csharp(&chunk.text, &chunk.id)?;
        let namespace = enclosing_scope(&chunk.id, &chunk.symbol_name);
        self.walk_decls(tree.root_node(), &chunk.text, &namespace);
        Ok(())
    }

    fn walk_decls(&mut self, node: tree_sitter::Node<'_>, source: &str, scope: &str) {
        if is_type_decl(node.kind()) {
            if let Some(name) = type_decl_name(node, source) {
                let id = join_scope(scope, &name);
                let decl = SymbolDecl {
                    id: id.clone(),
                    short_name: simple_type_name(&name).to_string(),
                    namespace: scope.to_string(),
                    kind: decl_kind_of(node.kind()),
                    bases: base_list(node, source),
                    fields: Vec::new(),
                };
                self.register(decl);
                if let Some(body) = child_by_field(node, "body") {
                    self.walk_members(body, source, &id);
                }
            }
            return;
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_decls(child, source, scope);
        }
    }

    fn walk_members(&mut self, body: tree_sitter::Node<'_>, source: &str, type_id: &str) {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            match member.kind() {
                "method_declaration" | "constructor_declaration" => {
                    let Some(name_node) = child_by_field(member, "name") else {
                        continue;
                    };
                    let name = node_text(name_node, source);
                    let params = child_by_field(member, "parameters")
                        .map(|p| param_signature(p, source))
                        .unwrap_or_default();
                    self.register(SymbolDecl {
                        id: format!("{type_id}.{name}({params})"),
                        short_name: name.to_string(),
                        namespace: type_id.to_string(),
                        kind: DeclKind::Method,
                        bases: Vec::new(),
                        fields: Vec::new(),
                    });
                }
                "property_declaration" => {
                    if let Some(name_node) = child_by_field(member, "name") {
                        let name = node_text(name_node, source);
                        self.register(SymbolDecl {
                            id: format!("{type_id}.{name}"),
                            short_name: name.to_string(),
                            namespace: type_id.to_string(),
                            kind: DeclKind::Property,
                            bases: Vec::new(),
                            fields: Vec::new(),
                        });
                    }
                }
                "field_declaration" => {
                    self.register_fields(member, source, type_id);
                }
                kind if is_type_decl(kind) => {
                    self.walk_decls(member, source, type_id);
                }
                _ => {}
            }
        }
    }

    fn register_fields(&mut self, node: tree_sitter::Node<'_>, source: &str, type_id: &str) {
        let public = is_public(node, source);
        let mut cursor = node.walk();
        for decl in node.children(&mut cursor) {
            if decl.kind() != "variable_declaration" {
                continue;
            }
            let field_type = child_by_field(decl, "type")
                .map(|t| type_text(t, source))
                .unwrap_or_default();
            let mut inner = decl.walk();
            for declarator in decl.children(&mut inner) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name_node) = child_by_field(declarator, "name")
                    .or_else(|| crate::helpers::find_child_by_kind(declarator, "identifier"))
                else {
                    continue;
                };
                let name = node_text(name_node, source).to_string();
                self.register(SymbolDecl {
                    id: format!("{type_id}.{name}"),
                    short_name: name.clone(),
                    namespace: type_id.to_string(),
                    kind: DeclKind::Field,
                    bases: Vec::new(),
                    fields: Vec::new(),
                });
                if public {
                    if let Some(&type_index) = self.by_id.get(type_id) {
                        self.decls[type_index].fields.push(FieldDecl {
                            name,
                            type_name: field_type.clone(),
                        });
                    }
                }
            }
        }
    }
}

fn decl_kind_of(node_kind: &str) -> DeclKind {
    match node_kind {
        "interface_declaration" => DeclKind::Interface,
        "struct_declaration" => DeclKind::Struct,
        "enum_declaration" => DeclKind::Enum,
        _ => DeclKind::Class,
    }
}

/// Base-list entries of a type declaration, as written.
fn base_list(node: tree_sitter::Node<'_>, source: &str) -> Vec<String> {
    let Some(bases) = child_by_field(node, "bases") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = bases.walk();
    for child in bases.children(&mut cursor) {
        match child.kind() {
            "identifier" | "qualified_name" | "generic_name" => {
                out.push(type_text(child, source));
            }
            _ => {}
        }
    }
    out
}

/// `Ns.Type.Member` minus `.Member` — the scope a declaration sits in.
fn enclosing_scope(id: &str, member: &str) -> String {
    id.strip_suffix(member)
        .and_then(|s| s.strip_suffix('.'))
        .map_or_else(
            || id.rsplit_once('.').map_or(String::new(), |(ns, _)| ns.to_string()),
            ToString::to_string,
        )
}

fn join_scope(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

// ── Tests ──────────────────────────────────────────────────────────
