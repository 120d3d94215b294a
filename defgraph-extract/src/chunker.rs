//! Chunking front-end: turns C# files and XML Def files into [`ChunkRecord`]s.
//!
//! C# files yield one chunk per type declaration and one per method; XML Def
//! files yield one chunk per Def element. A file that fails to parse is
//! logged and skipped, so one broken mod file never sinks the build.

use std::path::Path;

use tracing::warn;

use crate::helpers::{
    child_by_field, is_type_decl, node_text, param_signature, parse_csharp, type_decl_name,
};
use crate::{ChunkLanguage, ChunkRecord, ExtractError, Result, xml_typed_id};

/// Chunk a single C# source file.
pub fn chunk_csharp_file(path: &Path, source: &str) -> Result<Vec<ChunkRecord>> {
    let tree = parse_csharp(source, &path.to_string_lossy())?;
    let mut chunks = Vec::new();
    walk_unit(tree.root_node(), source, path, "", &mut chunks);
    Ok(chunks)
}

fn walk_unit(
    node: tree_sitter::Node<'_>,
    source: &str,
    path: &Path,
    namespace: &str,
    chunks: &mut Vec<ChunkRecord>,
) {
    match node.kind() {
        "namespace_declaration" => {
            let ns = namespace_name(node, source, namespace);
            let body = child_by_field(node, "body").unwrap_or(node);
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                walk_unit(child, source, path, &ns, chunks);
            }
            return;
        }
        kind if is_type_decl(kind) => {
            chunk_type(node, source, path, namespace, chunks);
            return;
        }
        _ => {}
    }

    // A file-scoped namespace declaration rescopes every following sibling.
    let mut scope = namespace.to_string();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "file_scoped_namespace_declaration" {
            scope = namespace_name(child, source, namespace);
            continue;
        }
        walk_unit(child, source, path, &scope, chunks);
    }
}

fn chunk_type(
    node: tree_sitter::Node<'_>,
    source: &str,
    path: &Path,
    scope: &str,
    chunks: &mut Vec<ChunkRecord>,
) {
    let Some(name) = type_decl_name(node, source) else {
        return;
    };
    let id = join(scope, &name);
    let short = name.split('`').next().unwrap_or(&name).to_string();

    chunks.push(ChunkRecord {
        id: id.clone(),
        language: ChunkLanguage::Code,
        text: node_text(node, source).to_string(),
        symbol_name: short,
        def_type: None,
        span_start: node.start_byte(),
        span_end: node.end_byte(),
        path: path.to_path_buf(),
    });

    let Some(body) = child_by_field(node, "body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        match member.kind() {
            "method_declaration" | "constructor_declaration" => {
                let Some(name_node) = child_by_field(member, "name") else {
                    continue;
                };
                let method = node_text(name_node, source);
                let params = child_by_field(member, "parameters")
                    .map(|p| param_signature(p, source))
                    .unwrap_or_default();
                chunks.push(ChunkRecord {
                    id: format!("{id}.{method}({params})"),
                    language: ChunkLanguage::Code,
                    text: node_text(member, source).to_string(),
                    symbol_name: method.to_string(),
                    def_type: None,
                    span_start: member.start_byte(),
                    span_end: member.end_byte(),
                    path: path.to_path_buf(),
                });
            }
            kind if is_type_decl(kind) => {
                chunk_type(member, source, path, &id, chunks);
            }
            _ => {}
        }
    }
}

fn namespace_name(node: tree_sitter::Node<'_>, source: &str, outer: &str) -> String {
    child_by_field(node, "name")
        .map(|n| join(outer, node_text(n, source)))
        .unwrap_or_else(|| outer.to_string())
}

fn join(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

// ── XML Defs ───────────────────────────────────────────────────────

/// Chunk a single XML Def file.
///
/// A `<Defs>` root yields one chunk per child element; any other root is a
/// single Def chunk. The chunk ID is `xml:<DefType>:<defName>`, falling back
/// to the `Name` attribute for abstract parent Defs.
pub fn chunk_xml_file(path: &Path, source: &str) -> Result<Vec<ChunkRecord>> {
    let doc = roxmltree::Document::parse(source).map_err(|e| ExtractError::Xml {
        path: path.to_string_lossy().to_string(),
        message: e.to_string(),
    })?;

    let root = doc.root_element();
    let mut chunks = Vec::new();

    if root.tag_name().name() == "Defs" {
        for child in root.children().filter(roxmltree::Node::is_element) {
            if let Some(chunk) = chunk_def(child, source, path) {
                chunks.push(chunk);
            }
        }
    } else if let Some(chunk) = chunk_def(root, source, path) {
        chunks.push(chunk);
    }

    Ok(chunks)
}

fn chunk_def(node: roxmltree::Node<'_, '_>, source: &str, path: &Path) -> Option<ChunkRecord> {
    let def_type = node.tag_name().name().to_string();
    let def_name = node
        .children()
        .find(|c| c.is_element() && c.tag_name().name() == "defName")
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .or_else(|| node.attribute("Name").map(ToString::to_string));

    let Some(def_name) = def_name else {
        warn!(path = %path.display(), def_type, "Def without defName or Name attribute, skipping");
        return None;
    };

    let range = node.range();
    Some(ChunkRecord {
        id: xml_typed_id(&def_type, &def_name),
        language: ChunkLanguage::Xml,
        text: source[range.clone()].to_string(),
        symbol_name: def_name,
        def_type: Some(def_type),
        span_start: range.start,
        span_end: range.end,
        path: path.to_path_buf(),
    })
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn chunks_class_and_methods() {
        let source = "namespace RimWorld {\n    public class CompExplosive : ThingComp {\n        public void Detonate(Map map) {}\n        public void Reset() {}\n    }\n}\n";
        let chunks = chunk_csharp_file(&PathBuf::from("CompExplosive.cs"), source).unwrap();

        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"RimWorld.CompExplosive"));
        assert!(ids.contains(&"RimWorld.CompExplosive.Detonate(Map)"));
        assert!(ids.contains(&"RimWorld.CompExplosive.Reset()"));

        let class = chunks.iter().find(|c| c.id == "RimWorld.CompExplosive").unwrap();
        assert_eq!(class.symbol_name, "CompExplosive");
        assert!(class.text.contains("Detonate"));
        assert_eq!(class.language, ChunkLanguage::Code);
    }

    #[test]
    fn file_scoped_namespace() {
        let source = "namespace Verse;\n\npublic class Pawn : Thing {\n    public void Tick() {}\n}\n";
        let chunks = chunk_csharp_file(&PathBuf::from("Pawn.cs"), source).unwrap();
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"Verse.Pawn"), "got {ids:?}");
        assert!(ids.contains(&"Verse.Pawn.Tick()"), "got {ids:?}");
    }

    #[test]
    fn nested_namespace_and_type() {
        let source = "namespace RimWorld.Planet {\n    public class Caravan {\n        public class Snapshot {}\n    }\n}\n";
        let chunks = chunk_csharp_file(&PathBuf::from("Caravan.cs"), source).unwrap();
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"RimWorld.Planet.Caravan"), "got {ids:?}");
        assert!(ids.contains(&"RimWorld.Planet.Caravan.Snapshot"), "got {ids:?}");
    }

    #[test]
    fn chunks_defs_file() {
        let source = "<Defs>\n  <ThingDef>\n    <defName>Steel</defName>\n    <label>steel</label>\n  </ThingDef>\n  <RecipeDef>\n    <defName>SmeltSteel</defName>\n  </RecipeDef>\n</Defs>\n";
        let chunks = chunk_xml_file(&PathBuf::from("Things.xml"), source).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "xml:ThingDef:Steel");
        assert_eq!(chunks[0].symbol_name, "Steel");
        assert_eq!(chunks[0].def_type.as_deref(), Some("ThingDef"));
        assert!(chunks[0].text.contains("<defName>Steel</defName>"));
        assert_eq!(chunks[1].id, "xml:RecipeDef:SmeltSteel");
    }

    #[test]
    fn abstract_parent_uses_name_attribute() {
        let source = "<Defs>\n  <ThingDef Name=\"BuildingBase\" Abstract=\"True\">\n    <category>Building</category>\n  </ThingDef>\n</Defs>\n";
        let chunks = chunk_xml_file(&PathBuf::from("Base.xml"), source).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "xml:ThingDef:BuildingBase");
    }

    #[test]
    fn nameless_def_is_skipped() {
        let source = "<Defs>\n  <ThingDef>\n    <label>mystery</label>\n  </ThingDef>\n</Defs>\n";
        let chunks = chunk_xml_file(&PathBuf::from("Broken.xml"), source).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = chunk_xml_file(&PathBuf::from("Bad.xml"), "<Defs><ThingDef></Defs>");
        assert!(err.is_err());
    }
}
