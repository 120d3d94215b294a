use tree_sitter::Node;

use crate::{ExtractError, Result};

/// Build a parser configured for C#.
pub(crate) fn csharp_parser() -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
        .map_err(|e| ExtractError::TreeSitter(e.to_string()))?;
    Ok(parser)
}

/// Parse C# source, surfacing a parser failure as an error for `origin`.
pub(crate) fn parse_csharp(source: &str, origin: &str) -> Result<tree_sitter::Tree> {
    let mut parser = csharp_parser()?;
    parser.parse(source, None).ok_or_else(|| ExtractError::Parse {
        path: origin.to_string(),
        message: "tree-sitter returned no tree".to_string(),
    })
}

/// Extract the source text for a tree-sitter node.
pub(crate) fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Find a child by field name.
pub(crate) fn child_by_field<'a>(node: Node<'a>, field: &str) -> Option<Node<'a>> {
    node.child_by_field_name(field)
}

/// Find the first child with a specific kind.
pub(crate) fn find_child_by_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|child| child.kind() == kind)
}

/// Node kinds that declare a C# type.
pub(crate) const TYPE_DECL_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "struct_declaration",
    "enum_declaration",
    "record_declaration",
];

/// Whether a node kind is a type declaration.
pub(crate) fn is_type_decl(kind: &str) -> bool {
    TYPE_DECL_KINDS.contains(&kind)
}

/// Whether a declaration node carries the `public` modifier.
pub(crate) fn is_public(node: Node<'_>, source: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|c| c.kind() == "modifier" && node_text(c, source) == "public")
}

/// Generic arity of a type declaration (0 when not generic).
pub(crate) fn generic_arity(node: Node<'_>) -> usize {
    child_by_field(node, "type_parameters").map_or(0, |tp| {
        let mut cursor = tp.walk();
        tp.children(&mut cursor)
            .filter(|c| c.kind() == "type_parameter")
            .count()
    })
}

/// Short name for a type declaration, with the `` `N `` arity suffix when generic.
pub(crate) fn type_decl_name(node: Node<'_>, source: &str) -> Option<String> {
    let name = node_text(child_by_field(node, "name")?, source);
    let arity = generic_arity(node);
    Some(if arity > 0 {
        format!("{name}`{arity}")
    } else {
        name.to_string()
    })
}

/// Normalised text of a type reference node (whitespace collapsed).
pub(crate) fn type_text(node: Node<'_>, source: &str) -> String {
    node_text(node, source).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parameter-type signature of a method: `ParamType, ParamType`.
pub(crate) fn param_signature(params: Node<'_>, source: &str) -> String {
    let mut cursor = params.walk();
    params
        .children(&mut cursor)
        .filter(|c| c.kind() == "parameter")
        .filter_map(|p| child_by_field(p, "type").map(|t| type_text(t, source)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The simple (rightmost, arity-stripped) name of a type reference:
/// `RimWorld.CompProperties` → `CompProperties`, `List<Thing>` → `List`.
pub(crate) fn simple_type_name(text: &str) -> &str {
    let base = text.split('<').next().unwrap_or(text);
    let base = base.trim_end_matches(['?', '[', ']']);
    let base = base.rsplit('.').next().unwrap_or(base);
    base.split('`').next().unwrap_or(base).trim()
}
