//! Phase 3: xml → xml edges, and phase 4: synthetic reverse edges.
//!
//! Def inheritance comes from `ParentName`; structural references come from
//! a small per-Def-kind table (recipe products and ingredients, pawn races,
//! research prerequisites, construction cost lists). Edges are emitted
//! first and then filtered against the set of known Defs — targets that
//! name neither a known `xml:` ID nor a known short Def name are dropped.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::warn;

use crate::{ChunkLanguage, ChunkRecord, EdgeKind, SymbolEdge, xml_def_name, xml_id};

/// Extract xml → xml edges from every XML chunk, in parallel, then apply
/// the known-target filter.
pub fn extract_xml_def_edges(chunks: &[ChunkRecord]) -> Vec<SymbolEdge> {
    let mut known_ids: HashSet<&str> = HashSet::new();
    let mut known_names: HashSet<&str> = HashSet::new();
    for chunk in chunks.iter().filter(|c| c.language == ChunkLanguage::Xml) {
        known_ids.insert(chunk.id.as_str());
        known_names.insert(chunk.symbol_name.as_str());
    }

    let raw: Vec<SymbolEdge> = chunks
        .par_iter()
        .filter(|c| c.language == ChunkLanguage::Xml)
        .flat_map_iter(extract_chunk_xml_def_edges)
        .collect();

    raw.into_iter()
        .filter(|edge| {
            known_ids.contains(edge.target.as_str())
                || xml_def_name(&edge.target)
                    .is_some_and(|name| known_names.contains(name))
        })
        .collect()
}

/// Unfiltered edges from a single XML chunk.
pub fn extract_chunk_xml_def_edges(chunk: &ChunkRecord) -> Vec<SymbolEdge> {
    let doc = match roxmltree::Document::parse(&chunk.text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(chunk = %chunk.id, error = %e, "Skipping unparseable XML chunk");
            return Vec::new();
        }
    };

    let root = doc.root_element();
    let mut edges = Vec::new();
    let push = |target: String, kind: EdgeKind, edges: &mut Vec<SymbolEdge>| {
        if target != chunk.id {
            edges.push(SymbolEdge {
                source: chunk.id.clone(),
                target,
                kind,
            });
        }
    };

    // Def inheritance: ParentName attribute or child element.
    let parent = root
        .attribute("ParentName")
        .map(ToString::to_string)
        .or_else(|| child_text(root, "ParentName"));
    if let Some(parent) = parent {
        push(xml_id(parent.trim()), EdgeKind::XmlInherits, &mut edges);
    }

    // Structural references, per Def kind.
    match chunk.def_type.as_deref() {
        Some("RecipeDef") => {
            if let Some(products) = child_element(root, "products") {
                for product in products.children().filter(roxmltree::Node::is_element) {
                    push(
                        xml_id(product.tag_name().name()),
                        EdgeKind::XmlReferences,
                        &mut edges,
                    );
                }
            }
            if let Some(ingredients) = child_element(root, "ingredients") {
                for thing_defs in ingredients
                    .descendants()
                    .filter(|n| n.is_element() && n.tag_name().name() == "thingDefs")
                {
                    for item in thing_defs.children().filter(roxmltree::Node::is_element) {
                        if let Some(value) = item.text().map(str::trim).filter(|s| !s.is_empty()) {
                            push(xml_id(value), EdgeKind::XmlReferences, &mut edges);
                        }
                    }
                }
            }
        }
        Some("PawnKindDef") => {
            if let Some(race) = child_text(root, "race") {
                push(xml_id(race.trim()), EdgeKind::XmlReferences, &mut edges);
            }
        }
        Some("ResearchProjectDef") => {
            if let Some(prereqs) = child_element(root, "prerequisites") {
                for item in prereqs.children().filter(roxmltree::Node::is_element) {
                    if let Some(value) = item.text().map(str::trim).filter(|s| !s.is_empty()) {
                        push(xml_id(value), EdgeKind::XmlReferences, &mut edges);
                    }
                }
            }
        }
        Some("ThingDef") => {
            if let Some(cost_list) = child_element(root, "costList") {
                for cost in cost_list.children().filter(roxmltree::Node::is_element) {
                    push(
                        xml_id(cost.tag_name().name()),
                        EdgeKind::XmlReferences,
                        &mut edges,
                    );
                }
            }
        }
        _ => {}
    }

    edges
}

/// Phase 4: transpose every `XmlBindsClass`/`XmlUsesComp` edge into a
/// `CodeUsedByDef` edge. Exact 1:1 correspondence with the phase-2 output.
pub fn reverse_code_bindings(edges: &[SymbolEdge]) -> Vec<SymbolEdge> {
    edges
        .iter()
        .filter(|e| matches!(e.kind, EdgeKind::XmlBindsClass | EdgeKind::XmlUsesComp))
        .map(|e| SymbolEdge {
            source: e.target.clone(),
            target: e.source.clone(),
            kind: EdgeKind::CodeUsedByDef,
        })
        .collect()
}

fn child_element<'a>(
    node: roxmltree::Node<'a, 'a>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    child_element(node, name)
        .and_then(|c| c.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

// ── Tests ──────────────────────────────────────────────────────────
