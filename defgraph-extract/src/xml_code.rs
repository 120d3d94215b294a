//! Phase 2: xml → code edges.
//!
//! Linkable-field tag values name C# classes (`<thingClass>`,
//! `<compClass>`, …); `comps/li[@Class]` items name component types. Bare
//! class names are normalised to fully-qualified form through a configured
//! namespace-prefix table. The linkable-field set is a seed list optionally
//! merged with fields discovered from the Def type schema in the symbol
//! table.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::helpers::simple_type_name;
use crate::symbols::{FieldDecl, SymbolTable};
use crate::{ChunkLanguage, ChunkRecord, EdgeKind, SymbolEdge};

/// A namespace-inference rule: bare names with this prefix live in this
/// namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceRule {
    pub prefix: String,
    pub namespace: String,
}

/// Configuration for the xml → code extractor. The tables are
/// codebase-specific heuristics and deliberately live in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlLinkConfig {
    /// Seed set of well-known linkable field names.
    pub linkable_fields: Vec<String>,
    /// Whether to augment the seed set from the Def type schema.
    pub discover_linkable: bool,
    /// Short names of the Def base types (schema discovery roots).
    pub def_base_types: Vec<String>,
    /// Short names of types whose subtypes make a field linkable.
    pub linkable_base_types: Vec<String>,
    /// Prefix → namespace rules, first match wins.
    pub namespace_rules: Vec<NamespaceRule>,
    /// Namespace for bare names no rule matches.
    pub default_namespace: String,
    /// PascalCase prefixes accepted as class names.
    pub class_name_prefixes: Vec<String>,
    /// PascalCase suffixes accepted as class names.
    pub class_name_suffixes: Vec<String>,
}

impl Default for XmlLinkConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(ToString::to_string).collect();
        Self {
            linkable_fields: strings(&[
                "thingClass",
                "compClass",
                "workerClass",
                "driverClass",
                "verbClass",
                "graphicClass",
                "hediffClass",
                "stateClass",
                "jobClass",
                "giverClass",
                "mentalStateClass",
                "thinkNodeClass",
            ]),
            discover_linkable: true,
            def_base_types: strings(&["Def"]),
            linkable_base_types: strings(&[
                "Thing",
                "ThingComp",
                "CompProperties",
                "Verb",
                "Graphic",
                "Hediff",
                "WorkGiver",
                "JobDriver",
            ]),
            namespace_rules: vec![
                NamespaceRule {
                    prefix: "CompProperties".into(),
                    namespace: "RimWorld".into(),
                },
                NamespaceRule {
                    prefix: "Verb_".into(),
                    namespace: "Verse".into(),
                },
                NamespaceRule {
                    prefix: "Graphic_".into(),
                    namespace: "Verse".into(),
                },
                NamespaceRule {
                    prefix: "Hediff".into(),
                    namespace: "Verse".into(),
                },
            ],
            default_namespace: "RimWorld".into(),
            class_name_prefixes: strings(&["Comp", "Verb", "Graphic", "Building", "Hediff", "Pawn"]),
            class_name_suffixes: strings(&["Worker", "Driver", "Effect"]),
        }
    }
}

/// Extract xml → code edges from every XML chunk, in parallel.
pub fn extract_xml_code_edges(
    chunks: &[ChunkRecord],
    table: &SymbolTable,
    config: &XmlLinkConfig,
) -> Vec<SymbolEdge> {
    let fields = linkable_fields(table, config);
    chunks
        .par_iter()
        .filter(|c| c.language == ChunkLanguage::Xml)
        .flat_map_iter(|chunk| extract_chunk_xml_code_edges(chunk, &fields, config))
        .collect()
}

/// Extract edges from a single XML chunk against a resolved field set.
pub fn extract_chunk_xml_code_edges(
    chunk: &ChunkRecord,
    fields: &HashSet<String>,
    config: &XmlLinkConfig,
) -> Vec<SymbolEdge> {
    let doc = match roxmltree::Document::parse(&chunk.text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(chunk = %chunk.id, error = %e, "Skipping unparseable XML chunk");
            return Vec::new();
        }
    };

    let mut edges = Vec::new();
    for node in doc.descendants().filter(roxmltree::Node::is_element) {
        let tag = node.tag_name().name();

        if fields.contains(tag) {
            if let Some(value) = node.text().map(str::trim).filter(|s| !s.is_empty()) {
                if let Some(class_id) = normalize_class_name(value, config) {
                    push_edge(&mut edges, chunk, class_id, EdgeKind::XmlBindsClass);
                }
            }
        }

        // comps/li[@Class] — a list item carrying its concrete component type.
        if tag == "comps" {
            for li in node
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == "li")
            {
                if let Some(value) = li.attribute("Class") {
                    if let Some(class_id) = normalize_class_name(value.trim(), config) {
                        push_edge(&mut edges, chunk, class_id, EdgeKind::XmlUsesComp);
                    }
                }
            }
        }
    }
    edges
}

fn push_edge(edges: &mut Vec<SymbolEdge>, chunk: &ChunkRecord, target: String, kind: EdgeKind) {
    if target == chunk.id {
        return;
    }
    edges.push(SymbolEdge {
        source: chunk.id.clone(),
        target,
        kind,
    });
}

// ── Class-name validation & namespace inference ────────────────────

/// Validate a tag value as a class name and qualify it.
///
/// Rejects numbers, booleans, and anything with whitespace or angle
/// brackets. Dotted names pass through unchanged; bare names must look
/// PascalCase-ish and get a namespace from the rule table.
pub fn normalize_class_name(value: &str, config: &XmlLinkConfig) -> Option<String> {
    if !is_class_name(value, config) {
        return None;
    }
    if value.contains('.') {
        return Some(value.to_string());
    }
    let namespace = config
        .namespace_rules
        .iter()
        .find(|rule| value.starts_with(rule.prefix.as_str()))
        .map_or(config.default_namespace.as_str(), |rule| {
            rule.namespace.as_str()
        });
    Some(format!("{namespace}.{value}"))
}

fn is_class_name(value: &str, config: &XmlLinkConfig) -> bool {
    if value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '<' || c == '>')
    {
        return false;
    }
    if value.parse::<f64>().is_ok() || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        return false;
    }
    let first = value.chars().next().unwrap_or(' ');
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    if value.contains('.') {
        return true;
    }
    config
        .class_name_prefixes
        .iter()
        .any(|p| value.starts_with(p.as_str()))
        || config
            .class_name_suffixes
            .iter()
            .any(|s| value.ends_with(s.as_str()))
        || is_pascal_case(value)
}

/// PascalCase: leading uppercase, word characters, at least one lowercase
/// letter, length ≥ 3.
fn is_pascal_case(value: &str) -> bool {
    value.len() >= 3
        && value.chars().next().is_some_and(char::is_uppercase)
        && value.chars().all(|c| c.is_alphanumeric() || c == '_')
        && value.chars().any(char::is_lowercase)
}

// ── Linkable-field discovery ───────────────────────────────────────

/// The effective linkable-field set: the configured seed, plus fields
/// discovered from the Def type schema when enabled.
///
/// A field qualifies when its declared type — or the element type of a
/// single-argument generic such as `List<T>` — transitively inherits one of
/// the configured linkable base types.
pub fn linkable_fields(table: &SymbolTable, config: &XmlLinkConfig) -> HashSet<String> {
    let mut fields: HashSet<String> = config.linkable_fields.iter().cloned().collect();
    if !config.discover_linkable {
        return fields;
    }

    let def_roots: HashSet<String> = config.def_base_types.iter().cloned().collect();
    let link_roots: HashSet<String> = config.linkable_base_types.iter().cloned().collect();

    for decl in table.decls().iter().filter(|d| d.kind.is_type()) {
        if !table.inherits_any(&decl.id, &def_roots) {
            continue;
        }
        for field in fields_including_inherited(table, &decl.id) {
            let target = unwrap_field_type(&field.type_name);
            let short = simple_type_name(&target);
            let linkable = link_roots.contains(short)
                || table
                    .resolve(short, &decl.namespace, None)
                    .is_some_and(|d| d.kind.is_type() && table.inherits_any(&d.id, &link_roots));
            if linkable {
                fields.insert(field.name.clone());
            }
        }
    }
    fields
}

/// Public fields of a type and all its resolvable ancestors.
fn fields_including_inherited(table: &SymbolTable, type_id: &str) -> Vec<FieldDecl> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![type_id.to_string()];

    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(decl) = table.get(&id) else { continue };
        out.extend(decl.fields.iter().cloned());
        for base in &decl.bases {
            if let Some(parent) = table.resolve(simple_type_name(base), &decl.namespace, None) {
                if parent.kind.is_type() {
                    stack.push(parent.id.clone());
                }
            }
        }
    }
    out
}

/// `List<T>` / `IEnumerable<T>` / any one-argument wrapper → `T`;
/// everything else passes through.
fn unwrap_field_type(type_name: &str) -> String {
    let Some(open) = type_name.find('<') else {
        return type_name.to_string();
    };
    let Some(close) = type_name.rfind('>') else {
        return type_name.to_string();
    };
    let inner = &type_name[open + 1..close];
    if inner.contains(',') {
        return type_name.to_string();
    }
    unwrap_field_type(inner.trim())
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn xml_chunk(id: &str, def_type: &str, text: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            language: ChunkLanguage::Xml,
            text: text.to_string(),
            symbol_name: id.rsplit(':').next().unwrap_or(id).to_string(),
            def_type: Some(def_type.to_string()),
            span_start: 0,
            span_end: text.len(),
            path: PathBuf::from("Defs/Things.xml"),
        }
    }

    fn code_chunk(id: &str, symbol_name: &str, text: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            language: ChunkLanguage::Code,
            text: text.to_string(),
            symbol_name: symbol_name.to_string(),
            def_type: None,
            span_start: 0,
            span_end: text.len(),
            path: PathBuf::from("Test.cs"),
        }
    }

    #[test]
    fn thing_class_binds() {
        let config = XmlLinkConfig::default();
        let chunk = xml_chunk(
            "xml:ThingDef:Turret",
            "ThingDef",
            "<ThingDef><defName>Turret</defName><thingClass>Building_Turret</thingClass></ThingDef>",
        );
        let fields = config.linkable_fields.iter().cloned().collect();
        let edges = extract_chunk_xml_code_edges(&chunk, &fields, &config);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "xml:ThingDef:Turret");
        assert_eq!(edges[0].target, "RimWorld.Building_Turret");
        assert_eq!(edges[0].kind, EdgeKind::XmlBindsClass);
    }

    #[test]
    fn dotted_names_pass_through() {
        let config = XmlLinkConfig::default();
        let chunk = xml_chunk(
            "xml:ThingDef:Beam",
            "ThingDef",
            "<ThingDef><thingClass>MyMod.Things.Beam</thingClass></ThingDef>",
        );
        let fields = config.linkable_fields.iter().cloned().collect();
        let edges = extract_chunk_xml_code_edges(&chunk, &fields, &config);
        assert_eq!(edges[0].target, "MyMod.Things.Beam");
    }

    #[test]
    fn namespace_rules_apply() {
        let config = XmlLinkConfig::default();
        assert_eq!(
            normalize_class_name("CompProperties_Explosive", &config).as_deref(),
            Some("RimWorld.CompProperties_Explosive")
        );
        assert_eq!(
            normalize_class_name("Verb_Shoot", &config).as_deref(),
            Some("Verse.Verb_Shoot")
        );
        assert_eq!(
            normalize_class_name("Graphic_Multi", &config).as_deref(),
            Some("Verse.Graphic_Multi")
        );
        assert_eq!(
            normalize_class_name("HediffComp_Infecter", &config).as_deref(),
            Some("Verse.HediffComp_Infecter")
        );
        assert_eq!(
            normalize_class_name("Bullet", &config).as_deref(),
            Some("RimWorld.Bullet")
        );
    }

    #[test]
    fn invalid_values_rejected() {
        let config = XmlLinkConfig::default();
        assert_eq!(normalize_class_name("42", &config), None);
        assert_eq!(normalize_class_name("1.5", &config), None);
        assert_eq!(normalize_class_name("true", &config), None);
        assert_eq!(normalize_class_name("False", &config), None);
        assert_eq!(normalize_class_name("two words", &config), None);
        assert_eq!(normalize_class_name("<ref>", &config), None);
        assert_eq!(normalize_class_name("lowercase", &config), None);
        assert_eq!(normalize_class_name("", &config), None);
    }

    #[test]
    fn comps_li_class_uses_comp() {
        let config = XmlLinkConfig::default();
        let chunk = xml_chunk(
            "xml:ThingDef:Shell",
            "ThingDef",
            "<ThingDef><comps><li Class=\"CompProperties_Explosive\"><explosiveRadius>2.9</explosiveRadius></li></comps></ThingDef>",
        );
        let fields = HashSet::new();
        let edges = extract_chunk_xml_code_edges(&chunk, &fields, &config);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, "RimWorld.CompProperties_Explosive");
        assert_eq!(edges[0].kind, EdgeKind::XmlUsesComp);
    }

    #[test]
    fn nested_linkable_tags_found() {
        let config = XmlLinkConfig::default();
        let chunk = xml_chunk(
            "xml:HediffDef:Burn",
            "HediffDef",
            "<HediffDef><stages><li><hediffClass>Hediff_Injury</hediffClass></li></stages></HediffDef>",
        );
        let fields = config.linkable_fields.iter().cloned().collect();
        let edges = extract_chunk_xml_code_edges(&chunk, &fields, &config);
        assert_eq!(edges[0].target, "Verse.Hediff_Injury");
    }

    #[test]
    fn discovers_fields_from_def_schema() {
        let code = vec![
            code_chunk("Verse.Def", "Def", "public class Def { public string defName; }"),
            code_chunk("Verse.Verb", "Verb", "public class Verb {}"),
            code_chunk(
                "Verse.VerbProperties",
                "VerbProperties",
                "public class VerbProperties : Verb {}",
            ),
            code_chunk(
                "RimWorld.ToolDef",
                "ToolDef",
                "public class ToolDef : Def { public List<VerbProperties> verbs; public int power; }",
            ),
        ];
        let table = SymbolTable::build(&code);
        let config = XmlLinkConfig::default();
        let fields = linkable_fields(&table, &config);

        assert!(fields.contains("verbs"), "discovered fields: {fields:?}");
        assert!(!fields.contains("power"));
        assert!(fields.contains("thingClass"), "seed set merged");
    }

    #[test]
    fn discovery_disabled_keeps_seed_only() {
        let table = SymbolTable::build(&[]);
        let config = XmlLinkConfig {
            discover_linkable: false,
            ..XmlLinkConfig::default()
        };
        let fields = linkable_fields(&table, &config);
        assert_eq!(fields.len(), config.linkable_fields.len());
    }

    proptest::proptest! {
        /// Normalisation never panics, and anything it accepts is a
        /// plausible qualified class name.
        #[test]
        fn normalization_is_total(value in "\\PC{0,40}") {
            let config = XmlLinkConfig::default();
            if let Some(normalized) = normalize_class_name(&value, &config) {
                proptest::prop_assert!(!normalized.contains(char::is_whitespace));
                proptest::prop_assert!(normalized.contains('.'));
            }
        }
    }
}
