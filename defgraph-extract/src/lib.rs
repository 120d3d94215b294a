//! Chunking and edge extraction for a game-modding corpus.
//!
//! Turns C# source files and XML Def files into [`ChunkRecord`]s, then runs
//! the multi-phase extractors that derive typed [`SymbolEdge`]s spanning the
//! two symbol universes (code symbols and `xml:`-prefixed Defs).

pub mod chunker;
pub mod code;
mod helpers;
pub mod symbols;
pub mod xml_code;
pub mod xml_defs;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Error type for the extraction engine.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// Source could not be parsed by tree-sitter.
    #[error("Parse error in {path}: {message}")]
    Parse {
        /// Path (or chunk ID) of the unit that failed to parse.
        path: String,
        /// Description of the parse failure.
        message: String,
    },

    /// Malformed XML in a Def file or chunk.
    #[error("XML error in {path}: {message}")]
    Xml { path: String, message: String },

    /// Internal tree-sitter error (language load, node access, etc.).
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// Filesystem I/O error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, ExtractError>`.
pub type Result<T> = std::result::Result<T, ExtractError>;

// ── Chunk records ──────────────────────────────────────────────────

/// Language of a chunk's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkLanguage {
    /// C# source (a type or method declaration).
    Code,
    /// A declarative XML Def.
    Xml,
}

impl ChunkLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Xml => "xml",
        }
    }
}

/// A named, spanned unit of source produced by the chunker.
///
/// `id` is the canonical symbol ID: `Namespace.Type[.Member[(ParamType, …)]]`
/// for code, `xml:<DefName>` or `xml:<DefType>:<DefName>` for Defs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub language: ChunkLanguage,
    pub text: String,
    /// Short (unqualified) name of the unit.
    pub symbol_name: String,
    /// Def category (`ThingDef`, `RecipeDef`, …) for XML chunks.
    pub def_type: Option<String>,
    /// Byte offset of the unit inside its source file.
    pub span_start: usize,
    /// Exclusive end byte offset inside the source file.
    pub span_end: usize,
    pub path: PathBuf,
}

// ── Edge kinds ─────────────────────────────────────────────────────

/// Typed directed edge kind, byte-coded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EdgeKind {
    /// code → code: invocation of a resolved method.
    Calls = 1,
    /// code → code: member access, object creation, or type/name reference.
    References = 2,
    /// code → code: base class in a type's base list.
    Inherits = 3,
    /// xml → xml: structural reference between Defs.
    XmlReferences = 4,
    /// code → code: interface in a type's base list.
    Implements = 5,
    /// xml → xml: `ParentName` inheritance between Defs.
    XmlInherits = 10,
    /// xml → code: a linkable field naming a class.
    XmlBindsClass = 20,
    /// xml → code: a `comps/li[@Class]` component binding.
    XmlUsesComp = 21,
    /// code → xml: synthetic transpose of `XmlBindsClass`/`XmlUsesComp`.
    CodeUsedByDef = 30,
}

impl EdgeKind {
    /// Decode an on-disk kind byte. Unknown bytes yield `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Calls),
            2 => Some(Self::References),
            3 => Some(Self::Inherits),
            4 => Some(Self::XmlReferences),
            5 => Some(Self::Implements),
            10 => Some(Self::XmlInherits),
            20 => Some(Self::XmlBindsClass),
            21 => Some(Self::XmlUsesComp),
            30 => Some(Self::CodeUsedByDef),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Edge-type prior used by the query scorer.
    pub fn weight(self) -> f64 {
        match self {
            Self::Calls => 0.8,
            Self::References => 0.5,
            Self::Inherits => 2.0,
            Self::XmlReferences => 0.4,
            Self::Implements => 0.9,
            Self::XmlInherits => 1.8,
            Self::XmlBindsClass | Self::CodeUsedByDef => 0.7,
            Self::XmlUsesComp => 0.6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calls => "calls",
            Self::References => "references",
            Self::Inherits => "inherits",
            Self::XmlReferences => "xml_references",
            Self::Implements => "implements",
            Self::XmlInherits => "xml_inherits",
            Self::XmlBindsClass => "xml_binds_class",
            Self::XmlUsesComp => "xml_uses_comp",
            Self::CodeUsedByDef => "code_used_by_def",
        }
    }
}

/// Scorer prior for a raw kind byte; unknown kinds fall back to 0.1.
pub fn kind_weight(byte: u8) -> f64 {
    EdgeKind::from_byte(byte).map_or(0.1, EdgeKind::weight)
}

/// A directed edge between two symbol IDs, prior to index assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl SymbolEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

// ── Symbol-ID helpers ──────────────────────────────────────────────

/// Prefix marking Def symbol IDs.
pub const XML_ID_PREFIX: &str = "xml:";

/// Whether a symbol ID lives in the Def universe.
pub fn is_xml_id(id: &str) -> bool {
    id.starts_with(XML_ID_PREFIX)
}

/// Short-form Def ID: `xml:<DefName>`.
pub fn xml_id(def_name: &str) -> String {
    format!("{XML_ID_PREFIX}{def_name}")
}

/// Typed Def ID: `xml:<DefType>:<DefName>`.
pub fn xml_typed_id(def_type: &str, def_name: &str) -> String {
    format!("{XML_ID_PREFIX}{def_type}:{def_name}")
}

/// The def name of an `xml:` ID — the last `:`-separated segment.
pub fn xml_def_name(id: &str) -> Option<&str> {
    id.strip_prefix(XML_ID_PREFIX).map(|rest| {
        rest.rsplit(':').next().unwrap_or(rest)
    })
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_kind_bytes_round_trip() {
        for kind in [
            EdgeKind::Calls,
            EdgeKind::References,
            EdgeKind::Inherits,
            EdgeKind::XmlReferences,
            EdgeKind::Implements,
            EdgeKind::XmlInherits,
            EdgeKind::XmlBindsClass,
            EdgeKind::XmlUsesComp,
            EdgeKind::CodeUsedByDef,
        ] {
            assert_eq!(EdgeKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(EdgeKind::from_byte(0), None);
        assert_eq!(EdgeKind::from_byte(99), None);
    }

    #[test]
    fn edge_weights_match_priors() {
        assert!((EdgeKind::Calls.weight() - 0.8).abs() < f64::EPSILON);
        assert!((EdgeKind::Inherits.weight() - 2.0).abs() < f64::EPSILON);
        assert!((EdgeKind::CodeUsedByDef.weight() - 0.7).abs() < f64::EPSILON);
        // Unknown kind bytes fall back to the default prior.
        assert!((kind_weight(200) - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn xml_id_forms() {
        assert_eq!(xml_id("Steel"), "xml:Steel");
        assert_eq!(xml_typed_id("ThingDef", "Steel"), "xml:ThingDef:Steel");
        assert!(is_xml_id("xml:Steel"));
        assert!(!is_xml_id("RimWorld.ThingDef"));
        assert_eq!(xml_def_name("xml:ThingDef:Steel"), Some("Steel"));
        assert_eq!(xml_def_name("xml:Steel"), Some("Steel"));
        assert_eq!(xml_def_name("RimWorld.Thing"), None);
    }
}
