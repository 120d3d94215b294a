use std::path::Path;

use serde::{Deserialize, Serialize};

use defgraph_extract::code::CodeResolution;
use defgraph_extract::xml_code::XmlLinkConfig;

use crate::error::ConfigError;

/// Top-level defgraph configuration, matching `defgraph.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefGraphConfig {
    #[serde(default)]
    pub index: IndexSection,
    #[serde(default)]
    pub extract: ExtractSection,
    #[serde(default)]
    pub graph: GraphSection,
    #[serde(default)]
    pub embedding: EmbeddingSection,
}

impl DefGraphConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::NotFound(format!("{}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Worker threads for the extraction fan-out; 0 = one per core.
    pub parallelism: usize,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            include_patterns: vec!["**/*.cs".into(), "**/*.xml".into()],
            exclude_patterns: vec![
                "**/obj/**".into(),
                "**/bin/**".into(),
                "**/.git/**".into(),
                "**/About/**".into(),
            ],
            parallelism: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSection {
    /// Phase-1 resolution mode: `semantic` or `syntactic`.
    pub code_resolution: CodeResolution,
    /// xml → code heuristic tables (linkable fields, namespace rules).
    #[serde(flatten)]
    pub xml_link: XmlLinkConfig,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            code_resolution: CodeResolution::Semantic,
            xml_link: XmlLinkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSection {
    /// File-name base of the artefacts inside the index directory.
    pub artifact_base: String,
    /// PageRank damping factor.
    pub damping: f64,
    /// PageRank iteration cap.
    pub max_iterations: u32,
    /// PageRank L1 convergence threshold.
    pub tolerance: f64,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            artifact_base: "graph".to_string(),
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    /// Whether embedding enrichment is enabled.
    pub enabled: bool,
    /// Base URL of the embedding service.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Texts per embedding request.
    pub batch_size: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            enabled: false, // opt-in by default
            base_url: "http://localhost:11434/v1".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key_env: "DEFGRAPH_EMBED_API_KEY".to_string(),
            batch_size: 32,
        }
    }
}
