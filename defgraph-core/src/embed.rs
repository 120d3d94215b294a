//! Embedding-vector HTTP client and cosine re-ranking.
//!
//! Opt-in enrichment: when `[embedding]` is enabled the build embeds chunk
//! texts and the search tool re-ranks lexical candidates by cosine
//! similarity. The client speaks the OpenAI-compatible `/embeddings` shape.

#![allow(clippy::cast_precision_loss)]

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbeddingSection;
use crate::error::{DefGraphError, EmbedError};

#[derive(Debug)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    /// Build a client from the config section, or `None` when disabled.
    /// The API key comes from the configured environment variable and is
    /// optional (local services don't need one).
    pub fn from_config(section: &EmbeddingSection) -> Option<Self> {
        if !section.enabled {
            return None;
        }
        Some(Self {
            client: Client::new(),
            base_url: section.base_url.trim_end_matches('/').to_string(),
            model: section.model.clone(),
            api_key: std::env::var(&section.api_key_env).ok(),
        })
    }

    /// Embed a batch of texts; one vector per input, in order.
    pub async fn embed(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        debug!(model = %self.model, batch = texts.len(), "Requesting embeddings");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| DefGraphError::Embed(EmbedError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(DefGraphError::Embed(EmbedError::ApiError {
                status,
                body: text,
            }));
        }

        let result: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| DefGraphError::Embed(EmbedError::Parse(e.to_string())))?;

        if result.data.len() != texts.len() {
            return Err(DefGraphError::Embed(EmbedError::Parse(format!(
                "expected {} vectors, got {}",
                texts.len(),
                result.data.len()
            ))));
        }

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Cosine similarity in [-1, 1]; 0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        dot += f64::from(x) * f64::from(y);
        norm_a += f64::from(x) * f64::from(x);
        norm_b += f64::from(y) * f64::from(y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Re-rank `(id, vector)` candidates by similarity to a query vector,
/// best first.
pub fn rank_by_similarity(
    query: &[f32],
    candidates: &[(String, Vec<f32>)],
) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = candidates
        .iter()
        .map(|(id, vector)| (id.clone(), cosine_similarity(query, vector)))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}

// ── Tests ──────────────────────────────────────────────────────────
