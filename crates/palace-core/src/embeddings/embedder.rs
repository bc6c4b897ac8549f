//! External embedder client (component K, embedding half).

use std::time::Duration;

use crate::error::{EngineError, Result};

/// Something that turns text into vectors. The HTTP client is the
/// production implementation; tests use an in-memory fake.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>>;
}

#[derive(serde::Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedResponseItem>,
}

#[derive(serde::Deserialize)]
struct EmbedResponseItem {
    embedding: Vec<f32>,
}

/// HTTP-backed embedder calling an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build embedder http client");
        Self { client, url, api_key }
    }
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let mut request = self.client.post(&self.url).json(&EmbedRequest { input: texts, model });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(format!("embedder request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Unavailable(format!(
                "embedder returned status {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Internal(format!("malformed embedder response: {e}")))?;

        Ok(body.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Cosine similarity between two equal-length vectors; `0.0` if either is zero-length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_unit_similarity() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_zero_similarity() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
