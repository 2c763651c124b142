//! Embedding backends.
//!
//! The model itself is external; this module defines the contract and two
//! implementations: a remote HTTP backend for a sentence-transformer
//! serving endpoint, and a deterministic feature-hash embedder that needs
//! no external service (tests, offline runs).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use qanun_core::hash::sha256_bytes;
use qanun_core::{Error, Result};

use crate::vector::Vector;

/// An embedding model backend.
///
/// Inputs are already normalized by the embedding service; implementations
/// only tokenize and embed. Returned vectors need not be unit length - the
/// service L2-normalizes them.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Output dimension; constant for the lifetime of a model identifier.
    fn dim(&self) -> usize;

    /// Opaque model identifier recorded alongside every vector.
    fn model_id(&self) -> &str;
}

/// Deterministic feature-hash embedder.
///
/// Each whitespace token and each character trigram hashes to a dimension
/// and a sign; the accumulated vector is a stable, content-sensitive
/// projection. Not a semantic model - similar wording scores high, similar
/// meaning does not - but deterministic, which is what tests and offline
/// runs need.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    model_id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize, model_id: impl Into<String>) -> Self {
        Self {
            dim,
            model_id: model_id.into(),
        }
    }

    fn accumulate(&self, values: &mut [f32], feature: &[u8]) {
        let digest = sha256_bytes(feature);
        let index = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
            % self.dim.max(1);
        let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
        if let Some(slot) = values.get_mut(index) {
            *slot += sign;
        }
    }

    fn embed_one(&self, text: &str) -> Vector {
        let mut values = vec![0.0f32; self.dim];
        for token in text.split_whitespace() {
            self.accumulate(&mut values, token.as_bytes());
            let chars: Vec<char> = token.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut values, trigram.as_bytes());
            }
        }
        Vector::new(values).l2_normalized()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    vectors: Vec<Vec<f32>>,
}

/// Remote embedding backend speaking a minimal JSON contract:
/// `POST {endpoint}` with `{model, texts}` returning `{vectors}`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: url::Url,
    dim: usize,
    model_id: String,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: &str,
        dim: usize,
        model_id: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid embedder endpoint: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::embedding_failed(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            dim,
            model_id: model_id.into(),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let request = EmbedRequest {
            model: &self.model_id,
            texts,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::embedding_failed(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::embedding_failed(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding_failed(format!("malformed embedding response: {e}")))?;

        if body.vectors.len() != texts.len() {
            return Err(Error::embedding_failed(format!(
                "expected {} vectors, got {}",
                texts.len(),
                body.vectors.len()
            )));
        }

        Ok(body.vectors.into_iter().map(Vector::new).collect())
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64, "test-hash");
        let texts = vec!["فسخ عقد العمل".to_string()];
        let a = embedder.embed(&texts).await.unwrap();
        let b = embedder.embed(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].dim(), 64);
    }

    #[tokio::test]
    async fn test_hash_embedder_outputs_unit_vectors() {
        let embedder = HashEmbedder::new(128, "test-hash");
        let texts = vec!["يلتزم صاحب العمل بدفع الاجر".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();
        assert!((vectors[0].l2_norm() - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_similar_texts_score_higher_than_unrelated() {
        let embedder = HashEmbedder::new(256, "test-hash");
        let texts = vec![
            "فسخ عقد العمل من قبل صاحب العمل".to_string(),
            "فسخ عقد العمل من قبل العامل".to_string(),
            "احكام الملكيه الفكريه والعلامات التجاريه".to_string(),
        ];
        let vectors = embedder.embed(&texts).await.unwrap();
        let close = vectors[0].cosine(&vectors[1]);
        let far = vectors[0].cosine(&vectors[2]);
        assert!(close > far, "close={close} far={far}");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let embedder = HashEmbedder::new(32, "test-hash");
        let vectors = embedder.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[test]
    fn test_http_embedder_rejects_bad_endpoint() {
        let result = HttpEmbedder::new(
            "not a url",
            256,
            "remote",
            std::time::Duration::from_secs(30),
        );
        assert!(result.is_err());
    }
}
