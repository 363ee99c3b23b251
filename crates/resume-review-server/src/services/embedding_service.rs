use crate::config::EmbeddingConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    content: &'a str,
    input: &'a str,
    model: &'a str,
}

/// HTTP embedding client for llama.cpp-style and OpenAI-compatible servers.
#[derive(Clone)]
pub struct EmbeddingService {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl EmbeddingService {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build embedding HTTP client")?;

        Ok(Self {
            client,
            url: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                config.endpoint
            ),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimension: config.dimension,
        })
    }

    /// Pull the first vector out of any of the response shapes we accept:
    /// `{"embedding": [...]}`, `{"data": [{"embedding": [...]}]}`,
    /// `[{"embedding": [...]}]` or a bare `[...]`.
    fn extract_embedding(json: &Value) -> Result<Vec<f32>> {
        let vector = match json {
            Value::Object(map) if map.get("embedding").is_some_and(Value::is_array) => {
                &map["embedding"]
            }
            Value::Object(map) => map
                .get("data")
                .and_then(|d| d.get(0))
                .and_then(|first| first.get("embedding"))
                .with_context(|| format!("Unrecognized embedding response format: {}", json))?,
            Value::Array(items) => match items.first() {
                Some(first) if first.get("embedding").is_some() => &first["embedding"],
                Some(_) => json,
                None => anyhow::bail!("Empty array returned from embedding server"),
            },
            _ => anyhow::bail!("Unrecognized embedding response format: {}", json),
        };

        let values = vector
            .as_array()
            .context("Embedding is not an array")?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Vec<f32>>();

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for {} chars", text.len());

        let request = EmbeddingRequest {
            content: text,
            input: text,
            model: &self.model,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to connect to embedding server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error ({}): {}", status, body);
        }

        let json: Value = response
            .json()
            .await
            .context("Failed to parse embedding response as JSON")?;

        let embedding = Self::extract_embedding(&json)?;

        if embedding.is_empty() {
            anyhow::bail!("Generated embedding is empty");
        }

        if self.dimension != 0 && embedding.len() != self.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }

        Ok(embedding)
    }
}
