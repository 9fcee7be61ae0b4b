use super::EmbeddingService;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
}

/// HTTP client for `POST {base_url}/generate_embedding`.
pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
}

impl EmbeddingClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        let base_url = base_url.trim_end_matches('/').to_string();

        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingService for EmbeddingClient {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            bail!("Text to embed must not be empty");
        }
        let url = format!("{}/generate_embedding", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest { text })
            .send()
            .await
            .context("Failed to connect to embedding service")?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            bail!("Embedding service answered with status {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse embedding response")
    }
}
