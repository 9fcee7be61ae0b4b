//! Client side of the external embedding microservice.

mod client;

pub use client::EmbeddingClient;

use anyhow::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds `text` into a vector. Any non-200 answer or transport failure
    /// is an error.
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    /// Liveness probe. Embeds a fixed word and reports whether that worked.
    async fn is_available(&self) -> bool {
        self.generate_embedding("test").await.is_ok()
    }
}
