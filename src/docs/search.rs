//! Semantic search over precomputed documentation chunk embeddings.

use super::library::{DocsLibrary, ResourceAnnotations, ResourceListItem, DOCS_URI_SCHEME, MARKDOWN_MIME_TYPE};
use crate::embedding::EmbeddingService;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

pub const DEFAULT_TOP_K: usize = 5;

/// One entry of the embeddings file.
#[derive(Debug, Clone, Deserialize)]
pub struct DocChunk {
    pub file_path: String,
    pub chunk_text: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocsSearchHit {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub resource: ResourceListItem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocsSearchResults {
    pub results: Vec<DocsSearchHit>,
    pub query: String,
}

pub struct DocsSearch {
    embeddings_file: PathBuf,
    chunks: Mutex<Option<Arc<Vec<DocChunk>>>>,
}

impl DocsSearch {
    pub fn new(embeddings_file: PathBuf) -> Self {
        Self {
            embeddings_file,
            chunks: Mutex::new(None),
        }
    }

    /// Loads the embeddings file on first use and keeps it in memory.
    fn chunks(&self) -> Result<Arc<Vec<DocChunk>>> {
        let mut cached = self.chunks.lock().unwrap();
        if let Some(chunks) = cached.as_ref() {
            return Ok(chunks.clone());
        }
        let raw = fs::read_to_string(&self.embeddings_file)
            .with_context(|| format!("Failed to read embeddings file {:?}", self.embeddings_file))?;
        let chunks: Vec<DocChunk> =
            serde_json::from_str(&raw).context("Failed to parse embeddings file")?;
        info!("Loaded {} documentation chunks", chunks.len());
        let chunks = Arc::new(chunks);
        *cached = Some(chunks.clone());
        Ok(chunks)
    }

    /// Ranks every chunk by cosine similarity to the embedded query and
    /// returns the `top_k` best.
    pub async fn search(
        &self,
        query: &str,
        embedder: &dyn EmbeddingService,
        library: &DocsLibrary,
        top_k: usize,
    ) -> Result<DocsSearchResults> {
        let chunks = self.chunks()?;
        if chunks.is_empty() {
            bail!("No documentation embeddings are available");
        }
        let query_embedding = embedder.generate_embedding(query).await?;
        if query_embedding.is_empty() {
            bail!("Embedding service returned an empty vector");
        }

        let mut scored: Vec<(f64, &DocChunk)> = chunks
            .iter()
            .filter(|chunk| !chunk.embedding.is_empty())
            .map(|chunk| (cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let results = scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| DocsSearchHit {
                kind: "resource",
                resource: ResourceListItem {
                    uri: format!("{}{}", DOCS_URI_SCHEME, chunk.file_path),
                    name: None,
                    title: None,
                    description: chunk.chunk_text.clone(),
                    mime_type: MARKDOWN_MIME_TYPE.to_string(),
                    annotations: ResourceAnnotations {
                        score: Some(score),
                        ..ResourceAnnotations::for_assistant(
                            library.last_modified_of(&chunk.file_path),
                        )
                    },
                },
            })
            .collect();

        Ok(DocsSearchResults {
            results,
            query: query.to_string(),
        })
    }
}

/// Cosine similarity over the common prefix of both vectors; zero when
/// either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let magnitude = norm_a.sqrt() * norm_b.sqrt();
    if magnitude == 0.0 {
        0.0
    } else {
        dot / magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingService;
    use tempfile::TempDir;

    fn write_embeddings(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("embeddings.json");
        let entries = serde_json::json!([
            {"file_path": "main/loader.md", "chunk_text": "Loader", "embedding": [1.0, 0.0]},
            {"file_path": "main/events.md", "chunk_text": "Events", "embedding": [0.0, 1.0]},
            {"file_path": "main/mixed.md", "chunk_text": "Mixed", "embedding": [0.7, 0.7]},
            {"file_path": "main/none.md", "chunk_text": "None", "embedding": []}
        ]);
        fs::write(&path, entries.to_string()).unwrap();
        path
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let dir = TempDir::new().unwrap();
        let search = DocsSearch::new(write_embeddings(&dir));
        let library = DocsLibrary::new(dir.path().to_path_buf());

        let mut embedder = MockEmbeddingService::new();
        embedder
            .expect_generate_embedding()
            .returning(|_| Ok(vec![1.0, 0.1]));

        let results = search.search("loader", &embedder, &library, 2).await.unwrap();
        assert_eq!(results.query, "loader");
        let uris: Vec<&str> = results.results.iter().map(|r| r.resource.uri.as_str()).collect();
        assert_eq!(uris, vec!["bx-docs://main/loader.md", "bx-docs://main/mixed.md"]);
        assert_eq!(results.results[0].kind, "resource");
        assert!(results.results[0].resource.annotations.score.unwrap() > 0.9);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let search = DocsSearch::new(write_embeddings(&dir));
        let library = DocsLibrary::new(dir.path().to_path_buf());

        let mut embedder = MockEmbeddingService::new();
        embedder
            .expect_generate_embedding()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        assert!(search.search("x", &embedder, &library, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_embeddings_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let search = DocsSearch::new(dir.path().join("missing.json"));
        let library = DocsLibrary::new(dir.path().to_path_buf());
        let embedder = MockEmbeddingService::new();
        assert!(search.search("x", &embedder, &library, 5).await.is_err());
    }
}
