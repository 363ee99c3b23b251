use super::{DocumentIndex, IndexError, IndexHandle, SearchHit};
use crate::document::{DocumentParser, TextChunker};
use crate::services::EmbeddingProvider;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct StoredChunk {
    index: usize,
    content: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Collection {
    name: String,
    source: String,
    chunks: Vec<StoredChunk>,
}

/// File-backed vector index: one JSON collection per session under
/// `root`, searched by brute-force cosine similarity.
pub struct LocalVectorIndex {
    root: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
    cache: RwLock<HashMap<String, Arc<Collection>>>,
}

impl LocalVectorIndex {
    pub fn new(root: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>, chunker: TextChunker) -> Self {
        Self {
            root: root.into(),
            embedder,
            chunker,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn collection_name(session_id: &str) -> String {
        format!("resume_{}", session_id)
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    async fn collection(&self, name: &str) -> Result<Option<Arc<Collection>>, IndexError> {
        if let Some(cached) = self.cache.read().await.get(name) {
            return Ok(Some(cached.clone()));
        }

        let bytes = match tokio::fs::read(self.collection_path(name)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let collection: Collection = serde_json::from_slice(&bytes)
            .with_context(|| format!("Collection {} is unreadable", name))?;
        let collection = Arc::new(collection);

        self.cache
            .write()
            .await
            .insert(name.to_string(), collection.clone());
        Ok(Some(collection))
    }
}

#[async_trait]
impl DocumentIndex for LocalVectorIndex {
    async fn embed_and_index(
        &self,
        session_id: &str,
        path: &Path,
        source: &str,
    ) -> Result<IndexHandle, IndexError> {
        let owned_path = path.to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || DocumentParser::parse(&owned_path))
            .await
            .context("Document parser task failed")??;

        let chunks = self.chunker.chunk(&parsed.content);
        if chunks.is_empty() {
            return Err(IndexError::EmptyDocument(format!(
                "No text content found in {}",
                source
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        debug!("Generated {} embeddings for {}", embeddings.len(), source);

        let name = Self::collection_name(session_id);
        let collection = Collection {
            name: name.clone(),
            source: source.to_string(),
            chunks: chunks
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| StoredChunk {
                    index: chunk.index,
                    content: chunk.content,
                    embedding,
                })
                .collect(),
        };

        tokio::fs::create_dir_all(&self.root).await?;
        let bytes = serde_json::to_vec(&collection).context("Failed to serialize collection")?;
        tokio::fs::write(self.collection_path(&name), bytes).await?;

        let handle = IndexHandle {
            collection: name.clone(),
            source: collection.source.clone(),
            chunk_count: collection.chunks.len(),
        };

        self.cache.write().await.insert(name, Arc::new(collection));
        info!(
            "Indexed {} into {} ({} chunks)",
            source, handle.collection, handle.chunk_count
        );

        Ok(handle)
    }

    async fn search(
        &self,
        handle: &IndexHandle,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let Some(collection) = self.collection(&handle.collection).await? else {
            debug!("Collection {} not found, no results", handle.collection);
            return Ok(Vec::new());
        };

        if collection.chunks.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let mut hits: Vec<SearchHit> = collection
            .chunks
            .iter()
            .map(|chunk| SearchHit {
                content: chunk.content.clone(),
                source: collection.source.clone(),
                chunk_index: chunk.index,
                score: cosine_similarity(&query_embedding, &chunk.embedding),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        debug!(
            "Search in {} returned {} hits",
            handle.collection,
            hits.len()
        );
        Ok(hits)
    }

    async fn drop_collection(&self, handle: &IndexHandle) -> Result<(), IndexError> {
        self.cache.write().await.remove(&handle.collection);

        match tokio::fs::remove_file(self.collection_path(&handle.collection)).await {
            Ok(()) => info!("Dropped collection {}", handle.collection),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Collection {} already gone", handle.collection)
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn delete_storage(&self) -> Result<(), IndexError> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(IndexError::StorageNotFound),
            Err(e) => return Err(e.into()),
        }

        self.cache.write().await.clear();
        info!("Deleted index storage at {:?}", self.root);
        Ok(())
    }
}

/// Cosine of the angle between two vectors. Mismatched lengths and zero
/// vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}
