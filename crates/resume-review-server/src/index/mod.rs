//! Per-session vector collections behind the [`DocumentIndex`] seam.

pub mod local;

pub use local::LocalVectorIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Serializable reference to one indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexHandle {
    pub collection: String,
    /// Original upload file name
    pub source: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
    pub score: f32,
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index storage not found")]
    StorageNotFound,

    #[error("{0}")]
    EmptyDocument(String),

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),

    #[error("Index IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Parse, chunk and embed the file at `path` into a collection owned by
    /// `session_id`. Replaces any collection the session already had.
    async fn embed_and_index(
        &self,
        session_id: &str,
        path: &Path,
        source: &str,
    ) -> Result<IndexHandle, IndexError>;

    /// Best matches for `query`, highest score first.
    async fn search(
        &self,
        handle: &IndexHandle,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError>;

    /// Forget one collection. Dropping a collection that no longer exists
    /// succeeds.
    async fn drop_collection(&self, handle: &IndexHandle) -> Result<(), IndexError>;

    /// Remove every persisted collection.
    async fn delete_storage(&self) -> Result<(), IndexError>;
}
