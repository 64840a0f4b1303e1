//! Vector stores and similarity search.

use crate::embeddings::EmbeddingError;
use serde::de::DeserializeOwned;
use std::future::Future;

mod in_memory_store;

pub use in_memory_store::{InMemoryVectorIndex, InMemoryVectorStore};

/// Errors raised by vector stores.
#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    /// Failed to embed the query.
    #[error("Embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),

    /// Json error (e.g.: serialization, deserialization, etc.)
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Trait for vector store indexes.
pub trait VectorStoreIndex: Send + Sync {
    /// Get the top n documents based on the distance to the given query.
    /// The result is a list of tuples of the form `(score, id, document)`,
    /// sorted by descending score.
    fn top_n<T: DeserializeOwned + Send>(
        &self,
        query: &str,
        n: usize,
    ) -> impl Future<Output = Result<Vec<(f64, String, T)>, VectorStoreError>> + Send;
}
