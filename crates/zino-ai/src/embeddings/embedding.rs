use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc};
use thiserror::Error;

/// Errors raised by embedding models.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Http error (e.g.: connection error, timeout, etc.)
    #[error("HttpError: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Json error (e.g.: serialization, deserialization)
    #[error("JsonError: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error parsing the embedding response
    #[error("ResponseError: {0}")]
    ResponseError(String),

    /// Error returned by the embedding model provider
    #[error("ProviderError: {0}")]
    ProviderError(String),
}

/// A document together with its vector.
#[derive(Clone, Default, Deserialize, Serialize, Debug, PartialEq)]
pub struct Embedding {
    /// The embedded text.
    pub document: String,
    /// The vector.
    pub vec: Vec<f64>,
}

/// Trait for embedding models that turn texts into vectors.
pub trait EmbeddingModel: Clone + Send + Sync {
    /// Number of dimensions of the vectors, or `0` if unknown.
    fn ndims(&self) -> usize;

    /// Embeds the texts, returning one embedding per text in the same order.
    fn embed_texts(
        &self,
        texts: Vec<String>,
    ) -> impl Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send;

    /// Embeds a single text.
    fn embed_text(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Embedding, EmbeddingError>> + Send {
        let texts = vec![text.to_owned()];
        async move {
            EmbeddingModel::embed_texts(self, texts)
                .await?
                .pop()
                .ok_or_else(|| EmbeddingError::ResponseError("no embedding is returned".to_owned()))
        }
    }
}

/// Dyn-compatible version of [`EmbeddingModel`].
pub trait EmbeddingModelDyn: Send + Sync {
    /// Number of dimensions of the vectors.
    fn ndims(&self) -> usize;

    /// Embeds the texts.
    fn embed_texts(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Embedding>, EmbeddingError>>;
}

impl<T: EmbeddingModel + 'static> EmbeddingModelDyn for T {
    fn ndims(&self) -> usize {
        EmbeddingModel::ndims(self)
    }

    fn embed_texts(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Embedding>, EmbeddingError>> {
        Box::pin(EmbeddingModel::embed_texts(self, texts))
    }
}

/// Wraps an embedding model in a cloneable, type-erased handle.
#[derive(Clone)]
pub struct EmbeddingModelHandle {
    inner: Arc<dyn EmbeddingModelDyn>,
}

impl EmbeddingModelHandle {
    /// Creates a new instance.
    #[inline]
    pub fn new(model: impl EmbeddingModel + 'static) -> Self {
        Self {
            inner: Arc::new(model),
        }
    }
}

impl std::fmt::Debug for EmbeddingModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingModelHandle")
            .field("ndims", &self.inner.ndims())
            .finish()
    }
}

impl EmbeddingModel for EmbeddingModelHandle {
    fn ndims(&self) -> usize {
        self.inner.ndims()
    }

    fn embed_texts(
        &self,
        texts: Vec<String>,
    ) -> impl Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send {
        self.inner.embed_texts(texts)
    }
}
