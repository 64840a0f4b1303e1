#![doc = include_str!("../README.md")]
#![doc(html_favicon_url = "https://zino.cc/assets/zino-logo.png")]
#![doc(html_logo_url = "https://zino.cc/assets/zino-logo.svg")]

pub mod completion;
pub mod embeddings;
pub mod extension;
pub mod json_utils;
pub mod providers;
pub mod structured;
pub mod vector_store;

pub use completion::{
    CompletionError, CompletionModel, CompletionModelDyn, CompletionModelHandle,
    CompletionRequest, Message,
};
pub use embeddings::{Embedding, EmbeddingError, EmbeddingModel, EmbeddingModelHandle};
pub use structured::{ExtractionError, JsonMode, StructuredGenerator};
