//! Text embeddings and vector distances.

mod distance;
mod embedding;

pub use distance::VectorDistance;
pub use embedding::{Embedding, EmbeddingError, EmbeddingModel, EmbeddingModelDyn, EmbeddingModelHandle};
