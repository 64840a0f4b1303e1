use super::{Client, error_message};
use crate::embeddings::{self, Embedding, EmbeddingError};
use serde::Deserialize;
use serde_json::json;

/// Embedding model of an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct EmbeddingModel {
    client: Client,
    model: String,
    ndims: usize,
}

impl EmbeddingModel {
    /// Creates a new instance.
    pub fn new(client: Client, model: &str, ndims: usize) -> Self {
        Self {
            client,
            model: model.to_owned(),
            ndims,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
    #[serde(default)]
    index: usize,
}

impl embeddings::EmbeddingModel for EmbeddingModel {
    fn ndims(&self) -> usize {
        self.ndims
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = json!({
            "model": self.model,
            "input": texts,
        });
        if self.ndims > 0 {
            body["dimensions"] = self.ndims.into();
        }

        let response = self.client.post("embeddings").json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(EmbeddingError::ProviderError(error_message(status, &text)));
        }

        let mut response = response.json::<EmbeddingResponse>().await?;
        if response.data.len() != texts.len() {
            return Err(EmbeddingError::ResponseError(format!(
                "expected {} embeddings, found {}",
                texts.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|data| data.index);
        Ok(texts
            .into_iter()
            .zip(response.data)
            .map(|(document, data)| Embedding {
                document,
                vec: data.embedding,
            })
            .collect())
    }
}
