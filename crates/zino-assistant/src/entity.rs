//! Resolution of free-text mentions to the canonical entities of parameters.

use crate::{
    AssistantError,
    function::{Entity, EntityConfig, Function},
    infilling::ArgumentInfiller,
    message::ChatMessage,
};
use futures::future;
use serde_json::{Map, Value};
use std::collections::HashMap;
use zino_ai::{
    EmbeddingModel, EmbeddingModelHandle,
    vector_store::{InMemoryVectorStore, VectorStoreError, VectorStoreIndex},
};

/// Default number of entities kept for each parameter.
pub const DEFAULT_TOP_K: usize = 3;

/// Finds the entities most similar to the preliminary arguments of a function.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    infiller: ArgumentInfiller,
    embedding: EmbeddingModelHandle,
    top_k: usize,
}

impl EntityResolver {
    /// Creates a new instance.
    pub fn new(infiller: ArgumentInfiller, embedding: EmbeddingModelHandle) -> Self {
        Self {
            infiller,
            embedding,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Sets the number of entities kept for each parameter.
    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Resolves the entities of every configured parameter.
    ///
    /// Preliminary values are generated without any entity restriction. When no value
    /// is generated for a parameter, the query itself is used for the search.
    pub async fn resolve(
        &self,
        function: &dyn Function,
        query: &str,
        history: &[ChatMessage],
    ) -> Result<HashMap<String, Vec<Entity>>, AssistantError> {
        let configs = function
            .entity_configs()
            .await
            .into_iter()
            .filter(|(_, config)| !config.entities.is_empty())
            .collect::<Vec<_>>();
        if configs.is_empty() {
            return Ok(HashMap::new());
        }

        let preliminary = self
            .infiller
            .generate_arguments(function, history, &HashMap::new())
            .await?;
        let resolved = future::try_join_all(configs.iter().map(|(param, config)| {
            let query = preliminary_query(&preliminary, param).unwrap_or_else(|| query.to_owned());
            async move {
                let entities = self.search(config, &query).await?;
                tracing::info!(
                    param = %param,
                    query = %query,
                    entities = ?entities.iter().map(|e| e.identity.as_str()).collect::<Vec<_>>(),
                    "entities are resolved"
                );
                Ok::<_, VectorStoreError>((param.clone(), entities))
            }
        }))
        .await?;
        Ok(resolved.into_iter().collect())
    }

    async fn search(
        &self,
        config: &EntityConfig,
        query: &str,
    ) -> Result<Vec<Entity>, VectorStoreError> {
        let documents = config
            .entities
            .iter()
            .map(|entity| entity.document())
            .collect::<Vec<_>>();
        let embeddings = EmbeddingModel::embed_texts(&self.embedding, documents).await?;

        // Zero-padded ids keep ties in declaration order.
        let width = config.entities.len().to_string().len();
        let store = InMemoryVectorStore::from_documents_with_ids(
            config
                .entities
                .iter()
                .cloned()
                .zip(embeddings)
                .enumerate()
                .map(|(index, (entity, embedding))| {
                    (format!("{index:0width$}"), entity, embedding)
                }),
        );
        let index = store.index(self.embedding.clone());
        let hits = index.top_n::<Entity>(query, self.top_k).await?;
        Ok(hits.into_iter().map(|(_, _, entity)| entity).collect())
    }
}

fn preliminary_query(arguments: &Map<String, Value>, param: &str) -> Option<String> {
    match arguments.get(param)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        value => Some(value.to_string()),
    }
}
