//! In-memory implementation of a vector store.

use super::{VectorStoreError, VectorStoreIndex};
use crate::embeddings::{Embedding, EmbeddingModel, VectorDistance};
use ordered_float::OrderedFloat;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
};

/// A vector store keeping the documents and their embeddings in a `HashMap`
/// keyed by the document id.
#[derive(Debug, Clone)]
pub struct InMemoryVectorStore<D> {
    embeddings: HashMap<String, (D, Embedding)>,
}

impl<D> Default for InMemoryVectorStore<D> {
    fn default() -> Self {
        Self {
            embeddings: HashMap::new(),
        }
    }
}

impl<D: Serialize> InMemoryVectorStore<D> {
    /// Creates a new instance from documents and their embeddings with ids.
    pub fn from_documents_with_ids(
        documents: impl IntoIterator<Item = (impl ToString, D, Embedding)>,
    ) -> Self {
        let mut store = Self::default();
        store.add_documents_with_ids(documents);
        store
    }

    /// Adds documents and their embeddings with ids.
    /// An existing document with the same id is replaced.
    pub fn add_documents_with_ids(
        &mut self,
        documents: impl IntoIterator<Item = (impl ToString, D, Embedding)>,
    ) {
        for (id, doc, embedding) in documents {
            self.embeddings.insert(id.to_string(), (doc, embedding));
        }
    }

    /// Gets the document by its id and deserializes it into the given type.
    pub fn get_document<T: DeserializeOwned>(
        &self,
        id: &str,
    ) -> Result<Option<T>, VectorStoreError> {
        self.embeddings
            .get(id)
            .map(|(doc, _)| serde_json::to_value(doc).and_then(serde_json::from_value))
            .transpose()
            .map_err(VectorStoreError::from)
    }

    /// Returns the `n` documents most similar to the query embedding,
    /// sorted by descending cosine similarity.
    fn vector_search(&self, query_embedding: &Embedding, n: usize) -> Vec<RankingItem<'_, D>> {
        let mut docs = BinaryHeap::with_capacity(n + 1);
        for (id, (doc, embedding)) in self.embeddings.iter() {
            let similarity = embedding.cosine_similarity(query_embedding, false);
            docs.push(Reverse(RankingItem(OrderedFloat(similarity), id, doc)));
            if docs.len() > n {
                docs.pop();
            }
        }

        let ranking = docs
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(item)| item)
            .collect::<Vec<_>>();
        tracing::debug!(
            "selected documents: {}",
            ranking
                .iter()
                .map(|RankingItem(similarity, id, _)| format!("{id} ({similarity:.4})"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        ranking
    }

    /// Creates an index with the embedding model used to embed queries.
    #[inline]
    pub fn index<M: EmbeddingModel>(self, model: M) -> InMemoryVectorIndex<M, D> {
        InMemoryVectorIndex { model, store: self }
    }
}

impl<D> InMemoryVectorStore<D> {
    /// Returns the number of documents.
    #[inline]
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if the store has no documents.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// `RankingItem(similarity, document id, document)`.
/// Ties are broken by the id so that the ranking is deterministic.
struct RankingItem<'a, D>(OrderedFloat<f64>, &'a String, &'a D);

impl<D> PartialEq for RankingItem<'_, D> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<D> Eq for RankingItem<'_, D> {}

impl<D> Ord for RankingItem<'_, D> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0).then_with(|| other.1.cmp(self.1))
    }
}

impl<D> PartialOrd for RankingItem<'_, D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A vector store paired with an embedding model.
#[derive(Debug, Clone)]
pub struct InMemoryVectorIndex<M, D> {
    model: M,
    store: InMemoryVectorStore<D>,
}

impl<M, D> InMemoryVectorIndex<M, D> {
    /// Returns a reference to the store.
    #[inline]
    pub fn store(&self) -> &InMemoryVectorStore<D> {
        &self.store
    }
}

impl<M: EmbeddingModel, D: Serialize + Send + Sync> VectorStoreIndex for InMemoryVectorIndex<M, D> {
    async fn top_n<T: DeserializeOwned + Send>(
        &self,
        query: &str,
        n: usize,
    ) -> Result<Vec<(f64, String, T)>, VectorStoreError> {
        let query_embedding = EmbeddingModel::embed_text(&self.model, query).await?;
        self.store
            .vector_search(&query_embedding, n)
            .into_iter()
            .map(|RankingItem(similarity, id, doc)| -> Result<_, VectorStoreError> {
                let doc = serde_json::from_value(serde_json::to_value(doc)?)?;
                Ok((similarity.0, id.clone(), doc))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingError;

    #[derive(Clone)]
    struct AxisModel;

    impl EmbeddingModel for AxisModel {
        fn ndims(&self) -> usize {
            2
        }

        async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Embedding>, EmbeddingError> {
            Ok(texts
                .into_iter()
                .map(|text| {
                    let vec = if text.contains("north") {
                        vec![0.0, 1.0]
                    } else {
                        vec![1.0, 0.0]
                    };
                    Embedding {
                        document: text,
                        vec,
                    }
                })
                .collect())
        }
    }

    fn embedding(document: &str, vec: Vec<f64>) -> Embedding {
        Embedding {
            document: document.to_owned(),
            vec,
        }
    }

    fn cities() -> InMemoryVectorStore<String> {
        InMemoryVectorStore::from_documents_with_ids(vec![
            ("oslo", "Oslo".to_owned(), embedding("Oslo", vec![0.1, 0.9])),
            ("cairo", "Cairo".to_owned(), embedding("Cairo", vec![0.9, 0.1])),
            ("paris", "Paris".to_owned(), embedding("Paris", vec![0.5, 0.6])),
        ])
    }

    #[test]
    fn it_looks_up_documents() {
        let mut store = cities();
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.get_document::<String>("cairo").unwrap().as_deref(),
            Some("Cairo")
        );
        assert!(store.get_document::<String>("lima").unwrap().is_none());

        store.add_documents_with_ids(vec![(
            "cairo",
            "Al-Qahira".to_owned(),
            embedding("Al-Qahira", vec![1.0, 0.0]),
        )]);
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.get_document::<String>("cairo").unwrap().as_deref(),
            Some("Al-Qahira")
        );
    }

    #[tokio::test]
    async fn it_ranks_by_descending_similarity() {
        let index = cities().index(AxisModel);
        let results = index.top_n::<String>("far north", 2).await.unwrap();
        let ids = results.iter().map(|(_, id, _)| id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["oslo", "paris"]);
        assert!(results[0].0 > results[1].0);
        assert_eq!(results[0].2, "Oslo");

        let results = index.top_n::<String>("south", 10).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].1, "cairo");
        assert_eq!(results[2].1, "oslo");
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let index = InMemoryVectorStore::<String>::default().index(AxisModel);
        assert!(index.store().is_empty());
        assert!(index.top_n::<String>("north", 3).await.unwrap().is_empty());
    }
}
