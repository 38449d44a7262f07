//! Semantic memory
//!
//! Text is embedded on save and on query; search ranks stored entries of one
//! collection by cosine similarity. The only store shipped here is the
//! in-process [`VolatileMemoryStore`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Interface for embeddings providers
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Generate embedding vector for text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
impl<T: Embeddings + ?Sized> Embeddings for Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Caller supplied id
    pub id: String,
    /// Stored text
    pub text: String,
    /// Cosine similarity to the query, in `[-1, 1]`
    pub relevance: f32,
}

/// Save and search text by meaning
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Save `text` under `id` in `collection`, replacing any previous entry
    async fn save(&self, collection: &str, id: &str, text: &str) -> Result<()>;

    /// Up to `limit` entries of `collection` ordered by descending relevance.
    /// An unknown collection yields no results.
    async fn search(&self, collection: &str, query: &str, limit: usize) -> Result<Vec<MemoryRecord>>;
}

#[derive(Debug, Clone)]
struct Entry {
    text: String,
    embedding: Vec<f32>,
}

/// In-process vector store: collection -> id -> (text, embedding)
#[derive(Debug, Default)]
pub struct VolatileMemoryStore {
    collections: DashMap<String, HashMap<String, Entry>>,
}

impl VolatileMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry
    pub fn upsert(&self, collection: &str, id: &str, text: &str, embedding: Vec<f32>) {
        self.collections.entry(collection.to_string()).or_default().insert(
            id.to_string(),
            Entry {
                text: text.to_string(),
                embedding,
            },
        );
    }

    /// Remove an entry; returns whether it existed
    pub fn remove(&self, collection: &str, id: &str) -> bool {
        self.collections
            .get_mut(collection)
            .map(|mut c| c.remove(id).is_some())
            .unwrap_or(false)
    }

    /// Number of entries in `collection`
    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map(|c| c.len()).unwrap_or(0)
    }

    /// Collection names, sorted
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Nearest entries to `query`, best first; entries of another dimension are skipped
    pub fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        min_relevance: f32,
    ) -> Vec<MemoryRecord> {
        let Some(entries) = self.collections.get(collection) else {
            return Vec::new();
        };

        let mut hits: Vec<MemoryRecord> = entries
            .iter()
            .filter_map(|(id, entry)| {
                let relevance = cosine_similarity(query, &entry.embedding)?;
                (relevance >= min_relevance).then(|| MemoryRecord {
                    id: id.clone(),
                    text: entry.text.clone(),
                    relevance,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        hits
    }
}

/// Cosine similarity; `None` when lengths differ or either vector is empty
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a * norm_b))
}

/// Embeddings + [`VolatileMemoryStore`]
pub struct SemanticMemory {
    embeddings: Arc<dyn Embeddings>,
    store: VolatileMemoryStore,
    min_relevance: f32,
}

impl SemanticMemory {
    /// Create an empty memory with no relevance floor
    pub fn new(embeddings: Arc<dyn Embeddings>) -> Self {
        Self {
            embeddings,
            store: VolatileMemoryStore::new(),
            min_relevance: f32::MIN,
        }
    }

    /// Drop hits below `min_relevance`
    pub fn with_min_relevance(mut self, min_relevance: f32) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    /// Underlying store
    pub fn store(&self) -> &VolatileMemoryStore {
        &self.store
    }
}

#[async_trait]
impl MemoryStore for SemanticMemory {
    async fn save(&self, collection: &str, id: &str, text: &str) -> Result<()> {
        let embedding = self.embeddings.embed(text).await?;
        if embedding.is_empty() {
            return Err(Error::backend(format!("empty embedding for memory '{}'", id)));
        }
        self.store.upsert(collection, id, text, embedding);
        debug!(collection, id, "Saved memory");
        Ok(())
    }

    async fn search(&self, collection: &str, query: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        if limit == 0 || self.store.count(collection) == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embeddings.embed(query).await?;
        let hits = self.store.nearest(collection, &embedding, limit, self.min_relevance);
        debug!(collection, hits = hits.len(), "Memory search");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts occurrences of a few keywords
    struct KeywordEmbeddings;

    const VOCABULARY: [&str; 4] = ["budapest", "family", "pet", "job"];

    #[async_trait]
    impl Embeddings for KeywordEmbeddings {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(VOCABULARY
                .iter()
                .map(|word| lower.matches(word).count() as f32 + 0.01)
                .collect())
        }
    }

    fn memory() -> SemanticMemory {
        SemanticMemory::new(Arc::new(KeywordEmbeddings))
    }

    #[tokio::test]
    async fn test_search_orders_by_relevance() {
        let memory = memory();
        memory.save("aboutMe", "info1", "My name is Andrea, my job is engineering").await.expect("save");
        memory.save("aboutMe", "info2", "I currently live in Budapest").await.expect("save");
        memory.save("aboutMe", "info3", "My family is from Budapest, Budapest is home").await.expect("save");
        memory.save("aboutMe", "info4", "I have a pet").await.expect("save");

        let hits = memory.search("aboutMe", "where is my family from? budapest", 2).await.expect("search");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "info3");
        assert!(hits[0].relevance >= hits[1].relevance);
    }

    #[tokio::test]
    async fn test_save_same_id_overwrites() {
        let memory = memory();
        memory.save("c", "a", "pet").await.expect("save");
        memory.save("c", "a", "job").await.expect("save");
        assert_eq!(memory.store().count("c"), 1);

        let hits = memory.search("c", "job", 5).await.expect("search");
        assert_eq!(hits[0].text, "job");
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let memory = memory();
        assert!(memory.search("nothing", "pet", 3).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn test_min_relevance_filters() {
        let memory = memory().with_min_relevance(0.9);
        memory.save("c", "pet", "pet").await.expect("save");
        memory.save("c", "job", "job").await.expect("save");
        let hits = memory.search("c", "pet", 5).await.expect("search");
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["pet"]);
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }
}
