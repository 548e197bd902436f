//! Vector store gateway.
//!
//! [`VectorStore`] is the narrow surface the pipeline consumes: similarity
//! search, insert, per-user history and a health check.
//! [`InMemoryVectorStore`] implements it with exact cosine similarity.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use twin_common::{Result, TwinError};

use crate::rest_store::RestVectorStore;
use crate::types::{
    Memory, MemoryType, RetrievedMemory, StoreBackend, StoreConfig, Subject, Visibility,
};

/// Filters applied to a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    /// Minimum similarity in `[0, 1]`
    pub threshold: f32,
    pub limit: usize,
    /// Access level; memories above it are excluded
    pub visibility: Option<Visibility>,
    pub memory_type: Option<MemoryType>,
    pub subject: Option<Subject>,
    pub user_id: Option<String>,
}

impl SearchFilter {
    pub fn new(threshold: f32, limit: usize) -> Self {
        Self {
            threshold,
            limit,
            visibility: None,
            memory_type: None,
            subject: None,
            user_id: None,
        }
    }

    /// Public persona memories only.
    pub fn public_persona(threshold: f32, limit: usize) -> Self {
        Self {
            visibility: Some(Visibility::Public),
            subject: Some(Subject::Persona),
            ..Self::new(threshold, limit)
        }
    }

    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn matches(&self, memory: &Memory) -> bool {
        if let Some(access) = self.visibility {
            if !memory.visibility.visible_at(access) {
                return false;
            }
        }
        if let Some(mt) = self.memory_type {
            if memory.memory_type != mt {
                return false;
            }
        }
        if let Some(subject) = self.subject {
            if memory.subject != subject {
                return false;
            }
        }
        if let Some(ref user_id) = self.user_id {
            if memory.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Memories most similar to `vector`, ordered by descending similarity.
    async fn similarity_search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedMemory>>;

    /// Validate and persist a memory.
    async fn insert(&self, memory: Memory) -> Result<Memory>;

    /// A user's most recent memories of one type, newest first.
    async fn recent_for_user(
        &self,
        user_id: &str,
        memory_type: MemoryType,
        limit: usize,
    ) -> Result<Vec<Memory>>;

    async fn health_check(&self) -> bool;
}

/// Cosine similarity clamped to `[0, 1]`. Mismatched or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Process-local store. Suitable for development and tests.
#[derive(Default)]
pub struct InMemoryVectorStore {
    memories: Arc<RwLock<Vec<Memory>>>,
    dimension: Option<usize>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject inserts whose embedding length differs from `dimension`.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            memories: Arc::default(),
            dimension: Some(dimension),
        }
    }

    pub async fn len(&self) -> usize {
        self.memories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memories.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<Memory> {
        self.memories.read().await.clone()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn similarity_search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedMemory>> {
        let memories = self.memories.read().await;
        let mut results: Vec<RetrievedMemory> = memories
            .iter()
            .filter(|m| filter.matches(m))
            .filter_map(|m| {
                let score = cosine_similarity(vector, &m.embedding);
                (score >= filter.threshold).then(|| RetrievedMemory::from_memory(m, score))
            })
            .collect();

        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(filter.limit);

        debug!(
            candidates = memories.len(),
            returned = results.len(),
            threshold = filter.threshold,
            "Similarity search"
        );

        Ok(results)
    }

    async fn insert(&self, memory: Memory) -> Result<Memory> {
        memory.validate()?;
        if let Some(dim) = self.dimension {
            if memory.embedding.len() != dim {
                return Err(TwinError::Store(format!(
                    "embedding has {} dimensions, store expects {}",
                    memory.embedding.len(),
                    dim
                )));
            }
        }

        debug!(
            memory_id = %memory.id,
            memory_type = ?memory.memory_type,
            "Inserting memory"
        );

        self.memories.write().await.push(memory.clone());
        Ok(memory)
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        memory_type: MemoryType,
        limit: usize,
    ) -> Result<Vec<Memory>> {
        let memories = self.memories.read().await;
        let mut results: Vec<Memory> = memories
            .iter()
            .filter(|m| m.memory_type == memory_type && m.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results.truncate(limit);
        Ok(results)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Build the configured vector store.
pub fn build_vector_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
        StoreBackend::Rest => Ok(Arc::new(RestVectorStore::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona(content: &str, embedding: Vec<f32>) -> Memory {
        Memory::persona(content, MemoryType::Fact).with_embedding(embedding)
    }

    #[test]
    fn cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn search_orders_by_similarity_and_limits() {
        let store = InMemoryVectorStore::new();
        store.insert(persona("far", vec![0.2, 1.0])).await.unwrap();
        store.insert(persona("near", vec![1.0, 0.1])).await.unwrap();
        store.insert(persona("exact", vec![1.0, 0.0])).await.unwrap();

        let results = store
            .similarity_search(&[1.0, 0.0], &SearchFilter::new(0.0, 2))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "exact");
        assert_eq!(results[1].content, "near");
    }

    #[tokio::test]
    async fn search_applies_threshold() {
        let store = InMemoryVectorStore::new();
        store.insert(persona("orthogonal", vec![0.0, 1.0])).await.unwrap();
        let results = store
            .similarity_search(&[1.0, 0.0], &SearchFilter::new(0.1, 10))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn public_persona_filter_excludes_private_and_user_memories() {
        let store = InMemoryVectorStore::new();
        store.insert(persona("public", vec![1.0])).await.unwrap();
        store
            .insert(persona("secret", vec![1.0]).with_visibility(Visibility::Private))
            .await
            .unwrap();
        store
            .insert(Memory::user_input("user said hi", "u1").with_embedding(vec![1.0]))
            .await
            .unwrap();

        let results = store
            .similarity_search(&[1.0], &SearchFilter::public_persona(0.0, 10))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "public");
    }

    #[tokio::test]
    async fn type_filter_narrows_results() {
        let store = InMemoryVectorStore::new();
        store.insert(persona("a fact", vec![1.0])).await.unwrap();
        store
            .insert(Memory::persona("likes jazz", MemoryType::Preference).with_embedding(vec![1.0]))
            .await
            .unwrap();

        let filter = SearchFilter::public_persona(0.0, 10).with_type(MemoryType::Preference);
        let results = store.similarity_search(&[1.0], &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "likes jazz");
    }

    #[tokio::test]
    async fn insert_validates_memory() {
        let store = InMemoryVectorStore::new();
        let err = store
            .insert(Memory::persona("no vector", MemoryType::Fact))
            .await
            .unwrap_err();
        assert!(matches!(err, TwinError::Validation(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn insert_checks_dimension() {
        let store = InMemoryVectorStore::with_dimension(3);
        assert!(store.insert(persona("short", vec![1.0])).await.is_err());
        assert!(store.insert(persona("ok", vec![1.0, 0.0, 0.0])).await.is_ok());
    }

    #[tokio::test]
    async fn recent_for_user_is_newest_first() {
        let store = InMemoryVectorStore::new();
        let mut older = Memory::user_input("first", "u1").with_embedding(vec![1.0]);
        older.created_at -= chrono::Duration::minutes(5);
        store.insert(older).await.unwrap();
        store
            .insert(Memory::user_input("second", "u1").with_embedding(vec![1.0]))
            .await
            .unwrap();
        store
            .insert(Memory::user_input("other user", "u2").with_embedding(vec![1.0]))
            .await
            .unwrap();

        let recent = store
            .recent_for_user("u1", MemoryType::UserInput, 50)
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "second");
    }

    #[tokio::test]
    async fn builds_memory_backend_by_default() {
        let store = build_vector_store(&StoreConfig::default()).unwrap();
        assert!(store.health_check().await);
    }

    #[test]
    fn rest_backend_requires_url() {
        let config = StoreConfig {
            backend: StoreBackend::Rest,
            ..StoreConfig::default()
        };
        assert!(matches!(
            build_vector_store(&config),
            Err(TwinError::Config(_))
        ));
    }
}
