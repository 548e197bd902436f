//! Memory retrieval for a chat turn.
//!
//! Retrieval never fails a turn: embedding or store errors are logged and
//! degrade to an empty memory list.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};
use twin_common::Result;

use crate::embedding::EmbeddingClient;
use crate::store::{SearchFilter, VectorStore};
use crate::types::{Memory, MemoryType, RetrievedMemory, UserMemoryContext};

/// Default number of `user_input` memories read for user context.
pub const USER_HISTORY_LIMIT: usize = 50;

/// How many memories to fetch and how similar they must be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPolicy {
    pub memory_count: usize,
    pub similarity_threshold: f32,
}

impl RetrievalPolicy {
    pub fn new(memory_count: usize, similarity_threshold: f32) -> Self {
        Self {
            memory_count,
            similarity_threshold,
        }
    }

    pub fn none() -> Self {
        Self::new(0, 1.0)
    }
}

/// Embeds questions and queries the vector store on behalf of the pipeline.
pub struct MemoryRetriever {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    user_history_limit: usize,
}

impl MemoryRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            user_history_limit: USER_HISTORY_LIMIT,
        }
    }

    pub fn with_user_history_limit(mut self, limit: usize) -> Self {
        self.user_history_limit = limit;
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Public persona memories relevant to `message`, most similar first.
    ///
    /// A policy with `memory_count == 0` returns immediately without
    /// calling the embedding service.
    #[instrument(skip(self, message), fields(limit = policy.memory_count))]
    pub async fn retrieve(&self, message: &str, policy: &RetrievalPolicy) -> Vec<RetrievedMemory> {
        if policy.memory_count == 0 {
            return Vec::new();
        }

        let embedding = match self.embedder.embed(message).await {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Embedding failed, continuing without memories");
                return Vec::new();
            }
        };

        let filter = SearchFilter::public_persona(policy.similarity_threshold, policy.memory_count);
        match self.store.similarity_search(&embedding.vector, &filter).await {
            Ok(memories) => {
                debug!(count = memories.len(), "Retrieved memories");
                memories
            }
            Err(e) => {
                warn!(error = %e, "Similarity search failed, continuing without memories");
                Vec::new()
            }
        }
    }

    /// Aggregate a user's recent `user_input` memories.
    ///
    /// Returns `None` when the user has no history or the store cannot be
    /// read; callers treat both as a stranger.
    #[instrument(skip(self))]
    pub async fn get_user_context(&self, user_id: &str) -> Option<UserMemoryContext> {
        let history = match self
            .store
            .recent_for_user(user_id, MemoryType::UserInput, self.user_history_limit)
            .await
        {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "Failed to load user history");
                return None;
            }
        };

        if history.is_empty() {
            return None;
        }

        let mut seen = HashSet::new();
        let preferences: Vec<String> = history
            .iter()
            .flat_map(|m| m.tags.iter())
            .filter(|tag| seen.insert(tag.as_str()))
            .cloned()
            .collect();

        Some(UserMemoryContext::from_interactions(
            user_id,
            preferences,
            history.len(),
        ))
    }

    /// Embed a memory's framed content and persist it.
    pub async fn remember(&self, memory: Memory) -> Result<Memory> {
        let embedding = self.embedder.embed(&memory.embedding_text()).await?;
        self.store.insert(memory.with_embedding(embedding.vector)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedding;
    use crate::store::InMemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use twin_common::{Relationship, TwinError};

    /// Two-dimensional "embedding": music-ness and food-ness.
    struct KeywordEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl EmbeddingClient for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TwinError::Embedding("503 Service Unavailable".into()));
            }
            let lower = text.to_lowercase();
            let music = if lower.contains("music") || lower.contains("jazz") { 1.0 } else { 0.0 };
            let food = if lower.contains("food") || lower.contains("ramen") { 1.0 } else { 0.0 };
            Ok(Embedding {
                vector: vec![music, food, 0.1],
                model_id: "keyword".into(),
                approx_tokens: 1,
            })
        }

        fn model_id(&self) -> &str {
            "keyword"
        }
    }

    async fn seeded_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .insert(
                Memory::persona("I love late night jazz", MemoryType::Preference)
                    .with_embedding(vec![1.0, 0.0, 0.1]),
            )
            .await
            .unwrap();
        store
            .insert(
                Memory::persona("Best ramen I ever had was in Osaka", MemoryType::Diary)
                    .with_embedding(vec![0.0, 1.0, 0.1]),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn zero_count_skips_embedding() {
        let embedder = Arc::new(KeywordEmbedder::new());
        let retriever = MemoryRetriever::new(embedder.clone(), seeded_store().await);

        let memories = retriever.retrieve("hey there", &RetrievalPolicy::none()).await;
        assert!(memories.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retrieves_by_similarity() {
        let retriever =
            MemoryRetriever::new(Arc::new(KeywordEmbedder::new()), seeded_store().await);

        let memories = retriever
            .retrieve("what music do you like", &RetrievalPolicy::new(5, 0.5))
            .await;
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].content, "I love late night jazz");
    }

    #[tokio::test]
    async fn embedding_failure_degrades_to_empty() {
        let embedder = Arc::new(KeywordEmbedder {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let retriever = MemoryRetriever::new(embedder, seeded_store().await);
        let memories = retriever
            .retrieve("tell me about music", &RetrievalPolicy::new(5, 0.0))
            .await;
        assert!(memories.is_empty());
    }

    #[tokio::test]
    async fn user_context_absent_for_new_user() {
        let retriever =
            MemoryRetriever::new(Arc::new(KeywordEmbedder::new()), seeded_store().await);
        assert!(retriever.get_user_context("nobody").await.is_none());
    }

    #[tokio::test]
    async fn user_context_aggregates_history() {
        let store = seeded_store().await;
        let retriever = MemoryRetriever::new(Arc::new(KeywordEmbedder::new()), store.clone());
        for i in 0..6 {
            retriever
                .remember(
                    Memory::user_input(format!("message number {i} about music"), "u1")
                        .with_tags(["music", "chat"]),
                )
                .await
                .unwrap();
        }

        let context = retriever.get_user_context("u1").await.unwrap();
        assert_eq!(context.interaction_count, 6);
        assert_eq!(context.relationship, Relationship::Acquaintance);
        assert_eq!(context.preferences, vec!["music", "chat"]);
    }

    #[tokio::test]
    async fn user_history_is_capped() {
        let store = seeded_store().await;
        let retriever = MemoryRetriever::new(Arc::new(KeywordEmbedder::new()), store)
            .with_user_history_limit(3);
        for i in 0..5 {
            retriever
                .remember(Memory::user_input(format!("hello again {i}"), "u2"))
                .await
                .unwrap();
        }
        let context = retriever.get_user_context("u2").await.unwrap();
        assert_eq!(context.interaction_count, 3);
    }
}
