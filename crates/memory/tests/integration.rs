//! Integration tests for the memory crate.
//!
//! These run the retriever against the in-process store with a
//! deterministic embedder, covering store/search round trips and the
//! visibility rules applied during retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use twin_common::{Relationship, Result};
use twin_memory::{
    Embedding, EmbeddingClient, InMemoryVectorStore, Memory, MemoryRetriever, MemoryType,
    RetrievalPolicy, SearchFilter, Subject, VectorStore, Visibility,
};

/// Hashes words into a small fixed-size vector.
struct HashingEmbedder;

#[async_trait]
impl EmbeddingClient for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        twin_memory::embedding::validate_embed_input(text)?;
        let mut vector = vec![0.0f32; 16];
        for word in text.to_lowercase().split_whitespace() {
            let bucket = word.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31) + b as usize) % 16;
            vector[bucket] += 1.0;
        }
        Ok(Embedding {
            vector,
            model_id: "hashing".to_string(),
            approx_tokens: 1,
        })
    }

    fn model_id(&self) -> &str {
        "hashing"
    }
}

#[tokio::test]
async fn test_round_trip_exact_vector() {
    let store = InMemoryVectorStore::with_dimension(4);
    let vector = vec![0.1, 0.7, 0.2, 0.4];
    store
        .insert(Memory::persona("a decoy", MemoryType::Fact).with_embedding(vec![0.9, 0.0, 0.1, 0.0]))
        .await
        .unwrap();
    let stored = store
        .insert(
            Memory::persona("I grew up near the sea", MemoryType::Fact)
                .with_embedding(vector.clone()),
        )
        .await
        .unwrap();

    let results = store
        .similarity_search(&vector, &SearchFilter::new(0.0, 10))
        .await
        .unwrap();

    assert_eq!(results[0].id, stored.id);
    assert!((results[0].relevance_score - 1.0).abs() < 1e-5);
    assert!(results
        .windows(2)
        .all(|w| w[0].relevance_score >= w[1].relevance_score));
}

#[tokio::test]
async fn test_retriever_only_returns_public_persona_memories() {
    let store = Arc::new(InMemoryVectorStore::new());
    let retriever = MemoryRetriever::new(Arc::new(HashingEmbedder), store.clone());

    retriever
        .remember(Memory::persona("jazz records on sunday", MemoryType::Preference))
        .await
        .unwrap();
    retriever
        .remember(
            Memory::persona("jazz records with my sister", MemoryType::Diary)
                .with_visibility(Visibility::CloseFriends),
        )
        .await
        .unwrap();
    retriever
        .remember(Memory::user_input("jazz records are great", "u1"))
        .await
        .unwrap();

    let memories = retriever
        .retrieve("jazz records", &RetrievalPolicy::new(10, 0.0))
        .await;

    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].content, "jazz records on sunday");

    let all = store.all().await;
    assert_eq!(all.len(), 3);
    assert!(all
        .iter()
        .any(|m| m.subject == Subject::User && m.user_id.as_deref() == Some("u1")));
}

#[tokio::test]
async fn test_user_context_relationship_tiers() {
    let store = Arc::new(InMemoryVectorStore::new());
    let retriever = MemoryRetriever::new(Arc::new(HashingEmbedder), store);

    for i in 0..20 {
        retriever
            .remember(Memory::user_input(format!("chat turn {i}"), "regular"))
            .await
            .unwrap();
    }

    let context = retriever.get_user_context("regular").await.unwrap();
    assert_eq!(context.interaction_count, 20);
    assert_eq!(context.relationship, Relationship::Friend);
}

#[tokio::test]
async fn test_remember_rejects_invalid_content() {
    let retriever = MemoryRetriever::new(
        Arc::new(HashingEmbedder),
        Arc::new(InMemoryVectorStore::new()),
    );
    let too_long = "x".repeat(twin_memory::MAX_CONTENT_CHARS + 1);
    assert!(retriever
        .remember(Memory::persona(too_long, MemoryType::Fact))
        .await
        .is_err());
}
