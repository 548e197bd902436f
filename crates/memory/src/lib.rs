//! Memory model, embeddings and vector store access for the persona twin.
//!
//! # Layout
//!
//! - [`types`]: the persisted [`Memory`] record and its projections
//! - [`embedding`]: hosted embedding clients behind [`EmbeddingClient`]
//! - [`store`]: the [`VectorStore`] gateway and an in-process implementation
//! - [`rest_store`]: a PostgREST/pgvector implementation
//! - [`retrieval`]: per-turn retrieval and user context aggregation
//!
//! ```text
//!   message ──► EmbeddingClient ──► vector ──► VectorStore::similarity_search
//!                                                   │
//!                                                   ▼
//!                                          Vec<RetrievedMemory>
//! ```

pub mod embedding;
pub mod rest_store;
pub mod retrieval;
pub mod store;
pub mod types;

pub use embedding::{
    build_embedding_client, Embedding, EmbeddingClient, EmbeddingConfig, EmbeddingProvider,
    GeminiEmbeddingClient, OpenAiEmbeddingClient, MAX_EMBED_CHARS,
};
pub use rest_store::RestVectorStore;
pub use retrieval::{MemoryRetriever, RetrievalPolicy, USER_HISTORY_LIMIT};
pub use store::{
    build_vector_store, cosine_similarity, InMemoryVectorStore, SearchFilter, VectorStore,
};
pub use types::{
    normalize_tags, Memory, MemoryType, RetrievedMemory, StoreBackend, StoreConfig, Subject,
    UserMemoryContext, Visibility, MAX_CONTENT_CHARS, MAX_TAGS, MAX_TAG_CHARS,
};
