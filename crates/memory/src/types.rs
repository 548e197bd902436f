//! Memory types and invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use twin_common::{Relationship, Result, TwinError};

/// Maximum memory content length, in characters.
pub const MAX_CONTENT_CHARS: usize = 2000;
/// Maximum number of tags on one memory.
pub const MAX_TAGS: usize = 10;
/// Maximum length of a single tag, in characters.
pub const MAX_TAG_CHARS: usize = 30;

/// Kind of memory being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Something true about the persona
    Fact,
    /// A dated journal-style entry
    Diary,
    /// A like or dislike
    Preference,
    /// A message a conversation partner sent
    UserInput,
    /// Derived by the system, e.g. conversation patterns
    System,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Diary => "diary",
            MemoryType::Preference => "preference",
            MemoryType::UserInput => "user_input",
            MemoryType::System => "system",
        }
    }
}

/// Whose memory this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// The persona's own memory
    #[serde(rename = "self")]
    Persona,
    /// Something learned about a conversation partner
    User,
}

/// Audience a memory may be shown to. Ordered from widest to narrowest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    CloseFriends,
    Private,
}

impl Visibility {
    /// Whether a memory with this visibility is readable at `access`.
    pub fn visible_at(&self, access: Visibility) -> bool {
        *self <= access
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::CloseFriends => "close_friends",
            Visibility::Private => "private",
        }
    }
}

/// A unit of persisted knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,

    pub content: String,

    /// Vector computed from the framed content at creation time
    #[serde(default)]
    pub embedding: Vec<f32>,

    #[serde(rename = "type")]
    pub memory_type: MemoryType,

    pub subject: Subject,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Memory {
    pub fn new(content: impl Into<String>, memory_type: MemoryType, subject: Subject) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            embedding: Vec::new(),
            memory_type,
            subject,
            user_id: None,
            tags: Vec::new(),
            visibility: Visibility::Public,
            mood: None,
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A persona memory of the given type.
    pub fn persona(content: impl Into<String>, memory_type: MemoryType) -> Self {
        Self::new(content, memory_type, Subject::Persona)
    }

    /// A message learned from a conversation partner.
    pub fn user_input(content: impl Into<String>, user_id: impl Into<String>) -> Self {
        let mut mem = Self::new(content, MemoryType::UserInput, Subject::User);
        mem.user_id = Some(user_id.into());
        mem.visibility = Visibility::Private;
        mem
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Text handed to the embedding model: content with light framing.
    pub fn embedding_text(&self) -> String {
        let mut text = match self.subject {
            Subject::Persona => format!("{}: {}", self.memory_type.as_str(), self.content),
            Subject::User => format!("user said: {}", self.content),
        };
        if !self.tags.is_empty() {
            text.push_str(" [");
            text.push_str(&self.tags.join(", "));
            text.push(']');
        }
        text
    }

    /// Check the invariants every stored memory must satisfy.
    pub fn validate(&self) -> Result<()> {
        let trimmed = self.content.trim();
        if trimmed.is_empty() {
            return Err(TwinError::Validation(
                "memory content must not be empty".to_string(),
            ));
        }
        let len = self.content.chars().count();
        if len > MAX_CONTENT_CHARS {
            return Err(TwinError::Validation(format!(
                "memory content is {len} characters, maximum is {MAX_CONTENT_CHARS}"
            )));
        }
        if self.subject == Subject::User && self.user_id.as_deref().map_or(true, str::is_empty) {
            return Err(TwinError::Validation(
                "user memories require a user_id".to_string(),
            ));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(TwinError::Validation(format!(
                "memory has {} tags, maximum is {MAX_TAGS}",
                self.tags.len()
            )));
        }
        if let Some(tag) = self.tags.iter().find(|t| {
            t.chars().count() > MAX_TAG_CHARS || t.is_empty() || t.to_lowercase() != **t
        }) {
            return Err(TwinError::Validation(format!("invalid tag '{tag}'")));
        }
        if self.embedding.is_empty() {
            return Err(TwinError::Validation(
                "memory has no embedding".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lowercase, trim, truncate and deduplicate tags, keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag: String = tag
            .as_ref()
            .trim()
            .to_lowercase()
            .chars()
            .take(MAX_TAG_CHARS)
            .collect();
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        out.push(tag);
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

/// Similarity-search projection of a [`Memory`]. The embedding is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Cosine similarity in `[0, 1]`
    pub relevance_score: f32,
}

impl RetrievedMemory {
    pub fn from_memory(memory: &Memory, relevance_score: f32) -> Self {
        Self {
            id: memory.id.clone(),
            content: memory.content.clone(),
            memory_type: memory.memory_type,
            tags: memory.tags.clone(),
            mood: memory.mood.clone(),
            created_at: memory.created_at,
            relevance_score,
        }
    }
}

/// What the twin knows about one conversation partner, derived from their
/// stored `user_input` memories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMemoryContext {
    pub user_id: String,
    pub preferences: Vec<String>,
    pub interaction_count: usize,
    pub relationship: Relationship,
}

impl UserMemoryContext {
    pub fn from_interactions(
        user_id: impl Into<String>,
        preferences: Vec<String>,
        interaction_count: usize,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            preferences,
            interaction_count,
            relationship: Relationship::from_interactions(interaction_count),
        }
    }
}

/// Which vector store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store; contents are lost on restart
    Memory,
    /// PostgREST endpoint backed by pgvector
    Rest,
}

/// Configuration for the vector store gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Base URL of the REST endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_table")]
    pub table: String,

    /// Name of the similarity-search RPC
    #[serde(default = "default_match_function")]
    pub match_function: String,

    /// Maximum user memories read when building user context
    #[serde(default = "default_user_history_limit")]
    pub user_history_limit: usize,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_table() -> String {
    "memories".into()
}

fn default_match_function() -> String {
    "match_memories".into()
}

fn default_user_history_limit() -> usize {
    50
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            api_key: None,
            table: default_table(),
            match_function: default_match_function(),
            user_history_limit: default_user_history_limit(),
        }
    }
}

impl StoreConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("TWIN_STORE_API_KEY").ok())
    }
}
