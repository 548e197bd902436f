//! Chat request and response envelopes.

use serde::{Deserialize, Serialize};

/// Coarse relationship tier between the persona and a conversation partner.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    #[default]
    Stranger,
    Acquaintance,
    Friend,
    CloseFriend,
}

impl Relationship {
    /// Tier for a number of prior interactions.
    ///
    /// `0..5` stranger, `5..20` acquaintance, `20..50` friend, `50+` close friend.
    pub fn from_interactions(count: usize) -> Self {
        match count {
            0..=4 => Relationship::Stranger,
            5..=19 => Relationship::Acquaintance,
            20..=49 => Relationship::Friend,
            _ => Relationship::CloseFriend,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Stranger => "stranger",
            Relationship::Acquaintance => "acquaintance",
            Relationship::Friend => "friend",
            Relationship::CloseFriend => "close_friend",
        }
    }
}

/// Optional caller-supplied relationship hints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Relationship>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_interactions: Option<u32>,
}

/// A chat turn addressed to the twin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoriesUsed {
    pub count: usize,
    pub types: Vec<String>,
    pub relevance_scores: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    pub tone: String,
    pub context_applied: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningSummary {
    pub new_memories_created: usize,
    pub user_insights_gained: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatData {
    pub response: String,
    pub conversation_id: String,
    pub memories_used: MemoriesUsed,
    pub personality: Personality,
    pub learning: LearningSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMeta {
    pub processing_time_ms: u64,
    pub tokens_used: u32,
    pub memory_search_time_ms: u64,
}

/// Successful response envelope. Clarifications, degraded replies and full
/// generations all share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub data: ChatData,
    pub meta: ChatMeta,
}

impl ChatResponse {
    pub fn new(data: ChatData, meta: ChatMeta) -> Self {
        Self {
            success: true,
            data,
            meta,
        }
    }
}

/// Failure envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&crate::TwinError> for ErrorEnvelope {
    fn from(err: &crate::TwinError) -> Self {
        ErrorEnvelope::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_tiers_use_exact_thresholds() {
        assert_eq!(Relationship::from_interactions(0), Relationship::Stranger);
        assert_eq!(Relationship::from_interactions(4), Relationship::Stranger);
        assert_eq!(Relationship::from_interactions(5), Relationship::Acquaintance);
        assert_eq!(Relationship::from_interactions(19), Relationship::Acquaintance);
        assert_eq!(Relationship::from_interactions(20), Relationship::Friend);
        assert_eq!(Relationship::from_interactions(50), Relationship::CloseFriend);
        assert_eq!(Relationship::default(), Relationship::Stranger);
    }

    #[test]
    fn relationship_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Relationship::CloseFriend).unwrap(),
            "\"close_friend\""
        );
    }

    #[test]
    fn chat_request_minimal_deserialization() {
        let request: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(request.message, "hi");
        assert!(request.user_id.is_none());
        assert!(request.context.is_none());
    }

    #[test]
    fn chat_request_with_context() {
        let json = r#"{
            "message": "hello",
            "user_id": "u1",
            "context": {"relationship": "friend", "previous_interactions": 12}
        }"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();
        let ctx = request.context.unwrap();
        assert_eq!(ctx.relationship, Some(Relationship::Friend));
        assert_eq!(ctx.previous_interactions, Some(12));
    }

    #[test]
    fn error_envelope_omits_missing_details() {
        let envelope = ErrorEnvelope::new("VALIDATION_ERROR", "message is required");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "VALIDATION_ERROR");
        assert!(json.get("details").is_none());
    }
}
