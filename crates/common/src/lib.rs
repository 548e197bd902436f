//! Common types shared across the persona twin crates.
//!
//! This crate provides the error taxonomy, the chat request/response
//! envelopes exchanged with callers, and request validation.

pub mod error;
pub mod message;
pub mod validation;

pub use error::{Result, TwinError};
pub use message::{
    ChatData, ChatMeta, ChatRequest, ChatResponse, ErrorEnvelope, LearningSummary, MemoriesUsed,
    Personality, Relationship, RequestContext,
};
pub use validation::{MAX_MESSAGE_CHARS, new_conversation_id, validate_chat_request};
