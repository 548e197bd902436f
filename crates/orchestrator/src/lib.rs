//! Conversation pipeline for the persona twin.
//!
//! [`TwinOrchestrator`] runs one chat turn end to end:
//!
//! - [`classifier`]: keyword then provider classification into a [`QuestionCategory`]
//! - [`ambiguity`] and [`clarification`]: short-circuit vague personal questions
//! - memory retrieval and user context via `twin_memory`
//! - [`prompt`]: persona prompt with the memory constraint block
//! - [`generation`]: provider call with graceful degradation ([`fallback`])
//! - [`learning`]: write-back of the user message and conversation patterns
//!
//! All category-dependent behaviour reads from [`CategoryTable`].

pub mod ambiguity;
pub mod category;
pub mod clarification;
pub mod classifier;
pub mod config;
pub mod fallback;
pub mod generation;
pub mod learning;
pub mod orchestrator;
pub mod persona;
pub mod prompt;
pub mod topics;

pub use ambiguity::{detect, AmbiguityAssessment, AMBIGUITY_THRESHOLD};
pub use category::{
    CategoryOverrides, CategoryProfile, CategoryStyle, CategoryTable, CategoryTuning,
    QuestionCategory, TuningOverride, MAX_RESPONSE_TOKENS,
};
pub use clarification::{build_clarification, Clarification};
pub use classifier::{classify, keyword_category};
pub use config::{LlmSection, ServerConfig, TwinConfig};
pub use fallback::{FallbackResponder, TransientFailure};
pub use generation::{GenerationOutcome, GenerationService};
pub use learning::{score_quality, LearningConfig, LearningOutcome, LearningService};
pub use orchestrator::{TwinOrchestrator, CLARIFYING_TONE, ERROR_HANDLING_TONE};
pub use persona::Persona;
pub use prompt::{PromptBuilder, NO_MEMORIES_MARKER};
pub use topics::Domain;
