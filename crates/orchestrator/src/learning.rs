//! Write-back after a completed turn.
//!
//! Each step is independent: a failed insert is logged and the remaining
//! steps still run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use twin_common::ChatRequest;
use twin_memory::{
    Memory, MemoryRetriever, MemoryType, UserMemoryContext, Visibility, MAX_CONTENT_CHARS,
};

use crate::category::{CategoryTable, CategoryTuning, QuestionCategory};
use crate::topics::{domains_in, mentions_any};

/// Messages this short or shorter are not stored.
pub const MIN_STORED_MESSAGE_CHARS: usize = 10;

const PATTERN_EXCERPT_CHARS: usize = 800;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub enabled: bool,
    /// Responses scoring strictly above this are stored as patterns
    pub pattern_quality_threshold: f32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern_quality_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearningOutcome {
    pub memories_created: usize,
    pub insights: Vec<String>,
    pub quality_score: f32,
    pub patterns_stored: bool,
}

/// Keyword rules producing coarse insight tags, per category.
const INSIGHT_RULES: &[(QuestionCategory, &[&str], &str)] = &[
    (QuestionCategory::Casual, &["hi", "hello", "hey"], "friendly_greeter"),
    (QuestionCategory::Casual, &["how are you", "how's it going"], "checks_in"),
    (QuestionCategory::Personal, &["music", "song", "band", "album"], "music_interest"),
    (QuestionCategory::Personal, &["food", "cook", "cooking", "restaurant"], "food_interest"),
    (QuestionCategory::Personal, &["travel", "trip", "vacation"], "travel_interest"),
    (QuestionCategory::Personal, &["book", "books", "read", "reading"], "reading_interest"),
    (QuestionCategory::Personal, &["movie", "movies", "film", "show"], "film_interest"),
    (QuestionCategory::Personal, &["hobby", "hobbies", "sport", "sports"], "hobby_interest"),
    (QuestionCategory::Technical, &["code", "coding", "programming", "software"], "tech_curious"),
    (QuestionCategory::Technical, &["learn", "learning", "beginner", "start"], "learning_focus"),
    (QuestionCategory::Technical, &["work", "job", "project", "team"], "professional_context"),
    (QuestionCategory::Deep, &["feel", "feeling", "feelings", "lonely", "afraid"], "emotional_openness"),
    (QuestionCategory::Deep, &["meaning", "purpose", "believe", "philosophy"], "philosophical_interest"),
    (QuestionCategory::Specific, &["when", "where", "which", "how many"], "detail_oriented"),
];

/// Coarse insight tags for `message` under `category`.
pub fn extract_insights(category: QuestionCategory, message: &str) -> Vec<String> {
    let lower = message.to_lowercase();
    INSIGHT_RULES
        .iter()
        .filter(|(c, words, _)| *c == category && mentions_any(&lower, words))
        .map(|(_, _, insight)| insight.to_string())
        .collect()
}

/// Length appropriateness of a response in words.
pub fn score_quality(word_count: usize, tuning: &CategoryTuning) -> f32 {
    let words = word_count as f32;
    if words <= tuning.target_words as f32 * 1.2 {
        1.0
    } else if word_count <= tuning.max_words {
        0.8
    } else if words <= tuning.max_words as f32 * 1.5 {
        0.6
    } else {
        0.3
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub struct LearningService {
    retriever: Arc<MemoryRetriever>,
    table: Arc<CategoryTable>,
    config: LearningConfig,
}

impl LearningService {
    pub fn new(
        retriever: Arc<MemoryRetriever>,
        table: Arc<CategoryTable>,
        config: LearningConfig,
    ) -> Self {
        Self {
            retriever,
            table,
            config,
        }
    }

    pub async fn learn(
        &self,
        category: QuestionCategory,
        request: &ChatRequest,
        response: &str,
        user_context: Option<&UserMemoryContext>,
    ) -> LearningOutcome {
        let insights = extract_insights(category, &request.message);
        let quality_score = score_quality(
            response.split_whitespace().count(),
            self.table.tuning(category),
        );
        let mut outcome = LearningOutcome {
            insights,
            quality_score,
            ..Default::default()
        };

        if !self.config.enabled {
            return outcome;
        }

        if self.store_user_message(category, request, user_context).await {
            outcome.memories_created += 1;
        }

        if quality_score > self.config.pattern_quality_threshold
            && self.store_pattern(category, request, response, quality_score).await
        {
            outcome.memories_created += 1;
            outcome.patterns_stored = true;
        }

        debug!(
            memories_created = outcome.memories_created,
            quality_score,
            insights = ?outcome.insights,
            "Learning complete"
        );
        outcome
    }

    async fn store_user_message(
        &self,
        category: QuestionCategory,
        request: &ChatRequest,
        user_context: Option<&UserMemoryContext>,
    ) -> bool {
        let user_id = match request.user_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => return false,
        };
        if request.message.trim().chars().count() <= MIN_STORED_MESSAGE_CHARS {
            return false;
        }

        let tags: Vec<&str> = domains_in(&request.message)
            .iter()
            .map(|d| d.as_str())
            .collect();
        let mut memory = Memory::user_input(
            excerpt(request.message.trim(), MAX_CONTENT_CHARS),
            user_id,
        )
        .with_tags(tags)
        .with_metadata("question_category", json!(category.as_str()));
        if let Some(ref conversation_id) = request.conversation_id {
            memory = memory.with_metadata("conversation_id", json!(conversation_id));
        }
        if let Some(ctx) = user_context {
            memory = memory.with_metadata("relationship", json!(ctx.relationship.as_str()));
        }

        match self.retriever.remember(memory).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Failed to store user message");
                false
            }
        }
    }

    async fn store_pattern(
        &self,
        category: QuestionCategory,
        request: &ChatRequest,
        response: &str,
        quality_score: f32,
    ) -> bool {
        let content = format!(
            "Conversation pattern ({category}): asked \"{}\", answered \"{}\"",
            excerpt(request.message.trim(), PATTERN_EXCERPT_CHARS),
            excerpt(response.trim(), PATTERN_EXCERPT_CHARS)
        );
        let memory = Memory::persona(excerpt(&content, MAX_CONTENT_CHARS), MemoryType::System)
            .with_visibility(Visibility::Private)
            .with_tags(["pattern", category.as_str()])
            .with_metadata("question_category", json!(category.as_str()))
            .with_metadata("pattern_success", json!(quality_score));

        match self.retriever.remember(memory).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Failed to store conversation pattern");
                false
            }
        }
    }
}
