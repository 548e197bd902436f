//! Ambiguity detection for personal questions.
//!
//! Three signals are accumulated as a cascade; each is only checked when
//! the previous one fired:
//!
//! 1. generic phrasing or vague object words (0.4)
//! 2. no specific knowledge domain mentioned (0.3)
//! 3. short message without qualifiers (0.3, or 0.15 when only fairly short)
//!
//! A message is ambiguous once the total reaches [`AMBIGUITY_THRESHOLD`],
//! which requires at least the first two signals.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::topics::{domains_in, mentions_any};

pub const AMBIGUITY_THRESHOLD: f32 = 0.5;

const KEYWORD_WEIGHT: f32 = 0.4;
const SCOPE_WEIGHT: f32 = 0.3;
const SHORT_WEIGHT: f32 = 0.3;
const FAIRLY_SHORT_WEIGHT: f32 = 0.15;

const SHORT_WORDS: usize = 4;
const FAIRLY_SHORT_WORDS: usize = 6;

static GENERIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bwhat (else )?do you (like|enjoy|love|do for fun)\b",
        r"\bwhat are you (into|interested in|passionate about)\b",
        r"\btell me (about yourself|something about you|about you)\b",
        r"\bwhat('s| is) your (thing|deal|vibe)\b",
        r"\bwhat (kind|sort) of (things|stuff)\b",
        r"\bany (hobbies|interests)\b",
        r"\bwhat interests you\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("generic question pattern is valid"))
    .collect()
});

const VAGUE_WORDS: &[&str] = &["things", "stuff", "anything", "something", "whatever"];

const QUALIFIERS: &[&str] = &[
    "recently",
    "lately",
    "these days",
    "right now",
    "for work",
    "at work",
    "this year",
    "growing up",
    "as a kid",
    "when you were",
    "on weekends",
    "in college",
];

const MODIFIERS: &[&str] = &[
    "favorite",
    "favourite",
    "best",
    "worst",
    "most",
    "first",
    "last",
    "top",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguityAssessment {
    pub is_ambiguous: bool,
    pub confidence: f32,
    pub reasons: Vec<String>,
}

/// Score how generic `message` is.
pub fn detect(message: &str) -> AmbiguityAssessment {
    let lower = message.trim().to_lowercase();
    let mut confidence = 0.0;
    let mut reasons = Vec::new();

    let generic = GENERIC_PATTERNS.iter().any(|re| re.is_match(&lower));
    if generic || mentions_any(&lower, VAGUE_WORDS) {
        confidence += KEYWORD_WEIGHT;
        reasons.push("generic_question".to_string());

        if domains_in(&lower).is_empty() {
            confidence += SCOPE_WEIGHT;
            reasons.push("no_specific_domain".to_string());

            let qualified = mentions_any(&lower, QUALIFIERS) || mentions_any(&lower, MODIFIERS);
            let words = lower.split_whitespace().count();
            if !qualified && words <= SHORT_WORDS {
                confidence += SHORT_WEIGHT;
                reasons.push("very_short_unqualified".to_string());
            } else if !qualified && words <= FAIRLY_SHORT_WORDS {
                confidence += FAIRLY_SHORT_WEIGHT;
                reasons.push("short_unqualified".to_string());
            }
        }
    }

    AmbiguityAssessment {
        is_ambiguous: confidence >= AMBIGUITY_THRESHOLD,
        confidence,
        reasons,
    }
}
