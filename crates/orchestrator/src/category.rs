//! Question categories and the per-category configuration table.
//!
//! Every category-dependent knob (response length, sampling, retrieval
//! depth, tone and instruction text) is read from [`CategoryTable`].
//! Numeric tuning can be overridden from configuration; style text is fixed.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use twin_common::TwinError;
use twin_memory::RetrievalPolicy;

/// Upper bound on generated tokens regardless of category.
pub const MAX_RESPONSE_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionCategory {
    Casual,
    Personal,
    Technical,
    Deep,
    Specific,
}

impl QuestionCategory {
    /// All categories, in keyword-matching priority order.
    pub const ALL: [QuestionCategory; 5] = [
        QuestionCategory::Casual,
        QuestionCategory::Personal,
        QuestionCategory::Technical,
        QuestionCategory::Deep,
        QuestionCategory::Specific,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionCategory::Casual => "casual",
            QuestionCategory::Personal => "personal",
            QuestionCategory::Technical => "technical",
            QuestionCategory::Deep => "deep",
            QuestionCategory::Specific => "specific",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionCategory {
    type Err = TwinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        QuestionCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| TwinError::Validation(format!("Unknown question category: {s}")))
    }
}

/// Numeric tuning for one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryTuning {
    pub target_words: usize,
    pub max_words: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub memory_count: usize,
    pub similarity_threshold: f32,
}

impl CategoryTuning {
    /// Token cap for generation: twice the word limit, at most
    /// [`MAX_RESPONSE_TOKENS`].
    pub fn max_tokens(&self) -> u32 {
        ((self.max_words * 2) as u32).min(MAX_RESPONSE_TOKENS)
    }

    pub fn retrieval_policy(&self) -> RetrievalPolicy {
        RetrievalPolicy::new(self.memory_count, self.similarity_threshold)
    }

    fn apply(&mut self, o: &TuningOverride) {
        if let Some(v) = o.target_words {
            self.target_words = v;
        }
        if let Some(v) = o.max_words {
            self.max_words = v;
        }
        if let Some(v) = o.temperature {
            self.temperature = v;
        }
        if let Some(v) = o.top_p {
            self.top_p = v;
        }
        if let Some(v) = o.memory_count {
            self.memory_count = v;
        }
        if let Some(v) = o.similarity_threshold {
            self.similarity_threshold = v;
        }
    }
}

/// Partial tuning read from configuration. Unset fields keep the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningOverride {
    pub target_words: Option<usize>,
    pub max_words: Option<usize>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub memory_count: Option<usize>,
    pub similarity_threshold: Option<f32>,
}

/// Overrides keyed by category, as they appear under `[categories.<name>]`.
pub type CategoryOverrides = HashMap<QuestionCategory, TuningOverride>;

/// Communication style for one category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryStyle {
    /// Reported as `personality.tone`
    pub tone: &'static str,
    pub structure: &'static str,
    /// Verb phrase that frames the user message in the context string
    pub framing: &'static str,
    pub instructions: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryProfile {
    pub tuning: CategoryTuning,
    pub style: CategoryStyle,
}

const DEFAULT_PROFILES: [CategoryProfile; 5] = [
    CategoryProfile {
        tuning: CategoryTuning {
            target_words: 25,
            max_words: 50,
            temperature: 0.8,
            top_p: 0.9,
            memory_count: 0,
            similarity_threshold: 0.3,
        },
        style: CategoryStyle {
            tone: "casual_friendly",
            structure: "One or two short sentences, like a text message",
            framing: "Respond casually to",
            instructions: &[
                "Keep it light and brief.",
                "Match the other person's energy.",
                "Do not bring up personal stories unless asked.",
            ],
        },
    },
    CategoryProfile {
        tuning: CategoryTuning {
            target_words: 60,
            max_words: 120,
            temperature: 0.7,
            top_p: 0.9,
            memory_count: 5,
            similarity_threshold: 0.25,
        },
        style: CategoryStyle {
            tone: "warm_personal",
            structure: "A short personal answer grounded in a memory, then a question back",
            framing: "Share something personal in response to",
            instructions: &[
                "Draw on the listed memories when they fit the question.",
                "End with a reciprocal question about their own experience.",
                "Never assume they share your background, hometown or history.",
            ],
        },
    },
    CategoryProfile {
        tuning: CategoryTuning {
            target_words: 100,
            max_words: 200,
            temperature: 0.4,
            top_p: 0.85,
            memory_count: 4,
            similarity_threshold: 0.3,
        },
        style: CategoryStyle {
            tone: "knowledgeable",
            structure: "Direct answer first, then a brief explanation or example",
            framing: "Explain clearly in response to",
            instructions: &[
                "Be accurate and concrete.",
                "Mention your own experience only if a listed memory supports it.",
                "Say so plainly when you are unsure.",
            ],
        },
    },
    CategoryProfile {
        tuning: CategoryTuning {
            target_words: 150,
            max_words: 300,
            temperature: 0.75,
            top_p: 0.95,
            memory_count: 8,
            similarity_threshold: 0.15,
        },
        style: CategoryStyle {
            tone: "reflective",
            structure: "A considered reflection that can span a few short paragraphs",
            framing: "Thoughtfully explore",
            instructions: &[
                "Take the question seriously and think it through honestly.",
                "Connect to listed memories where they genuinely relate.",
                "Acknowledge uncertainty instead of sounding certain.",
            ],
        },
    },
    CategoryProfile {
        tuning: CategoryTuning {
            target_words: 40,
            max_words: 80,
            temperature: 0.5,
            top_p: 0.85,
            memory_count: 3,
            similarity_threshold: 0.35,
        },
        style: CategoryStyle {
            tone: "direct",
            structure: "The specific answer in one or two sentences",
            framing: "Give a direct answer to",
            instructions: &[
                "Answer the exact question that was asked.",
                "If no listed memory contains the answer, say you don't remember.",
            ],
        },
    },
];

/// Enum-indexed category configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    profiles: [CategoryProfile; 5],
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            profiles: DEFAULT_PROFILES,
        }
    }
}

impl CategoryTable {
    pub fn with_overrides(overrides: &CategoryOverrides) -> Self {
        let mut table = Self::default();
        for (category, o) in overrides {
            table.profiles[category.index()].tuning.apply(o);
        }
        table
    }

    pub fn profile(&self, category: QuestionCategory) -> &CategoryProfile {
        &self.profiles[category.index()]
    }

    pub fn tuning(&self, category: QuestionCategory) -> &CategoryTuning {
        &self.profile(category).tuning
    }

    pub fn style(&self, category: QuestionCategory) -> &CategoryStyle {
        &self.profile(category).style
    }
}
