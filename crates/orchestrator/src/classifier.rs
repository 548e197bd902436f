//! Question classification.
//!
//! Keyword lists are checked in category priority order; the first list
//! with a match wins. Only when nothing matches is the generation
//! provider asked, and any failure there falls back to `casual`.

use tracing::{debug, warn};
use twin_llm::{LlmClient, LlmRequest};

use crate::category::QuestionCategory;
use crate::topics::mentions_any;

const CLASSIFY_TEMPERATURE: f32 = 0.1;
const CLASSIFY_MAX_TOKENS: u32 = 10;

const CLASSIFY_PROMPT: &str = "Classify the user's message into exactly one category:\n\
- casual: greetings, small talk, how are you\n\
- personal: questions about the persona's preferences, life or experiences\n\
- technical: programming, technology or how-something-works questions\n\
- deep: philosophical, emotional or meaning-of-life questions\n\
- specific: a precise factual question about a particular event, date, place or name\n\n\
Reply with the single category word only.";

/// Keyword lists in priority order.
const KEYWORDS: [(QuestionCategory, &[&str]); 5] = [
    (
        QuestionCategory::Casual,
        &[
            "hi", "hello", "hey", "yo", "sup", "what's up", "whats up", "how are you",
            "how's it going", "hows it going", "good morning", "good evening", "good night",
            "thanks", "thank you", "lol", "haha", "nice to meet you",
        ],
    ),
    (
        QuestionCategory::Personal,
        &[
            "what do you like", "do you like", "you like", "your favorite", "your favourite",
            "about you", "about yourself", "your life", "do you enjoy", "your hobbies",
            "what are you into", "are you into", "do you have any", "your family",
            "what do you do for fun", "tell me about your",
        ],
    ),
    (
        QuestionCategory::Technical,
        &[
            "code", "coding", "programming", "algorithm", "database", "api", "software",
            "debug", "compile", "framework", "rust", "python", "javascript", "typescript",
            "how does", "how do i", "explain how", "architecture", "deploy",
        ],
    ),
    (
        QuestionCategory::Deep,
        &[
            "meaning of life", "why do you think", "philosophy", "believe in", "purpose",
            "regret", "what matters", "do you ever wonder", "happiness", "consciousness",
            "afraid of", "fear", "what makes you", "mortality",
        ],
    ),
    (
        QuestionCategory::Specific,
        &[
            "when did", "where did", "which", "how many", "what year", "how long",
            "name of", "exactly", "what time", "who was",
        ],
    ),
];

/// First category whose keyword list matches, without calling a provider.
///
/// Keywords match whole words or phrases, not arbitrary substrings: "hey"
/// does not fire inside "they", and "api" does not fire inside "apis".
pub fn keyword_category(message: &str) -> Option<QuestionCategory> {
    let lower = message.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| mentions_any(&lower, words))
        .map(|(category, _)| *category)
}

/// Parse a provider answer such as `"Technical."` into a category.
fn parse_category(answer: &str) -> Option<QuestionCategory> {
    answer
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .and_then(|w| w.parse().ok())
}

/// Classify `message`. Never fails; the worst case is `casual`.
pub async fn classify(message: &str, llm: &dyn LlmClient) -> QuestionCategory {
    if let Some(category) = keyword_category(message) {
        debug!(%category, "Keyword classification");
        return category;
    }

    let request = LlmRequest::new(CLASSIFY_PROMPT, message)
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

    match llm.complete(request).await {
        Ok(response) => match parse_category(&response.content) {
            Some(category) => {
                debug!(%category, "Provider classification");
                category
            }
            None => {
                warn!(
                    answer = %response.content.chars().take(50).collect::<String>(),
                    "Unrecognized classification, defaulting to casual"
                );
                QuestionCategory::Casual
            }
        },
        Err(e) => {
            warn!(error = %e, "Classification call failed, defaulting to casual");
            QuestionCategory::Casual
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use twin_common::{Result, TwinError};
    use twin_llm::LlmResponse;

    struct ScriptedClient {
        answer: Option<&'static str>,
        calls: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedClient {
        fn new(answer: Option<&'static str>) -> Self {
            Self {
                answer,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.calls.lock().push(request);
            match self.answer {
                Some(answer) => Ok(LlmResponse {
                    content: answer.to_string(),
                    model: "scripted".into(),
                    usage: None,
                    finish_reason: None,
                }),
                None => Err(TwinError::Provider("connection refused".into())),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn keywords_win_without_provider_call() {
        let client = ScriptedClient::new(Some("deep"));
        let cases = [
            ("hey what's up", QuestionCategory::Casual),
            ("What do you like?", QuestionCategory::Personal),
            ("How does a hash map work in Rust?", QuestionCategory::Technical),
            ("Do you ever wonder about the meaning of life", QuestionCategory::Deep),
            ("When did you move to Berlin?", QuestionCategory::Specific),
        ];
        for (message, expected) in cases {
            assert_eq!(classify(message, &client).await, expected, "{message}");
        }
        assert!(client.calls.lock().is_empty());
    }

    #[test]
    fn earlier_category_takes_priority() {
        assert_eq!(
            keyword_category("hey, what do you like"),
            Some(QuestionCategory::Casual)
        );
        assert_eq!(keyword_category("they arrived"), None);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        assert_eq!(keyword_category("tell me about APIs"), None);
        assert_eq!(
            keyword_category("which api should I call"),
            Some(QuestionCategory::Technical)
        );
    }

    #[tokio::test]
    async fn falls_back_to_provider() {
        let client = ScriptedClient::new(Some(" Deep."));
        assert_eq!(
            classify("Tell me something true", &client).await,
            QuestionCategory::Deep
        );
        let calls = client.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].temperature, Some(CLASSIFY_TEMPERATURE));
    }

    #[tokio::test]
    async fn invalid_or_failed_answers_default_to_casual() {
        let nonsense = ScriptedClient::new(Some("philosophical"));
        assert_eq!(
            classify("Tell me something true", &nonsense).await,
            QuestionCategory::Casual
        );

        let failing = ScriptedClient::new(None);
        assert_eq!(
            classify("Tell me something true", &failing).await,
            QuestionCategory::Casual
        );
    }
}
