//! In-character replies used when a provider fails transiently.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use twin_common::TwinError;

use crate::topics::{mentions_any, Domain};

/// Known transient failure signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientFailure {
    Overloaded,
    RateLimited,
    QuotaExceeded,
    Network,
}

impl TransientFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransientFailure::Overloaded => "overloaded",
            TransientFailure::RateLimited => "rate_limited",
            TransientFailure::QuotaExceeded => "quota_exceeded",
            TransientFailure::Network => "network",
        }
    }

    /// Recognize a transient failure from an error message.
    ///
    /// Anything unrecognized is a hard failure and should propagate.
    pub fn detect(err: &TwinError) -> Option<Self> {
        let text = err.to_string().to_lowercase();
        if mentions_any(&text, &["quota", "resource_exhausted", "insufficient_quota"]) {
            Some(TransientFailure::QuotaExceeded)
        } else if mentions_any(
            &text,
            &["429", "rate limit", "rate limited", "rate_limit", "too many requests"],
        ) {
            Some(TransientFailure::RateLimited)
        } else if mentions_any(
            &text,
            &["503", "overloaded", "service unavailable", "overloaded_error"],
        ) {
            Some(TransientFailure::Overloaded)
        } else if mentions_any(
            &text,
            &[
                "network",
                "timeout",
                "timed out",
                "connection refused",
                "connection reset",
                "connection closed",
                "dns error",
            ],
        ) {
            Some(TransientFailure::Network)
        } else {
            None
        }
    }

    fn pool(&self) -> &'static [&'static str] {
        match self {
            TransientFailure::Overloaded => &[
                "Sorry, my brain is a little overloaded right now. Give me a moment and ask me again?",
                "Hmm, I'm having trouble getting my thoughts together at the moment. Try me again in a bit?",
                "Oof, too many conversations at once. Can you ask me that again in a minute?",
            ],
            TransientFailure::RateLimited => &[
                "Whoa, I need a quick breather. Ask me again in a few seconds?",
                "I'm talking a bit too fast today. Give me a second and try again?",
                "Slow down a little for me! Send that again in a moment?",
            ],
            TransientFailure::QuotaExceeded => &[
                "I've talked so much today that I'm out of words for now. Can we pick this up later?",
                "I've hit my limit for today, sorry! Catch me again a bit later?",
            ],
            TransientFailure::Network => &[
                "I think my connection just dropped. Could you say that again?",
                "Sorry, I lost you for a second there. What were you saying?",
                "My signal is spotty right now. Mind asking again?",
            ],
        }
    }
}

/// Extra variants offered when the user's message touches a domain.
const CONTEXTUAL: &[(Domain, &str)] = &[
    (
        Domain::Music,
        "I'd love to talk music, but my head's a bit foggy right now. Ask me again in a minute?",
    ),
    (
        Domain::Technology,
        "Ironically, I'm having some technical difficulties myself. Try me again shortly?",
    ),
    (
        Domain::Food,
        "Now you've made me hungry, and a little distracted. Ask me again in a moment?",
    ),
    (
        Domain::Travel,
        "My mind wandered off somewhere far away. Can you ask me that again?",
    ),
];

/// Picks a canned reply uniformly from the matching pool.
pub struct FallbackResponder {
    rng: Mutex<StdRng>,
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl FallbackResponder {
    /// Deterministic selection for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn respond(&self, failure: TransientFailure, message: &str) -> String {
        let lower = message.to_lowercase();
        let mut pool: Vec<&str> = failure.pool().to_vec();
        if failure != TransientFailure::QuotaExceeded {
            pool.extend(
                CONTEXTUAL
                    .iter()
                    .filter(|(domain, _)| mentions_any(&lower, domain.keywords()))
                    .map(|(_, line)| *line),
            );
        }

        let mut rng = self.rng.lock();
        pool.choose(&mut *rng)
            .copied()
            .unwrap_or("Sorry, I'm having trouble right now. Can you try again?")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_transient_signatures() {
        let cases = [
            ("Gemini API error 503 Service Unavailable: model overloaded", Some(TransientFailure::Overloaded)),
            ("OpenAI API error 429 Too Many Requests", Some(TransientFailure::RateLimited)),
            ("Anthropic API error 529: overloaded_error", Some(TransientFailure::Overloaded)),
            ("You exceeded your current quota", Some(TransientFailure::QuotaExceeded)),
            ("OpenAI network request failed: operation timed out", Some(TransientFailure::Network)),
            ("OpenAI API error 400 Bad Request: invalid model", None),
            ("Failed to parse response: missing field `choices`", None),
        ];
        for (message, expected) in cases {
            let err = TwinError::Provider(message.to_string());
            assert_eq!(TransientFailure::detect(&err), expected, "{message}");
        }
    }

    #[test]
    fn seeded_selection_is_deterministic() {
        let a = FallbackResponder::seeded(7);
        let b = FallbackResponder::seeded(7);
        for _ in 0..5 {
            assert_eq!(
                a.respond(TransientFailure::Overloaded, "hi"),
                b.respond(TransientFailure::Overloaded, "hi")
            );
        }
    }

    #[test]
    fn replies_come_from_pool() {
        let responder = FallbackResponder::seeded(1);
        let reply = responder.respond(TransientFailure::Network, "hello");
        assert!(TransientFailure::Network.pool().contains(&reply.as_str()));
    }

    #[test]
    fn music_questions_can_get_contextual_reply() {
        let responder = FallbackResponder::seeded(3);
        let contextual = CONTEXTUAL[0].1;
        let seen = (0..50)
            .map(|_| responder.respond(TransientFailure::Overloaded, "what music do you like"))
            .any(|r| r == contextual);
        assert!(seen);

        let plain = FallbackResponder::seeded(3);
        assert!((0..50)
            .map(|_| plain.respond(TransientFailure::Overloaded, "hello"))
            .all(|r| r != contextual));
    }
}
