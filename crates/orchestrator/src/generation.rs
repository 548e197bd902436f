//! Provider-agnostic generation with graceful degradation.

use std::sync::Arc;

use tracing::{debug, info, warn};
use twin_common::{Result, TwinError};
use twin_llm::{approximate_tokens, LlmClient, LlmRequest, ProviderKind, ProviderRegistry};

use crate::category::{CategoryTable, CategoryTuning, QuestionCategory};
use crate::fallback::{FallbackResponder, TransientFailure};

/// Result of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The provider produced a reply.
    Completed {
        response: String,
        tokens_used: u32,
        model: String,
    },
    /// The provider failed transiently and a canned reply was substituted.
    Degraded {
        response: String,
        tokens_used: u32,
        failure: TransientFailure,
    },
}

impl GenerationOutcome {
    pub fn response(&self) -> &str {
        match self {
            GenerationOutcome::Completed { response, .. }
            | GenerationOutcome::Degraded { response, .. } => response,
        }
    }

    pub fn tokens_used(&self) -> u32 {
        match self {
            GenerationOutcome::Completed { tokens_used, .. }
            | GenerationOutcome::Degraded { tokens_used, .. } => *tokens_used,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, GenerationOutcome::Degraded { .. })
    }
}

/// Sampling parameters for a category.
pub fn build_request(tuning: &CategoryTuning, system_prompt: &str, context: &str) -> LlmRequest {
    LlmRequest::new(system_prompt, context)
        .with_temperature(tuning.temperature)
        .with_top_p(tuning.top_p)
        .with_max_tokens(tuning.max_tokens())
}

pub struct GenerationService {
    providers: ProviderRegistry,
    table: Arc<CategoryTable>,
    fallback: FallbackResponder,
}

impl GenerationService {
    pub fn new(providers: ProviderRegistry, table: Arc<CategoryTable>) -> Self {
        Self {
            providers,
            table,
            fallback: FallbackResponder::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackResponder) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Client for `provider`, or the default one.
    pub fn client(&self, provider: Option<ProviderKind>) -> Result<Arc<dyn LlmClient>> {
        self.providers.get(provider)
    }

    /// Generate a reply. Known transient provider failures become
    /// [`GenerationOutcome::Degraded`]; every other error is returned.
    pub async fn generate(
        &self,
        system_prompt: &str,
        context: &str,
        message: &str,
        category: QuestionCategory,
        provider: Option<ProviderKind>,
    ) -> Result<GenerationOutcome> {
        let client = self.client(provider)?;
        let request = build_request(self.table.tuning(category), system_prompt, context);
        let prompt_chars = request.char_count();

        debug!(
            %category,
            model = client.model_name(),
            max_tokens = ?request.max_tokens,
            "Calling generation provider"
        );

        match client.complete(request).await {
            Ok(response) => {
                if response.content.trim().is_empty() {
                    return Err(TwinError::Provider(format!(
                        "{} returned an empty response",
                        response.model
                    )));
                }
                let tokens_used = match response.usage {
                    Some(ref usage) => usage.total(),
                    None => approximate_tokens(prompt_chars + response.content.chars().count()),
                };
                Ok(GenerationOutcome::Completed {
                    response: response.content,
                    tokens_used,
                    model: response.model,
                })
            }
            Err(e) => match TransientFailure::detect(&e) {
                Some(failure) => {
                    warn!(error = %e, ?failure, "Provider failed transiently, degrading");
                    let response = self.fallback.respond(failure, message);
                    let tokens_used = approximate_tokens(response.chars().count());
                    info!(tokens_used, "Returning canned reply");
                    Ok(GenerationOutcome::Degraded {
                        response,
                        tokens_used,
                        failure,
                    })
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use twin_llm::{LlmResponse, TokenUsage};

    enum Behaviour {
        Reply(&'static str, Option<TokenUsage>),
        Fail(&'static str),
    }

    struct FakeClient {
        behaviour: Behaviour,
        last: Mutex<Option<LlmRequest>>,
    }

    impl FakeClient {
        fn arc(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmClient for FakeClient {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            *self.last.lock() = Some(request);
            match &self.behaviour {
                Behaviour::Reply(text, usage) => Ok(LlmResponse {
                    content: text.to_string(),
                    model: "fake-model".into(),
                    usage: usage.clone(),
                    finish_reason: Some("stop".into()),
                }),
                Behaviour::Fail(msg) => Err(TwinError::Provider(msg.to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "fake-model"
        }
    }

    fn service(client: Arc<FakeClient>) -> GenerationService {
        GenerationService::new(
            ProviderRegistry::new(ProviderKind::Gemini, client),
            Arc::new(CategoryTable::default()),
        )
        .with_fallback(FallbackResponder::seeded(42))
    }

    #[tokio::test]
    async fn applies_category_sampling() {
        let client = FakeClient::arc(Behaviour::Reply(
            "Sure!",
            Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 2,
            }),
        ));
        let outcome = service(client.clone())
            .generate("sys", "ctx", "msg", QuestionCategory::Technical, None)
            .await
            .unwrap();
        assert_eq!(outcome.tokens_used(), 12);
        assert!(!outcome.is_degraded());

        let request = client.last.lock().clone().unwrap();
        assert_eq!(request.temperature, Some(0.4));
        assert_eq!(request.top_p, Some(0.85));
        assert_eq!(request.max_tokens, Some(400));
        assert_eq!(request.system_prompt.as_deref(), Some("sys"));
    }

    #[tokio::test]
    async fn approximates_missing_usage() {
        let client = FakeClient::arc(Behaviour::Reply("abcdefgh", None));
        let outcome = service(client)
            .generate("sys", "ctx", "msg", QuestionCategory::Casual, None)
            .await
            .unwrap();
        // 3 + 3 + 8 characters
        assert_eq!(outcome.tokens_used(), 4);
    }

    #[tokio::test]
    async fn transient_failure_degrades() {
        let svc = service(FakeClient::arc(Behaviour::Fail(
            "Gemini API error 503 Service Unavailable: try later",
        )));
        for _ in 0..3 {
            let outcome = svc
                .generate("sys", "ctx", "msg", QuestionCategory::Personal, None)
                .await
                .unwrap();
            assert!(outcome.is_degraded());
            assert_eq!(
                outcome.tokens_used(),
                outcome.response().chars().count().div_ceil(4) as u32
            );
        }
    }

    #[tokio::test]
    async fn hard_failure_propagates() {
        let svc = service(FakeClient::arc(Behaviour::Fail(
            "Failed to parse response: missing field `candidates`",
        )));
        let err = svc
            .generate("sys", "ctx", "msg", QuestionCategory::Deep, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TwinError::Provider(_)));
    }

    #[tokio::test]
    async fn empty_reply_is_hard_failure() {
        let svc = service(FakeClient::arc(Behaviour::Reply("   ", None)));
        assert!(svc
            .generate("sys", "ctx", "msg", QuestionCategory::Casual, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unknown_provider_is_config_error() {
        let svc = service(FakeClient::arc(Behaviour::Reply("hi", None)));
        let err = svc
            .generate("sys", "ctx", "msg", QuestionCategory::Casual, Some(ProviderKind::OpenAi))
            .await
            .unwrap_err();
        assert!(matches!(err, TwinError::Config(_)));
    }
}
