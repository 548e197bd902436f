//! The per-request conversation pipeline.
//!
//! ```text
//! classify ─► (personal? detect ambiguity) ─► retrieve memories ─► user context
//!     ─► ambiguous? ── yes ─► clarification ─► respond
//!                  └─ no ──► prompt ─► generate ─► degraded? ── yes ─► respond
//!                                                           └─ no ──► learn ─► respond
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use twin_common::{
    new_conversation_id, ChatData, ChatMeta, ChatRequest, ChatResponse, LearningSummary,
    MemoriesUsed, Personality, Result, TwinError,
};
use twin_llm::{ProviderKind, ProviderRegistry};
use twin_memory::{
    build_embedding_client, build_vector_store, EmbeddingClient, MemoryRetriever,
    RetrievedMemory, UserMemoryContext,
};

use crate::ambiguity::detect;
use crate::category::{CategoryTable, QuestionCategory};
use crate::clarification::build_clarification;
use crate::classifier::classify;
use crate::config::TwinConfig;
use crate::fallback::FallbackResponder;
use crate::generation::{GenerationOutcome, GenerationService};
use crate::learning::{LearningConfig, LearningService};
use crate::persona::Persona;
use crate::prompt::PromptBuilder;

pub const CLARIFYING_TONE: &str = "clarifying";
pub const ERROR_HANDLING_TONE: &str = "error_handling";

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

fn memories_used(memories: &[RetrievedMemory]) -> MemoriesUsed {
    MemoriesUsed {
        count: memories.len(),
        types: memories
            .iter()
            .map(|m| m.memory_type.as_str().to_string())
            .collect(),
        relevance_scores: memories.iter().map(|m| m.relevance_score).collect(),
    }
}

/// Relationship hints on the request, used when the store has no history.
fn context_from_request(request: &ChatRequest) -> Option<UserMemoryContext> {
    let hints = request.context.as_ref()?;
    let user_id = request.user_id.clone().unwrap_or_default();
    match (hints.previous_interactions, hints.relationship) {
        (Some(n), _) => Some(UserMemoryContext::from_interactions(
            user_id,
            Vec::new(),
            n as usize,
        )),
        (None, Some(relationship)) => Some(UserMemoryContext {
            user_id,
            preferences: Vec::new(),
            interaction_count: 0,
            relationship,
        }),
        (None, None) => None,
    }
}

pub struct TwinOrchestrator {
    table: Arc<CategoryTable>,
    retriever: Arc<MemoryRetriever>,
    prompts: PromptBuilder,
    generation: GenerationService,
    learning: LearningService,
}

impl TwinOrchestrator {
    pub fn new(
        persona: Persona,
        providers: ProviderRegistry,
        retriever: Arc<MemoryRetriever>,
        table: CategoryTable,
        learning: LearningConfig,
    ) -> Self {
        let table = Arc::new(table);
        Self {
            prompts: PromptBuilder::new(persona, table.clone()),
            generation: GenerationService::new(providers, table.clone()),
            learning: LearningService::new(retriever.clone(), table.clone(), learning),
            retriever,
            table,
        }
    }

    /// Wire every collaborator from configuration.
    pub fn from_config(config: &TwinConfig) -> Result<Self> {
        let providers =
            ProviderRegistry::from_configs(&config.llm.providers, config.llm.default_provider)?;
        let embedder: Arc<dyn EmbeddingClient> =
            Arc::from(build_embedding_client(&config.embedding)?);
        let store = build_vector_store(&config.store)?;
        let retriever = MemoryRetriever::new(embedder, store)
            .with_user_history_limit(config.store.user_history_limit);

        info!(
            persona = %config.persona.name,
            providers = ?providers.providers(),
            default_provider = %providers.default_provider(),
            store = ?config.store.backend,
            "Twin orchestrator configured"
        );

        Ok(Self::new(
            config.persona.clone(),
            providers,
            Arc::new(retriever),
            CategoryTable::with_overrides(&config.categories),
            config.learning.clone(),
        ))
    }

    /// Replace the canned-reply picker, e.g. with a seeded one.
    pub fn with_fallback(mut self, fallback: FallbackResponder) -> Self {
        self.generation = self.generation.with_fallback(fallback);
        self
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    pub fn providers(&self) -> &ProviderRegistry {
        self.generation.providers()
    }

    pub async fn health_check(&self) -> bool {
        self.retriever.store().health_check().await
    }

    /// Process a validated request with the default provider.
    pub async fn process(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.process_with_provider(request, None).await
    }

    /// Process a validated request with `provider`, or the default when `None`.
    pub async fn process_with_provider(
        &self,
        request: ChatRequest,
        provider: Option<ProviderKind>,
    ) -> Result<ChatResponse> {
        let started = Instant::now();
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(new_conversation_id);

        info!(
            conversation_id = %conversation_id,
            user_id = ?request.user_id,
            content_preview = %preview(&request.message),
            "Processing chat message"
        );

        let client = self.generation.client(provider)?;

        // Write-back needs the store; an outage fails the turn up front.
        // Individual query errors past this point still degrade locally.
        if !self.health_check().await {
            warn!(conversation_id = %conversation_id, "Memory store unreachable");
            return Err(TwinError::StoreUnavailable(
                "memory store health check failed".to_string(),
            ));
        }

        let category = classify(&request.message, client.as_ref()).await;
        let ambiguity = (category == QuestionCategory::Personal).then(|| detect(&request.message));

        let search_started = Instant::now();
        let memories = self
            .retriever
            .retrieve(
                &request.message,
                &self.table.tuning(category).retrieval_policy(),
            )
            .await;
        let memory_search_time_ms = search_started.elapsed().as_millis() as u64;

        let stored_context = match request.user_id.as_deref() {
            Some(user_id) => self.retriever.get_user_context(user_id).await,
            None => None,
        };
        let user_context = stored_context.or_else(|| context_from_request(&request));

        debug!(
            %category,
            memories = memories.len(),
            has_user_context = user_context.is_some(),
            ambiguity = ?ambiguity.as_ref().map(|a| a.confidence),
            "Context gathered"
        );

        if let Some(assessment) = ambiguity.filter(|a| a.is_ambiguous) {
            let clarification = build_clarification(&memories);
            info!(
                confidence = assessment.confidence,
                domains = ?clarification.domains,
                "Ambiguous question, answering with clarification"
            );
            let mut context_applied = vec!["ambiguity_detection".to_string()];
            context_applied.extend(assessment.reasons);

            return Ok(self.respond(
                clarification.response,
                conversation_id,
                &memories,
                Personality {
                    tone: CLARIFYING_TONE.to_string(),
                    context_applied,
                },
                LearningSummary::default(),
                0,
                memory_search_time_ms,
                started,
            ));
        }

        let system_prompt =
            self.prompts
                .build_system_prompt(category, &memories, user_context.as_ref());
        let context = self.prompts.build_context(
            category,
            &memories,
            user_context.as_ref(),
            request.user_name.as_deref(),
            &request.message,
        );

        let outcome = self
            .generation
            .generate(&system_prompt, &context, &request.message, category, provider)
            .await?;

        let tokens_used = outcome.tokens_used();
        let response = match outcome {
            GenerationOutcome::Degraded {
                response, failure, ..
            } => {
                return Ok(self.respond(
                    response,
                    conversation_id,
                    &memories,
                    Personality {
                        tone: ERROR_HANDLING_TONE.to_string(),
                        context_applied: vec![format!(
                            "graceful_degradation:{}",
                            failure.as_str()
                        )],
                    },
                    LearningSummary::default(),
                    tokens_used,
                    memory_search_time_ms,
                    started,
                ));
            }
            GenerationOutcome::Completed { response, .. } => response,
        };

        let mut learn_request = request;
        learn_request.conversation_id = Some(conversation_id.clone());
        let learned = self
            .learning
            .learn(category, &learn_request, &response, user_context.as_ref())
            .await;

        let mut context_applied = vec![format!("category:{category}")];
        if !memories.is_empty() {
            context_applied.push("memories".to_string());
        }
        if let Some(ref ctx) = user_context {
            context_applied.push(format!("relationship:{}", ctx.relationship.as_str()));
        }

        Ok(self.respond(
            response,
            conversation_id,
            &memories,
            Personality {
                tone: self.table.style(category).tone.to_string(),
                context_applied,
            },
            LearningSummary {
                new_memories_created: learned.memories_created,
                user_insights_gained: learned.insights,
            },
            tokens_used,
            memory_search_time_ms,
            started,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn respond(
        &self,
        response: String,
        conversation_id: String,
        memories: &[RetrievedMemory],
        personality: Personality,
        learning: LearningSummary,
        tokens_used: u32,
        memory_search_time_ms: u64,
        started: Instant,
    ) -> ChatResponse {
        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            tone = %personality.tone,
            tokens_used,
            processing_time_ms,
            "Chat message processed"
        );
        ChatResponse::new(
            ChatData {
                response,
                conversation_id,
                memories_used: memories_used(memories),
                personality,
                learning,
            },
            ChatMeta {
                processing_time_ms,
                tokens_used,
                memory_search_time_ms,
            },
        )
    }
}
