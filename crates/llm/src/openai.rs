//! OpenAI-compatible chat completions.
//!
//! Also serves OpenRouter and other compatible gateways through `base_url`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use twin_common::{Result, TwinError};

use crate::client::{LlmClient, LlmRequest, LlmResponse, Speaker, TokenUsage};
use crate::transport::{joined_text, send_json};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const PROVIDER: &str = "OpenAI";

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, model: String, api_key: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    fn body<'a>(&'a self, request: &'a LlmRequest) -> CompletionBody<'a> {
        let system = request.system_prompt.as_deref().map(|content| WireMessage {
            role: "system",
            content,
        });
        let turns = request.turns.iter().map(|turn| WireMessage {
            role: match turn.speaker {
                Speaker::User => "user",
                Speaker::Persona => "assistant",
            },
            content: &turn.text,
        });

        CompletionBody {
            model: &self.model,
            messages: system.into_iter().chain(turns).collect(),
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
        }
    }

    fn normalize(&self, reply: CompletionReply) -> Result<LlmResponse> {
        let Some(choice) = reply.choices.into_iter().next() else {
            return Err(TwinError::Provider(format!("No choices in {PROVIDER} response")));
        };
        let content = joined_text(PROVIDER, choice.message.content)?;

        Ok(LlmResponse {
            content,
            model: reply.model.unwrap_or_else(|| self.model.clone()),
            usage: reply.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut http = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&self.body(&request));
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let reply: CompletionReply = send_json(PROVIDER, http).await?;
        self.normalize(reply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
