//! Google Gemini `generateContent`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use twin_common::{Result, TwinError};

use crate::client::{LlmClient, LlmRequest, LlmResponse, Speaker, TokenUsage};
use crate::transport::{joined_text, send_json};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROVIDER: &str = "Gemini";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateReply {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ReplyContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(base_url: Option<String>, model: String, api_key: String) -> Self {
        let base_url = base_url.unwrap_or_else(|| GEMINI_API_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    fn body(request: &LlmRequest) -> GenerateBody<'_> {
        GenerateBody {
            contents: request
                .turns
                .iter()
                .map(|turn| Content {
                    role: Some(match turn.speaker {
                        Speaker::User => "user",
                        Speaker::Persona => "model",
                    }),
                    parts: [Part { text: &turn.text }],
                })
                .collect(),
            system_instruction: request.system_prompt.as_deref().map(|text| Content {
                role: None,
                parts: [Part { text }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_p: request.top_p,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn normalize(&self, reply: GenerateReply) -> Result<LlmResponse> {
        let Some(candidate) = reply.candidates.into_iter().next() else {
            return Err(TwinError::Provider(format!("No candidates in {PROVIDER} response")));
        };
        let finish_reason = candidate.finish_reason;
        let parts = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.text);

        // A blocked candidate has no text; surface why.
        let content = joined_text(PROVIDER, parts).map_err(|_| {
            TwinError::Provider(format!(
                "Empty content in {PROVIDER} response (finish reason: {})",
                finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

        Ok(LlmResponse {
            content,
            model: reply.model_version.unwrap_or_else(|| self.model.clone()),
            usage: reply.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            }),
            finish_reason,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let http = self
            .http_client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::body(&request));

        let reply: GenerateReply = send_json(PROVIDER, http).await?;
        self.normalize(reply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
