//! Anthropic messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use twin_common::Result;

use crate::client::{LlmClient, LlmRequest, LlmResponse, Speaker, TokenUsage};
use crate::transport::{joined_text, send_json};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "Anthropic";

/// The API requires `max_tokens`; this matches the category cap ceiling.
const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireTurn<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Serialize)]
struct WireTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: String,
    usage: Option<Usage>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

pub struct AnthropicClient {
    api_url: String,
    model: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(model: String, api_key: String) -> Self {
        Self::with_url(None, model, api_key)
    }

    pub fn with_url(api_url: Option<String>, model: String, api_key: String) -> Self {
        Self {
            api_url: api_url.unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
            model,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    fn body<'a>(&'a self, request: &'a LlmRequest) -> MessagesBody<'a> {
        MessagesBody {
            model: &self.model,
            system: request.system_prompt.as_deref(),
            messages: request
                .turns
                .iter()
                .map(|turn| WireTurn {
                    role: match turn.speaker {
                        Speaker::User => "user",
                        Speaker::Persona => "assistant",
                    },
                    content: &turn.text,
                })
                .collect(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            top_p: request.top_p,
        }
    }

    fn normalize(reply: MessagesReply) -> Result<LlmResponse> {
        let content = joined_text(
            PROVIDER,
            reply
                .content
                .into_iter()
                .filter(|block| block.kind == "text")
                .map(|block| block.text),
        )?;

        Ok(LlmResponse {
            content,
            model: reply.model,
            usage: reply.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
            finish_reason: reply.stop_reason,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let http = self
            .http_client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(&request));

        let reply: MessagesReply = send_json(PROVIDER, http).await?;
        Self::normalize(reply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Turn;

    fn client() -> AnthropicClient {
        AnthropicClient::new("claude-3-5-haiku-latest".to_string(), "sk-ant-test".to_string())
    }

    #[test]
    fn system_prompt_is_top_level() {
        let client = client();
        let mut request = LlmRequest::new("Be Ava.", "Hello").with_top_p(0.9);
        request.turns.push(Turn::persona("Hi there!"));
        request.turns.push(Turn::user("How are you?"));

        let json = serde_json::to_value(client.body(&request)).unwrap();
        assert_eq!(json["system"], "Be Ava.");
        assert_eq!(json["model"], "claude-3-5-haiku-latest");
        let turns = json["messages"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1]["role"], "assistant");
        assert!(turns.iter().all(|t| t["role"] != "system"));
        assert!((json["top_p"].as_f64().unwrap() - 0.9).abs() < 0.001);
    }

    #[test]
    fn max_tokens_is_always_sent() {
        let client = client();
        let json = serde_json::to_value(client.body(&LlmRequest::new("s", "Hello"))).unwrap();
        assert_eq!(json["max_tokens"], DEFAULT_MAX_TOKENS);

        let capped = LlmRequest::new("s", "Hello").with_max_tokens(240);
        let json = serde_json::to_value(client.body(&capped)).unwrap();
        assert_eq!(json["max_tokens"], 240);
    }

    #[test]
    fn only_text_blocks_are_kept() {
        let reply: MessagesReply = serde_json::from_str(
            r#"{
                "content": [
                    {"type": "text", "text": "Jazz, "},
                    {"type": "tool_use", "id": "t1"},
                    {"type": "text", "text": "mostly."}
                ],
                "model": "claude-3-5-haiku-20241022",
                "usage": {"input_tokens": 30, "output_tokens": 4},
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();
        let response = AnthropicClient::normalize(reply).unwrap();
        assert_eq!(response.content, "Jazz, mostly.");
        assert_eq!(response.usage.map(|u| u.total()), Some(34));
        assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn empty_reply_is_an_error() {
        let reply: MessagesReply =
            serde_json::from_str(r#"{"content": [], "model": "m"}"#).unwrap();
        assert!(AnthropicClient::normalize(reply).is_err());
    }
}
