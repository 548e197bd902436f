//! Embedding generation through hosted embedding APIs.
//!
//! Two backends are provided: an OpenAI-compatible `/v1/embeddings` client
//! and a Gemini `embedContent` client. Both refuse empty or oversized input
//! instead of truncating it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use twin_common::{Result, TwinError};

/// Maximum accepted input length, in characters.
pub const MAX_EMBED_CHARS: usize = 8000;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A computed embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub model_id: String,
    pub approx_tokens: u32,
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
    fn model_id(&self) -> &str;
}

/// Reject input the embedding service must not see.
pub fn validate_embed_input(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(TwinError::Embedding("cannot embed empty text".to_string()));
    }
    let len = text.chars().count();
    if len > MAX_EMBED_CHARS {
        return Err(TwinError::Embedding(format!(
            "text is {len} characters, maximum is {MAX_EMBED_CHARS}"
        )));
    }
    Ok(())
}

fn approx_tokens(text: &str) -> u32 {
    text.chars().count().div_ceil(4) as u32
}

/// Which hosted embedding API to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAi,
    Gemini,
}

/// Configuration for the embedding client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Expected vector length. Responses of any other length are rejected.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_provider() -> EmbeddingProvider {
    EmbeddingProvider::OpenAi
}

fn default_model() -> String {
    "text-embedding-3-small".into()
}

fn default_dimension() -> usize {
    1536
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_url: None,
            api_key: None,
            dimension: default_dimension(),
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the API key from config, then from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        let env_var = match self.provider {
            EmbeddingProvider::OpenAi => "OPENAI_API_KEY",
            EmbeddingProvider::Gemini => "GEMINI_API_KEY",
        };
        std::env::var(env_var).ok().filter(|k| !k.is_empty())
    }
}

/// Build the configured embedding client.
pub fn build_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::OpenAi => Ok(Box::new(OpenAiEmbeddingClient::new(
            config.api_url.clone(),
            config.model.clone(),
            config.resolve_api_key(),
            config.dimension,
        ))),
        EmbeddingProvider::Gemini => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                TwinError::Config("Gemini embeddings require an API key".to_string())
            })?;
            Ok(Box::new(GeminiEmbeddingClient::new(
                config.api_url.clone(),
                config.model.clone(),
                api_key,
                config.dimension,
            )))
        }
    }
}

fn check_dimension(vector: &[f32], expected: usize, model: &str) -> Result<()> {
    if vector.len() != expected {
        return Err(TwinError::Embedding(format!(
            "Dimension mismatch: model '{}' returned {}-dim vector, expected {}",
            model,
            vector.len(),
            expected
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<OpenAiEmbeddingUsage>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingUsage {
    prompt_tokens: u32,
}

/// OpenAI-compatible embedding client.
pub struct OpenAiEmbeddingClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    http_client: reqwest::Client,
}

impl OpenAiEmbeddingClient {
    pub fn new(
        base_url: Option<String>,
        model: String,
        api_key: Option<String>,
        dimension: usize,
    ) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key,
            dimension,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Embedding> {
        validate_embed_input(text)?;

        let url = format!("{}/v1/embeddings", self.base_url);
        let mut http_req = self.http_client.post(&url).json(&OpenAiEmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| TwinError::Embedding(format!("Embedding network request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(TwinError::Embedding(format!(
                "Embedding API error {status}: {body_text}"
            )));
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| TwinError::Embedding(format!("Failed to parse embedding response: {e}")))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| TwinError::Embedding("Empty embedding result".to_string()))?;
        check_dimension(&vector, self.dimension, &self.model)?;

        debug!(dimension = vector.len(), "Generated embedding");

        Ok(Embedding {
            vector,
            model_id: parsed.model.unwrap_or_else(|| self.model.clone()),
            approx_tokens: parsed
                .usage
                .map(|u| u.prompt_tokens)
                .unwrap_or_else(|| approx_tokens(text)),
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GeminiEmbedRequest<'a> {
    content: GeminiEmbedContent<'a>,
}

#[derive(Serialize)]
struct GeminiEmbedContent<'a> {
    parts: [GeminiEmbedPart<'a>; 1],
}

#[derive(Serialize)]
struct GeminiEmbedPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiEmbedResponse {
    embedding: GeminiEmbedValues,
}

#[derive(Deserialize)]
struct GeminiEmbedValues {
    values: Vec<f32>,
}

/// Gemini `embedContent` client.
pub struct GeminiEmbeddingClient {
    base_url: String,
    model: String,
    api_key: String,
    dimension: usize,
    http_client: reqwest::Client,
}

impl GeminiEmbeddingClient {
    pub fn new(base_url: Option<String>, model: String, api_key: String, dimension: usize) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            api_key,
            dimension,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbeddingClient {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Embedding> {
        validate_embed_input(text)?;

        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);
        let body = GeminiEmbedRequest {
            content: GeminiEmbedContent {
                parts: [GeminiEmbedPart { text }],
            },
        };

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| TwinError::Embedding(format!("Embedding network request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(TwinError::Embedding(format!(
                "Embedding API error {status}: {body_text}"
            )));
        }

        let parsed: GeminiEmbedResponse = response
            .json()
            .await
            .map_err(|e| TwinError::Embedding(format!("Failed to parse embedding response: {e}")))?;

        let vector = parsed.embedding.values;
        check_dimension(&vector, self.dimension, &self.model)?;

        debug!(dimension = vector.len(), "Generated embedding");

        Ok(Embedding {
            vector,
            model_id: self.model.clone(),
            approx_tokens: approx_tokens(text),
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_input() {
        assert!(validate_embed_input("").is_err());
        assert!(validate_embed_input("  \t").is_err());
    }

    #[test]
    fn rejects_oversized_input() {
        assert!(validate_embed_input(&"a".repeat(MAX_EMBED_CHARS)).is_ok());
        assert!(validate_embed_input(&"a".repeat(MAX_EMBED_CHARS + 1)).is_err());
    }

    #[tokio::test]
    async fn client_fails_loudly_before_network_call() {
        let client = OpenAiEmbeddingClient::new(
            Some("http://127.0.0.1:9".to_string()),
            "text-embedding-3-small".to_string(),
            None,
            1536,
        );
        let err = client.embed("").await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        assert!(check_dimension(&[0.0; 3], 3, "m").is_ok());
        assert!(check_dimension(&[0.0; 3], 768, "m").is_err());
    }

    #[test]
    fn config_defaults() {
        let config: EmbeddingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.model, "text-embedding-3-small");
        assert_eq!(config.dimension, 1536);
    }

    #[test]
    fn gemini_request_shape() {
        let body = GeminiEmbedRequest {
            content: GeminiEmbedContent {
                parts: [GeminiEmbedPart { text: "hello" }],
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
    }

    #[tokio::test]
    #[ignore = "Calls the hosted embedding API; needs OPENAI_API_KEY"]
    async fn test_embed_single() {
        let config = EmbeddingConfig::default();
        let client = build_embedding_client(&config).unwrap();
        let embedding = client.embed("Hello, world!").await.unwrap();
        assert_eq!(embedding.vector.len(), config.dimension);
        assert!(embedding.vector.iter().any(|&x| x != 0.0));
    }
}
