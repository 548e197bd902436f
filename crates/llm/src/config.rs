use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use twin_common::{Result, TwinError};

use crate::anthropic::AnthropicClient;
use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::gemini::GeminiClient;
use crate::openai::OpenAiClient;
use crate::retry::{RetryConfig, RetryingClient};

/// Tag selecting one hosted generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = TwinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openrouter" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(TwinError::Config(format!("Unknown LLM provider: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_concurrent() -> usize {
    2
}

impl LlmConfig {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: None,
            api_key_env: None,
            api_url: None,
            max_concurrent_requests: default_max_concurrent(),
            retry: RetryConfig::default(),
        }
    }

    /// Resolve the API key from config, then from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        let env_var = self
            .api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env());
        std::env::var(env_var).ok().filter(|k| !k.is_empty())
    }
}

/// Bounds the number of in-flight requests to a provider.
pub struct SemaphoredClient {
    inner: Arc<dyn LlmClient>,
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl SemaphoredClient {
    pub fn new(inner: Arc<dyn LlmClient>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl LlmClient for SemaphoredClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| TwinError::Provider(format!("Semaphore acquire failed: {e}")))?;
        self.inner.complete(request).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Build a provider client wrapped with retry and a concurrency limit.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let base_client: Box<dyn LlmClient> = match config.provider {
        ProviderKind::OpenAi => Box::new(OpenAiClient::new(
            config.api_url.clone(),
            config.model.clone(),
            config.resolve_api_key(),
        )),
        ProviderKind::Anthropic => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                TwinError::Config("Anthropic requires an API key".to_string())
            })?;
            Box::new(AnthropicClient::with_url(
                config.api_url.clone(),
                config.model.clone(),
                api_key,
            ))
        }
        ProviderKind::Gemini => {
            let api_key = config
                .resolve_api_key()
                .ok_or_else(|| TwinError::Config("Gemini requires an API key".to_string()))?;
            Box::new(GeminiClient::new(
                config.api_url.clone(),
                config.model.clone(),
                api_key,
            ))
        }
    };

    let retrying: Box<dyn LlmClient> =
        Box::new(RetryingClient::new(base_client, config.retry.clone()));

    let semaphored = SemaphoredClient::new(Arc::from(retrying), config.max_concurrent_requests);

    Ok(Arc::new(semaphored))
}

/// Provider clients keyed by tag, with a default selection.
#[derive(Clone)]
pub struct ProviderRegistry {
    clients: HashMap<ProviderKind, Arc<dyn LlmClient>>,
    default_provider: ProviderKind,
}

impl ProviderRegistry {
    pub fn new(default_provider: ProviderKind, client: Arc<dyn LlmClient>) -> Self {
        let mut clients = HashMap::new();
        clients.insert(default_provider, client);
        Self {
            clients,
            default_provider,
        }
    }

    /// Build every configured provider. The default must be among them.
    pub fn from_configs(configs: &[LlmConfig], default_provider: ProviderKind) -> Result<Self> {
        let mut clients = HashMap::new();
        for config in configs {
            if clients.contains_key(&config.provider) {
                warn!(
                    provider = %config.provider,
                    model = %config.model,
                    "Ignoring duplicate provider entry"
                );
                continue;
            }
            clients.insert(config.provider, build_llm_client(config)?);
            info!(
                provider = %config.provider,
                model = %config.model,
                "Registered generation provider"
            );
        }

        if !clients.contains_key(&default_provider) {
            return Err(TwinError::Config(format!(
                "Default provider '{default_provider}' is not configured"
            )));
        }

        Ok(Self {
            clients,
            default_provider,
        })
    }

    pub fn with_provider(mut self, kind: ProviderKind, client: Arc<dyn LlmClient>) -> Self {
        self.clients.insert(kind, client);
        self
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    /// Client for `kind`, or the default when `None`.
    pub fn get(&self, kind: Option<ProviderKind>) -> Result<Arc<dyn LlmClient>> {
        let kind = kind.unwrap_or(self.default_provider);
        self.clients
            .get(&kind)
            .cloned()
            .ok_or_else(|| TwinError::Config(format!("Provider '{kind}' is not registered")))
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.clients.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
provider = "gemini"
model = "gemini-1.5-flash"
api_key = "g-test"
max_concurrent_requests = 4

[retry]
max_retries = 5
initial_delay_ms = 1000
max_delay_ms = 60000
backoff_multiplier = 3.0
"#;

    struct StaticClient(&'static str);

    #[async_trait]
    impl LlmClient for StaticClient {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
            Ok(LlmResponse {
                content: self.0.to_string(),
                model: self.0.to_string(),
                usage: None,
                finish_reason: None,
            })
        }
        fn model_name(&self) -> &str {
            self.0
        }
    }

    fn missing_key_config(provider: ProviderKind, model: &str) -> LlmConfig {
        LlmConfig {
            api_key_env: Some("TWIN_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..LlmConfig::new(provider, model)
        }
    }

    #[test]
    fn deserialize_config_from_toml() {
        let config: LlmConfig = toml::from_str(TOML_CONFIG).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.resolve_api_key().as_deref(), Some("g-test"));
    }

    #[test]
    fn deserialize_config_defaults() {
        let config: LlmConfig = toml::from_str(
            r#"
provider = "openai"
model = "gpt-4o-mini"
"#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.api_url.is_none());
    }

    #[test]
    fn provider_kind_parses_aliases() {
        assert_eq!("OpenRouter".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn build_openai_client_without_key() {
        let config = missing_key_config(ProviderKind::OpenAi, "llama3");
        let client = build_llm_client(&config).unwrap();
        assert_eq!(client.model_name(), "llama3");
    }

    #[test]
    fn build_anthropic_without_key_fails() {
        let config = missing_key_config(ProviderKind::Anthropic, "claude-3-5-haiku-latest");
        assert!(build_llm_client(&config).is_err());
    }

    #[test]
    fn build_gemini_without_key_fails() {
        let config = missing_key_config(ProviderKind::Gemini, "gemini-1.5-flash");
        assert!(build_llm_client(&config).is_err());
    }

    #[test]
    fn registry_requires_default_provider() {
        let configs = vec![missing_key_config(ProviderKind::OpenAi, "gpt-4o-mini")];
        assert!(ProviderRegistry::from_configs(&configs, ProviderKind::Gemini).is_err());
        let registry = ProviderRegistry::from_configs(&configs, ProviderKind::OpenAi).unwrap();
        assert_eq!(registry.providers(), vec![ProviderKind::OpenAi]);
    }

    #[test]
    fn registry_keeps_first_entry_per_provider() {
        let configs = vec![
            missing_key_config(ProviderKind::OpenAi, "first"),
            missing_key_config(ProviderKind::OpenAi, "second"),
        ];
        let registry = ProviderRegistry::from_configs(&configs, ProviderKind::OpenAi).unwrap();
        assert_eq!(registry.get(None).unwrap().model_name(), "first");
    }

    #[tokio::test]
    async fn registry_selects_by_tag() {
        let registry = ProviderRegistry::new(ProviderKind::Gemini, Arc::new(StaticClient("gemini")))
            .with_provider(ProviderKind::Anthropic, Arc::new(StaticClient("claude")));

        let default = registry.get(None).unwrap();
        assert_eq!(default.model_name(), "gemini");

        let claude = registry.get(Some(ProviderKind::Anthropic)).unwrap();
        let response = claude.complete(LlmRequest::default()).await.unwrap();
        assert_eq!(response.content, "claude");

        assert!(registry.get(Some(ProviderKind::OpenAi)).is_err());
    }

    #[tokio::test]
    async fn semaphored_client_limits_concurrency() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingClient {
            concurrent: Arc<AtomicU32>,
            max_seen: Arc<AtomicU32>,
        }

        #[async_trait]
        impl LlmClient for CountingClient {
            async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(30)).await;
                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(LlmResponse {
                    content: "ok".to_string(),
                    model: "test".to_string(),
                    usage: None,
                    finish_reason: None,
                })
            }
            fn model_name(&self) -> &str {
                "test"
            }
        }

        let max_seen = Arc::new(AtomicU32::new(0));
        let inner = Arc::new(CountingClient {
            concurrent: Arc::new(AtomicU32::new(0)),
            max_seen: max_seen.clone(),
        });
        let semaphored = Arc::new(SemaphoredClient::new(inner, 2));

        let mut handles = vec![];
        for _ in 0..6 {
            let client = semaphored.clone();
            handles.push(tokio::spawn(async move {
                client.complete(LlmRequest::default()).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
