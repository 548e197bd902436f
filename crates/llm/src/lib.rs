//! Hosted text-generation providers behind a single client trait.
//!
//! Each backend (`openai`, `anthropic`, `gemini`) translates an
//! [`LlmRequest`] into its own wire format and normalizes the reply into an
//! [`LlmResponse`]. [`build_llm_client`] wraps a backend with retry and a
//! concurrency limit; [`ProviderRegistry`] selects one by [`ProviderKind`].

pub mod anthropic;
pub mod client;
pub mod config;
pub mod gemini;
pub mod openai;
pub mod retry;
mod transport;

pub use anthropic::AnthropicClient;
pub use client::{
    approximate_tokens, LlmClient, LlmRequest, LlmResponse, Speaker, TokenUsage, Turn,
};
pub use config::{LlmConfig, ProviderKind, ProviderRegistry, SemaphoredClient, build_llm_client};
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
