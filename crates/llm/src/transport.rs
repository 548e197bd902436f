//! HTTP plumbing shared by the provider adapters.
//!
//! Failures are rendered as `"<Provider> API error <status>: <body>"` so the
//! retry wrapper and graceful degradation can recognize them by message.

use reqwest::header::RETRY_AFTER;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::debug;
use twin_common::{Result, TwinError};

/// Longest provider error body carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Send `request` and decode a successful JSON reply.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| TwinError::Provider(format!("{provider} network request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|v| format!(" (retry-after {v})"))
            .unwrap_or_default();
        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect();
        debug!(provider, %status, "Provider returned an error status");
        return Err(TwinError::Provider(format!(
            "{provider} API error {status}{retry_after}: {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| TwinError::Provider(format!("Failed to parse {provider} response: {e}")))
}

/// Concatenate text fragments, rejecting a reply with no visible text.
pub(crate) fn joined_text<I>(provider: &str, parts: I) -> Result<String>
where
    I: IntoIterator<Item = String>,
{
    let text: String = parts.into_iter().collect();
    if text.trim().is_empty() {
        return Err(TwinError::Provider(format!(
            "Empty content in {provider} response"
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_text_concatenates() {
        let text = joined_text("Test", vec!["Hel".to_string(), "lo".to_string()]).unwrap();
        assert_eq!(text, "Hello");
    }

    #[test]
    fn joined_text_rejects_blank() {
        let err = joined_text("Test", vec![" ".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Provider error: Empty content in Test response");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let request = reqwest::Client::new().post("http://127.0.0.1:9/v1");
        let err = send_json::<serde_json::Value>("Test", request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Test network request failed"));
    }
}
