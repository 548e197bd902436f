//! HTTP route handlers for the API.

use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use twin_common::{validate_chat_request, ChatRequest, ChatResponse, ErrorEnvelope, TwinError};
use twin_llm::ProviderKind;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub store_available: bool,
    pub default_provider: ProviderKind,
}

/// Health check endpoint. Answers 503 while the memory store is unreachable.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let store_available = state.orchestrator.health_check().await;
    let (code, status) = if store_available {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: state.uptime_seconds(),
            store_available,
            default_provider: state.orchestrator.providers().default_provider(),
        }),
    )
}

/// Optional query parameters for a chat turn.
#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    /// Generation provider tag, e.g. `openai`. Defaults to the configured one.
    #[serde(default)]
    pub provider: Option<String>,
}

/// A failed request, rendered as an error envelope.
#[derive(Debug)]
pub struct ApiError(pub TwinError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            TwinError::Validation(_) => StatusCode::BAD_REQUEST,
            TwinError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TwinError> for ApiError {
    fn from(err: TwinError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "Chat request failed");
        } else {
            warn!(code = self.0.code(), error = %self.0, "Chat request rejected");
        }
        (status, Json(ErrorEnvelope::from(&self.0))).into_response()
    }
}

/// Run one conversation turn through the orchestrator.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChatQuery>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| TwinError::Validation(rejection.body_text()))?;
    let request = validate_chat_request(request)?;
    let provider = query
        .provider
        .as_deref()
        .map(str::parse::<ProviderKind>)
        .transpose()
        .map_err(|e| TwinError::Validation(e.to_string()))?;

    info!(
        user_id = ?request.user_id,
        conversation_id = ?request.conversation_id,
        provider = ?provider,
        "Received chat message"
    );

    let response = state
        .orchestrator
        .process_with_provider(request, provider)
        .await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError(TwinError::Validation("empty".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(TwinError::StoreUnavailable("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(TwinError::Provider("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(TwinError::Store("bad row".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            uptime_seconds: 100,
            store_available: true,
            default_provider: ProviderKind::Gemini,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains(r#""default_provider":"gemini""#));
    }

    #[test]
    fn test_chat_query_provider_is_optional() {
        let query: ChatQuery = serde_json::from_str("{}").unwrap();
        assert!(query.provider.is_none());
    }
}
