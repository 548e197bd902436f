//! PostgREST-backed vector store.
//!
//! Expects a `memories` table with a pgvector `embedding` column and a
//! `match_memories` RPC returning rows ordered by cosine similarity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use twin_common::{Result, TwinError};

use crate::store::{SearchFilter, VectorStore};
use crate::types::{Memory, MemoryType, RetrievedMemory, StoreConfig, Subject, Visibility};

const MEMORY_COLUMNS: &str =
    "id,content,type,subject,user_id,tags,visibility,mood,metadata,created_at,updated_at";

#[derive(Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_visibility: Option<Vec<Visibility>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_type: Option<MemoryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_subject: Option<Subject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_user_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct MatchRow {
    id: String,
    content: String,
    #[serde(rename = "type")]
    memory_type: MemoryType,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    mood: Option<String>,
    created_at: DateTime<Utc>,
    similarity: f32,
}

impl From<MatchRow> for RetrievedMemory {
    fn from(row: MatchRow) -> Self {
        RetrievedMemory {
            id: row.id,
            content: row.content,
            memory_type: row.memory_type,
            tags: row.tags.unwrap_or_default(),
            mood: row.mood,
            created_at: row.created_at,
            relevance_score: row.similarity.clamp(0.0, 1.0),
        }
    }
}

/// Visibility levels readable at `access`, for the RPC's `IN` filter.
fn visible_levels(access: Visibility) -> Vec<Visibility> {
    [
        Visibility::Public,
        Visibility::CloseFriends,
        Visibility::Private,
    ]
    .into_iter()
    .filter(|v| v.visible_at(access))
    .collect()
}

pub struct RestVectorStore {
    base_url: String,
    api_key: Option<String>,
    table: String,
    match_function: String,
    http_client: reqwest::Client,
}

impl RestVectorStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base_url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| TwinError::Config("REST store requires a url".to_string()))?
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            api_key: config.resolve_api_key(),
            table: config.table.clone(),
            match_function: config.match_function.clone(),
            http_client: reqwest::Client::new(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, path);
        let mut builder = self.http_client.request(method, url);
        if let Some(ref key) = self.api_key {
            builder = builder.header("apikey", key).bearer_auth(key);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder, op: &str) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| TwinError::StoreUnavailable(format!("{op} request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body_text = response.text().await.unwrap_or_default();
        Err(map_status_error(status, op, &body_text))
    }
}

fn map_status_error(status: StatusCode, op: &str, body: &str) -> TwinError {
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            TwinError::StoreUnavailable(format!("{op} failed with {status}: {body}"))
        }
        _ => TwinError::Store(format!("{op} failed with {status}: {body}")),
    }
}

#[async_trait]
impl VectorStore for RestVectorStore {
    #[instrument(skip(self, vector), fields(limit = filter.limit, threshold = filter.threshold))]
    async fn similarity_search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedMemory>> {
        let body = MatchRequest {
            query_embedding: vector,
            match_threshold: filter.threshold,
            match_count: filter.limit,
            filter_visibility: filter.visibility.map(visible_levels),
            filter_type: filter.memory_type,
            filter_subject: filter.subject,
            filter_user_id: filter.user_id.as_deref(),
        };

        let path = format!("rpc/{}", self.match_function);
        let response = self
            .send(
                self.request(reqwest::Method::POST, &path).json(&body),
                "similarity search",
            )
            .await?;

        let rows: Vec<MatchRow> = response
            .json()
            .await
            .map_err(|e| TwinError::Store(format!("Failed to parse search results: {e}")))?;

        let mut results: Vec<RetrievedMemory> = rows.into_iter().map(Into::into).collect();
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(filter.limit);

        debug!(returned = results.len(), "Similarity search complete");
        Ok(results)
    }

    #[instrument(skip(self, memory), fields(memory_id = %memory.id))]
    async fn insert(&self, memory: Memory) -> Result<Memory> {
        memory.validate()?;

        self.send(
            self.request(reqwest::Method::POST, &self.table)
                .header("Prefer", "return=minimal")
                .json(&memory),
            "insert",
        )
        .await?;

        Ok(memory)
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        memory_type: MemoryType,
        limit: usize,
    ) -> Result<Vec<Memory>> {
        let user_filter = format!("eq.{user_id}");
        let type_filter = format!("eq.{}", memory_type.as_str());
        let limit = limit.to_string();

        let response = self
            .send(
                self.request(reqwest::Method::GET, &self.table).query(&[
                    ("select", MEMORY_COLUMNS),
                    ("user_id", user_filter.as_str()),
                    ("type", type_filter.as_str()),
                    ("order", "created_at.desc"),
                    ("limit", limit.as_str()),
                ]),
                "user history",
            )
            .await?;

        response
            .json()
            .await
            .map_err(|e| TwinError::Store(format!("Failed to parse user history: {e}")))
    }

    async fn health_check(&self) -> bool {
        let ping = self
            .request(reqwest::Method::GET, &self.table)
            .query(&[("select", "id"), ("limit", "1")]);
        match self.send(ping, "health check").await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Vector store health check failed");
                false
            }
        }
    }
}
