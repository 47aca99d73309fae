use async_trait::async_trait;
use nlsql_core::backend::{ApiBackend, ApiError};
use nlsql_core::profiles::DbType;
use nlsql_core::wire::{
    ConnectAck, ConnectRequest, ExecutionRequest, GenerationRequest, GenerationResult,
    MetadataResponse, QueryExecutionResult, SampleRequest, SamplesResponse,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const CONNECT_PATH: &str = "/api/db/connect";
pub const DISCONNECT_PATH: &str = "/api/db/disconnect";
pub const METADATA_PATH: &str = "/api/db/metadata";
pub const EXECUTE_PATH: &str = "/api/db/execute";
pub const GENERATE_SQL_PATH: &str = "/api/generate-sql";
pub const GENERATE_SAMPLES_PATH: &str = "/api/generate-samples";
pub const SAMPLE_METADATA_PATH: &str = "/api/sample-metadata";

const CONNECT_FAILED: &str = "Connection failed";
const DISCONNECT_FAILED: &str = "Disconnect failed";
const METADATA_FAILED: &str = "Metadata extraction failed";
const SAMPLES_FAILED: &str = "Sample generation failed";
const GENERATION_FAILED: &str = "SQL generation failed";
const EXECUTION_FAILED: &str = "Query execution failed";
const SAMPLE_METADATA_FAILED: &str = "Failed to load sample metadata";

#[derive(Debug, Error)]
pub enum HttpBackendError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// [`ApiBackend`] over the generation service's REST API. No request timeout
/// is applied.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, HttpBackendError> {
        let client = Client::builder().pool_max_idle_per_host(5).build()?;
        Ok(Self::with_client(client, base_url))
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, fallback: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(to_transport_error)?;
        decode(response, fallback).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!(path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(to_transport_error)?;
        decode(response, fallback).await
    }
}

#[async_trait]
impl ApiBackend for HttpBackend {
    async fn connect(&self, request: &ConnectRequest) -> Result<ConnectAck, ApiError> {
        self.post_json(CONNECT_PATH, request, CONNECT_FAILED).await
    }

    async fn disconnect(&self) -> Result<(), ApiError> {
        debug!(path = DISCONNECT_PATH, "POST");
        let response = self
            .client
            .post(self.url(DISCONNECT_PATH))
            .send()
            .await
            .map_err(to_transport_error)?;
        ensure_success(response, DISCONNECT_FAILED).await.map(drop)
    }

    async fn extract_metadata(&self) -> Result<MetadataResponse, ApiError> {
        self.get_json(METADATA_PATH, METADATA_FAILED).await
    }

    async fn generate_samples(
        &self,
        request: &SampleRequest,
    ) -> Result<SamplesResponse, ApiError> {
        self.post_json(GENERATE_SAMPLES_PATH, request, SAMPLES_FAILED)
            .await
    }

    async fn generate_sql(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ApiError> {
        self.post_json(GENERATE_SQL_PATH, request, GENERATION_FAILED)
            .await
    }

    async fn execute_query(
        &self,
        request: &ExecutionRequest,
    ) -> Result<QueryExecutionResult, ApiError> {
        self.post_json(EXECUTE_PATH, request, EXECUTION_FAILED).await
    }

    async fn sample_metadata(&self, db_type: DbType) -> Result<Value, ApiError> {
        let path = format!("{SAMPLE_METADATA_PATH}/{}", db_type.as_str());
        self.get_json(&path, SAMPLE_METADATA_FAILED).await
    }
}

/// The `detail` field of an error body. Non-string details (validation error
/// lists) are returned as compact JSON.
#[must_use]
pub fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(detail) if detail.trim().is_empty() => None,
        Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}

async fn ensure_success(response: Response, fallback: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_detail(&body).unwrap_or_else(|| fallback.to_string());
    debug!(status = status.as_u16(), %message, "backend returned an error");
    Err(ApiError::server(status.as_u16(), message))
}

async fn decode<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T, ApiError> {
    ensure_success(response, fallback)
        .await?
        .json::<T>()
        .await
        .map_err(|error| ApiError::Decode(error.to_string()))
}

fn to_transport_error(error: reqwest::Error) -> ApiError {
    ApiError::Transport(error.to_string())
}
