use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::profiles::DbType;
use crate::wire::{
    ConnectAck, ConnectRequest, ExecutionRequest, GenerationRequest, GenerationResult,
    MetadataResponse, QueryExecutionResult, SampleRequest, SamplesResponse,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Non-2xx response. `message` is the body's `detail` or a per-call fallback.
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }
}

/// The REST surface of the generation backend.
#[async_trait]
pub trait ApiBackend: Send + Sync {
    async fn connect(&self, request: &ConnectRequest) -> Result<ConnectAck, ApiError>;
    async fn disconnect(&self) -> Result<(), ApiError>;
    async fn extract_metadata(&self) -> Result<MetadataResponse, ApiError>;
    async fn generate_samples(&self, request: &SampleRequest)
        -> Result<SamplesResponse, ApiError>;
    async fn generate_sql(&self, request: &GenerationRequest)
        -> Result<GenerationResult, ApiError>;
    async fn execute_query(
        &self,
        request: &ExecutionRequest,
    ) -> Result<QueryExecutionResult, ApiError>;
    async fn sample_metadata(&self, db_type: DbType) -> Result<Value, ApiError>;
}
