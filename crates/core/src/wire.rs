//! Request and response bodies exchanged with the generation backend.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::profiles::{ConnectionConfig, DbType};
use crate::provider::Provider;

#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct ConnectRequest {
    pub db_type: DbType,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl From<&ConnectionConfig> for ConnectRequest {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            db_type: config.db_type,
            host: config.host.clone(),
            port: config.port,
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataResponse {
    pub metadata: Value,
    #[serde(default)]
    pub table_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SampleRequest {
    pub metadata: Value,
    pub provider: Provider,
    pub model_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SamplesResponse {
    #[serde(default)]
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationRequest {
    pub request: String,
    pub db_type: DbType,
    pub include_etl: bool,
    pub provider: Provider,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_info: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationResult {
    #[serde(default)]
    pub intent_summary: Option<String>,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub safety_notes: Vec<String>,
    #[serde(default)]
    pub tables_used: Vec<String>,
    #[serde(default)]
    pub etl_pipeline: Option<EtlPipeline>,
}

impl GenerationResult {
    /// SQL of a non-blocked result, if it is non-empty.
    #[must_use]
    pub fn runnable_sql(&self) -> Option<&str> {
        if self.is_blocked {
            return None;
        }
        self.sql.as_deref().filter(|sql| !sql.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EtlPipeline {
    #[serde(default)]
    pub extract: Option<ExtractStage>,
    #[serde(default)]
    pub transform: Option<Vec<String>>,
    #[serde(default)]
    pub load: Option<LoadStage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractStage {
    #[serde(default)]
    pub source_tables: Option<Vec<String>>,
    #[serde(default)]
    pub conditions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadStage {
    #[serde(default)]
    pub target_table: Option<String>,
    #[serde(default)]
    pub write_mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub sql: String,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryExecutionResult {
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub data: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub row_count: i64,
    #[serde(default)]
    pub message: Option<String>,
}
