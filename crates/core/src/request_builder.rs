use serde_json::Value;
use thiserror::Error;

use crate::connection_manager::ExtractedMetadata;
use crate::form::{MetadataSource, RequestForm};
use crate::profiles::DbType;
use crate::provider::Provider;
use crate::wire::{ExecutionRequest, GenerationRequest, SampleRequest};

/// Row cap sent with every execution request.
pub const EXECUTION_ROW_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("enter a natural-language request first")]
    EmptyRequest,
    #[error("there is no SQL to execute")]
    EmptySql,
    #[error("metadata JSON is malformed: {0}")]
    MalformedMetadata(#[source] serde_json::Error),
}

pub fn build_generation_request(
    form: &RequestForm,
    db_type: DbType,
    metadata: Option<&ExtractedMetadata>,
) -> Result<GenerationRequest, RequestError> {
    let request = form.text.trim();
    if request.is_empty() {
        return Err(RequestError::EmptyRequest);
    }

    let database_info = match form.metadata_source {
        MetadataSource::RealDatabase => metadata.map(|metadata| metadata.schema.clone()),
        MetadataSource::Custom if form.custom_metadata.trim().is_empty() => None,
        MetadataSource::Custom => Some(
            serde_json::from_str::<Value>(&form.custom_metadata)
                .map_err(RequestError::MalformedMetadata)?,
        ),
    };

    Ok(GenerationRequest {
        request: request.to_string(),
        db_type,
        include_etl: form.include_etl,
        provider: Provider::for_model(&form.model_name),
        model_name: form.model_name.clone(),
        database_info,
    })
}

pub fn build_execution_request(sql: &str) -> Result<ExecutionRequest, RequestError> {
    let sql = sql.trim();
    if sql.is_empty() {
        return Err(RequestError::EmptySql);
    }

    Ok(ExecutionRequest {
        sql: sql.to_string(),
        limit: EXECUTION_ROW_LIMIT,
    })
}

#[must_use]
pub fn build_sample_request(metadata: &ExtractedMetadata, model_name: &str) -> SampleRequest {
    SampleRequest {
        metadata: metadata.schema.clone(),
        provider: Provider::for_model(model_name),
        model_name: model_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        build_execution_request, build_generation_request, build_sample_request, RequestError,
        EXECUTION_ROW_LIMIT,
    };
    use crate::connection_manager::ExtractedMetadata;
    use crate::form::{MetadataSource, RequestForm};
    use crate::profiles::DbType;
    use crate::provider::Provider;

    fn metadata() -> ExtractedMetadata {
        ExtractedMetadata {
            schema: json!({"schema_summary": {"tables": [{"table_name": "users"}]}}),
            table_count: 1,
        }
    }

    fn form(text: &str) -> RequestForm {
        RequestForm {
            text: text.to_string(),
            ..RequestForm::default()
        }
    }

    #[test]
    fn blank_request_is_rejected_before_dispatch() {
        let err = build_generation_request(&form("   "), DbType::PostgreSql, None)
            .expect_err("blank request should fail");
        assert!(matches!(err, RequestError::EmptyRequest));
    }

    #[test]
    fn real_database_source_attaches_extracted_metadata() {
        let metadata = metadata();
        let request =
            build_generation_request(&form(" top users "), DbType::PostgreSql, Some(&metadata))
                .expect("request should build");

        assert_eq!(request.request, "top users");
        assert_eq!(request.database_info, Some(metadata.schema));
        assert_eq!(request.provider, Provider::OpenAi);
    }

    #[test]
    fn real_database_source_without_metadata_omits_database_info() {
        let request = build_generation_request(&form("top users"), DbType::MySql, None)
            .expect("request should build");
        assert!(request.database_info.is_none());
        assert_eq!(request.db_type, DbType::MySql);
    }

    #[test]
    fn custom_source_parses_json_and_ignores_extracted_metadata() {
        let mut form = form("top users");
        form.metadata_source = MetadataSource::Custom;
        form.custom_metadata = r#"{"tables": ["orders"]}"#.to_string();
        form.model_name = "gemini-pro".to_string();

        let request = build_generation_request(&form, DbType::PostgreSql, Some(&metadata()))
            .expect("request should build");
        assert_eq!(request.database_info, Some(json!({"tables": ["orders"]})));
        assert_eq!(request.provider, Provider::Google);
    }

    #[test]
    fn malformed_custom_json_aborts_generation() {
        let mut form = form("top users");
        form.metadata_source = MetadataSource::Custom;
        form.custom_metadata = "{not json".to_string();

        let err = build_generation_request(&form, DbType::PostgreSql, None)
            .expect_err("malformed metadata should fail");
        assert!(matches!(err, RequestError::MalformedMetadata(_)));
    }

    #[test]
    fn blank_custom_json_is_treated_as_absent() {
        let mut form = form("top users");
        form.metadata_source = MetadataSource::Custom;
        form.custom_metadata = "  \n".to_string();

        let request = build_generation_request(&form, DbType::PostgreSql, Some(&metadata()))
            .expect("request should build");
        assert!(request.database_info.is_none());
    }

    #[test]
    fn execution_request_trims_sql_and_uses_fixed_limit() {
        let request = build_execution_request("  SELECT 1;  ").expect("request should build");
        assert_eq!(request.sql, "SELECT 1;");
        assert_eq!(request.limit, EXECUTION_ROW_LIMIT);

        assert!(matches!(
            build_execution_request(" \n "),
            Err(RequestError::EmptySql)
        ));
    }

    #[test]
    fn sample_request_uses_same_provider_dispatch() {
        let metadata = metadata();
        let request = build_sample_request(&metadata, "gpt-5-nano-2025-08-07");
        assert_eq!(request.provider, Provider::OpenAi);
        assert_eq!(request.metadata, metadata.schema);

        let request = build_sample_request(&metadata, "gemini-1.5-flash");
        assert_eq!(request.provider, Provider::Google);
    }
}
