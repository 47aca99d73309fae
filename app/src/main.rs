use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use nlsql_adapters::HttpBackend;
use nlsql_core::controller::GenerationDisplay;
use nlsql_core::form::MetadataSource;
use nlsql_core::profiles::{DbType, PRESETS};
use nlsql_core::settings::{self, ClientSettings};
use nlsql_core::view_model::{ResultBody, ResultView, ViewModel};
use nlsql_core::{html, ApiBackend, Session, ViewStateController};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nlsql", version, about = "Natural-language to SQL client")]
struct Cli {
    /// Base URL of the generation service.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive terminal client (default).
    Tui,
    /// List the quick-connect presets.
    Presets,
    /// Generate SQL for one request and print it.
    Generate {
        request: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        etl: bool,
        #[arg(long, default_value_t = DbType::PostgreSql)]
        db_type: DbType,
        /// JSON schema description sent as custom metadata.
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Also write the HTML fragments to this file.
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Print the backend's sample metadata for a database type.
    SamplesMetadata { db_type: DbType },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget {
    File,
    Stderr,
}

fn init_logging(settings: &ClientSettings, target: LogTarget) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File => {
            let path = settings::default_log_path()?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };
    installed.map_err(|error| anyhow::anyhow!("failed to install log subscriber: {error}"))
}

fn controller_for(settings: &ClientSettings) -> ViewStateController {
    ViewStateController::with_model(settings.default_model.clone())
}

fn list_presets() -> String {
    let mut out = String::new();
    for preset in &PRESETS {
        let _ = writeln!(
            out,
            "{:<16} {:<28} {} {}:{}/{}",
            preset.key,
            preset.name,
            preset.db_type.label(),
            preset.host,
            preset.port,
            preset.database
        );
    }
    out
}

fn render_text(view: &ViewModel) -> String {
    let mut out = String::new();
    let ResultView::Shown(generation) = &view.result else {
        return out;
    };

    let _ = writeln!(out, "Intent: {}", generation.intent_summary);
    match &generation.body {
        ResultBody::Blocked { reason } => {
            let _ = writeln!(out, "Blocked: {reason}");
        }
        ResultBody::Sql { sql } => {
            let _ = writeln!(out, "\n{sql}\n");
        }
    }
    for (title, items) in [
        ("Assumptions", &generation.assumptions),
        ("Safety notes", &generation.safety_notes),
        ("Tables", &generation.tables_used),
    ] {
        if let Some(items) = items {
            let _ = writeln!(out, "{title}:");
            for item in items {
                let _ = writeln!(out, "  - {item}");
            }
        }
    }
    if let Some(etl) = &generation.etl {
        let _ = writeln!(out, "ETL pipeline:");
        if let Some(extract) = &etl.extract {
            let _ = writeln!(
                out,
                "  extract: {} where {}",
                extract.source_tables, extract.conditions
            );
        }
        if let Some(steps) = &etl.transform {
            for step in steps {
                let _ = writeln!(out, "  transform: {step}");
            }
        }
        if let Some(load) = &etl.load {
            let _ = writeln!(out, "  load: {} ({})", load.target_table, load.write_mode);
        }
    }
    out
}

struct GenerateArgs {
    request: String,
    model: Option<String>,
    etl: bool,
    db_type: DbType,
    metadata: Option<PathBuf>,
    html: Option<PathBuf>,
}

async fn generate<B: ApiBackend + ?Sized>(
    backend: Arc<B>,
    settings: &ClientSettings,
    args: GenerateArgs,
) -> anyhow::Result<String> {
    let mut controller = controller_for(settings);
    controller.set_db_type(args.db_type);
    {
        let form = controller.request_form_mut();
        form.text = args.request;
        form.include_etl = args.etl;
        if let Some(model) = args.model {
            form.model_name = model;
        }
        if let Some(path) = &args.metadata {
            form.metadata_source = MetadataSource::Custom;
            form.custom_metadata = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
        }
    }

    let mut session = Session::new(backend, controller);
    session.generate().await?;

    let view = session.controller().view();
    if let Some(path) = &args.html {
        fs::write(path, html::render_document(&view))
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote HTML rendering");
    }

    if let GenerationDisplay::Failed(message) = session.controller().generation() {
        bail!("{message}");
    }
    Ok(render_text(&view))
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = ClientSettings::load_default()?.with_api_url_override(cli.api_url.as_deref());
    let command = cli.command.unwrap_or(Command::Tui);

    match command {
        Command::Tui => {
            init_logging(&settings, LogTarget::File)?;
            info!(api = %settings.api_base_url, "starting terminal client");
            let backend = Arc::new(HttpBackend::new(settings.api_base_url.clone())?);
            nlsql_tui::run(backend, controller_for(&settings))?;
        }
        Command::Presets => print!("{}", list_presets()),
        Command::Generate {
            request,
            model,
            etl,
            db_type,
            metadata,
            html,
        } => {
            init_logging(&settings, LogTarget::Stderr)?;
            let backend = Arc::new(HttpBackend::new(settings.api_base_url.clone())?);
            let args = GenerateArgs {
                request,
                model,
                etl,
                db_type,
                metadata,
                html,
            };
            let text = runtime()?.block_on(generate(backend, &settings, args))?;
            print!("{text}");
        }
        Command::SamplesMetadata { db_type } => {
            init_logging(&settings, LogTarget::Stderr)?;
            let backend = HttpBackend::new(settings.api_base_url.clone())?;
            let metadata = runtime()?.block_on(backend.sample_metadata(db_type))?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use clap::Parser;
    use nlsql_core::backend::{ApiBackend, ApiError};
    use nlsql_core::profiles::DbType;
    use nlsql_core::settings::ClientSettings;
    use nlsql_core::wire::{
        ConnectAck, ConnectRequest, ExecutionRequest, GenerationRequest, GenerationResult,
        MetadataResponse, QueryExecutionResult, SampleRequest, SamplesResponse,
    };
    use serde_json::Value;
    use tempfile::TempDir;

    use super::{generate, list_presets, Cli, Command, GenerateArgs};

    #[derive(Debug)]
    struct CannedBackend {
        result: Result<GenerationResult, ApiError>,
    }

    #[async_trait]
    impl ApiBackend for CannedBackend {
        async fn connect(&self, _request: &ConnectRequest) -> Result<ConnectAck, ApiError> {
            Ok(ConnectAck::default())
        }

        async fn disconnect(&self) -> Result<(), ApiError> {
            Ok(())
        }

        async fn extract_metadata(&self) -> Result<MetadataResponse, ApiError> {
            Err(ApiError::server(400, "Database not connected"))
        }

        async fn generate_samples(
            &self,
            _request: &SampleRequest,
        ) -> Result<SamplesResponse, ApiError> {
            Ok(SamplesResponse::default())
        }

        async fn generate_sql(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResult, ApiError> {
            assert_eq!(request.db_type, DbType::MySql);
            self.result.clone()
        }

        async fn execute_query(
            &self,
            _request: &ExecutionRequest,
        ) -> Result<QueryExecutionResult, ApiError> {
            Ok(QueryExecutionResult::default())
        }

        async fn sample_metadata(&self, _db_type: DbType) -> Result<Value, ApiError> {
            Ok(Value::Null)
        }
    }

    fn args(html: Option<std::path::PathBuf>) -> GenerateArgs {
        GenerateArgs {
            request: "top customers".to_string(),
            model: None,
            etl: false,
            db_type: DbType::MySql,
            metadata: None,
            html,
        }
    }

    #[test]
    fn no_subcommand_defaults_to_tui() {
        let cli = Cli::try_parse_from(["nlsql"]).expect("parse");
        assert!(cli.command.is_none());
        assert!(cli.api_url.is_none());
    }

    #[test]
    fn generate_flags_parse() {
        let cli = Cli::try_parse_from([
            "nlsql",
            "generate",
            "orders this week",
            "--db-type",
            "mysql",
            "--etl",
            "--api-url",
            "http://10.0.0.5:8080",
        ])
        .expect("parse");

        assert_eq!(cli.api_url.as_deref(), Some("http://10.0.0.5:8080"));
        let Some(Command::Generate {
            request,
            etl,
            db_type,
            ..
        }) = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(request, "orders this week");
        assert!(etl);
        assert_eq!(db_type, DbType::MySql);
    }

    #[test]
    fn unknown_db_type_is_rejected() {
        assert!(Cli::try_parse_from(["nlsql", "samples-metadata", "oracle"]).is_err());
    }

    #[test]
    fn presets_are_listed_by_key() {
        let listing = list_presets();
        assert_eq!(listing.lines().count(), 2);
        assert!(listing.contains("local_postgres"));
    }

    #[tokio::test]
    async fn generate_prints_sql_and_writes_html() {
        let dir = TempDir::new().expect("tempdir");
        let html_path = dir.path().join("result.html");
        let backend = Arc::new(CannedBackend {
            result: Ok(GenerationResult {
                intent_summary: Some("top <10> customers".to_string()),
                sql: Some("SELECT * FROM customers LIMIT 10".to_string()),
                ..GenerationResult::default()
            }),
        });

        let text = generate(backend, &ClientSettings::default(), args(Some(html_path.clone())))
            .await
            .expect("generation should succeed");

        assert!(text.contains("SELECT * FROM customers LIMIT 10"));
        let html = std::fs::read_to_string(html_path).expect("html written");
        assert!(html.contains("top &lt;10&gt; customers"));
    }

    #[tokio::test]
    async fn generation_failure_is_an_error() {
        let backend = Arc::new(CannedBackend {
            result: Err(ApiError::server(500, "SQL generation failed")),
        });

        let err = generate(backend, &ClientSettings::default(), args(None))
            .await
            .expect_err("generation should fail");
        assert!(err.to_string().contains("SQL generation failed"));
    }
}
