use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::{Call, Completion, Pending};
use crate::backend::ApiError;
use crate::connection_manager::{ConnectionError, ConnectionManager, ExtractedMetadata};
use crate::form::{ConnectionForm, MetadataSource, RequestForm};
use crate::profiles::DbType;
use crate::request_builder::{
    build_execution_request, build_generation_request, build_sample_request, RequestError,
};
use crate::request_tokens::{ActionFamily, Applied, RequestToken, RequestTokens};
use crate::view_model::{self, ViewModel};
use crate::wire::{
    ConnectAck, GenerationResult, MetadataResponse, QueryExecutionResult, SamplesResponse,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A one-off message for the user, the equivalent of an alert box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Local precondition failures. None of them issue a network call.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("no extracted metadata yet; run Extract Schema first")]
    NoMetadata,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GenerationDisplay {
    #[default]
    Empty,
    Generated(GenerationResult),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExecutionDisplay {
    #[default]
    Hidden,
    Running,
    Finished(QueryExecutionResult),
    Failed(String),
}

/// Result of applying a completion: whether it reached the view, plus an
/// optional dependent call to issue next.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub applied: Applied,
    pub follow_up: Option<Call>,
}

impl Update {
    fn current() -> Self {
        Self {
            applied: Applied::Current,
            follow_up: None,
        }
    }

    fn stale() -> Self {
        Self {
            applied: Applied::Stale,
            follow_up: None,
        }
    }
}

impl From<Applied> for Update {
    fn from(applied: Applied) -> Self {
        Self {
            applied,
            follow_up: None,
        }
    }
}

/// The whole client-side state. Every user action goes through a `begin_*`
/// method that runs guards and returns the [`Call`] to perform, and every
/// response comes back through [`ViewStateController::apply`].
#[derive(Debug, Default)]
pub struct ViewStateController {
    connection: ConnectionManager,
    connection_form: ConnectionForm,
    request_form: RequestForm,
    sql_editor: String,
    generation: GenerationDisplay,
    execution: ExecutionDisplay,
    samples: Vec<String>,
    connection_form_collapsed: bool,
    metadata_viewer_open: bool,
    notice: Option<Notice>,
    tokens: RequestTokens,
}

impl ViewStateController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_model(model_name: impl Into<String>) -> Self {
        let mut controller = Self::default();
        controller.request_form.model_name = model_name.into();
        controller
    }

    #[must_use]
    pub fn view(&self) -> ViewModel {
        view_model::render(self)
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    #[must_use]
    pub fn connection_form(&self) -> &ConnectionForm {
        &self.connection_form
    }

    pub fn connection_form_mut(&mut self) -> &mut ConnectionForm {
        &mut self.connection_form
    }

    #[must_use]
    pub fn request_form(&self) -> &RequestForm {
        &self.request_form
    }

    pub fn request_form_mut(&mut self) -> &mut RequestForm {
        &mut self.request_form
    }

    #[must_use]
    pub fn sql_editor(&self) -> &str {
        &self.sql_editor
    }

    /// The SQL editor is only editable while the SQL panel is shown.
    pub fn sql_editor_mut(&mut self) -> Option<&mut String> {
        match &self.generation {
            GenerationDisplay::Generated(result) if !result.is_blocked => {
                Some(&mut self.sql_editor)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn generation(&self) -> &GenerationDisplay {
        &self.generation
    }

    #[must_use]
    pub fn current_result(&self) -> Option<&GenerationResult> {
        match &self.generation {
            GenerationDisplay::Generated(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn execution(&self) -> &ExecutionDisplay {
        &self.execution
    }

    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    #[must_use]
    pub fn connection_form_collapsed(&self) -> bool {
        self.connection_form_collapsed
    }

    pub fn toggle_connection_form(&mut self) {
        self.connection_form_collapsed = !self.connection_form_collapsed;
    }

    #[must_use]
    pub fn metadata_viewer_open(&self) -> bool {
        self.metadata_viewer_open
    }

    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.tokens.in_flight(ActionFamily::Connect)
    }

    #[must_use]
    pub fn is_extracting(&self) -> bool {
        self.tokens.in_flight(ActionFamily::Extract)
    }

    #[must_use]
    pub fn is_refreshing_samples(&self) -> bool {
        self.tokens.in_flight(ActionFamily::Samples)
    }

    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.tokens.in_flight(ActionFamily::Generate)
    }

    /// Copy and execute are enabled iff the current result is not blocked and
    /// carries non-empty SQL.
    #[must_use]
    pub fn has_runnable_result(&self) -> bool {
        self.current_result()
            .and_then(GenerationResult::runnable_sql)
            .is_some()
    }

    pub fn select_preset(&mut self, key: &str) -> bool {
        let applied = self.connection_form.apply_preset(key);
        debug!(preset = key, applied, "quick connect preset selected");
        applied
    }

    pub fn set_db_type(&mut self, db_type: DbType) {
        self.connection_form.set_db_type(db_type);
    }

    pub fn begin_connect(&mut self) -> Result<Call, GuardError> {
        let config = self.connection_form.to_config();
        let request = match self.connection.begin_connect(config) {
            Ok(request) => request,
            Err(error) => return Err(self.reject(error.into())),
        };

        info!(
            db_type = %request.db_type,
            host = %request.host,
            port = request.port,
            database = %request.database,
            "connecting to database"
        );
        let token = self.tokens.issue(ActionFamily::Connect);
        Ok(Call::Connect(Pending {
            token,
            payload: request,
        }))
    }

    pub fn finish_connect(
        &mut self,
        token: RequestToken,
        outcome: Result<ConnectAck, ApiError>,
    ) -> Applied {
        if self.tokens.settle(token) == Applied::Stale {
            debug!("discarding superseded connect response");
            return Applied::Stale;
        }

        match &outcome {
            Ok(ack) => info!(version = ?ack.version, "database connected"),
            Err(error) => warn!(%error, "database connection failed"),
        }
        let connected = outcome.is_ok();
        self.connection.complete_connect(outcome);
        if connected {
            self.connection_form_collapsed = true;
        }
        Applied::Current
    }

    /// Resets local state unconditionally and returns the best-effort backend
    /// notification to send.
    pub fn disconnect(&mut self) -> Call {
        if self.connection.disconnect() {
            info!("disconnected from database");
        }
        for family in [
            ActionFamily::Connect,
            ActionFamily::Extract,
            ActionFamily::Samples,
            ActionFamily::Execute,
        ] {
            self.tokens.invalidate(family);
        }
        if self.execution == ExecutionDisplay::Running {
            self.execution = ExecutionDisplay::Hidden;
        }
        self.metadata_viewer_open = false;
        self.connection_form_collapsed = false;
        Call::Disconnect
    }

    pub fn finish_disconnect(&mut self, outcome: Result<(), ApiError>) {
        if let Err(error) = outcome {
            warn!(%error, "backend disconnect failed; local state already reset");
        }
    }

    pub fn begin_extract(&mut self) -> Result<Call, GuardError> {
        if let Err(error) = self.connection.ensure_connected() {
            return Err(self.reject(error.into()));
        }

        Ok(Call::Extract(self.tokens.issue(ActionFamily::Extract)))
    }

    pub fn finish_extract(
        &mut self,
        token: RequestToken,
        outcome: Result<MetadataResponse, ApiError>,
    ) -> Update {
        if self.tokens.settle(token) == Applied::Stale {
            debug!("discarding superseded metadata response");
            return Update::stale();
        }

        match outcome {
            Ok(response) => {
                let table_count = self.connection.cache_metadata(response).table_count;
                info!(table_count, "schema metadata extracted");
                self.notice = Some(Notice::info(format!(
                    "Extracted metadata for {table_count} tables. Generating sample queries from it."
                )));
                Update {
                    applied: Applied::Current,
                    follow_up: self.begin_samples(),
                }
            }
            Err(error) => {
                warn!(%error, "schema metadata extraction failed");
                self.notice = Some(Notice::error(format!(
                    "Metadata extraction failed: {error}"
                )));
                Update::current()
            }
        }
    }

    /// Sample generation for the cached metadata, if there is any.
    pub fn begin_samples(&mut self) -> Option<Call> {
        let metadata = self.connection.metadata()?;
        let payload = build_sample_request(metadata, &self.request_form.model_name);
        let token = self.tokens.issue(ActionFamily::Samples);
        Some(Call::Samples(Pending { token, payload }))
    }

    pub fn refresh_samples(&mut self) -> Result<Call, GuardError> {
        match self.begin_samples() {
            Some(call) => Ok(call),
            None => Err(self.reject(GuardError::NoMetadata)),
        }
    }

    pub fn finish_samples(
        &mut self,
        token: RequestToken,
        outcome: Result<SamplesResponse, ApiError>,
    ) -> Applied {
        if self.tokens.settle(token) == Applied::Stale {
            return Applied::Stale;
        }

        match outcome {
            Ok(response) if response.samples.is_empty() => {
                debug!("backend returned no sample queries");
            }
            Ok(response) => {
                debug!(count = response.samples.len(), "sample queries received");
                self.samples = response.samples;
            }
            Err(error) => warn!(%error, "sample query generation failed"),
        }
        Applied::Current
    }

    /// Copies a sample query into the request text.
    pub fn choose_sample(&mut self, index: usize) -> bool {
        let Some(sample) = self.samples.get(index) else {
            return false;
        };
        self.request_form.text.clone_from(sample);
        true
    }

    pub fn begin_generate(&mut self) -> Result<Call, GuardError> {
        let built = build_generation_request(
            &self.request_form,
            self.connection_form.db_type,
            self.connection.metadata(),
        );
        let payload = match built {
            Ok(payload) => payload,
            Err(error) => return Err(self.reject(error.into())),
        };

        debug!(
            provider = %payload.provider,
            model = %payload.model_name,
            include_etl = payload.include_etl,
            with_database_info = payload.database_info.is_some(),
            "requesting SQL generation"
        );
        let token = self.tokens.issue(ActionFamily::Generate);
        Ok(Call::Generate(Pending { token, payload }))
    }

    pub fn finish_generate(
        &mut self,
        token: RequestToken,
        outcome: Result<GenerationResult, ApiError>,
    ) -> Applied {
        if self.tokens.settle(token) == Applied::Stale {
            debug!("discarding superseded generation response");
            return Applied::Stale;
        }

        match outcome {
            Ok(result) => {
                info!(blocked = result.is_blocked, "SQL generation finished");
                self.tokens.invalidate(ActionFamily::Execute);
                self.execution = ExecutionDisplay::Hidden;
                self.sql_editor = result.runnable_sql().unwrap_or_default().to_string();
                self.generation = GenerationDisplay::Generated(result);
            }
            Err(error) => {
                warn!(%error, "SQL generation failed");
                self.sql_editor.clear();
                self.generation = GenerationDisplay::Failed(error.to_string());
            }
        }
        Applied::Current
    }

    pub fn begin_execute(&mut self) -> Result<Call, GuardError> {
        if let Err(error) = self.connection.ensure_connected() {
            return Err(self.reject(error.into()));
        }
        if !self.has_runnable_result() {
            return Err(self.reject(RequestError::EmptySql.into()));
        }
        let payload = match build_execution_request(&self.sql_editor) {
            Ok(payload) => payload,
            Err(error) => return Err(self.reject(error.into())),
        };

        let token = self.tokens.issue(ActionFamily::Execute);
        self.execution = ExecutionDisplay::Running;
        Ok(Call::Execute(Pending { token, payload }))
    }

    pub fn finish_execute(
        &mut self,
        token: RequestToken,
        outcome: Result<QueryExecutionResult, ApiError>,
    ) -> Applied {
        if self.tokens.settle(token) == Applied::Stale {
            debug!("discarding superseded execution response");
            return Applied::Stale;
        }

        self.execution = match outcome {
            Ok(result) => {
                info!(row_count = result.row_count, "query executed");
                ExecutionDisplay::Finished(result)
            }
            Err(error) => {
                warn!(%error, "query execution failed");
                ExecutionDisplay::Failed(error.to_string())
            }
        };
        Applied::Current
    }

    pub fn close_execution_panel(&mut self) {
        self.tokens.invalidate(ActionFamily::Execute);
        self.execution = ExecutionDisplay::Hidden;
    }

    /// Text to put on the clipboard, when copying is enabled.
    #[must_use]
    pub fn copy_sql(&self) -> Option<String> {
        if !self.has_runnable_result() || self.sql_editor.trim().is_empty() {
            return None;
        }
        Some(self.sql_editor.clone())
    }

    pub fn finish_copy(&mut self, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => self.notice = Some(Notice::info("SQL copied to clipboard")),
            Err(error) => warn!(%error, "failed to copy SQL"),
        }
    }

    pub fn open_metadata_viewer(&mut self) -> Result<(), GuardError> {
        if self.connection.metadata().is_none() {
            return Err(self.reject(GuardError::NoMetadata));
        }
        self.metadata_viewer_open = true;
        Ok(())
    }

    pub fn close_metadata_viewer(&mut self) {
        self.metadata_viewer_open = false;
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&ExtractedMetadata> {
        self.connection.metadata()
    }

    pub fn load_sample_metadata(&mut self) -> Call {
        let token = self.tokens.issue(ActionFamily::SampleMetadata);
        Call::SampleMetadata(Pending {
            token,
            payload: self.connection_form.db_type,
        })
    }

    /// Puts the backend's demo schema for `db_type` into the custom metadata
    /// editor and switches generation to use it.
    pub fn finish_sample_metadata(
        &mut self,
        token: RequestToken,
        db_type: DbType,
        outcome: Result<Value, ApiError>,
    ) -> Applied {
        if self.tokens.settle(token) == Applied::Stale {
            debug!(%db_type, "discarding superseded sample metadata");
            return Applied::Stale;
        }
        let value = match outcome {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, %db_type, "failed to load sample metadata");
                return Applied::Current;
            }
        };

        match serde_json::to_string_pretty(&value) {
            Ok(rendered) => {
                self.request_form.custom_metadata = rendered;
                self.request_form.metadata_source = MetadataSource::Custom;
                self.notice = Some(Notice::info(format!(
                    "Loaded sample {} metadata",
                    db_type.label()
                )));
            }
            Err(error) => warn!(%error, "failed to render sample metadata"),
        }
        Applied::Current
    }

    pub fn apply(&mut self, completion: Completion) -> Update {
        match completion {
            Completion::Connected { token, outcome } => self.finish_connect(token, outcome).into(),
            Completion::Disconnected(outcome) => {
                self.finish_disconnect(outcome);
                Update::current()
            }
            Completion::Extracted { token, outcome } => self.finish_extract(token, outcome),
            Completion::Sampled { token, outcome } => self.finish_samples(token, outcome).into(),
            Completion::Generated { token, outcome } => {
                self.finish_generate(token, outcome).into()
            }
            Completion::Executed { token, outcome } => self.finish_execute(token, outcome).into(),
            Completion::SampleMetadataLoaded {
                token,
                db_type,
                outcome,
            } => self.finish_sample_metadata(token, db_type, outcome).into(),
        }
    }

    fn reject(&mut self, error: GuardError) -> GuardError {
        debug!(%error, "action rejected locally");
        self.notice = Some(Notice::warning(error.to_string()));
        error
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        ExecutionDisplay, GenerationDisplay, GuardError, NoticeLevel, ViewStateController,
    };
    use crate::action::{Call, Pending};
    use crate::backend::ApiError;
    use crate::connection_manager::ConnectionError;
    use crate::form::MetadataSource;
    use crate::profiles::{DbType, PRESETS};
    use crate::request_builder::RequestError;
    use crate::request_tokens::{Applied, RequestToken};
    use crate::wire::{
        ConnectAck, GenerationResult, MetadataResponse, QueryExecutionResult, SamplesResponse,
    };

    fn connect_token(call: Call) -> RequestToken {
        match call {
            Call::Connect(Pending { token, .. }) => token,
            other => panic!("expected connect call, got {other:?}"),
        }
    }

    fn generate_token(call: Call) -> RequestToken {
        match call {
            Call::Generate(Pending { token, .. }) => token,
            other => panic!("expected generate call, got {other:?}"),
        }
    }

    fn connected_controller() -> ViewStateController {
        let mut controller = ViewStateController::new();
        assert!(controller.select_preset(PRESETS[0].key));
        let call = controller.begin_connect().expect("connect should start");
        let applied = controller.finish_connect(connect_token(call), Ok(ConnectAck::default()));
        assert_eq!(applied, Applied::Current);
        controller
    }

    fn sql_result(sql: &str) -> GenerationResult {
        GenerationResult {
            intent_summary: Some("recent orders".to_string()),
            sql: Some(sql.to_string()),
            ..GenerationResult::default()
        }
    }

    fn generate_with(
        controller: &mut ViewStateController,
        outcome: Result<GenerationResult, ApiError>,
    ) {
        controller.request_form_mut().text = "recent orders".to_string();
        let call = controller.begin_generate().expect("generate should start");
        controller.finish_generate(generate_token(call), outcome);
    }

    #[test]
    fn connect_with_blank_fields_is_guarded_without_a_call() {
        let mut controller = ViewStateController::new();
        controller.connection_form_mut().database = "shop".to_string();

        let err = controller
            .begin_connect()
            .expect_err("blank host and user should be rejected");
        assert!(matches!(
            err,
            GuardError::Connection(ConnectionError::MissingFields(_))
        ));
        assert!(!controller.is_connecting());
        assert_eq!(
            controller.notice().map(|notice| notice.level),
            Some(NoticeLevel::Warning)
        );
    }

    #[test]
    fn successful_connect_collapses_form_and_disconnect_clears_metadata() {
        let mut controller = connected_controller();
        assert!(controller.connection().is_connected());
        assert!(controller.connection_form_collapsed());

        let Call::Extract(token) = controller.begin_extract().expect("extract should start")
        else {
            panic!("expected extract call");
        };
        controller.finish_extract(
            token,
            Ok(MetadataResponse {
                metadata: json!({"tables": ["users"]}),
                table_count: 1,
            }),
        );
        assert!(controller.metadata().is_some());

        assert_eq!(controller.disconnect(), Call::Disconnect);
        assert!(!controller.connection().is_connected());
        assert!(controller.metadata().is_none());
        assert!(!controller.connection_form_collapsed());
    }

    #[test]
    fn extract_requires_connection() {
        let mut controller = ViewStateController::new();
        let err = controller
            .begin_extract()
            .expect_err("extract should be guarded");
        assert!(matches!(
            err,
            GuardError::Connection(ConnectionError::NotConnected)
        ));
        assert!(!controller.is_extracting());
    }

    #[test]
    fn extract_success_schedules_sample_generation() {
        let mut controller = connected_controller();
        let Call::Extract(token) = controller.begin_extract().expect("extract should start")
        else {
            panic!("expected extract call");
        };
        assert!(controller.is_extracting());

        let update = controller.finish_extract(
            token,
            Ok(MetadataResponse {
                metadata: json!({"tables": ["users", "orders"]}),
                table_count: 2,
            }),
        );
        assert!(!controller.is_extracting());
        assert!(matches!(update.follow_up, Some(Call::Samples(_))));
        assert!(controller
            .notice()
            .is_some_and(|notice| notice.message.contains("2 tables")));
    }

    #[test]
    fn extract_failure_restores_trigger_and_reports_error() {
        let mut controller = connected_controller();
        let Call::Extract(token) = controller.begin_extract().expect("extract should start")
        else {
            panic!("expected extract call");
        };

        let update = controller.finish_extract(token, Err(ApiError::server(400, "boom")));
        assert!(update.follow_up.is_none());
        assert!(!controller.is_extracting());
        assert_eq!(
            controller.notice().map(|notice| notice.level),
            Some(NoticeLevel::Error)
        );
    }

    #[test]
    fn sample_failure_is_silent_and_empty_list_keeps_previous_samples() {
        let mut controller = connected_controller();
        let Call::Extract(token) = controller.begin_extract().expect("extract should start")
        else {
            panic!("expected extract call");
        };
        let update = controller.finish_extract(
            token,
            Ok(MetadataResponse {
                metadata: json!({}),
                table_count: 0,
            }),
        );
        let Some(Call::Samples(pending)) = update.follow_up else {
            panic!("expected samples follow-up");
        };
        controller.finish_samples(
            pending.token,
            Ok(SamplesResponse {
                samples: vec!["count users".to_string()],
            }),
        );
        assert_eq!(controller.samples(), ["count users".to_string()]);

        let Ok(Call::Samples(pending)) = controller.refresh_samples() else {
            panic!("expected samples call");
        };
        controller.take_notice();
        controller.finish_samples(pending.token, Err(ApiError::Transport("down".into())));
        assert_eq!(controller.samples(), ["count users".to_string()]);
        assert!(controller.notice().is_none());

        assert!(controller.choose_sample(0));
        assert_eq!(controller.request_form().text, "count users");
        assert!(!controller.choose_sample(5));
    }

    #[test]
    fn blocked_result_hides_sql_and_disables_actions() {
        let mut controller = connected_controller();
        let blocked = GenerationResult {
            is_blocked: true,
            block_reason: Some("destructive request".to_string()),
            sql: Some("DROP TABLE users".to_string()),
            assumptions: vec!["none".to_string()],
            ..GenerationResult::default()
        };
        generate_with(&mut controller, Ok(blocked));

        assert!(!controller.has_runnable_result());
        assert!(controller.copy_sql().is_none());
        assert!(controller.sql_editor().is_empty());
        assert!(controller.sql_editor_mut().is_none());
        let err = controller
            .begin_execute()
            .expect_err("execute should be guarded");
        assert!(matches!(err, GuardError::Request(RequestError::EmptySql)));
    }

    #[test]
    fn sql_result_populates_editor_verbatim() {
        let sql = "SELECT id,\n       name\nFROM users  -- <b>\nLIMIT 10;";
        let mut controller = connected_controller();
        generate_with(&mut controller, Ok(sql_result(sql)));

        assert_eq!(controller.sql_editor(), sql);
        assert_eq!(controller.copy_sql().as_deref(), Some(sql));
        assert!(controller.has_runnable_result());
    }

    #[test]
    fn generation_error_clears_current_result() {
        let mut controller = connected_controller();
        generate_with(&mut controller, Ok(sql_result("SELECT 1")));
        generate_with(&mut controller, Err(ApiError::server(500, "SQL generation failed")));

        assert!(controller.current_result().is_none());
        assert_eq!(
            controller.generation(),
            &GenerationDisplay::Failed("SQL generation failed".to_string())
        );
        assert!(!controller.has_runnable_result());
    }

    #[test]
    fn malformed_custom_metadata_aborts_before_dispatch() {
        let mut controller = ViewStateController::new();
        let form = controller.request_form_mut();
        form.text = "top users".to_string();
        form.metadata_source = MetadataSource::Custom;
        form.custom_metadata = "{".to_string();

        let err = controller
            .begin_generate()
            .expect_err("malformed JSON should be rejected");
        assert!(matches!(
            err,
            GuardError::Request(RequestError::MalformedMetadata(_))
        ));
        assert!(!controller.is_generating());
    }

    #[test]
    fn stale_generation_response_is_discarded_and_keeps_loading() {
        let mut controller = ViewStateController::new();
        controller.request_form_mut().text = "users".to_string();
        let first = generate_token(controller.begin_generate().expect("first generate"));
        let second = generate_token(controller.begin_generate().expect("second generate"));

        let applied = controller.finish_generate(first, Ok(sql_result("SELECT 'first'")));
        assert_eq!(applied, Applied::Stale);
        assert!(controller.is_generating());
        assert_eq!(controller.generation(), &GenerationDisplay::Empty);

        let applied = controller.finish_generate(second, Ok(sql_result("SELECT 'second'")));
        assert_eq!(applied, Applied::Current);
        assert!(!controller.is_generating());
        assert_eq!(controller.sql_editor(), "SELECT 'second'");
    }

    #[test]
    fn execute_runs_editor_sql_and_records_outcome() {
        let mut controller = connected_controller();
        generate_with(&mut controller, Ok(sql_result("SELECT 1")));
        if let Some(editor) = controller.sql_editor_mut() {
            editor.push_str(" AS one");
        }

        let Call::Execute(pending) = controller.begin_execute().expect("execute should start")
        else {
            panic!("expected execute call");
        };
        assert_eq!(pending.payload.sql, "SELECT 1 AS one");
        assert_eq!(pending.payload.limit, 50);
        assert_eq!(controller.execution(), &ExecutionDisplay::Running);

        controller.finish_execute(pending.token, Err(ApiError::server(400, "syntax error")));
        assert_eq!(
            controller.execution(),
            &ExecutionDisplay::Failed("syntax error".to_string())
        );
    }

    #[test]
    fn disconnect_discards_in_flight_execution() {
        let mut controller = connected_controller();
        generate_with(&mut controller, Ok(sql_result("SELECT 1")));
        let Call::Execute(pending) = controller.begin_execute().expect("execute should start")
        else {
            panic!("expected execute call");
        };

        controller.disconnect();
        let applied = controller.finish_execute(pending.token, Ok(QueryExecutionResult::default()));
        assert_eq!(applied, Applied::Stale);
        assert_eq!(controller.execution(), &ExecutionDisplay::Hidden);
    }

    #[test]
    fn stale_connect_cannot_resurrect_connection_after_disconnect() {
        let mut controller = ViewStateController::new();
        controller.select_preset(PRESETS[0].key);
        let token = connect_token(controller.begin_connect().expect("connect should start"));
        controller.disconnect();

        let applied = controller.finish_connect(token, Ok(ConnectAck::default()));
        assert_eq!(applied, Applied::Stale);
        assert!(!controller.connection().is_connected());
    }

    #[test]
    fn sample_metadata_fills_custom_editor() {
        let mut controller = ViewStateController::new();
        controller.set_db_type(DbType::MySql);
        let Call::SampleMetadata(pending) = controller.load_sample_metadata() else {
            panic!("expected sample metadata call");
        };
        assert_eq!(pending.payload, DbType::MySql);

        let applied = controller.finish_sample_metadata(
            pending.token,
            DbType::MySql,
            Ok(json!({"db_type": "MySQL"})),
        );
        assert_eq!(applied, Applied::Current);
        assert_eq!(
            controller.request_form().metadata_source,
            MetadataSource::Custom
        );
        assert!(controller
            .request_form()
            .custom_metadata
            .contains("\"db_type\": \"MySQL\""));
    }

    #[test]
    fn copy_is_offered_only_for_runnable_sql() {
        let mut controller = connected_controller();
        assert_eq!(controller.copy_sql(), None);

        generate_with(
            &mut controller,
            Ok(GenerationResult {
                is_blocked: true,
                sql: Some("DROP TABLE users".to_string()),
                ..GenerationResult::default()
            }),
        );
        assert_eq!(controller.copy_sql(), None);

        generate_with(&mut controller, Ok(sql_result("SELECT 1")));
        assert_eq!(controller.copy_sql().as_deref(), Some("SELECT 1"));
        controller.finish_copy(Ok(()));
        assert_eq!(
            controller.take_notice().map(|notice| notice.message),
            Some("SQL copied to clipboard".to_string())
        );

        controller.finish_copy(Err("no clipboard".to_string()));
        assert!(controller.notice().is_none());
    }

    #[test]
    fn closing_execution_panel_drops_late_result() {
        let mut controller = connected_controller();
        generate_with(&mut controller, Ok(sql_result("SELECT 1")));
        let Call::Execute(pending) = controller.begin_execute().expect("execute should start")
        else {
            panic!("expected execute call");
        };

        controller.close_execution_panel();
        let applied = controller.finish_execute(pending.token, Ok(QueryExecutionResult::default()));
        assert_eq!(applied, Applied::Stale);
        assert_eq!(controller.execution(), &ExecutionDisplay::Hidden);
    }

    #[test]
    fn late_sample_metadata_for_previous_type_is_discarded() {
        let mut controller = ViewStateController::new();
        let Call::SampleMetadata(postgres) = controller.load_sample_metadata() else {
            panic!("expected sample metadata call");
        };
        controller.set_db_type(DbType::MySql);
        let Call::SampleMetadata(mysql) = controller.load_sample_metadata() else {
            panic!("expected sample metadata call");
        };

        controller.finish_sample_metadata(
            mysql.token,
            DbType::MySql,
            Ok(json!({"db_type": "MySQL"})),
        );
        let applied = controller.finish_sample_metadata(
            postgres.token,
            DbType::PostgreSql,
            Ok(json!({"db_type": "PostgreSQL"})),
        );

        assert_eq!(applied, Applied::Stale);
        assert!(controller
            .request_form()
            .custom_metadata
            .contains("\"db_type\": \"MySQL\""));
    }

    #[test]
    fn metadata_viewer_requires_extracted_metadata() {
        let mut controller = ViewStateController::new();
        assert!(matches!(
            controller.open_metadata_viewer(),
            Err(GuardError::NoMetadata)
        ));
        assert!(!controller.metadata_viewer_open());
    }
}
