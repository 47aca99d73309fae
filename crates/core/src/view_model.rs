//! Presentation-independent view of the controller state.
//!
//! Every function here is pure: it reads state and produces plain values.
//! Presentation adapters (`crate::html`, the terminal UI) only translate a
//! [`ViewModel`] into their own widgets or markup.

use serde_json::Value;

use crate::connection_manager::ConnectionState;
use crate::controller::{ExecutionDisplay, GenerationDisplay, Notice, ViewStateController};
use crate::form::MetadataSource;
use crate::provider::Provider;
use crate::wire::{EtlPipeline, GenerationResult, QueryExecutionResult};

pub const PLACEHOLDER: &str = "-";
pub const DEFAULT_BLOCK_REASON: &str = "This request cannot be processed.";
pub const NO_DATA_MESSAGE: &str = "No data returned.";

#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub connection: ConnectionView,
    pub request: RequestView,
    pub result: ResultView,
    pub samples: Vec<String>,
    pub execution: ExecutionView,
    pub controls: ControlsView,
    pub notice: Option<Notice>,
    pub metadata_viewer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionView {
    pub state: ConnectionState,
    pub status: String,
    pub form_collapsed: bool,
    pub connect_visible: bool,
    pub connect_busy: bool,
    pub disconnect_visible: bool,
    pub extract_visible: bool,
    pub extract_busy: bool,
    pub table_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestView {
    pub model_name: String,
    pub provider: Provider,
    pub include_etl: bool,
    pub metadata_source: MetadataSource,
    pub generating: bool,
    pub refreshing_samples: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultView {
    Empty,
    Loading,
    Shown(GenerationView),
}

/// Exactly one of the blocked panel or the SQL panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultBody {
    Blocked { reason: String },
    Sql { sql: String },
}

/// A generation result ready for display. The optional sections are `None`
/// when hidden, which is always the case for a blocked body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationView {
    pub intent_summary: String,
    pub body: ResultBody,
    pub assumptions: Option<Vec<String>>,
    pub safety_notes: Option<Vec<String>>,
    pub tables_used: Option<Vec<String>>,
    pub etl: Option<EtlView>,
}

impl GenerationView {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self.body, ResultBody::Blocked { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlView {
    pub extract: Option<ExtractView>,
    pub transform: Option<Vec<String>>,
    pub load: Option<LoadView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractView {
    pub source_tables: String,
    pub conditions: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadView {
    pub target_table: String,
    pub write_mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionView {
    Hidden,
    Running,
    Rows(TableView),
    NoData { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub summary: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Value(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlsView {
    pub copy_enabled: bool,
    pub execute_visible: bool,
    pub execute_enabled: bool,
}

#[must_use]
pub fn render(controller: &ViewStateController) -> ViewModel {
    let connection = controller.connection();
    let state = connection.state();
    let connected = connection.is_connected();
    let request_form = controller.request_form();
    let runnable =
        controller.has_runnable_result() && !controller.sql_editor().trim().is_empty();

    let result = if controller.is_generating() {
        ResultView::Loading
    } else {
        match controller.generation() {
            GenerationDisplay::Empty => ResultView::Empty,
            GenerationDisplay::Generated(result) => {
                let mut view = render_generation(result);
                // The panel shows the editor, which the user may have changed.
                if let ResultBody::Sql { sql } = &mut view.body {
                    controller.sql_editor().clone_into(sql);
                }
                ResultView::Shown(view)
            }
            GenerationDisplay::Failed(message) => ResultView::Shown(render_failure(message)),
        }
    };

    ViewModel {
        connection: ConnectionView {
            state,
            status: connection.status().text(),
            form_collapsed: controller.connection_form_collapsed(),
            connect_visible: !connected,
            connect_busy: controller.is_connecting(),
            disconnect_visible: connected,
            extract_visible: connected,
            extract_busy: controller.is_extracting(),
            table_count: connection.metadata().map(|metadata| metadata.table_count),
        },
        request: RequestView {
            model_name: request_form.model_name.clone(),
            provider: Provider::for_model(&request_form.model_name),
            include_etl: request_form.include_etl,
            metadata_source: request_form.metadata_source,
            generating: controller.is_generating(),
            refreshing_samples: controller.is_refreshing_samples(),
        },
        result,
        samples: controller.samples().to_vec(),
        execution: render_execution(controller.execution()),
        controls: ControlsView {
            copy_enabled: runnable,
            execute_visible: connected,
            execute_enabled: connected && runnable,
        },
        notice: controller.notice().cloned(),
        metadata_viewer: if controller.metadata_viewer_open() {
            controller
                .metadata()
                .and_then(|metadata| serde_json::to_string_pretty(&metadata.schema).ok())
        } else {
            None
        },
    }
}

#[must_use]
pub fn render_generation(result: &GenerationResult) -> GenerationView {
    let intent_summary = result
        .intent_summary
        .as_deref()
        .filter(|summary| !summary.is_empty())
        .unwrap_or(PLACEHOLDER)
        .to_string();

    if result.is_blocked {
        let reason = result
            .block_reason
            .as_deref()
            .filter(|reason| !reason.is_empty())
            .unwrap_or(DEFAULT_BLOCK_REASON)
            .to_string();
        return GenerationView {
            intent_summary,
            body: ResultBody::Blocked { reason },
            assumptions: None,
            safety_notes: None,
            tables_used: None,
            etl: None,
        };
    }

    GenerationView {
        intent_summary,
        body: ResultBody::Sql {
            sql: result.sql.clone().unwrap_or_default(),
        },
        assumptions: non_empty(&result.assumptions),
        safety_notes: non_empty(&result.safety_notes),
        tables_used: non_empty(&result.tables_used),
        etl: result.etl_pipeline.as_ref().and_then(render_etl),
    }
}

/// A generation that failed outright is shown in the blocked state with the
/// error as its reason.
#[must_use]
pub fn render_failure(message: &str) -> GenerationView {
    GenerationView {
        intent_summary: PLACEHOLDER.to_string(),
        body: ResultBody::Blocked {
            reason: message.to_string(),
        },
        assumptions: None,
        safety_notes: None,
        tables_used: None,
        etl: None,
    }
}

/// `None` when no stage is present.
#[must_use]
pub fn render_etl(pipeline: &EtlPipeline) -> Option<EtlView> {
    let extract = pipeline.extract.as_ref().map(|extract| ExtractView {
        source_tables: extract
            .source_tables
            .as_ref()
            .filter(|tables| !tables.is_empty())
            .map_or_else(|| PLACEHOLDER.to_string(), |tables| tables.join(", ")),
        conditions: or_placeholder(extract.conditions.as_deref()),
    });
    let transform = pipeline
        .transform
        .as_ref()
        .filter(|steps| !steps.is_empty())
        .cloned();
    let load = pipeline.load.as_ref().map(|load| LoadView {
        target_table: or_placeholder(load.target_table.as_deref()),
        write_mode: or_placeholder(load.write_mode.as_deref()),
    });

    if extract.is_none() && transform.is_none() && load.is_none() {
        return None;
    }
    Some(EtlView {
        extract,
        transform,
        load,
    })
}

#[must_use]
pub fn render_query_result(result: &QueryExecutionResult) -> ExecutionView {
    let (Some(columns), Some(data)) = (&result.columns, &result.data) else {
        let message = match result.message.as_deref() {
            Some(message) if !message.is_empty() => format!("{NO_DATA_MESSAGE} {message}"),
            _ => NO_DATA_MESSAGE.to_string(),
        };
        return ExecutionView::NoData { message };
    };

    let rows = data
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| match row.get(column) {
                    None | Some(Value::Null) => Cell::Null,
                    Some(Value::String(text)) => Cell::Value(text.clone()),
                    Some(other) => Cell::Value(other.to_string()),
                })
                .collect()
        })
        .collect();

    ExecutionView::Rows(TableView {
        summary: format!("{} rows returned", result.row_count),
        columns: columns.clone(),
        rows,
    })
}

fn render_execution(execution: &ExecutionDisplay) -> ExecutionView {
    match execution {
        ExecutionDisplay::Hidden => ExecutionView::Hidden,
        ExecutionDisplay::Running => ExecutionView::Running,
        ExecutionDisplay::Finished(result) => render_query_result(result),
        ExecutionDisplay::Failed(message) => ExecutionView::Failed {
            message: message.clone(),
        },
    }
}

fn non_empty(items: &[String]) -> Option<Vec<String>> {
    (!items.is_empty()).then(|| items.to_vec())
}

fn or_placeholder(value: Option<&str>) -> String {
    value
        .filter(|value| !value.is_empty())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}
