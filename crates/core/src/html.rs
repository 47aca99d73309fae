//! HTML fragments for a [`ViewModel`]. Each function fully renders one
//! container; nothing is patched incrementally.

use crate::controller::NoticeLevel;
use crate::view_model::{
    Cell, EtlView, ExecutionView, GenerationView, ResultBody, ResultView, TableView, ViewModel,
};

/// Replaces `& < > " '` with their entities.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[must_use]
pub fn list_items(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("<li>{}</li>", escape_html(item)))
        .collect()
}

#[must_use]
pub fn table_tags(tables: &[String]) -> String {
    tables
        .iter()
        .map(|table| format!("<span class=\"table-tag\">{}</span>", escape_html(table)))
        .collect()
}

#[must_use]
pub fn etl_pipeline(etl: &EtlView) -> String {
    let mut html = String::new();

    if let Some(extract) = &etl.extract {
        html.push_str(&format!(
            "<div class=\"etl-stage\"><h4>Extract</h4>\
             <p><strong>Source tables:</strong> {}</p>\
             <p><strong>Conditions:</strong> {}</p></div>",
            escape_html(&extract.source_tables),
            escape_html(&extract.conditions),
        ));
    }
    if let Some(steps) = &etl.transform {
        html.push_str(&format!(
            "<div class=\"etl-stage\"><h4>Transform</h4><ul>{}</ul></div>",
            list_items(steps)
        ));
    }
    if let Some(load) = &etl.load {
        html.push_str(&format!(
            "<div class=\"etl-stage\"><h4>Load</h4>\
             <p><strong>Target table:</strong> {}</p>\
             <p><strong>Write mode:</strong> {}</p></div>",
            escape_html(&load.target_table),
            escape_html(&load.write_mode),
        ));
    }

    html
}

#[must_use]
pub fn generation(view: &GenerationView) -> String {
    let mut html = format!(
        "<div class=\"intent-summary\">{}</div>",
        escape_html(&view.intent_summary)
    );

    match &view.body {
        ResultBody::Blocked { reason } => html.push_str(&format!(
            "<div class=\"blocked-section\"><p class=\"block-reason\">{}</p></div>",
            escape_html(reason)
        )),
        ResultBody::Sql { sql } => html.push_str(&format!(
            "<div class=\"sql-section\"><textarea class=\"sql-code-editor\">{}</textarea></div>",
            escape_html(sql)
        )),
    }

    if let Some(assumptions) = &view.assumptions {
        html.push_str(&format!(
            "<div class=\"assumptions-section\"><ul>{}</ul></div>",
            list_items(assumptions)
        ));
    }
    if let Some(notes) = &view.safety_notes {
        html.push_str(&format!(
            "<div class=\"safety-section\"><ul>{}</ul></div>",
            list_items(notes)
        ));
    }
    if let Some(tables) = &view.tables_used {
        html.push_str(&format!(
            "<div class=\"tables-section\">{}</div>",
            table_tags(tables)
        ));
    }
    if let Some(etl) = &view.etl {
        html.push_str(&format!(
            "<div class=\"etl-section\">{}</div>",
            etl_pipeline(etl)
        ));
    }

    html
}

#[must_use]
pub fn query_table(table: &TableView) -> String {
    let mut html = format!(
        "<div class=\"row-summary\">{}</div>\
         <div class=\"result-table-container\"><table class=\"result-table\"><thead><tr>",
        escape_html(&table.summary)
    );
    for column in &table.columns {
        html.push_str(&format!("<th>{}</th>", escape_html(column)));
    }
    html.push_str("</tr></thead><tbody>");

    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            match cell {
                Cell::Value(value) => html.push_str(&format!("<td>{}</td>", escape_html(value))),
                Cell::Null => html.push_str("<td><span class=\"null-marker\">NULL</span></td>"),
            }
        }
        html.push_str("</tr>");
    }

    html.push_str("</tbody></table></div>");
    html
}

#[must_use]
pub fn execution_error(message: &str) -> String {
    format!(
        "<div class=\"result-card warning-card\">\
         <div class=\"card-header\"><h3>Execution Error</h3></div>\
         <div class=\"card-body\"><p>{}</p></div></div>",
        escape_html(message)
    )
}

/// `None` while the execution panel is hidden.
#[must_use]
pub fn execution(view: &ExecutionView) -> Option<String> {
    match view {
        ExecutionView::Hidden => None,
        ExecutionView::Running => Some("<p class=\"loading\">Running query...</p>".to_string()),
        ExecutionView::Rows(table) => Some(query_table(table)),
        ExecutionView::NoData { message } => Some(format!("<p>{}</p>", escape_html(message))),
        ExecutionView::Failed { message } => Some(execution_error(message)),
    }
}

#[must_use]
pub fn sample_queries(samples: &[String]) -> String {
    samples
        .iter()
        .map(|sample| format!("<div class=\"example-item\">{}</div>", escape_html(sample)))
        .collect()
}

/// The result-side of the page: notice, samples, generation and execution.
#[must_use]
pub fn render_document(view: &ViewModel) -> String {
    let mut html = String::new();

    if let Some(notice) = &view.notice {
        let class = match notice.level {
            NoticeLevel::Info => "notice-info",
            NoticeLevel::Warning => "notice-warning",
            NoticeLevel::Error => "notice-error",
        };
        html.push_str(&format!(
            "<div class=\"notice {class}\">{}</div>",
            escape_html(&notice.message)
        ));
    }

    html.push_str(&format!(
        "<div class=\"connection-status\">{}</div>",
        escape_html(&view.connection.status)
    ));

    if !view.samples.is_empty() {
        html.push_str(&format!(
            "<div class=\"examples-section\">{}</div>",
            sample_queries(&view.samples)
        ));
    }

    match &view.result {
        ResultView::Empty => html.push_str("<div class=\"empty-state\"></div>"),
        ResultView::Loading => html.push_str("<div class=\"loading\">Generating SQL...</div>"),
        ResultView::Shown(generation_view) => html.push_str(&format!(
            "<div class=\"result-container\">{}</div>",
            generation(generation_view)
        )),
    }

    let disabled = |enabled: bool| if enabled { "" } else { " disabled" };
    html.push_str(&format!(
        "<button class=\"copy-btn\"{}>Copy</button>",
        disabled(view.controls.copy_enabled)
    ));
    if view.controls.execute_visible {
        html.push_str(&format!(
            "<button class=\"execute-btn\"{}>Execute</button>",
            disabled(view.controls.execute_enabled)
        ));
    }

    if let Some(fragment) = execution(&view.execution) {
        html.push_str(&format!(
            "<div class=\"query-result-section\">{fragment}</div>"
        ));
    }

    if let Some(metadata) = &view.metadata_viewer {
        html.push_str(&format!(
            "<pre class=\"metadata-viewer\">{}</pre>",
            escape_html(metadata)
        ));
    }

    html
}
