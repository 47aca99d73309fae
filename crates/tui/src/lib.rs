use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use nlsql_adapters::SystemClipboard;
use nlsql_core::action::{perform, Call, Completion};
use nlsql_core::backend::ApiBackend;
use nlsql_core::controller::{NoticeLevel, ViewStateController};
use nlsql_core::form::MetadataSource;
use nlsql_core::profiles::PRESETS;
use nlsql_core::provider::{next_model, MODEL_CHOICES};
use nlsql_core::view_model::{
    Cell, ExecutionView, GenerationView, ResultBody, ResultView, ViewModel,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Connection,
    Request,
    Result,
}

impl Pane {
    fn next(self) -> Self {
        match self {
            Self::Connection => Self::Request,
            Self::Request => Self::Result,
            Self::Result => Self::Connection,
        }
    }

    fn previous(self) -> Self {
        match self {
            Self::Connection => Self::Result,
            Self::Request => Self::Connection,
            Self::Result => Self::Request,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionField {
    Preset,
    DbType,
    Host,
    Port,
    Database,
    User,
    Password,
}

impl ConnectionField {
    const ALL: [Self; 7] = [
        Self::Preset,
        Self::DbType,
        Self::Host,
        Self::Port,
        Self::Database,
        Self::User,
        Self::Password,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Preset => "Quick connect",
            Self::DbType => "Type",
            Self::Host => "Host",
            Self::Port => "Port",
            Self::Database => "Database",
            Self::User => "User",
            Self::Password => "Password",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestField {
    Request,
    Model,
    IncludeEtl,
    MetadataSource,
    CustomMetadata,
    Samples,
}

impl RequestField {
    const ALL: [Self; 6] = [
        Self::Request,
        Self::Model,
        Self::IncludeEtl,
        Self::MetadataSource,
        Self::CustomMetadata,
        Self::Samples,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Request => "Request",
            Self::Model => "Model",
            Self::IncludeEtl => "Include ETL",
            Self::MetadataSource => "Metadata",
            Self::CustomMetadata => "Custom JSON",
            Self::Samples => "Samples",
        }
    }
}

fn step<T: Copy + PartialEq>(all: &[T], current: T, forward: bool) -> T {
    let index = all.iter().position(|item| *item == current).unwrap_or(0);
    let next = if forward {
        (index + 1) % all.len()
    } else {
        (index + all.len() - 1) % all.len()
    };
    all[next]
}

/// Side effects requested by a handled message.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Perform(Call),
    Copy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Quit,
    ToggleHelp,
    NextPane,
    PreviousPane,
    NextField,
    PreviousField,
    Cycle { forward: bool },
    Input(char),
    Backspace,
    Submit,
    Connect,
    Disconnect,
    Extract,
    RefreshSamples,
    Generate,
    Execute,
    CopySql,
    ToggleMetadataViewer,
    LoadSampleMetadata,
    ToggleConnectionForm,
    Dismiss,
}

#[derive(Debug)]
struct TuiApp {
    controller: ViewStateController,
    pane: Pane,
    connection_field: ConnectionField,
    request_field: RequestField,
    preset_index: Option<usize>,
    sample_index: usize,
    show_help: bool,
    should_quit: bool,
}

impl TuiApp {
    fn new(controller: ViewStateController) -> Self {
        Self {
            controller,
            pane: Pane::Connection,
            connection_field: ConnectionField::Preset,
            request_field: RequestField::Request,
            preset_index: None,
            sample_index: 0,
            show_help: false,
            should_quit: false,
        }
    }

    fn handle(&mut self, msg: Msg) -> Option<Effect> {
        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::ToggleHelp => self.show_help = !self.show_help,
            Msg::NextPane => self.pane = self.pane.next(),
            Msg::PreviousPane => self.pane = self.pane.previous(),
            Msg::NextField => self.move_field(true),
            Msg::PreviousField => self.move_field(false),
            Msg::Cycle { forward } => self.cycle(forward),
            Msg::Input(ch) => {
                if let Some(text) = self.focused_text_mut() {
                    text.push(ch);
                }
            }
            Msg::Backspace => {
                if let Some(text) = self.focused_text_mut() {
                    text.pop();
                }
            }
            Msg::Submit => return self.submit(),
            Msg::Connect => return self.controller.begin_connect().ok().map(Effect::Perform),
            Msg::Disconnect => {
                self.pane = Pane::Connection;
                return Some(Effect::Perform(self.controller.disconnect()));
            }
            Msg::Extract => return self.controller.begin_extract().ok().map(Effect::Perform),
            Msg::RefreshSamples => {
                return self.controller.refresh_samples().ok().map(Effect::Perform)
            }
            Msg::Generate => return self.controller.begin_generate().ok().map(Effect::Perform),
            Msg::Execute => return self.controller.begin_execute().ok().map(Effect::Perform),
            Msg::CopySql => return self.controller.copy_sql().map(Effect::Copy),
            Msg::ToggleMetadataViewer => {
                if self.controller.metadata_viewer_open() {
                    self.controller.close_metadata_viewer();
                } else if let Err(error) = self.controller.open_metadata_viewer() {
                    debug!(%error, "metadata viewer unavailable");
                }
            }
            Msg::LoadSampleMetadata => {
                return Some(Effect::Perform(self.controller.load_sample_metadata()))
            }
            Msg::ToggleConnectionForm => self.controller.toggle_connection_form(),
            Msg::Dismiss => self.dismiss(),
        }
        None
    }

    fn apply(&mut self, completion: Completion) -> Option<Call> {
        let update = self.controller.apply(completion);
        if self.controller.samples().len() <= self.sample_index {
            self.sample_index = 0;
        }
        if self.controller.connection_form_collapsed() && self.pane == Pane::Connection {
            self.pane = Pane::Request;
        }
        update.follow_up
    }

    fn submit(&mut self) -> Option<Effect> {
        match self.pane {
            Pane::Connection => {
                if self.controller.connection().is_connected() {
                    self.controller.begin_extract().ok().map(Effect::Perform)
                } else {
                    self.controller.begin_connect().ok().map(Effect::Perform)
                }
            }
            Pane::Request => match self.request_field {
                RequestField::CustomMetadata => {
                    self.controller.request_form_mut().custom_metadata.push('\n');
                    None
                }
                RequestField::Samples => {
                    if self.controller.choose_sample(self.sample_index) {
                        self.request_field = RequestField::Request;
                    }
                    None
                }
                _ => self.controller.begin_generate().ok().map(Effect::Perform),
            },
            Pane::Result => {
                if let Some(editor) = self.controller.sql_editor_mut() {
                    editor.push('\n');
                }
                None
            }
        }
    }

    fn dismiss(&mut self) {
        if self.show_help {
            self.show_help = false;
        } else if self.controller.metadata_viewer_open() {
            self.controller.close_metadata_viewer();
        } else if self.controller.take_notice().is_none() {
            self.controller.close_execution_panel();
        }
    }

    fn move_field(&mut self, forward: bool) {
        match self.pane {
            Pane::Connection => {
                self.connection_field = step(&ConnectionField::ALL, self.connection_field, forward);
            }
            Pane::Request => {
                self.request_field = step(&RequestField::ALL, self.request_field, forward);
            }
            Pane::Result => {}
        }
    }

    fn cycle(&mut self, forward: bool) {
        match (self.pane, self.connection_field, self.request_field) {
            (Pane::Connection, ConnectionField::Preset, _) => {
                let index = match (self.preset_index, forward) {
                    (None, true) => 0,
                    (None, false) => PRESETS.len() - 1,
                    (Some(index), true) => (index + 1) % PRESETS.len(),
                    (Some(index), false) => (index + PRESETS.len() - 1) % PRESETS.len(),
                };
                if self.controller.select_preset(PRESETS[index].key) {
                    self.preset_index = Some(index);
                }
            }
            (Pane::Connection, ConnectionField::DbType, _) => {
                let db_type = self.controller.connection_form().db_type.toggled();
                self.controller.set_db_type(db_type);
            }
            (Pane::Request, _, RequestField::Model) => {
                let form = self.controller.request_form_mut();
                form.model_name = if forward {
                    next_model(&form.model_name)
                } else {
                    previous_model(&form.model_name)
                }
                .to_string();
            }
            (Pane::Request, _, RequestField::IncludeEtl) => {
                let form = self.controller.request_form_mut();
                form.include_etl = !form.include_etl;
            }
            (Pane::Request, _, RequestField::MetadataSource) => {
                let form = self.controller.request_form_mut();
                form.metadata_source = form.metadata_source.toggled();
            }
            (Pane::Request, _, RequestField::Samples) => {
                let count = self.controller.samples().len();
                if count > 0 {
                    self.sample_index = step(
                        &(0..count).collect::<Vec<_>>(),
                        self.sample_index,
                        forward,
                    );
                }
            }
            _ => {}
        }
    }

    fn focused_text_mut(&mut self) -> Option<&mut String> {
        match self.pane {
            Pane::Connection => {
                if self.controller.connection_form_collapsed() {
                    return None;
                }
                let form = self.controller.connection_form_mut();
                match self.connection_field {
                    ConnectionField::Host => Some(&mut form.host),
                    ConnectionField::Port => Some(&mut form.port),
                    ConnectionField::Database => Some(&mut form.database),
                    ConnectionField::User => Some(&mut form.user),
                    ConnectionField::Password => Some(&mut form.password),
                    ConnectionField::Preset | ConnectionField::DbType => None,
                }
            }
            Pane::Request => {
                let form = self.controller.request_form_mut();
                match self.request_field {
                    RequestField::Request => Some(&mut form.text),
                    RequestField::CustomMetadata => Some(&mut form.custom_metadata),
                    _ => None,
                }
            }
            Pane::Result => self.controller.sql_editor_mut(),
        }
    }

    fn pane_name(&self) -> &'static str {
        match self.pane {
            Pane::Connection => "Connection",
            Pane::Request => "Request",
            Pane::Result => "Result",
        }
    }
}

fn previous_model(current: &str) -> &'static str {
    let index = MODEL_CHOICES
        .iter()
        .position(|model| *model == current)
        .unwrap_or(0);
    MODEL_CHOICES[(index + MODEL_CHOICES.len() - 1) % MODEL_CHOICES.len()]
}

pub fn run<B>(backend: Arc<B>, controller: ViewStateController) -> Result<(), TuiError>
where
    B: ApiBackend + ?Sized + 'static,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, &runtime, backend, controller);
    let restore_result = restore_terminal(&mut terminal);

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Spawns the round trip on the runtime; the completion comes back through
/// `completions`.
fn spawn_call<B>(
    runtime: &Runtime,
    backend: &Arc<B>,
    completions: &UnboundedSender<Completion>,
    call: Call,
) where
    B: ApiBackend + ?Sized + 'static,
{
    let backend = Arc::clone(backend);
    let completions = completions.clone();
    runtime.spawn(async move {
        let completion = perform(backend.as_ref(), call).await;
        if completions.send(completion).is_err() {
            debug!("terminal loop closed before completion arrived");
        }
    });
}

fn run_loop<B>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    runtime: &Runtime,
    backend: Arc<B>,
    controller: ViewStateController,
) -> Result<(), TuiError>
where
    B: ApiBackend + ?Sized + 'static,
{
    let mut app = TuiApp::new(controller);
    let clipboard = SystemClipboard::default();
    let (sender, mut receiver): (UnboundedSender<Completion>, UnboundedReceiver<Completion>) =
        unbounded_channel();
    info!("terminal client started");

    loop {
        terminal.draw(|frame| render(frame, &app))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let effect = map_key_event(key).and_then(|message| app.handle(message));
                    match effect {
                        Some(Effect::Perform(call)) => spawn_call(runtime, &backend, &sender, call),
                        Some(Effect::Copy(text)) => {
                            let outcome = clipboard.copy(&text).map_err(|error| error.to_string());
                            app.controller.finish_copy(outcome);
                        }
                        None => {}
                    }
                }
            }
        }

        while let Ok(completion) = receiver.try_recv() {
            if let Some(call) = app.apply(completion) {
                spawn_call(runtime, &backend, &sender, call);
            }
        }

        if app.should_quit {
            break;
        }
    }

    info!("terminal client stopped");
    Ok(())
}

fn pane_block(app: &TuiApp, pane: Pane, title: &str) -> Block<'static> {
    let style = if app.pane == pane {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title.to_string())
}

fn marker(active: bool) -> &'static str {
    if active {
        ">"
    } else {
        " "
    }
}

fn render(frame: &mut Frame<'_>, app: &TuiApp) {
    let view = app.controller.view();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let status_color = if view.connection.disconnect_visible {
        Color::Green
    } else {
        Color::Red
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" Pane: {} ", app.pane_name()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            view.connection.status.clone(),
            Style::default().fg(status_color),
        ),
        Span::raw(" | "),
        Span::raw(format!(
            "Model: {} ({})",
            view.request.model_name, view.request.provider
        )),
        Span::raw(" | "),
        Span::raw(format!(
            "Tables: {}",
            view.connection
                .table_count
                .map_or_else(|| "-".to_string(), |count| count.to_string())
        )),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Natural Language to SQL"),
    );
    frame.render_widget(header, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);

    let connection_height = if view.connection.form_collapsed { 4 } else { 11 };
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(connection_height), Constraint::Min(6)])
        .split(columns[0]);
    render_connection(frame, app, &view, left[0]);
    render_request(frame, app, &view, left[1]);

    if view.execution == ExecutionView::Hidden {
        render_result(frame, app, &view, columns[1]);
    } else {
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(columns[1]);
        render_result(frame, app, &view, right[0]);
        render_execution(frame, &view.execution, right[1]);
    }

    let notice_line = match &view.notice {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Info => Color::Cyan,
                NoticeLevel::Warning => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(Span::styled(
                notice.message.clone(),
                Style::default().fg(color),
            ))
        }
        None => Line::from("Ready"),
    };
    let footer = Paragraph::new(vec![
        notice_line,
        Line::from(
            "F1 help | Tab pane | Ctrl+G generate | Ctrl+E execute | Ctrl+Y copy | Esc dismiss | Ctrl+Q quit",
        ),
    ])
    .block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(footer, chunks[2]);

    if let Some(metadata) = &view.metadata_viewer {
        render_metadata_popup(frame, metadata);
    }
    if app.show_help {
        render_help_popup(frame);
    }
}

fn render_connection(frame: &mut Frame<'_>, app: &TuiApp, view: &ViewModel, area: Rect) {
    let mut lines = Vec::new();

    if view.connection.form_collapsed {
        lines.push(Line::from(view.connection.status.clone()));
        lines.push(Line::from("F2 show form | Ctrl+X extract schema | Ctrl+D disconnect"));
    } else {
        let form = app.controller.connection_form();
        let active = app.pane == Pane::Connection;
        let masked = "*".repeat(form.password.chars().count());
        let preset = app
            .preset_index
            .map_or("(choose with Left/Right)", |index| PRESETS[index].name);
        for field in ConnectionField::ALL {
            let value = match field {
                ConnectionField::Preset => preset,
                ConnectionField::DbType => form.db_type.label(),
                ConnectionField::Host => form.host.as_str(),
                ConnectionField::Port => form.port.as_str(),
                ConnectionField::Database => form.database.as_str(),
                ConnectionField::User => form.user.as_str(),
                ConnectionField::Password => masked.as_str(),
            };
            lines.push(Line::from(format!(
                "{} {}: {value}",
                marker(active && app.connection_field == field),
                field.label()
            )));
        }

        let action = if view.connection.connect_busy {
            "Connecting..."
        } else if view.connection.connect_visible {
            "Enter: connect"
        } else {
            "Ctrl+D: disconnect | Ctrl+X: extract schema"
        };
        lines.push(Line::from(Span::styled(
            action,
            Style::default().add_modifier(Modifier::DIM),
        )));
    }

    if view.connection.extract_busy {
        lines.push(Line::from("Extracting schema..."));
    }

    let body = Paragraph::new(lines)
        .block(pane_block(app, Pane::Connection, "Database"))
        .alignment(Alignment::Left);
    frame.render_widget(body, area);
}

fn render_request(frame: &mut Frame<'_>, app: &TuiApp, view: &ViewModel, area: Rect) {
    let form = app.controller.request_form();
    let active = app.pane == Pane::Request;
    let mut lines = Vec::new();

    for field in RequestField::ALL {
        let selected = marker(active && app.request_field == field);
        match field {
            RequestField::Request => {
                lines.push(Line::from(format!("{selected} {}: {}", field.label(), form.text)));
            }
            RequestField::Model => lines.push(Line::from(format!(
                "{selected} {}: {} ({})",
                field.label(),
                view.request.model_name,
                view.request.provider
            ))),
            RequestField::IncludeEtl => lines.push(Line::from(format!(
                "{selected} {}: [{}]",
                field.label(),
                if view.request.include_etl { "x" } else { " " }
            ))),
            RequestField::MetadataSource => lines.push(Line::from(format!(
                "{selected} {}: {}",
                field.label(),
                view.request.metadata_source.label()
            ))),
            RequestField::CustomMetadata => {
                if view.request.metadata_source == MetadataSource::Custom {
                    lines.push(Line::from(format!("{selected} {}:", field.label())));
                    lines.extend(
                        form.custom_metadata
                            .lines()
                            .map(|line| Line::from(format!("    {line}"))),
                    );
                }
            }
            RequestField::Samples => {
                let sample = view
                    .samples
                    .get(app.sample_index)
                    .map_or_else(
                        || "(extract a schema to get suggestions)".to_string(),
                        |sample| {
                            format!("{}/{}: {sample}", app.sample_index + 1, view.samples.len())
                        },
                    );
                let suffix = if view.request.refreshing_samples {
                    " (refreshing...)"
                } else {
                    ""
                };
                lines.push(Line::from(format!(
                    "{selected} {}: {sample}{suffix}",
                    field.label()
                )));
            }
        }
    }

    let body = Paragraph::new(lines)
        .block(pane_block(app, Pane::Request, "Request"))
        .wrap(Wrap { trim: false });
    frame.render_widget(body, area);
}

fn generation_lines(generation: &GenerationView, lines: &mut Vec<Line<'static>>) {
    lines.push(Line::from(format!("Intent: {}", generation.intent_summary)));
    lines.push(Line::from(""));

    match &generation.body {
        ResultBody::Blocked { reason } => {
            lines.push(Line::from(Span::styled(
                "Blocked",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(reason.clone()));
        }
        ResultBody::Sql { sql } => {
            lines.extend(sql.lines().map(|line| {
                Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(Color::Green),
                ))
            }));
        }
    }

    let mut section = |title: &str, items: &Option<Vec<String>>| {
        if let Some(items) = items {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                title.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            lines.extend(items.iter().map(|item| Line::from(format!("- {item}"))));
        }
    };
    section("Assumptions", &generation.assumptions);
    section("Safety notes", &generation.safety_notes);

    if let Some(tables) = &generation.tables_used {
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Tables: {}", tables.join(", "))));
    }

    if let Some(etl) = &generation.etl {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "ETL pipeline",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        if let Some(extract) = &etl.extract {
            lines.push(Line::from(format!(
                "Extract: {} (conditions: {})",
                extract.source_tables, extract.conditions
            )));
        }
        if let Some(steps) = &etl.transform {
            lines.push(Line::from("Transform:"));
            lines.extend(steps.iter().map(|step| Line::from(format!("  - {step}"))));
        }
        if let Some(load) = &etl.load {
            lines.push(Line::from(format!(
                "Load: {} ({})",
                load.target_table, load.write_mode
            )));
        }
    }
}

fn render_result(frame: &mut Frame<'_>, app: &TuiApp, view: &ViewModel, area: Rect) {
    let mut lines = Vec::new();
    match &view.result {
        ResultView::Empty => {
            lines.push(Line::from("Describe the data you need and press Ctrl+G."));
        }
        ResultView::Loading => lines.push(Line::from("Generating SQL...")),
        ResultView::Shown(generation) => generation_lines(generation, &mut lines),
    }

    let enabled = |on: bool| {
        if on {
            Style::default()
        } else {
            Style::default().add_modifier(Modifier::DIM)
        }
    };
    let mut controls = vec![Span::styled("[Ctrl+Y copy]", enabled(view.controls.copy_enabled))];
    if view.controls.execute_visible {
        controls.push(Span::raw(" "));
        controls.push(Span::styled(
            "[Ctrl+E execute]",
            enabled(view.controls.execute_enabled),
        ));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(controls));

    let body = Paragraph::new(lines)
        .block(pane_block(app, Pane::Result, "Generated SQL"))
        .wrap(Wrap { trim: false });
    frame.render_widget(body, area);
}

fn render_execution(frame: &mut Frame<'_>, execution: &ExecutionView, area: Rect) {
    let mut title = "Query Result";
    let lines = match execution {
        ExecutionView::Hidden => Vec::new(),
        ExecutionView::Running => vec![Line::from("Running query...")],
        ExecutionView::NoData { message } => vec![Line::from(message.clone())],
        ExecutionView::Failed { message } => {
            title = "Execution Error";
            vec![Line::from(Span::styled(
                message.clone(),
                Style::default().fg(Color::Yellow),
            ))]
        }
        ExecutionView::Rows(table) => {
            let mut lines = vec![
                Line::from(Span::styled(
                    table.summary.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(table.columns.join(" | ")),
            ];
            for row in &table.rows {
                let mut spans = Vec::with_capacity(row.len() * 2);
                for (index, cell) in row.iter().enumerate() {
                    if index > 0 {
                        spans.push(Span::raw(" | "));
                    }
                    spans.push(match cell {
                        Cell::Value(value) => Span::raw(value.clone()),
                        Cell::Null => Span::styled(
                            "NULL",
                            Style::default()
                                .fg(Color::DarkGray)
                                .add_modifier(Modifier::ITALIC),
                        ),
                    });
                }
                lines.push(Line::from(spans));
            }
            lines
        }
    };

    let body = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(body, area);
}

fn render_metadata_popup(frame: &mut Frame<'_>, metadata: &str) {
    let area = centered_rect(80, 80, frame.area());
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(metadata.to_string())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Extracted metadata (Esc to close)"),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(popup, area);
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Global keymap"),
        Line::from("Ctrl+Q / Ctrl+C: quit"),
        Line::from("F1: toggle help"),
        Line::from("Tab / Shift+Tab: cycle panes"),
        Line::from("Up / Down: move between fields"),
        Line::from("Left / Right: change preset, type, model or toggles"),
        Line::from("Enter: connect, generate or pick a sample (by pane)"),
        Line::from("Ctrl+G: generate SQL | Ctrl+E: execute SQL | Ctrl+Y: copy SQL"),
        Line::from("Ctrl+X: extract schema | Ctrl+R: refresh samples | Ctrl+O: view metadata"),
        Line::from("Ctrl+K: connect | Ctrl+D: disconnect | F2: toggle connection form"),
        Line::from("Ctrl+L: load sample metadata for the selected database type"),
        Line::from("Esc: close popup, notice or query result"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn map_key_event(key: KeyEvent) -> Option<Msg> {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('q' | 'c')) => Some(Msg::Quit),
        (KeyModifiers::CONTROL, KeyCode::Char('g')) => Some(Msg::Generate),
        (KeyModifiers::CONTROL, KeyCode::Char('e')) => Some(Msg::Execute),
        (KeyModifiers::CONTROL, KeyCode::Char('x')) => Some(Msg::Extract),
        (KeyModifiers::CONTROL, KeyCode::Char('d')) => Some(Msg::Disconnect),
        (KeyModifiers::CONTROL, KeyCode::Char('y')) => Some(Msg::CopySql),
        (KeyModifiers::CONTROL, KeyCode::Char('r')) => Some(Msg::RefreshSamples),
        (KeyModifiers::CONTROL, KeyCode::Char('o')) => Some(Msg::ToggleMetadataViewer),
        (KeyModifiers::CONTROL, KeyCode::Char('l')) => Some(Msg::LoadSampleMetadata),
        (KeyModifiers::CONTROL, KeyCode::Char('k')) => Some(Msg::Connect),
        (_, KeyCode::F(1)) => Some(Msg::ToggleHelp),
        (_, KeyCode::F(2)) => Some(Msg::ToggleConnectionForm),
        (_, KeyCode::Tab) => Some(Msg::NextPane),
        (_, KeyCode::BackTab) => Some(Msg::PreviousPane),
        (_, KeyCode::Up) => Some(Msg::PreviousField),
        (_, KeyCode::Down) => Some(Msg::NextField),
        (_, KeyCode::Left) => Some(Msg::Cycle { forward: false }),
        (_, KeyCode::Right) => Some(Msg::Cycle { forward: true }),
        (_, KeyCode::Enter) => Some(Msg::Submit),
        (_, KeyCode::Backspace) => Some(Msg::Backspace),
        (_, KeyCode::Esc) => Some(Msg::Dismiss),
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) => Some(Msg::Input(ch)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use nlsql_core::action::{Call, Completion, Pending};
    use nlsql_core::controller::ViewStateController;
    use nlsql_core::profiles::DbType;
    use nlsql_core::wire::{ConnectAck, GenerationResult, MetadataResponse};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::{map_key_event, render, ConnectionField, Effect, Msg, Pane, RequestField, TuiApp};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut TuiApp, text: &str) {
        for ch in text.chars() {
            app.handle(Msg::Input(ch));
        }
    }

    fn screen(app: &TuiApp) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).expect("test terminal");
        terminal
            .draw(|frame| render(frame, app))
            .expect("draw should succeed");
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(ratatui::buffer::Cell::symbol)
            .collect()
    }

    fn connected_app() -> TuiApp {
        let mut app = TuiApp::new(ViewStateController::new());
        app.handle(Msg::Cycle { forward: true });
        let Some(Effect::Perform(Call::Connect(Pending { token, .. }))) = app.handle(Msg::Submit)
        else {
            panic!("expected connect call");
        };
        app.apply(Completion::Connected {
            token,
            outcome: Ok(ConnectAck::default()),
        });
        app
    }

    #[test]
    fn pane_cycles_in_expected_order() {
        assert_eq!(Pane::Connection.next(), Pane::Request);
        assert_eq!(Pane::Request.next(), Pane::Result);
        assert_eq!(Pane::Result.next(), Pane::Connection);
        assert_eq!(Pane::Connection.previous(), Pane::Result);
    }

    #[test]
    fn keymap_supports_required_global_keys() {
        assert_eq!(map_key_event(ctrl('q')), Some(Msg::Quit));
        assert_eq!(map_key_event(ctrl('g')), Some(Msg::Generate));
        assert_eq!(map_key_event(ctrl('e')), Some(Msg::Execute));
        assert_eq!(map_key_event(ctrl('y')), Some(Msg::CopySql));
        assert_eq!(map_key_event(key(KeyCode::Tab)), Some(Msg::NextPane));
        assert_eq!(map_key_event(key(KeyCode::F(1))), Some(Msg::ToggleHelp));
        assert_eq!(map_key_event(key(KeyCode::Esc)), Some(Msg::Dismiss));
    }

    #[test]
    fn plain_and_shifted_characters_are_input() {
        assert_eq!(map_key_event(key(KeyCode::Char('q'))), Some(Msg::Input('q')));
        assert_eq!(
            map_key_event(KeyEvent::new(KeyCode::Char('Q'), KeyModifiers::SHIFT)),
            Some(Msg::Input('Q'))
        );
    }

    #[test]
    fn typing_edits_focused_connection_field() {
        let mut app = TuiApp::new(ViewStateController::new());
        app.handle(Msg::NextField);
        app.handle(Msg::NextField);
        assert_eq!(app.connection_field, ConnectionField::Host);
        type_text(&mut app, "db1");
        app.handle(Msg::Backspace);

        assert_eq!(app.controller.connection_form().host, "db");
    }

    #[test]
    fn blank_form_submit_is_guarded() {
        let mut app = TuiApp::new(ViewStateController::new());
        assert_eq!(app.handle(Msg::Submit), None);
        assert!(app.controller.notice().is_some());
        assert!(screen(&app).contains("enter the host, database, user"));
    }

    #[test]
    fn db_type_toggle_resets_port() {
        let mut app = TuiApp::new(ViewStateController::new());
        app.handle(Msg::NextField);
        app.handle(Msg::Cycle { forward: true });

        let form = app.controller.connection_form();
        assert_eq!(form.db_type, DbType::MySql);
        assert_eq!(form.port, "3306");
    }

    #[test]
    fn successful_connect_moves_focus_to_request() {
        let app = connected_app();
        assert!(app.controller.connection().is_connected());
        assert_eq!(app.pane, Pane::Request);
        assert!(screen(&app).contains("Connected to shop"));
    }

    #[test]
    fn extraction_schedules_samples_and_sample_can_be_chosen() {
        let mut app = connected_app();
        let Some(Effect::Perform(Call::Extract(token))) = app.handle(Msg::Extract) else {
            panic!("expected extract call");
        };
        let follow_up = app.apply(Completion::Extracted {
            token,
            outcome: Ok(MetadataResponse {
                metadata: serde_json::json!({"tables": ["users"]}),
                table_count: 1,
            }),
        });
        let Some(Call::Samples(pending)) = follow_up else {
            panic!("expected samples follow-up");
        };
        app.apply(Completion::Sampled {
            token: pending.token,
            outcome: Ok(nlsql_core::wire::SamplesResponse {
                samples: vec!["count users".to_string(), "newest users".to_string()],
            }),
        });

        app.request_field = RequestField::Samples;
        app.handle(Msg::Cycle { forward: true });
        app.handle(Msg::Submit);
        assert_eq!(app.controller.request_form().text, "newest users");
        assert_eq!(app.request_field, RequestField::Request);
    }

    #[test]
    fn generated_sql_is_shown_and_copyable() {
        let mut app = connected_app();
        type_text(&mut app, "all users");
        let Some(Effect::Perform(Call::Generate(pending))) = app.handle(Msg::Submit) else {
            panic!("expected generate call");
        };
        assert!(screen(&app).contains("Generating SQL..."));

        app.apply(Completion::Generated {
            token: pending.token,
            outcome: Ok(GenerationResult {
                intent_summary: Some("every user".to_string()),
                sql: Some("SELECT * FROM users".to_string()),
                ..GenerationResult::default()
            }),
        });

        assert!(screen(&app).contains("SELECT * FROM users"));
        assert_eq!(
            app.handle(Msg::CopySql),
            Some(Effect::Copy("SELECT * FROM users".to_string()))
        );
        assert!(matches!(
            app.handle(Msg::Execute),
            Some(Effect::Perform(Call::Execute(_)))
        ));
    }

    #[test]
    fn dismiss_closes_help_before_notice() {
        let mut app = TuiApp::new(ViewStateController::new());
        app.handle(Msg::Submit);
        app.handle(Msg::ToggleHelp);

        app.handle(Msg::Dismiss);
        assert!(!app.show_help);
        assert!(app.controller.notice().is_some());
        app.handle(Msg::Dismiss);
        assert!(app.controller.notice().is_none());
    }
}
