use std::io;
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap};

use crate::cache::ResponseCache;
use crate::domain::{DataPortal, Format};
use crate::error::PortalError;
use crate::fetcher::PortalClient;
use crate::selection::Action;
use crate::session::Session;
use crate::state_store::AppStateStore;

const NOTICE_TTL: Duration = Duration::from_secs(5);
const MAX_COLUMN_WIDTH: usize = 32;
const KEY_HELP: &[(&str, &str)] = &[
    ("q", "Quit"),
    ("c", "Clear cache"),
    ("a", "Select all"),
    ("u", "Show query URL"),
    ("p", "Copy query URL"),
    ("m", "Load more"),
    ("Tab", "Next pane"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Options,
    ResultTypes,
    Queries,
    Results,
    Fields,
}

impl Pane {
    const ORDER: [Pane; 5] = [
        Pane::Options,
        Pane::ResultTypes,
        Pane::Queries,
        Pane::Results,
        Pane::Fields,
    ];

    fn next(self) -> Self {
        let index = Self::ORDER.iter().position(|pane| *pane == self).unwrap_or(0);
        Self::ORDER[(index + 1) % Self::ORDER.len()]
    }

    fn previous(self) -> Self {
        let index = Self::ORDER.iter().position(|pane| *pane == self).unwrap_or(0);
        Self::ORDER[(index + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

#[derive(Debug, Clone)]
struct Notice {
    message: String,
    is_error: bool,
    shown_at: Instant,
}

/// Selections the search-field catalog depends on.
type FormKey = (DataPortal, Format, Option<String>);

/// Values typed into the query form, one per search field in declared order.
#[derive(Debug, Clone, Default)]
struct QueryForm {
    key: Option<FormKey>,
    fields: Vec<String>,
    values: Vec<String>,
    cursor: usize,
}

impl QueryForm {
    /// Typed values are dropped whenever the selection they were entered
    /// for changes, even if the new catalog has the same fields.
    fn sync(&mut self, key: FormKey, fields: Vec<String>) {
        if self.key.as_ref() == Some(&key) && fields == self.fields {
            return;
        }
        self.values = vec![String::new(); fields.len()];
        self.fields = fields;
        self.key = Some(key);
        self.cursor = 0;
    }

    fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    fn active_value(&mut self) -> Option<&mut String> {
        self.values.get_mut(self.cursor)
    }

    fn move_cursor(&mut self, delta: isize) {
        self.cursor = step(self.cursor, delta, self.fields.len());
    }
}

pub struct Tui<C, R, S> {
    session: Session<C, R, S>,
    focus: Pane,
    result_cursor: usize,
    field_cursor: usize,
    row_offset: usize,
    column_offset: usize,
    form: QueryForm,
    notice: Option<Notice>,
    clipboard: Option<arboard::Clipboard>,
}

impl<C, R, S> Tui<C, R, S>
where
    C: PortalClient,
    R: ResponseCache,
    S: AppStateStore,
{
    pub fn new(session: Session<C, R, S>) -> Self {
        let mut tui = Self {
            session,
            focus: Pane::ResultTypes,
            result_cursor: 0,
            field_cursor: 0,
            row_offset: 0,
            column_offset: 0,
            form: QueryForm::default(),
            notice: None,
            clipboard: None,
        };
        tui.sync_after_dispatch();
        if let Some(err) = tui.session.take_startup_error() {
            tui.notify_error(err.to_string());
        }
        tui
    }

    pub fn run(&mut self) -> miette::Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let outcome = self.event_loop(&mut terminal);

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        outcome
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> miette::Result<()> {
        loop {
            if self
                .notice
                .as_ref()
                .is_some_and(|notice| notice.shown_at.elapsed() >= NOTICE_TTL)
            {
                self.notice = None;
            }

            terminal
                .draw(|frame| draw_ui(frame, self))
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key) {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }

        match key.code {
            KeyCode::Tab => {
                self.focus = self.focus.next();
                return false;
            }
            KeyCode::BackTab => {
                self.focus = self.focus.previous();
                return false;
            }
            _ => {}
        }

        if self.focus == Pane::Queries {
            self.handle_form_key(key);
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') => {
                if self.apply(Action::ClearCache) {
                    self.notify("Cache cleared");
                }
            }
            KeyCode::Char('a') => {
                let outcome = self.session.select_all_return_fields();
                self.settle(outcome);
            }
            KeyCode::Char('u') => match self.session.share_url() {
                Some(url) => self.notify(url),
                None => self.notify_error("no result type selected"),
            },
            KeyCode::Char('p') => self.copy_url(),
            KeyCode::Char('m') => {
                self.apply(Action::LoadMore);
            }
            _ => self.handle_pane_key(key),
        }
        false
    }

    fn handle_pane_key(&mut self, key: KeyEvent) {
        let selection = self.session.selection().clone();
        match (self.focus, key.code) {
            (Pane::Options, KeyCode::Right) => {
                self.apply(Action::SetDataPortal(selection.data_portal.next()));
            }
            (Pane::Options, KeyCode::Left) => {
                self.apply(Action::SetDataPortal(selection.data_portal.previous()));
            }
            (Pane::Options, KeyCode::Char('[' | ']') | KeyCode::Up | KeyCode::Down) => {
                self.apply(Action::SetFormat(selection.format.next()));
            }
            (Pane::ResultTypes, KeyCode::Up) => self.move_result_cursor(-1),
            (Pane::ResultTypes, KeyCode::Down) => self.move_result_cursor(1),
            (Pane::ResultTypes, KeyCode::Enter | KeyCode::Char(' ')) => {
                let ids = self.session.result_type_ids();
                if let Some(result_type) = ids.get(self.result_cursor) {
                    if selection.result_type.as_ref() != Some(result_type) {
                        self.apply(Action::SetResultType(result_type.clone()));
                    }
                }
            }
            (Pane::Results, KeyCode::Up) => self.row_offset = self.row_offset.saturating_sub(1),
            (Pane::Results, KeyCode::Down) => {
                let rows = self.result_row_count();
                self.row_offset = step(self.row_offset, 1, rows);
            }
            (Pane::Results, KeyCode::PageDown) => {
                let rows = self.result_row_count();
                self.row_offset = step(self.row_offset, 10, rows);
            }
            (Pane::Results, KeyCode::PageUp) => self.row_offset = self.row_offset.saturating_sub(10),
            (Pane::Results, KeyCode::Left) => {
                self.column_offset = self.column_offset.saturating_sub(1)
            }
            (Pane::Results, KeyCode::Right) => {
                let columns = self
                    .session
                    .views()
                    .results
                    .as_ref()
                    .map(|results| results.data.columns.len())
                    .unwrap_or(0);
                self.column_offset = step(self.column_offset, 1, columns);
            }
            (Pane::Results, KeyCode::Enter) => {
                self.apply(Action::LoadMore);
            }
            (Pane::Fields, KeyCode::Up) => {
                let len = self.session.return_field_ids().len();
                self.field_cursor = step(self.field_cursor, -1, len);
            }
            (Pane::Fields, KeyCode::Down) => {
                let len = self.session.return_field_ids().len();
                self.field_cursor = step(self.field_cursor, 1, len);
            }
            (Pane::Fields, KeyCode::Enter | KeyCode::Char(' ')) => {
                let ids = self.session.return_field_ids();
                if let Some(field) = ids.get(self.field_cursor) {
                    self.apply(Action::ToggleReturnField(field.clone()));
                }
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.focus = Pane::ResultTypes,
            KeyCode::Up => self.form.move_cursor(-1),
            KeyCode::Down => self.form.move_cursor(1),
            KeyCode::Enter => {
                let pairs = self.form.pairs().collect::<Vec<_>>();
                let outcome = self.session.submit_query(pairs);
                self.settle(outcome);
            }
            KeyCode::Backspace => {
                if let Some(value) = self.form.active_value() {
                    value.pop();
                }
            }
            KeyCode::Char(ch) => {
                if let Some(value) = self.form.active_value() {
                    value.push(ch);
                }
            }
            _ => {}
        }
    }

    fn apply(&mut self, action: Action) -> bool {
        let outcome = self.session.dispatch(action);
        self.settle(outcome)
    }

    /// Failed actions leave the session untouched and show a notice.
    fn settle(&mut self, outcome: Result<(), PortalError>) -> bool {
        match outcome {
            Ok(()) => {
                self.sync_after_dispatch();
                true
            }
            Err(err) => {
                tracing::warn!("action failed: {err}");
                self.notify_error(err.to_string());
                false
            }
        }
    }

    fn sync_after_dispatch(&mut self) {
        let selection = self.session.selection();
        let key = (
            selection.data_portal,
            selection.format,
            selection.result_type.clone(),
        );
        self.form.sync(key, self.session.search_field_ids());

        let ids = self.session.result_type_ids();
        if let Some(current) = self.session.selection().result_type.as_ref() {
            if let Some(index) = ids.iter().position(|id| id == current) {
                self.result_cursor = index;
            }
        }
        self.result_cursor = self.result_cursor.min(ids.len().saturating_sub(1));

        let fields = self.session.return_field_ids().len();
        self.field_cursor = self.field_cursor.min(fields.saturating_sub(1));

        let rows = self.result_row_count();
        self.row_offset = self.row_offset.min(rows.saturating_sub(1));
    }

    fn copy_url(&mut self) {
        let Some(url) = self.session.share_url() else {
            self.notify_error("no result type selected");
            return;
        };
        match self.clipboard_set(url) {
            Ok(()) => self.notify("Copied!"),
            Err(err) => self.notify_error(err.to_string()),
        }
    }

    fn clipboard_set(&mut self, text: String) -> Result<(), PortalError> {
        if self.clipboard.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|err| PortalError::Clipboard(err.to_string()))?;
            self.clipboard = Some(clipboard);
        }
        match self.clipboard.as_mut() {
            Some(clipboard) => clipboard
                .set_text(text)
                .map_err(|err| PortalError::Clipboard(err.to_string())),
            None => Err(PortalError::Clipboard("not initialized".to_string())),
        }
    }

    fn move_result_cursor(&mut self, delta: isize) {
        let len = self.session.result_type_ids().len();
        self.result_cursor = step(self.result_cursor, delta, len);
    }

    fn result_row_count(&self) -> usize {
        self.session
            .views()
            .results
            .as_ref()
            .map(|results| results.data.row_count())
            .unwrap_or(0)
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice {
            message: message.into(),
            is_error: false,
            shown_at: Instant::now(),
        });
    }

    fn notify_error(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice {
            message: message.into(),
            is_error: true,
            shown_at: Instant::now(),
        });
    }
}

fn step(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let max = len - 1;
    if delta.is_negative() {
        current.saturating_sub(delta.unsigned_abs())
    } else {
        current.saturating_add(delta as usize).min(max)
    }
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

fn draw_ui<C, R, S>(frame: &mut ratatui::Frame, tui: &Tui<C, R, S>)
where
    C: PortalClient,
    R: ResponseCache,
    S: AppStateStore,
{
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_options(frame, tui, chunks[0]);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(30),
            Constraint::Length(30),
            Constraint::Min(20),
            Constraint::Length(30),
        ])
        .split(chunks[1]);

    draw_result_types(frame, tui, main[0]);
    draw_query_form(frame, tui, main[1]);
    draw_results(frame, tui, main[2]);
    draw_return_fields(frame, tui, main[3]);
    draw_notice(frame, tui, chunks[2]);
    draw_footer(frame, tui, chunks[3]);
}

fn draw_options<C, R, S>(frame: &mut ratatui::Frame, tui: &Tui<C, R, S>, area: Rect)
where
    C: PortalClient,
    R: ResponseCache,
    S: AppStateStore,
{
    let selection = tui.session.selection();
    let line = Line::from(vec![
        Span::styled(
            "ENA Portal Browser  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("◀ ", Style::default().fg(Color::Gray)),
        Span::styled(
            selection.data_portal.title(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(" ▶   ", Style::default().fg(Color::Gray)),
        Span::styled("format: ", Style::default().fg(Color::Gray)),
        Span::styled(
            selection.format.as_str().to_uppercase(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]);
    let block = pane_block(" Options ".to_string(), tui.focus == Pane::Options);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_result_types<C, R, S>(frame: &mut ratatui::Frame, tui: &Tui<C, R, S>, area: Rect)
where
    C: PortalClient,
    R: ResponseCache,
    S: AppStateStore,
{
    let current = tui.session.selection().result_type.as_deref();
    let ids = tui.session.result_type_ids();
    let focused = tui.focus == Pane::ResultTypes;
    let visible = area.height.saturating_sub(2) as usize;
    let start = window_start(tui.result_cursor, visible);

    let lines = ids
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(index, id)| {
            let marker = if Some(id.as_str()) == current { "(•) " } else { "( ) " };
            let mut style = Style::default();
            if focused && index == tui.result_cursor {
                style = style.fg(Color::Black).bg(Color::Cyan);
            }
            Line::from(Span::styled(format!("{marker}{id}"), style))
        })
        .collect::<Vec<_>>();
    let block = pane_block(" Result type ".to_string(), focused);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_query_form<C, R, S>(frame: &mut ratatui::Frame, tui: &Tui<C, R, S>, area: Rect)
where
    C: PortalClient,
    R: ResponseCache,
    S: AppStateStore,
{
    let focused = tui.focus == Pane::Queries;
    let visible = area.height.saturating_sub(2) as usize;
    let start = window_start(tui.form.cursor, visible);

    let lines = tui
        .form
        .pairs()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(index, (field, value))| {
            let active = focused && index == tui.form.cursor;
            let value_span = if value.is_empty() && !active {
                Span::styled(field.to_string(), Style::default().fg(Color::DarkGray))
            } else {
                Span::raw(format!("{field}={value}{}", if active { "▏" } else { "" }))
            };
            let style = if active {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            Line::from(value_span).style(style)
        })
        .collect::<Vec<_>>();
    let block = pane_block(" Queries ".to_string(), focused);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_results<C, R, S>(frame: &mut ratatui::Frame, tui: &Tui<C, R, S>, area: Rect)
where
    C: PortalClient,
    R: ResponseCache,
    S: AppStateStore,
{
    let focused = tui.focus == Pane::Results;
    let selection = tui.session.selection();
    let result_type = selection.result_type.as_deref().unwrap_or("-");

    let Some(results) = tui.session.views().results.as_ref() else {
        let block = pane_block(format!(" Results for {result_type} "), focused);
        let text = Paragraph::new("Pick a result type to load results")
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(text, area);
        return;
    };

    let cached = results
        .cached_at
        .map(|at| {
            at.with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "live".to_string());
    let title = format!(
        " Results for {result_type} ({} rows, limit {}, cached {cached}) ",
        results.data.row_count(),
        selection.page_size
    );
    let block = pane_block(title, focused);

    let data = &results.data;
    let columns = data
        .columns
        .iter()
        .enumerate()
        .skip(tui.column_offset)
        .collect::<Vec<_>>();
    let widths = columns
        .iter()
        .map(|(index, name)| {
            let widest = data
                .rows
                .iter()
                .filter_map(|row| row.get(*index))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0);
            Constraint::Length(widest.clamp(4, MAX_COLUMN_WIDTH) as u16)
        })
        .collect::<Vec<_>>();

    let header = Row::new(
        columns
            .iter()
            .map(|(_, name)| Cell::from(name.to_string()))
            .collect::<Vec<_>>(),
    )
    .style(Style::default().add_modifier(Modifier::BOLD))
    .bottom_margin(1);

    let rows = data
        .rows
        .iter()
        .skip(tui.row_offset)
        .map(|row| {
            Row::new(
                columns
                    .iter()
                    .map(|(index, _)| Cell::from(row.get(*index).cloned().unwrap_or_default()))
                    .collect::<Vec<_>>(),
            )
        })
        .collect::<Vec<_>>();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(block.inner(area));
    frame.render_widget(block, area);

    if data.columns.is_empty() {
        frame.render_widget(
            Paragraph::new("No rows").alignment(Alignment::Center),
            chunks[0],
        );
    } else {
        frame.render_widget(Table::new(rows, widths).header(header), chunks[0]);
    }

    let more = Paragraph::new(Line::from(Span::styled(
        "[ More (m) ]",
        Style::default().fg(Color::Cyan),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(more, chunks[1]);
}

fn draw_return_fields<C, R, S>(frame: &mut ratatui::Frame, tui: &Tui<C, R, S>, area: Rect)
where
    C: PortalClient,
    R: ResponseCache,
    S: AppStateStore,
{
    let focused = tui.focus == Pane::Fields;
    let selected = &tui.session.selection().return_fields;
    let ids = tui.session.return_field_ids();
    let visible = area.height.saturating_sub(2) as usize;
    let start = window_start(tui.field_cursor, visible);

    let lines = ids
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(index, id)| {
            let marker = if selected.contains(id) { "[x] " } else { "[ ] " };
            let mut style = Style::default();
            if focused && index == tui.field_cursor {
                style = style.fg(Color::Black).bg(Color::Cyan);
            }
            Line::from(Span::styled(format!("{marker}{id}"), style))
        })
        .collect::<Vec<_>>();
    let block = pane_block(format!(" Fields ({}) ", selected.len()), focused);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_notice<C, R, S>(frame: &mut ratatui::Frame, tui: &Tui<C, R, S>, area: Rect) {
    let Some(notice) = tui.notice.as_ref() else {
        return;
    };
    let style = if notice.is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    };
    let text = Paragraph::new(Line::from(Span::styled(notice.message.clone(), style)))
        .wrap(Wrap { trim: true });
    frame.render_widget(text, area);
}

fn draw_footer<C, R, S>(frame: &mut ratatui::Frame, tui: &Tui<C, R, S>, area: Rect) {
    let mut spans = Vec::new();
    if tui.focus == Pane::Queries {
        spans.push(Span::styled(
            " typing: Enter submit, Esc leave form ",
            Style::default().fg(Color::Yellow),
        ));
    } else {
        for (key, label) in KEY_HELP {
            spans.push(Span::styled(
                format!(" {key} "),
                Style::default().fg(Color::Black).bg(Color::Cyan),
            ));
            spans.push(Span::raw(format!(" {label} ")));
        }
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn window_start(cursor: usize, visible: usize) -> usize {
    if visible == 0 || cursor < visible {
        0
    } else {
        cursor + 1 - visible
    }
}
