//! Ratatui presentation for the console.
//!
//! The TUI never mutates the console directly while handling keys: [`Tui::handle_key`]
//! turns a key into an [`Action`] and [`Tui::apply`] runs it against the console. Rendering
//! reads the console's outbound state only.

use std::io;
use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use thiserror::Error;

use crate::colors::severity_color_name;
use crate::vigil_console::Console;
use crate::vigil_core::{LogEntry, Severity, ValidationError};
use crate::vigil_follow::ScrollMetrics;
use crate::vigil_source::{format_size, AnalysisState, FileUpload, SourceView, MAX_UPLOAD_BYTES};
use crate::vigil_telemetry::RandomSource;

/// Height of one log row when translating rows into scroll metrics.
pub const ROW_PX: f64 = 16.0;

/// Key handling modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Chat,
    Url,
    File,
}

/// Console commands produced by key handling.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    SendAlert,
    SendCriticalAlert,
    SendChat(String),
    SelectUrl(String),
    LoadFile(PathBuf),
    ToggleAnalysis,
    ClearSource,
    Scroll(ScrollMetrics),
    JumpToLatest,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Continue,
    Rejected(ValidationError),
    Quit,
}

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("could not read {path}: {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    pub buffer: String,
    pub cursor: usize,
}

impl InputState {
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    pub fn insert_char(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some(ch) = self.buffer[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
            self.buffer.remove(self.cursor);
        }
    }

    /// Take the buffer, leaving the input empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.buffer)
    }
}

#[derive(Debug, Clone)]
pub struct Tui {
    pub mode: Mode,
    pub input: InputState,
    offset: usize,
    total_rows: usize,
    viewport_rows: usize,
}

impl Default for Tui {
    fn default() -> Self {
        Self::new()
    }
}

impl Tui {
    pub fn new() -> Self {
        Self { mode: Mode::Normal, input: InputState::default(), offset: 0, total_rows: 0, viewport_rows: 0 }
    }

    /// First visible log row.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Map a key to an action. Source inputs are unavailable while `analysis` is running.
    pub fn handle_key(&mut self, key: KeyEvent, analysis: AnalysisState) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return Action::Quit;
        }

        let source_locked = analysis == AnalysisState::Running;
        match self.mode {
            Mode::Normal => self.handle_normal(key, source_locked),
            Mode::Url | Mode::File if source_locked => {
                self.input.clear();
                self.mode = Mode::Normal;
                Action::None
            }
            Mode::Chat | Mode::Url | Mode::File => self.handle_input(key),
        }
    }

    fn handle_normal(&mut self, key: KeyEvent, source_locked: bool) -> Action {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('a') => Action::SendAlert,
            KeyCode::Char('!') => Action::SendCriticalAlert,
            KeyCode::Char('m') => self.enter(Mode::Chat),
            KeyCode::Char('u' | 'f' | 'x') if source_locked => Action::None,
            KeyCode::Char('u') => self.enter(Mode::Url),
            KeyCode::Char('f') => self.enter(Mode::File),
            KeyCode::Char('s') => Action::ToggleAnalysis,
            KeyCode::Char('x') => Action::ClearSource,
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-1),
            KeyCode::PageDown => self.scroll_by(self.page()),
            KeyCode::PageUp => self.scroll_by(-self.page()),
            KeyCode::Char('g') | KeyCode::Home => self.scroll_by(-(self.total_rows as isize)),
            KeyCode::Char('G') | KeyCode::End => Action::JumpToLatest,
            _ => Action::None,
        }
    }

    fn handle_input(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => {
                self.input.clear();
                self.mode = Mode::Normal;
                Action::None
            }
            KeyCode::Enter => {
                let mode = std::mem::replace(&mut self.mode, Mode::Normal);
                let value = self.input.take();
                match mode {
                    Mode::Chat => Action::SendChat(value),
                    Mode::File if !value.trim().is_empty() => {
                        Action::LoadFile(PathBuf::from(value.trim()))
                    }
                    _ => Action::None,
                }
            }
            KeyCode::Backspace => {
                self.input.backspace();
                self.url_keystroke()
            }
            KeyCode::Char(ch) => {
                self.input.insert_char(ch);
                self.url_keystroke()
            }
            _ => Action::None,
        }
    }

    /// The URL field re-selects the source on every keystroke.
    fn url_keystroke(&self) -> Action {
        if self.mode == Mode::Url {
            Action::SelectUrl(self.input.buffer.clone())
        } else {
            Action::None
        }
    }

    fn enter(&mut self, mode: Mode) -> Action {
        self.input.clear();
        self.mode = mode;
        Action::None
    }

    fn page(&self) -> isize {
        self.viewport_rows.max(1) as isize
    }

    fn max_offset(&self) -> usize {
        self.total_rows.saturating_sub(self.viewport_rows)
    }

    fn scroll_by(&mut self, delta: isize) -> Action {
        let max = self.max_offset() as isize;
        self.offset = (self.offset as isize + delta).clamp(0, max) as usize;
        Action::Scroll(self.scroll_metrics())
    }

    pub fn scroll_metrics(&self) -> ScrollMetrics {
        ScrollMetrics::new(
            self.offset as f64 * ROW_PX,
            self.total_rows as f64 * ROW_PX,
            self.viewport_rows as f64 * ROW_PX,
        )
    }

    /// Run an action against the console.
    ///
    /// Validation failures are already logged by the console and come back as
    /// [`ActionOutcome::Rejected`]; upload I/O failures are pushed as error entries.
    pub fn apply<R: RandomSource>(
        &mut self,
        action: Action,
        console: &mut Console<R>,
    ) -> Result<ActionOutcome, TuiError> {
        let result = match action {
            Action::None => Ok(()),
            Action::Quit => return Ok(ActionOutcome::Quit),
            Action::SendAlert => {
                console.send_alert();
                Ok(())
            }
            Action::SendCriticalAlert => {
                console.send_critical_alert();
                Ok(())
            }
            Action::SendChat(text) => console.send_chat_message(&text).map(|_| ()),
            Action::SelectUrl(url) => console.select_remote_source(&url),
            Action::LoadFile(path) => {
                let upload = match FileUpload::from_path(&path) {
                    Ok(upload) => upload,
                    Err(source) => {
                        console.push_event(
                            format!("Could not read file {}: {source}", path.display()),
                            Severity::Error,
                        );
                        return Err(TuiError::Upload { path, source });
                    }
                };
                console.select_file_source(upload)
            }
            Action::ToggleAnalysis => match console.analysis_state() {
                AnalysisState::Running => {
                    console.stop_analysis();
                    Ok(())
                }
                AnalysisState::Idle => console.start_analysis().map(|_| ()),
            },
            Action::ClearSource => console.clear_source().map(|_| ()),
            Action::Scroll(metrics) => {
                console.scroll_sampled(metrics.scroll_top, metrics.scroll_height, metrics.client_height);
                Ok(())
            }
            Action::JumpToLatest => {
                console.jump_to_latest();
                self.offset = self.max_offset();
                Ok(())
            }
        };

        Ok(match result {
            Ok(()) => ActionOutcome::Continue,
            Err(error) => ActionOutcome::Rejected(error),
        })
    }

    pub fn draw<B: Backend, R: RandomSource>(
        &mut self,
        terminal: &mut Terminal<B>,
        console: &Console<R>,
    ) -> Result<(), TuiError> {
        terminal.draw(|frame| self.render(frame, console))?;
        Ok(())
    }

    pub fn render<R: RandomSource>(&mut self, frame: &mut Frame<'_>, console: &Console<R>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
            .split(frame.area());

        self.render_top_bar(frame, chunks[0], console);

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(38)])
            .split(chunks[1]);
        self.render_logs(frame, main[0], console);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(0)])
            .split(main[1]);
        self.render_density(frame, side[0], console);
        self.render_source(frame, side[1], console);

        self.render_footer(frame, chunks[2], console.analysis_state());
    }

    fn render_top_bar<R: RandomSource>(&self, frame: &mut Frame<'_>, area: Rect, console: &Console<R>) {
        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(16), Constraint::Length(1), Constraint::Min(0)])
            .split(area);

        let critical = console.alert_state().active;
        let (label, color) = if critical { ("🚨 CRITICAL", Color::Red) } else { ("▶ Live", Color::Green) };
        let status_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
        let status = Block::default().borders(Borders::ALL).border_style(status_style);
        let inner = status.inner(top[0]);
        frame.render_widget(status, top[0]);
        frame.render_widget(Paragraph::new(label).alignment(Alignment::Center).style(status_style), inner);

        let analysis = match console.analysis_state() {
            AnalysisState::Running => Span::styled("running", Style::default().fg(Color::Green)),
            AnalysisState::Idle => Span::styled("idle", dimmed_style()),
        };
        let line = Line::from(vec![
            Span::styled(console.config().operator.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(" · analysis ", dimmed_style()),
            analysis,
            Span::styled(" · source ", dimmed_style()),
            Span::raw(console.source().label()),
        ]);
        let block = Block::default().borders(Borders::ALL).title("───── Vigil ");
        let info = block.inner(top[2]);
        frame.render_widget(block, top[2]);
        frame.render_widget(Paragraph::new(line), info);
    }

    fn render_logs<R: RandomSource>(&mut self, frame: &mut Frame<'_>, area: Rect, console: &Console<R>) {
        let total = console.log().len();
        let mut block = Block::default()
            .borders(Borders::ALL)
            .title(Line::from(" Logs ").style(Style::default().add_modifier(Modifier::BOLD)))
            .title_bottom(Line::from(format!("─ {total} of {} ─", console.log().capacity())).right_aligned());
        if console.unseen() > 0 {
            let notice = format!(" ↓ {} new messages (G) ", console.unseen());
            block = block.title_bottom(
                Line::from(notice)
                    .style(Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD))
                    .left_aligned(),
            );
        }
        let inner = block.inner(area);
        frame.render_widget(block, area);

        self.total_rows = total;
        self.viewport_rows = inner.height as usize;
        self.offset = if console.is_at_bottom() {
            self.max_offset()
        } else {
            self.offset.min(self.max_offset())
        };

        let items: Vec<ListItem> = console.entries().map(|entry| ListItem::new(format_log_line(entry))).collect();
        let mut state = ListState::default().with_offset(self.offset);
        frame.render_stateful_widget(List::new(items), inner, &mut state);
    }

    fn render_density<R: RandomSource>(&self, frame: &mut Frame<'_>, area: Rect, console: &Console<R>) {
        let block = Block::default().borders(Borders::ALL).title(" Occupancy ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(snapshot) = console.density() else {
            frame.render_widget(Paragraph::new("No analysis running").style(dimmed_style()), inner);
            return;
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(inner);
        let ratio = snapshot.occupancy_ratio();
        let gauge_color = if ratio >= 0.8 { Color::Red } else if ratio >= 0.5 { Color::Yellow } else { Color::Green };
        frame.render_widget(
            Gauge::default()
                .gauge_style(Style::default().fg(gauge_color))
                .ratio(ratio)
                .label(format!("{}/{}", snapshot.total_count, snapshot.capacity())),
            rows[0],
        );

        let zones: Vec<Line> = snapshot
            .zones
            .iter()
            .map(|zone| Line::from(format!("{:<8}{:>4}", zone.label, zone.count)))
            .collect();
        frame.render_widget(Paragraph::new(zones), rows[1]);
    }

    fn render_source<R: RandomSource>(&self, frame: &mut Frame<'_>, area: Rect, console: &Console<R>) {
        let block = Block::default().borders(Borders::ALL).title(" Source ");
        let lines = match console.source().view() {
            SourceView::None => vec![
                Line::styled("No source selected", dimmed_style()),
                Line::styled(
                    format!("u: video URL  f: file (max {})", format_size(MAX_UPLOAD_BYTES)),
                    dimmed_style(),
                ),
            ],
            SourceView::RemoteUrl { raw, video_id } => vec![
                Line::from(raw),
                match video_id {
                    Some(id) => Line::styled(format!("video id {id}"), Style::default().fg(Color::Green)),
                    None => Line::styled("not a recognised video URL", Style::default().fg(Color::Red)),
                },
            ],
            SourceView::UploadedFile { file_name, size_bytes, handle_url } => vec![
                Line::from(file_name),
                Line::styled(format_size(size_bytes), dimmed_style()),
                Line::styled(handle_url, dimmed_style()),
            ],
        };
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }).block(block), area);
    }

    fn render_footer(&self, frame: &mut Frame<'_>, area: Rect, analysis: AnalysisState) {
        let key_style = Style::default().fg(Color::LightBlue).add_modifier(Modifier::BOLD);
        let line = match self.mode {
            Mode::Normal => {
                let hints: &[(&str, &str)] = match analysis {
                    AnalysisState::Idle => &[
                        ("Alert", "a"),
                        ("Critical", "!"),
                        ("Chat", "m"),
                        ("URL", "u"),
                        ("File", "f"),
                        ("Start", "s"),
                        ("Clear", "x"),
                        ("Latest", "G"),
                        ("Quit", "q"),
                    ],
                    AnalysisState::Running => &[
                        ("Alert", "a"),
                        ("Critical", "!"),
                        ("Chat", "m"),
                        ("Stop", "s"),
                        ("Latest", "G"),
                        ("Quit", "q"),
                    ],
                };
                let mut spans = Vec::new();
                for &(label, key) in hints {
                    if !spans.is_empty() {
                        spans.push(Span::styled(" | ", dimmed_style()));
                    }
                    spans.push(Span::styled(label, dimmed_style()));
                    spans.push(Span::raw(":"));
                    spans.push(Span::styled(key, key_style));
                }
                Line::from(spans)
            }
            mode => {
                let prompt = match mode {
                    Mode::Chat => "Message",
                    Mode::Url => "Video URL",
                    _ => "File path",
                };
                Line::from(vec![
                    Span::styled(format!(" {prompt} "), Style::default().add_modifier(Modifier::REVERSED)),
                    Span::raw(" "),
                    Span::raw(self.input.buffer.clone()),
                    Span::styled("▏", key_style),
                ])
            }
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn dimmed_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn color_from_name(value: &str) -> Option<Color> {
    match value {
        "blue" => Some(Color::Blue),
        "yellow" => Some(Color::Yellow),
        "red" => Some(Color::Red),
        _ => None,
    }
}

fn format_log_line(entry: &LogEntry) -> Line<'_> {
    let color = color_from_name(severity_color_name(entry.severity())).unwrap_or(Color::Reset);
    let mut message_style = Style::default();
    if entry.severity() == Severity::Error {
        message_style = message_style.fg(Color::Red);
    }
    Line::from(vec![
        Span::styled("● ", Style::default().fg(color)),
        Span::styled(format!("{} ", entry.timestamp().format("%H:%M:%S")), dimmed_style()),
        Span::styled(entry.message(), message_style),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crossterm::event::{KeyEventKind, KeyEventState};
    use ratatui::backend::TestBackend;
    use rstest::{fixture, rstest};

    use crate::vigil_console::ConsoleConfig;
    use crate::vigil_follow::FollowState;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent { code, modifiers: KeyModifiers::NONE, kind: KeyEventKind::Press, state: KeyEventState::empty() }
    }

    #[fixture]
    fn console() -> Console {
        let epoch = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Console::seeded(ConsoleConfig::default(), 11, epoch)
    }

    fn render_once(tui: &mut Tui, console: &Console) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).expect("terminal");
        tui.draw(&mut terminal, console).expect("draw");
        terminal.backend().buffer().content().iter().map(|cell| cell.symbol()).collect()
    }

    fn seed(console: &mut Console, count: usize) {
        for n in 1..=count {
            console.push_event(format!("event {n}"), Severity::Info);
        }
    }

    #[rstest]
    fn renders_log_tail_and_status(mut console: Console) {
        seed(&mut console, 30);
        let mut tui = Tui::new();

        let screen = render_once(&mut tui, &console);
        assert!(screen.contains("event 30"));
        assert!(!screen.contains("event 1 "));
        assert!(screen.contains("▶ Live"));
        assert!(screen.contains("No analysis running"));
    }

    #[rstest]
    fn scrolling_up_detaches_and_shows_notice(mut console: Console) {
        seed(&mut console, 30);
        let mut tui = Tui::new();
        render_once(&mut tui, &console);

        let action = tui.handle_key(key(KeyCode::Char('k')), AnalysisState::Idle);
        assert!(matches!(action, Action::Scroll(_)));
        tui.apply(action, &mut console).expect("apply scroll");
        assert_eq!(console.follow_state(), FollowState::Detached);

        console.push_event("late", Severity::Warning);
        let screen = render_once(&mut tui, &console);
        assert!(screen.contains("1 new messages"));

        let action = tui.handle_key(key(KeyCode::End), AnalysisState::Idle);
        tui.apply(action, &mut console).expect("apply jump");
        assert!(console.is_at_bottom());
        assert!(render_once(&mut tui, &console).contains("late"));
    }

    #[rstest]
    fn scrolling_back_to_bottom_refollows(mut console: Console) {
        seed(&mut console, 30);
        let mut tui = Tui::new();
        render_once(&mut tui, &console);

        let up = tui.handle_key(key(KeyCode::PageUp), AnalysisState::Idle);
        tui.apply(up, &mut console).expect("apply");
        assert!(!console.is_at_bottom());

        let down = tui.handle_key(key(KeyCode::PageDown), AnalysisState::Idle);
        tui.apply(down, &mut console).expect("apply");
        assert!(console.is_at_bottom());
    }

    #[test]
    fn chat_input_submits_on_enter() {
        let mut tui = Tui::new();
        assert_eq!(tui.handle_key(key(KeyCode::Char('m')), AnalysisState::Idle), Action::None);
        assert_eq!(tui.mode, Mode::Chat);
        for ch in "hix".chars() {
            tui.handle_key(key(KeyCode::Char(ch)), AnalysisState::Idle);
        }
        tui.handle_key(key(KeyCode::Backspace), AnalysisState::Idle);

        assert_eq!(
            tui.handle_key(key(KeyCode::Enter), AnalysisState::Idle),
            Action::SendChat("hi".to_string())
        );
        assert_eq!(tui.mode, Mode::Normal);
    }

    #[rstest]
    fn url_input_reselects_on_each_keystroke(mut console: Console) {
        let mut tui = Tui::new();
        tui.handle_key(key(KeyCode::Char('u')), AnalysisState::Idle);

        let mut last = Action::None;
        for ch in "youtu.be/ab1".chars() {
            last = tui.handle_key(key(KeyCode::Char(ch)), AnalysisState::Idle);
            tui.apply(last.clone(), &mut console).expect("apply");
        }
        assert_eq!(last, Action::SelectUrl("youtu.be/ab1".to_string()));
        assert_eq!(console.source().parsed_id().as_deref(), Some("ab1"));
        assert!(console.log().is_empty());
    }

    #[rstest]
    fn source_keys_are_inert_while_running(mut console: Console) {
        console.select_remote_source("https://youtu.be/abc123").unwrap();
        console.start_analysis().unwrap();
        let mut tui = Tui::new();

        for code in [KeyCode::Char('u'), KeyCode::Char('f'), KeyCode::Char('x')] {
            assert_eq!(tui.handle_key(key(code), console.analysis_state()), Action::None);
            assert_eq!(tui.mode, Mode::Normal);
        }
        for ch in "youtu.be/other1".chars() {
            let action = tui.handle_key(key(KeyCode::Char(ch)), console.analysis_state());
            tui.apply(action, &mut console).expect("apply");
        }

        assert_eq!(console.log().len(), 2);
        assert_eq!(
            console.entries().next().map(LogEntry::message),
            Some("Analysis started on video abc123")
        );
        assert_eq!(console.source().parsed_id().as_deref(), Some("abc123"));
    }

    #[rstest]
    fn open_url_input_closes_once_analysis_runs(mut console: Console) {
        console.select_remote_source("https://youtu.be/abc123").unwrap();
        let mut tui = Tui::new();
        tui.handle_key(key(KeyCode::Char('u')), console.analysis_state());
        assert_eq!(tui.mode, Mode::Url);

        console.start_analysis().unwrap();
        assert_eq!(tui.handle_key(key(KeyCode::Char('z')), console.analysis_state()), Action::None);
        assert_eq!(tui.mode, Mode::Normal);
        assert!(tui.input.buffer.is_empty());
    }

    #[rstest]
    fn footer_hides_source_hints_while_running(mut console: Console) {
        let mut tui = Tui::new();
        let idle = render_once(&mut tui, &console);
        assert!(idle.contains("URL:u"));
        assert!(idle.contains("File:f"));

        console.select_remote_source("https://youtu.be/abc123").unwrap();
        console.start_analysis().unwrap();
        let running = render_once(&mut tui, &console);
        assert!(!running.contains("URL:u"));
        assert!(!running.contains("File:f"));
        assert!(!running.contains("Clear:x"));
        assert!(running.contains("Stop:s"));
    }

    #[rstest]
    fn toggle_analysis_without_source_is_rejected(mut console: Console) {
        let mut tui = Tui::new();
        let outcome = tui.apply(Action::ToggleAnalysis, &mut console).expect("apply");
        assert_eq!(outcome, ActionOutcome::Rejected(ValidationError::NoSource));
        assert_eq!(console.log().len(), 1);
    }

    #[rstest]
    fn missing_upload_is_reported_to_the_log(mut console: Console) {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("missing.mp4");
        let mut tui = Tui::new();

        let result = tui.apply(Action::LoadFile(path), &mut console);
        assert!(matches!(result, Err(TuiError::Upload { .. })));
        let entry = console.entries().last().expect("error entry");
        assert_eq!(entry.severity(), Severity::Error);
        assert!(entry.message().starts_with("Could not read file"));
    }

    #[rstest]
    fn critical_alert_and_density_render(mut console: Console) {
        console.select_remote_source("https://youtu.be/abc123").unwrap();
        console.start_analysis().unwrap();
        console.advance(std::time::Duration::from_secs(5));
        let mut tui = Tui::new();
        tui.apply(Action::SendCriticalAlert, &mut console).expect("apply");

        let screen = render_once(&mut tui, &console);
        assert!(screen.contains("CRITICAL"));
        assert!(screen.contains("Zone A"));
        assert!(screen.contains("video id abc123"));
    }

    #[rstest]
    fn every_severity_has_a_dot_color(
        #[values(Severity::Info, Severity::Warning, Severity::Error)] severity: Severity,
    ) {
        assert!(color_from_name(severity_color_name(severity)).is_some());
    }

    #[rstest]
    fn quit_keys(#[values(KeyCode::Char('q'), KeyCode::Esc)] code: KeyCode) {
        let mut tui = Tui::new();
        assert_eq!(tui.handle_key(key(code), AnalysisState::Idle), Action::Quit);
    }
}
