use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use niosfm_config::AppConfig;
use niosfm_core::router::redact;
use niosfm_core::{
    Event as CoreEvent, GridShell, Output, SelectionOption, SessionState, Table,
};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table as TableWidget,
    Wrap,
};
use ratatui::Terminal;
use std::collections::VecDeque;
use std::io::{self, Stdout};
use tracing::{debug, warn};

pub async fn run(shell: GridShell, config: AppConfig) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, shell, config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

async fn run_app(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<Stdout>>,
    shell: GridShell,
    config: AppConfig,
) -> Result<()> {
    let mut event_stream = EventStream::new();
    let mut event_rx = shell.bus().subscribe();
    let mut app = AppState::new(shell, &config);

    loop {
        terminal.draw(|f| app.draw(f))?;

        tokio::select! {
            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(event)) => {
                        if app.handle_event(event).await {
                            break;
                        }
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
            maybe_bus = event_rx.recv() => {
                match maybe_bus {
                    Ok(event) => app.handle_bus_event(event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "ui lagged behind shell events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

struct AppState {
    shell: GridShell,
    theme: Theme,
    input: String,
    output: OutputLog,
    files: Option<Table>,
    grid_info: String,
    session_state: SessionState,
    selection: Option<SelectionOverlay>,
}

#[derive(Clone, Copy, Debug)]
struct Theme {
    accent: Color,
    accent_soft: Color,
    text: Color,
    muted: Color,
    selection_bg: Color,
    selection_fg: Color,
}

impl Theme {
    fn grid() -> Self {
        Self {
            accent: Color::Green,
            accent_soft: Color::LightGreen,
            text: Color::White,
            muted: Color::Gray,
            selection_bg: Color::Green,
            selection_fg: Color::Black,
        }
    }
}

struct OutputLog {
    lines: VecDeque<String>,
    limit: usize,
}

impl OutputLog {
    fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    fn push(&mut self, text: &str) {
        for line in text.lines() {
            self.lines.push_back(line.to_string());
        }
        while self.lines.len() > self.limit {
            self.lines.pop_front();
        }
    }

    fn tail(&self, height: usize) -> impl Iterator<Item = &String> {
        self.lines.iter().skip(self.lines.len().saturating_sub(height))
    }
}

#[derive(Clone, Debug)]
struct SelectionOverlay {
    options: Vec<SelectionOption>,
    cursor: usize,
}

impl SelectionOverlay {
    fn new(options: Vec<SelectionOption>) -> Self {
        Self { options, cursor: 0 }
    }

    fn move_cursor(&mut self, delta: i32) {
        if self.options.is_empty() {
            self.cursor = 0;
            return;
        }
        let last = self.options.len() - 1;
        self.cursor = if delta < 0 {
            self.cursor.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            (self.cursor + delta as usize).min(last)
        };
    }

    fn current(&self) -> Option<&SelectionOption> {
        self.options.get(self.cursor)
    }
}

impl AppState {
    fn new(shell: GridShell, config: &AppConfig) -> Self {
        let mut output = OutputLog::new(config.ui.scrollback_lines);
        output.push("Try: help");
        Self {
            shell,
            theme: Theme::grid(),
            input: String::new(),
            output,
            files: None,
            grid_info: niosfm_core::session::NOT_CONNECTED.to_string(),
            session_state: SessionState::Disconnected,
            selection: None,
        }
    }

    fn draw(&self, f: &mut ratatui::Frame<'_>) {
        let size = f.area();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .split(size);
        self.draw_header(f, layout[0]);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(layout[1]);
        self.draw_files(f, body[0]);
        let manager = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(35),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(body[1]);
        self.draw_grid_info(f, manager[0]);
        self.draw_output(f, manager[1]);
        self.draw_input(f, manager[2]);
        self.draw_footer(f, layout[2]);
        if let Some(selection) = &self.selection {
            self.draw_selection(f, centered_rect(60, 50, size), selection);
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let session = self.shell.session();
        let status = match self.session_state {
            SessionState::Connected => format!(
                "connected to {} as {} (WAPI {})",
                session.grid_address,
                session.username.as_deref().unwrap_or("-"),
                session.wapi_version
            ),
            SessionState::Connecting => format!("connecting to {}", session.grid_address),
            SessionState::Disconnected => "disconnected".to_string(),
        };
        let spans = vec![
            Span::styled(
                "NIOS File Manager",
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(status, Style::default().fg(theme.accent_soft)),
        ];
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent_soft));
        f.render_widget(
            Paragraph::new(Text::from(Line::from(spans))).block(block),
            area,
        );
    }

    fn draw_files(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let title = format!("NIOS Files: {}", self.shell.listing().directory());
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(theme.accent));
        let Some(table) = &self.files else {
            let hint = Paragraph::new("Run list to load the grid's files.")
                .block(block)
                .style(Style::default().fg(theme.muted));
            f.render_widget(hint, area);
            return;
        };
        let header = Row::new(table.columns.iter().map(|c| Cell::from(c.clone()))).style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        );
        let rows = table.rows.iter().map(|row| {
            Row::new(row.iter().map(|c| Cell::from(c.clone())))
                .style(Style::default().fg(theme.text))
        });
        let widths = [
            Constraint::Percentage(50),
            Constraint::Length(11),
            Constraint::Length(24),
        ];
        let widget = TableWidget::new(rows, widths).header(header).block(block);
        f.render_widget(widget, area);
    }

    fn draw_grid_info(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Grid Information")
            .border_style(Style::default().fg(theme.accent));
        let paragraph = Paragraph::new(self.grid_info.as_str())
            .block(block)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(theme.text));
        f.render_widget(paragraph, area);
    }

    fn draw_output(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Command")
            .border_style(Style::default().fg(theme.accent));
        let height = area.height.saturating_sub(2) as usize;
        let lines: Vec<Line> = self
            .output
            .tail(height)
            .map(|l| Line::from(l.clone()))
            .collect();
        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .style(Style::default().fg(theme.text));
        f.render_widget(paragraph, area);
    }

    fn draw_input(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let border = if self.selection.is_some() {
            theme.muted
        } else {
            theme.accent
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border));
        let line = Line::from(vec![
            Span::styled("> ", Style::default().fg(theme.accent_soft)),
            Span::raw(self.input.as_str()),
        ]);
        f.render_widget(Paragraph::new(line).block(block), area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = self.theme;
        let hint = if self.selection.is_some() {
            "Up/Down move | Enter download | Esc cancel"
        } else {
            "Enter run | Esc clear | Ctrl+Q quit"
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent_soft));
        let paragraph = Paragraph::new(hint)
            .block(block)
            .style(Style::default().fg(theme.accent_soft));
        f.render_widget(paragraph, area);
    }

    fn draw_selection(&self, f: &mut ratatui::Frame<'_>, area: Rect, selection: &SelectionOverlay) {
        let theme = self.theme;
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Select a file to download")
            .border_style(Style::default().fg(theme.accent));
        let items: Vec<ListItem> = selection
            .options
            .iter()
            .map(|o| ListItem::new(Line::from(o.label.clone())))
            .collect();
        let list = List::new(items)
            .block(block)
            .style(Style::default().fg(theme.text))
            .highlight_style(
                Style::default()
                    .fg(theme.selection_fg)
                    .bg(theme.selection_bg)
                    .add_modifier(Modifier::BOLD),
            );
        let mut state = ListState::default();
        state.select(Some(selection.cursor));
        f.render_widget(Clear, area);
        f.render_stateful_widget(list, area, &mut state);
    }

    fn handle_bus_event(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::Output(Output::Text(text)) => self.output.push(&text),
            CoreEvent::Output(Output::Table(table)) => {
                self.output
                    .push(&format!("Listed {} entries.", table.rows.len()));
                self.files = Some(table);
            }
            CoreEvent::GridInfo(text) => self.grid_info = text,
            CoreEvent::SessionStateChanged { state } => {
                self.session_state = state;
                if state == SessionState::Connecting {
                    self.files = None;
                }
            }
            CoreEvent::SelectionOpened { options } => {
                self.selection = Some(SelectionOverlay::new(options));
            }
            CoreEvent::SelectionClosed => self.selection = None,
        }
    }

    async fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Key(key) => {
                if matches!(key.kind, KeyEventKind::Release) {
                    return false;
                }
                self.handle_key(key).await
            }
            _ => false,
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
        {
            return true;
        }
        if self.selection.is_some() {
            self.handle_selection_key(key);
            return false;
        }
        match key.code {
            KeyCode::Enter => {
                let line = std::mem::take(&mut self.input);
                if !line.trim().is_empty() {
                    self.output.push(&format!("> {}", redact(&line)));
                }
                self.shell.submit(&line).await;
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Esc => self.input.clear(),
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
        false
    }

    fn handle_selection_key(&mut self, key: KeyEvent) {
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Up => selection.move_cursor(-1),
            KeyCode::Down => selection.move_cursor(1),
            KeyCode::PageUp => selection.move_cursor(-10),
            KeyCode::PageDown => selection.move_cursor(10),
            KeyCode::Enter => {
                if let Some(option) = selection.current().cloned() {
                    if let Err(err) = self.shell.pick(&option.reference) {
                        debug!(error = %err, "pick rejected");
                        self.output.push(&format!("Selection failed: {}", err));
                    }
                }
            }
            KeyCode::Esc => {
                if let Err(err) = self.shell.cancel_selection() {
                    debug!(error = %err, "cancel rejected");
                }
            }
            _ => {}
        }
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1]);
    horizontal[1]
}
