use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use custombet_terminal::config::{self, PredictionConfig};
use custombet_terminal::gemini::GeminiClient;
use custombet_terminal::logging::init_file_logging;
use custombet_terminal::provider::spawn_prediction_worker;
use custombet_terminal::state::{
    self as st, AppState, DisplayMode, FetchRequest, Match, Pick, ProviderCommand, apply_delta,
    local_today,
};

const CARD_HEIGHT: u16 = 8;
const SKELETON_CARDS: usize = 12;

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
}

impl App {
    fn new(state: AppState, cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state,
            should_quit: false,
            cmd_tx,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.date_input.is_some() {
            match key.code {
                KeyCode::Enter => {
                    let request = self.state.submit_date_input();
                    self.dispatch(request);
                }
                KeyCode::Esc => self.state.cancel_date_input(),
                KeyCode::Backspace => self.state.pop_date_char(),
                KeyCode::Char(ch) => self.state.push_date_char(ch),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') | KeyCode::Char('R') => {
                let request = self.state.refresh();
                self.dispatch(request);
            }
            KeyCode::Left | KeyCode::Char('h') => {
                let request = self.state.shift_date(-1);
                self.dispatch(request);
            }
            KeyCode::Right | KeyCode::Char('l') => {
                let request = self.state.shift_date(1);
                self.dispatch(request);
            }
            KeyCode::Char('t') => {
                let request = self.state.change_date(local_today());
                self.dispatch(request);
            }
            KeyCode::Char('/') | KeyCode::Char('d') => self.state.begin_date_input(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('s') => self.state.toggle_sources(),
            KeyCode::PageDown | KeyCode::Char(']') => self.state.scroll_sources_down(),
            KeyCode::PageUp | KeyCode::Char('[') => self.state.scroll_sources_up(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => self.state.help_overlay = false,
            _ => {}
        }
    }

    fn dispatch(&mut self, request: Option<FetchRequest>) {
        let Some(request) = request else {
            return;
        };
        let Some(tx) = &self.cmd_tx else {
            self.state.abandon_request(request, "prediction worker unavailable");
            return;
        };
        if tx.send(request.into()).is_err() {
            self.state
                .abandon_request(request, "prediction worker stopped");
        } else {
            self.state.push_log(format!(
                "[INFO] Requested predictions for {}",
                request.date.format(st::DATE_FORMAT)
            ));
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let log_path = config::log_file_path();
    if let Err(err) = init_file_logging(&log_path) {
        eprintln!("warning: {err:#}");
    }

    let config = PredictionConfig::from_env();
    let mut state = AppState::from_config(&config);
    if !config.has_credential() {
        state.push_log("[WARN] GEMINI_API_KEY / API_KEY is not set; fetches will fail");
        tracing::warn!("no provider credential configured");
    }
    let client = GeminiClient::new(config).context("initialise prediction client")?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    spawn_prediction_worker(Arc::new(client), tx, cmd_rx);

    let mut app = App::new(state, Some(cmd_tx));
    let initial = app.state.refresh();
    app.dispatch(initial);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<st::Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        loop {
            match rx.try_recv() {
                Ok(delta) => apply_delta(&mut app.state, delta),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    app.state.worker_lost();
                    break;
                }
            }
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let state = &app.state;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(sources_height(state)),
            Constraint::Length(5),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let intro = Paragraph::new(intro_text(state)).style(Style::default().fg(Color::Gray));
    frame.render_widget(intro, chunks[1]);

    match state.display_mode() {
        DisplayMode::Loading => render_skeleton(frame, chunks[2]),
        DisplayMode::Error => render_error(frame, chunks[2], state),
        DisplayMode::Results => render_results(frame, chunks[2], state),
    }

    if chunks[3].height > 0 {
        render_sources(frame, chunks[3], state);
    }

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[4]);

    let footer = Paragraph::new(footer_text(state))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[5]);

    if state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let status = if state.loading {
        "Analysing...".to_string()
    } else {
        match &state.fetched_at {
            Some(at) => format!("Updated {}", at.format("%H:%M")),
            None => "Idle".to_string(),
        }
    };
    let line1 = format!(
        "  CUSTOMBET AI | {} | Date: {} | {}",
        st::variant_label(state.variant),
        state.date_label(),
        status
    );
    let line2 = "  AI prediction engine | r Refresh | ←/→ Day | / Pick date".to_string();
    format!("{line1}\n{line2}")
}

fn intro_text(state: &AppState) -> String {
    let first = format!("Daily selections for {}", state.date_label());
    match &state.summary {
        Some(summary) if state.display_mode() == DisplayMode::Results => {
            format!("{first}\n{summary}")
        }
        _ => format!("{first}\nGrounded in live Google Search results for line-ups and odds."),
    }
}

fn footer_text(state: &AppState) -> String {
    if let Some(input) = &state.date_input {
        return format!("Date (YYYY-MM-DD): {input}_   Enter Apply | Esc Cancel");
    }
    "r Refresh | ←/→ Day | t Today | / Date | j/k Move | s Sources | ? Help | q Quit   \
     Predictions are probabilities. Never bet what you cannot afford to lose."
        .to_string()
}

fn grid_columns(width: u16) -> usize {
    match width {
        0..=59 => 1,
        60..=99 => 2,
        100..=139 => 3,
        _ => 4,
    }
}

fn grid_rows(area: Rect, cols: usize, count: usize, first_row: usize) -> Vec<(usize, Rect)> {
    let visible_rows = (area.height / CARD_HEIGHT) as usize;
    if visible_rows == 0 || cols == 0 {
        return Vec::new();
    }
    let mut cells = Vec::new();
    for row in 0..visible_rows {
        let row_area = Rect {
            x: area.x,
            y: area.y + (row as u16) * CARD_HEIGHT,
            width: area.width,
            height: CARD_HEIGHT,
        };
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, cols as u32); cols])
            .split(row_area);
        for (col, cell) in columns.iter().enumerate() {
            let idx = (first_row + row) * cols + col;
            if idx >= count {
                return cells;
            }
            cells.push((idx, *cell));
        }
    }
    cells
}

fn render_skeleton(frame: &mut Frame, area: Rect) {
    let cols = grid_columns(area.width);
    let style = Style::default().fg(Color::DarkGray);
    for (_, cell) in grid_rows(area, cols, SKELETON_CARDS, 0) {
        let card = Paragraph::new("\n  ░░░░░░░░░░\n  ░░░░░░\n  ░░░░░░░░")
            .style(style)
            .block(Block::default().borders(Borders::ALL).border_style(style));
        frame.render_widget(card, cell);
    }
}

fn render_error(frame: &mut Frame, area: Rect, state: &AppState) {
    let popup = centered_rect(60, 70, area);
    let message = state.error.clone().unwrap_or_default();
    let code = state
        .last_error
        .as_ref()
        .map(|err| err.kind_code())
        .unwrap_or("UNKNOWN");
    let mut lines = vec![
        Line::from(Span::styled(
            "Something went wrong",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(message),
        Line::from(""),
        Line::from(Span::styled(
            "[r] Try again",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    let tip = if state
        .last_error
        .as_ref()
        .is_some_and(|err| err.is_configuration())
    {
        format!("Tip: make sure GEMINI_API_KEY (or API_KEY) is set in .env  [{code}]")
    } else {
        format!("[{code}]")
    };
    lines.push(Line::from(Span::styled(
        tip,
        Style::default().fg(Color::DarkGray),
    )));
    let panel = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    frame.render_widget(panel, popup);
}

fn render_results(frame: &mut Frame, area: Rect, state: &AppState) {
    if state.matches.is_empty() {
        let empty = Paragraph::new("No predictions for this date")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }
    if area.height < CARD_HEIGHT {
        let empty = Paragraph::new("Prediction grid needs more height")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let cols = grid_columns(area.width);
    let total_rows = state.matches.len().div_ceil(cols);
    let visible_rows = (area.height / CARD_HEIGHT) as usize;
    let (first_row, _) = visible_range(state.selected / cols, total_rows, visible_rows);

    for (idx, cell) in grid_rows(area, cols, state.matches.len(), first_row) {
        render_card(frame, cell, idx, &state.matches[idx], idx == state.selected);
    }
}

fn render_card(frame: &mut Frame, area: Rect, index: usize, m: &Match, selected: bool) {
    let border = if selected {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Gray)
    };
    let pick_line = match &m.pick {
        Pick::Outcome {
            outcome,
            start_time,
        } => Line::from(vec![
            Span::styled(
                format!(" {} ", outcome.code()),
                Style::default()
                    .fg(Color::Black)
                    .bg(outcome_color(*outcome))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" {}  {start_time}", st::outcome_label(*outcome))),
        ]),
        Pick::CustomBet { .. } => Line::from(Span::styled(
            st::pick_text(&m.pick),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    };
    let lines = vec![
        Line::from(format!("{} vs {}", m.home_team, m.away_team)),
        pick_line,
        Line::from(Span::styled(
            format!("Confidence {}%", m.confidence),
            Style::default().fg(Color::Green),
        )),
        Line::from(Span::styled(
            format!("\"{}\"", m.reasoning),
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )),
    ];
    let card = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(format!("#{} {}", index + 1, m.league))
            .borders(Borders::ALL)
            .border_style(border),
    );
    frame.render_widget(card, area);
}

fn outcome_color(outcome: st::Outcome) -> Color {
    match outcome {
        st::Outcome::HomeWin => Color::Green,
        st::Outcome::Draw => Color::Yellow,
        st::Outcome::AwayWin => Color::Blue,
    }
}

fn sources_height(state: &AppState) -> u16 {
    if state.display_mode() != DisplayMode::Results || state.sources.is_empty() {
        return 0;
    }
    if state.sources_expanded {
        (state.sources.len() as u16).min(8) + 2
    } else {
        4
    }
}

fn render_sources(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = if state.sources_expanded {
        format!(
            "Grounding sources {}/{} - s collapse, PgUp/PgDn scroll",
            state.sources_scroll + 1,
            state.sources.len()
        )
    } else {
        format!("Grounding sources ({}) - s to expand", state.sources.len())
    };
    let text = if state.sources_expanded {
        state
            .sources
            .iter()
            .map(|s| format!("{}  <{}>", s.title, s.uri))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        state
            .sources
            .iter()
            .map(|s| s.title.as_str())
            .collect::<Vec<_>>()
            .join(" · ")
    };
    let mut panel = Paragraph::new(text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().title(title).borders(Borders::ALL));
    panel = if state.sources_expanded {
        panel.scroll((state.sources_scroll.min(u16::MAX as usize) as u16, 0))
    } else {
        panel.wrap(Wrap { trim: true })
    };
    frame.render_widget(panel, area);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "CUSTOMBET AI - Help",
        "",
        "  r            Refresh / retry",
        "  ← / h        Previous day",
        "  → / l        Next day",
        "  t            Today",
        "  / or d       Type a date (YYYY-MM-DD)",
        "  j/k or ↑/↓   Move between cards",
        "  s            Expand / collapse sources",
        "  PgUp/PgDn    Scroll sources ([ / ])",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
