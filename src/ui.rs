use anyhow::Result;
use club_roster::{LedgerSummary, PlayerRecord};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

const PAGE_JUMP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Standings,
    Ledger,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Standings => Page::Ledger,
            Page::Ledger => Page::Standings,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Standings => "Standings",
            Page::Ledger => "Ledger",
        }
    }
}

pub struct App {
    /// Already in display order
    pub players: Vec<PlayerRecord>,
    pub summary: LedgerSummary,
    pub state: TableState,
    pub ledger_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
}

impl App {
    pub fn new(players: Vec<PlayerRecord>, summary: LedgerSummary) -> Self {
        let mut state = TableState::default();
        if !players.is_empty() {
            state.select(Some(0));
        }

        let mut ledger_state = TableState::default();
        if !summary.contributions.is_empty() || !summary.expenses.is_empty() {
            ledger_state.select(Some(0));
        }

        Self {
            players,
            summary,
            state,
            ledger_state,
            current_page: Page::Standings,
            show_detail: false,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn selected_player(&self) -> Option<&PlayerRecord> {
        self.state.selected().and_then(|i| self.players.get(i))
    }

    fn ledger_len(&self) -> usize {
        self.summary.contributions.len() + self.summary.expenses.len()
    }

    fn active(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Standings => {
                let len = self.players.len();
                (&mut self.state, len)
            }
            Page::Ledger => {
                let len = self.ledger_len();
                (&mut self.ledger_state, len)
            }
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| (i + PAGE_JUMP).min(len - 1));
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| i.saturating_sub(PAGE_JUMP));
        state.select(Some(i));
    }

    pub fn first(&mut self) {
        let (state, len) = self.active();
        if len > 0 {
            state.select(Some(0));
        }
    }

    pub fn last(&mut self) {
        let (state, len) = self.active();
        if len > 0 {
            state.select(Some(len - 1));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Standings if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            render_standings(f, content_chunks[0], app);
            render_detail_panel(f, content_chunks[1], app);
        }
        Page::Standings => render_standings(f, chunks[1], app),
        Page::Ledger => render_ledger(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Standings, Page::Ledger].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Players: {}", app.players.len()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Balance: {}", app.summary.balance),
        Style::default().fg(if app.summary.balance.cents() < 0 {
            Color::Red
        } else {
            Color::Green
        }),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn render_standings(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.players.iter().enumerate().map(|(rank, p)| {
        let color = match p.points() {
            pts if pts < 0 => Color::Red,
            0 => Color::White,
            _ => Color::Green,
        };

        Row::new(vec![
            Cell::from(format!("{}", rank + 1)),
            Cell::from(truncate(p.name(), 28)),
            Cell::from(p.appearances().to_string()),
            Cell::from(p.goals_scored().to_string()),
            Cell::from(p.points().to_string()).style(Style::default().fg(color)),
            Cell::from(p.contribution().to_string()),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(30),
            Constraint::Length(13),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Length(14),
        ],
    )
    .header(header_row(&["#", "Player", "Appearances", "Goals Scored", "Points", "Contribution"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Standings "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_ledger(f: &mut Frame, area: Rect, app: &mut App) {
    let contributions = app.summary.contributions.iter().map(|c| {
        Row::new(vec![
            Cell::from(c.recorded_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::from(truncate(&c.player_name, 28)),
            Cell::from(c.amount.to_string()).style(Style::default().fg(Color::Green)),
        ])
    });
    let expenses = app.summary.expenses.iter().map(|e| {
        Row::new(vec![
            Cell::from(e.recorded_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::from(truncate(&e.description, 28)),
            Cell::from(format!("-{}", e.amount)).style(Style::default().fg(Color::Red)),
        ])
    });

    let title = format!(
        " Ledger - in {} / out {} / balance {} ",
        app.summary.total_contributions, app.summary.total_expenses, app.summary.balance
    );

    let table = Table::new(
        contributions.chain(expenses),
        [Constraint::Length(18), Constraint::Length(30), Constraint::Length(14)],
    )
    .header(header_row(&["Recorded", "Player / Expense", "Amount"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.ledger_state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Player Details ");

    let Some(p) = app.selected_player() else {
        f.render_widget(Paragraph::new("No player selected").block(block), area);
        return;
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("  {}: ", name), label), Span::raw(value)])
    };

    let content = vec![
        Line::from(""),
        field("Player", p.name().to_string()),
        Line::from(""),
        field("Appearances", p.appearances().to_string()),
        field("Goals Scored", p.goals_scored().to_string()),
        field("Points", p.points().to_string()),
        field("Contribution", p.contribution().to_string()),
        Line::from(""),
        field("Registered", p.registered_at().format("%Y-%m-%d").to_string()),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  Press Enter to close",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )]),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (selected, total) = match app.current_page {
        Page::Standings => (app.state.selected(), app.players.len()),
        Page::Ledger => (app.ledger_state.selected(), app.ledger_len()),
    };

    let key = Style::default().fg(Color::Yellow);
    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected.map(|i| i + 1).unwrap_or(0), total),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Enter", key),
        Span::raw(" Details | "),
        Span::styled("Tab", key),
        Span::raw(" Page | "),
        Span::styled("↑/↓", key),
        Span::raw(" Nav | "),
        Span::styled("PgUp/PgDn", key),
        Span::raw(" Fast | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
