use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, execute, terminal};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Span, Spans, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use std::error::Error;
use std::io;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

use crate::tsd_board::{Board, Tile, TileKind};
use crate::tsd_color::{clue_color, Themed};
use crate::tsd_game::{Difficulty, GameSession, Screen};

/// Terminal columns taken by one tile; a tile is one row high
const TILE_COLS: u16 = 2;

const MIN_WIDTH: u16 = 64;
const MIN_HEIGHT: u16 = 24;

/// Something a clickable button does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Choose(Difficulty),
    Restart,
    Menu,
}

#[derive(Debug, Default)]
struct UiState {
    cursor: (usize, usize),
    // top-left terminal cell of tile (0, 0), set while a board is drawn
    board_origin: Option<(u16, u16)>,
    // buttons drawn in the last frame
    buttons: Vec<(Rect, Action)>,
    hover: Option<Action>,
    exit_requested: bool,
}

impl UiState {
    fn button_at(&self, column: u16, row: u16) -> Option<Action> {
        self.buttons
            .iter()
            .find(|(r, _)| contains(*r, column, row))
            .map(|(_, a)| *a)
    }

    /// Tile under the mouse, if a board is on screen
    fn tile_under(&self, session: &GameSession, column: u16, row: u16) -> Option<(usize, usize)> {
        let board = session.board()?;
        tile_at(self.board_origin?, (board.width(), board.height()), column, row)
    }

    fn recentre(&mut self, session: &GameSession) {
        if let Some(board) = session.board() {
            self.cursor = (board.width() / 2, board.height() / 2);
        }
    }
}

struct Glyphs {
    hidden: &'static str,
    mine: &'static str,
    flag: &'static str,
    wrong: &'static str,
}

fn glyphs(ascii: bool) -> Glyphs {
    if ascii {
        Glyphs { hidden: "#", mine: "*", flag: "F", wrong: "x" }
    } else {
        Glyphs { hidden: "■", mine: "☼", flag: "⚑", wrong: "✗" }
    }
}

/// Convert a terminal cell to board coordinates by floor-dividing its offset
/// from the board origin by the tile size
fn tile_at(origin: (u16, u16), dims: (usize, usize), column: u16, row: u16) -> Option<(usize, usize)> {
    let dx = column.checked_sub(origin.0)?;
    let dy = row.checked_sub(origin.1)?;
    let (x, y) = ((dx / TILE_COLS) as usize, dy as usize);
    (x < dims.0 && y < dims.1).then_some((x, y))
}

fn contains(r: Rect, column: u16, row: u16) -> bool {
    column >= r.x && column < r.x + r.width && row >= r.y && row < r.y + r.height
}

pub fn run(session: &mut GameSession) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnableMouseCapture, terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, session);

    let restored = restore(disable_raw_mode(), terminal.backend_mut());
    result?;
    restored?;
    Ok(())
}

/// Leave the alternate screen and show the cursor even when leaving raw mode
/// failed; the first failure is returned
fn restore<W: io::Write>(raw_mode: io::Result<()>, out: &mut W) -> io::Result<()> {
    let screen = execute!(out, DisableMouseCapture, terminal::LeaveAlternateScreen);
    let shown = execute!(out, cursor::Show);
    raw_mode.and(screen).and(shown)
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, session: &mut GameSession) -> Result<(), Box<dyn Error>> {
    let mut ui = UiState::default();
    let tick_rate = Duration::from_millis(200);

    while !ui.exit_requested {
        terminal.draw(|f| draw(f, session, &mut ui))?;
        if event::poll(tick_rate)? {
            match event::read()? {
                // Windows reports releases too
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(key, session, &mut ui)?,
                Event::Mouse(me) => handle_mouse(me, session, &mut ui)?,
                _ => {}
            }
        }
    }
    log::info!("exit requested");
    Ok(())
}

fn perform(action: Action, session: &mut GameSession, ui: &mut UiState) -> Result<(), Box<dyn Error>> {
    match action {
        Action::Choose(d) => session.choose(d)?,
        Action::Restart => session.restart()?,
        Action::Menu => session.to_menu(),
    }
    ui.hover = None;
    ui.recentre(session);
    Ok(())
}

fn handle_key(key: KeyEvent, session: &mut GameSession, ui: &mut UiState) -> Result<(), Box<dyn Error>> {
    let quit = matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q'))
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL));
    if quit {
        ui.exit_requested = true;
        return Ok(());
    }
    match session.screen() {
        Screen::Menu => {
            let choice = match key.code {
                KeyCode::Char('1') | KeyCode::Char('e') | KeyCode::Char('E') => Some(Difficulty::Easy),
                KeyCode::Char('2') | KeyCode::Char('m') | KeyCode::Char('M') => Some(Difficulty::Medium),
                KeyCode::Char('3') | KeyCode::Char('h') | KeyCode::Char('H') => Some(Difficulty::Hard),
                KeyCode::Enter => Some(session.config().difficulty.unwrap_or(Difficulty::Easy)),
                _ => None,
            };
            if let Some(d) = choice {
                perform(Action::Choose(d), session, ui)?;
            }
        }
        Screen::Playing => {
            let Some(board) = session.board() else {
                return Ok(());
            };
            let (w, h) = (board.width(), board.height());
            let (cx, cy) = ui.cursor;
            match key.code {
                KeyCode::Left => ui.cursor.0 = cx.saturating_sub(1),
                KeyCode::Right => ui.cursor.0 = (cx + 1).min(w - 1),
                KeyCode::Up => ui.cursor.1 = cy.saturating_sub(1),
                KeyCode::Down => ui.cursor.1 = (cy + 1).min(h - 1),
                KeyCode::Char(' ') | KeyCode::Enter => session.dig(cx, cy)?,
                KeyCode::Char('f') | KeyCode::Char('F') => session.toggle_flag(cx, cy)?,
                _ => {}
            }
        }
        Screen::Win | Screen::Lose => match key.code {
            KeyCode::Char('r') | KeyCode::Char('R') | KeyCode::Enter => perform(Action::Restart, session, ui)?,
            KeyCode::Char('m') | KeyCode::Char('M') => perform(Action::Menu, session, ui)?,
            _ => {}
        },
    }
    Ok(())
}

fn handle_mouse(me: MouseEvent, session: &mut GameSession, ui: &mut UiState) -> Result<(), Box<dyn Error>> {
    let (column, row) = (me.column, me.row);
    match me.kind {
        MouseEventKind::Moved => {
            ui.hover = ui.button_at(column, row);
            if session.screen() == Screen::Playing {
                if let Some(pos) = ui.tile_under(session, column, row) {
                    ui.cursor = pos;
                }
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(action) = ui.button_at(column, row) {
                return perform(action, session, ui);
            }
            if session.screen() == Screen::Playing {
                if let Some((x, y)) = ui.tile_under(session, column, row) {
                    ui.cursor = (x, y);
                    session.dig(x, y)?;
                }
            }
        }
        MouseEventKind::Down(MouseButton::Right) => {
            if session.screen() == Screen::Playing {
                if let Some((x, y)) = ui.tile_under(session, column, row) {
                    ui.cursor = (x, y);
                    session.toggle_flag(x, y)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn draw<B: Backend>(f: &mut Frame<B>, session: &GameSession, ui: &mut UiState) {
    let size = f.size();
    ui.buttons.clear();
    ui.board_origin = None;

    let (need_w, need_h) = match session.board() {
        Some(b) => (
            MIN_WIDTH.max(b.width() as u16 * TILE_COLS + 3),
            MIN_HEIGHT.max(b.height() as u16 + 8),
        ),
        None => (MIN_WIDTH, MIN_HEIGHT),
    };
    if size.width < need_w || size.height < need_h {
        let warn_lines = vec![
            Spans::from(Span::raw("Terminal size too small.")),
            Spans::from(Span::raw(format!("Minimum required: {} x {}", need_w, need_h))),
        ];
        let warn = Paragraph::new(Text::from(warn_lines))
            .block(Block::default().borders(Borders::ALL).title("Resize Terminal"))
            .alignment(Alignment::Center);
        f.render_widget(Clear, size);
        let area = center_rect(40u16.min(size.width), 4u16.min(size.height), size);
        f.render_widget(warn, area);
        return;
    }

    // layout: status row, body, bottom bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(6), Constraint::Length(3)].as_ref())
        .split(size);

    draw_status(f, session, chunks[0]);

    match session.screen() {
        Screen::Menu => {
            draw_menu(f, session, ui, chunks[1]);
            draw_hints(f, " 1/2/3 or click: choose difficulty", chunks[2]);
        }
        Screen::Playing => {
            if let Some(board) = session.board() {
                draw_board(f, session, board, ui, chunks[1]);
            }
            draw_hints(f, " L-Click | Space: dig   R-Click | F: flag   Arrows: move", chunks[2]);
        }
        Screen::Win | Screen::Lose => {
            if let Some(board) = session.board() {
                draw_board(f, session, board, ui, chunks[1]);
            }
            draw_result(f, session.screen() == Screen::Win, ui, chunks[2]);
        }
    }
}

fn draw_status<B: Backend>(f: &mut Frame<B>, session: &GameSession, area: Rect) {
    let left = match (session.screen(), session.board()) {
        (Screen::Menu, _) | (_, None) => " Minesweeper".to_string(),
        (_, Some(board)) => format!(
            " {}   Mines: {}/{}",
            session.mode().map_or("Hard", |d| d.name()),
            board.remaining_mines(),
            board.mine_count()
        ),
    };
    let right = "Esc: Exit ";
    let inner_w = area.width.saturating_sub(2) as usize;
    let gap = inner_w.saturating_sub(left.as_str().width() + right.width()).max(1);
    let spans = Spans::from(vec![
        Span::raw(left),
        Span::raw(" ".repeat(gap)),
        Span::styled("Esc", Style::default().fg(Color::Yellow.themed()).add_modifier(Modifier::BOLD)),
        Span::raw(": Exit "),
    ]);
    let status = Paragraph::new(spans).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn draw_hints<B: Backend>(f: &mut Frame<B>, text: &str, area: Rect) {
    let hints = Paragraph::new(text.to_string()).block(Block::default().borders(Borders::ALL));
    f.render_widget(hints, area);
}

fn draw_button<B: Backend>(f: &mut Frame<B>, ui: &mut UiState, label: &str, bg: Color, action: Action, area: Rect) {
    let mut style = Style::default().bg(bg).fg(Color::White.themed());
    if ui.hover == Some(action) {
        style = style.fg(Color::Yellow.themed()).add_modifier(Modifier::BOLD);
    }
    let button = Paragraph::new(label.to_string())
        .style(style)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(button, area);
    ui.buttons.push((area, action));
}

fn draw_menu<B: Backend>(f: &mut Frame<B>, session: &GameSession, ui: &mut UiState, area: Rect) {
    let title = Paragraph::new(Span::styled(
        "MINESWEEPER",
        Style::default().fg(Color::White.themed()).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center);
    f.render_widget(title, Rect::new(area.x, area.y + area.height / 6, area.width, 1));

    let entries = [
        (Difficulty::Easy, Color::Green),
        (Difficulty::Medium, Color::Yellow),
        (Difficulty::Hard, Color::Red),
    ];
    for (i, (d, bg)) in entries.into_iter().enumerate() {
        // rows at 1/3, 1/2 and 2/3 of the body
        let centre = area.y + area.height * (i as u16 + 2) / 6;
        let rect = Rect::new(area.x, centre.saturating_sub(1), area.width, 3);
        let label = if session.config().difficulty == Some(d) {
            format!("▸ {}", d.name())
        } else {
            d.name().to_string()
        };
        draw_button(f, ui, &label, bg.themed(), Action::Choose(d), center_rect(20, 3, rect));
    }
}

fn draw_result<B: Backend>(f: &mut Frame<B>, won: bool, ui: &mut UiState, area: Rect) {
    let parts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(13), Constraint::Length(15)].as_ref())
        .split(area);
    let (text, bg) = if won {
        ("YOU WIN!", Color::Green.themed())
    } else {
        ("GAME OVER", Color::Red.themed())
    };
    let message = Paragraph::new(Span::styled(
        text,
        Style::default().fg(Color::White.themed()).add_modifier(Modifier::BOLD),
    ))
    .style(Style::default().bg(bg))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(message, parts[0]);
    draw_button(f, ui, "Restart", bg, Action::Restart, parts[1]);
    draw_button(f, ui, "Main Menu", Color::DarkGray.themed(), Action::Menu, parts[2]);
}

fn draw_board<B: Backend>(f: &mut Frame<B>, session: &GameSession, board: &Board, ui: &mut UiState, area: Rect) {
    let g = glyphs(session.config().ascii_icons);
    let playing = session.screen() == Screen::Playing;
    // one padding column on the right so the last tile has the same margin as the first
    let board_area = center_rect(board.width() as u16 * TILE_COLS + 3, board.height() as u16 + 2, area);
    ui.board_origin = Some((board_area.x + 1, board_area.y + 1));

    let hidden_bg = Color::DarkGray.themed();
    let lines: Vec<Spans> = (0..board.height())
        .map(|y| {
            let mut spans: Vec<Span> = board
                .row(y)
                .map(|tile| {
                    let mut span = tile_span(tile, &g, board.exploded() == Some(tile.position()));
                    if playing && ui.cursor == tile.position() {
                        span.style = span.style.bg(Color::LightBlue.themed());
                    }
                    span
                })
                .collect();
            spans.push(Span::styled(" ", Style::default().bg(hidden_bg)));
            Spans::from(spans)
        })
        .collect();

    let title = session.mode().map_or("Hard", |d| d.name());
    let paragraph = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_alignment(Alignment::Center),
        )
        .alignment(Alignment::Left);
    f.render_widget(paragraph, board_area);
}

fn tile_span(tile: &Tile, g: &Glyphs, exploded: bool) -> Span<'static> {
    let hidden = Style::default().bg(Color::DarkGray.themed()).fg(Color::Gray.themed());
    let open = Style::default().bg(Color::Gray.themed());
    let (glyph, style) = if tile.revealed() {
        match tile.kind() {
            TileKind::Mine if exploded => (g.mine.to_string(), open.bg(Color::Red.themed()).fg(Color::Black.themed())),
            TileKind::Mine => (g.mine.to_string(), open.fg(Color::Black.themed())),
            _ if tile.misflagged() => (g.wrong.to_string(), open.fg(Color::Red.themed()).add_modifier(Modifier::BOLD)),
            TileKind::Clue(n) => (n.to_string(), open.fg(clue_color(n)).add_modifier(Modifier::BOLD)),
            TileKind::Empty => (" ".to_string(), open),
        }
    } else if tile.flagged() {
        (g.flag.to_string(), hidden.fg(Color::Red.themed()))
    } else {
        (g.hidden.to_string(), hidden)
    };
    Span::styled(format!(" {}", glyph), style)
}

fn center_rect(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
