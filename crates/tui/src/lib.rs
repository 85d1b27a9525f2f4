use std::cell::Cell;
use std::io::{self, Stdout};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use dbstudio_adapters::SystemClipboard;
use dbstudio_core::clipboard::{Clipboard, ClipboardError, MemoryClipboard, PasteOutcome, PasteTicket};
use dbstudio_core::context_menu::{
    apply_header_command, ContextMenuProvider, ExtensionRegistry, HeaderCommand,
    HeaderCommandOutcome, HeaderContext, MenuItem,
};
use dbstudio_core::dispatcher::{CommandDispatcher, GridAction};
use dbstudio_core::grid_state::{GridEvent, GridState};
use dbstudio_core::input::{GridInput, Key, KeyBindings, KeyInput, Modifiers};
use dbstudio_core::matrix::{CellAddress, ResultSet};
use dbstudio_core::viewport::{ScrollOffset, ViewportConfig};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use thiserror::Error;
use tracing::{debug, warn};

const TICK_RATE: Duration = Duration::from_millis(120);
const GUTTER_WIDTH: u16 = 7;
const CELL_WIDTH: u32 = 16;
const WHEEL_STEP: u64 = 3;
const COPY_COLUMN_NAME_KEY: &str = "copy-column-name";

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Everything the terminal front-end needs to show one result.
#[derive(Debug, Clone)]
pub struct GridSession {
    pub title: String,
    pub result: ResultSet,
    pub table_name: Option<String>,
    pub render_ahead: usize,
    pub bindings: KeyBindings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuMove {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Quit,
    ToggleHelp,
    OpenMenu,
    CloseMenu,
    MoveMenu(MenuMove),
    SelectMenuItem,
    DiscardChanges,
    EditChar(char),
    EditBackspace,
    Grid(GridInput),
    Wheel { down: bool },
}

#[derive(Debug)]
struct HeaderMenu {
    col: usize,
    items: Vec<MenuItem>,
    cursor: usize,
}

impl HeaderMenu {
    fn selectable(item: &MenuItem) -> bool {
        matches!(item, MenuItem::Action { disabled: false, .. })
    }

    fn step(&mut self, direction: MenuMove) {
        let len = self.items.len();
        if len == 0 {
            return;
        }
        for _ in 0..len {
            self.cursor = match direction {
                MenuMove::Up => (self.cursor + len - 1) % len,
                MenuMove::Down => (self.cursor + 1) % len,
            };
            if Self::selectable(&self.items[self.cursor]) {
                return;
            }
        }
    }
}

/// Offers "Copy column name" on every header.
struct ColumnNameProvider;

impl ContextMenuProvider for ColumnNameProvider {
    fn header_menu(&self, context: &HeaderContext<'_>) -> Vec<MenuItem> {
        vec![MenuItem::Action {
            key: COPY_COLUMN_NAME_KEY.to_string(),
            label: "Copy column name".to_string(),
            disabled: false,
            checked: false,
            command: HeaderCommand::Extension {
                key: COPY_COLUMN_NAME_KEY.to_string(),
                col: context.header.index(),
            },
        }]
    }
}

/// A header or body column placed on screen, relative to the grid body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnSlot {
    col: usize,
    x: u16,
    width: u16,
}

fn column_slots(state: &GridState, area_width: u16) -> Vec<ColumnSlot> {
    let viewport = state.viewport();
    let sticky = state.sticky_header();
    let mut slots = Vec::new();
    let mut sticky_width = 0_u64;

    if let Some(col) = sticky {
        let width = u16::try_from(viewport.column_width(col))
            .unwrap_or(u16::MAX)
            .min(area_width);
        slots.push(ColumnSlot { col, x: 0, width });
        sticky_width = u64::from(width);
    }

    let mut offset = 0_u64;
    for col in state.render_columns() {
        if Some(col) == sticky {
            continue;
        }
        let width = u64::from(viewport.column_width(col));
        let start = offset;
        offset += width;
        let Some(x) = (start + sticky_width).checked_sub(viewport.scroll().left) else {
            continue;
        };
        if x < sticky_width {
            continue;
        }
        if x >= u64::from(area_width) {
            break;
        }
        let visible = width.min(u64::from(area_width) - x);
        slots.push(ColumnSlot {
            col,
            x: u16::try_from(x).unwrap_or(u16::MAX),
            width: u16::try_from(visible).unwrap_or(u16::MAX),
        });
    }
    slots
}

fn screen_layout(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(4),
            Constraint::Length(4),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

fn grid_body(area: Rect) -> Rect {
    screen_layout(area)[1].inner(Margin::new(1, 1))
}

fn first_visible_row(state: &GridState) -> usize {
    usize::try_from(state.viewport().scroll().top).unwrap_or(usize::MAX)
}

fn to_modifiers(modifiers: KeyModifiers) -> Modifiers {
    Modifiers {
        shift: modifiers.contains(KeyModifiers::SHIFT),
        ctrl: modifiers.contains(KeyModifiers::CONTROL),
        alt: modifiers.contains(KeyModifiers::ALT),
        meta: modifiers.intersects(KeyModifiers::SUPER | KeyModifiers::META),
    }
}

fn grid_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Up => Some(Key::ArrowUp),
        KeyCode::Down => Some(Key::ArrowDown),
        KeyCode::Left => Some(Key::ArrowLeft),
        KeyCode::Right => Some(Key::ArrowRight),
        KeyCode::Tab => Some(Key::Tab),
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::Esc => Some(Key::Escape),
        KeyCode::Backspace => Some(Key::Backspace),
        KeyCode::Char(ch) => Some(Key::Char(ch)),
        _ => None,
    }
}

fn map_key_event(key: KeyEvent, editing: bool, menu_open: bool) -> Option<Msg> {
    if menu_open {
        return match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(Msg::MoveMenu(MenuMove::Up)),
            KeyCode::Down | KeyCode::Char('j') => Some(Msg::MoveMenu(MenuMove::Down)),
            KeyCode::Enter => Some(Msg::SelectMenuItem),
            KeyCode::Esc | KeyCode::Char('m') => Some(Msg::CloseMenu),
            _ => None,
        };
    }

    let modifiers = to_modifiers(key.modifiers);
    let command = modifiers.ctrl || modifiers.alt || modifiers.meta;
    if editing {
        return match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                grid_key(key.code).map(|key| Msg::Grid(GridInput::Key(KeyInput::new(key, modifiers))))
            }
            KeyCode::Backspace => Some(Msg::EditBackspace),
            KeyCode::Char(ch) if !command => Some(Msg::EditChar(ch)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char('q') if !command => Some(Msg::Quit),
        KeyCode::Char('?') if !command => Some(Msg::ToggleHelp),
        KeyCode::Char('m') if !command => Some(Msg::OpenMenu),
        KeyCode::Char('u') if !command => Some(Msg::DiscardChanges),
        KeyCode::BackTab => None,
        code => grid_key(code).map(|key| Msg::Grid(GridInput::Key(KeyInput::new(key, modifiers)))),
    }
}

struct TuiApp {
    title: String,
    state: GridState,
    dispatcher: CommandDispatcher,
    registry: ExtensionRegistry,
    clipboard: Arc<dyn Clipboard>,
    table_name: Option<String>,
    menu: Option<HeaderMenu>,
    show_help: bool,
    should_quit: bool,
    status_line: String,
    screen: Rect,
    dirty: Rc<Cell<bool>>,
    window: Rc<Cell<(usize, usize)>>,
    paste_tx: Sender<(PasteTicket, Result<String, ClipboardError>)>,
    paste_rx: Receiver<(PasteTicket, Result<String, ClipboardError>)>,
}

impl TuiApp {
    fn new(session: GridSession, clipboard: Arc<dyn Clipboard>) -> Self {
        let config = ViewportConfig {
            render_ahead: session.render_ahead,
            row_height: 1,
            header_height: 1,
            default_column_width: CELL_WIDTH,
        };
        let mut state = GridState::new(session.result, config);

        let dirty = Rc::new(Cell::new(true));
        let window = Rc::new(Cell::new((0, 0)));
        let (dirty_flag, watched) = (Rc::clone(&dirty), Rc::clone(&window));
        state.subscribe(move |event: &GridEvent| {
            let (start, end) = watched.get();
            if event.touches_rows(&(start..end)) {
                dirty_flag.set(true);
            }
        });
        if state.row_count() > 0 && state.header_count() > 0 {
            if let Err(error) = state.set_focus(0, 0) {
                debug!(%error, "initial focus unavailable");
            }
        }

        let mut registry = ExtensionRegistry::new();
        registry.register(ColumnNameProvider);
        let (paste_tx, paste_rx) = mpsc::channel();

        Self {
            title: session.title,
            state,
            dispatcher: CommandDispatcher::new(session.bindings),
            registry,
            clipboard,
            table_name: session.table_name,
            menu: None,
            show_help: false,
            should_quit: false,
            status_line: "Arrows move, Shift extends, Enter edits, m opens column menu, ? help"
                .to_string(),
            screen: Rect::default(),
            dirty,
            window,
            paste_tx,
            paste_rx,
        }
    }

    fn resize(&mut self, screen: Rect) {
        self.screen = screen;
        let body = grid_body(screen);
        self.state.set_viewport_size(
            u32::from(body.width.saturating_sub(GUTTER_WIDTH)),
            u32::from(body.height),
        );
        let window = self.state.visible_row_window();
        self.window.set((window.start, window.end));
        self.dirty.set(true);
    }

    fn needs_redraw(&self) -> bool {
        self.dirty.replace(false)
    }

    fn handle(&mut self, msg: Msg, runtime: &tokio::runtime::Runtime) {
        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::ToggleHelp => self.show_help = !self.show_help,
            Msg::OpenMenu => self.open_menu(),
            Msg::CloseMenu => self.menu = None,
            Msg::MoveMenu(direction) => {
                if let Some(menu) = &mut self.menu {
                    menu.step(direction);
                }
            }
            Msg::SelectMenuItem => self.select_menu_item(),
            Msg::DiscardChanges => {
                let restored = self.state.discard_changes();
                self.status_line = format!("Discarded {restored} pending change(s)");
            }
            Msg::EditChar(ch) => {
                if let Err(error) = self.state.update_staged_value(|staged| staged.push(ch)) {
                    debug!(%error, "typed character dropped");
                }
            }
            Msg::EditBackspace => {
                if let Err(error) = self.state.update_staged_value(|staged| {
                    staged.pop();
                }) {
                    debug!(%error, "backspace dropped");
                }
            }
            Msg::Grid(input) => self.dispatch(&input, runtime),
            Msg::Wheel { down } => self.wheel(down),
        }
        self.dirty.set(true);
    }

    fn dispatch(&mut self, input: &GridInput, runtime: &tokio::runtime::Runtime) {
        let dispatch = self
            .dispatcher
            .dispatch(&mut self.state, input, self.clipboard.as_ref());
        let window = self.state.visible_row_window();
        self.window.set((window.start, window.end));

        if let Some(ticket) = dispatch.pending_paste {
            let clipboard = Arc::clone(&self.clipboard);
            let sender = self.paste_tx.clone();
            runtime.spawn(async move {
                let read = clipboard.read_text().await;
                if sender.send((ticket, read)).is_err() {
                    warn!("paste result dropped: grid view closed");
                }
            });
            self.status_line = format!("Pasting into {}", ticket.target());
        }

        match dispatch.action {
            Some(GridAction::Copy) => self.status_line = "Copied selection".to_string(),
            Some(GridAction::CommitEdit) => self.status_line = "Cell updated".to_string(),
            Some(GridAction::CancelEdit) => self.status_line = "Edit cancelled".to_string(),
            Some(GridAction::CommitRejected { cell, expected }) => {
                self.status_line = format!("{cell}: value is not a valid {expected}; Esc to cancel");
            }
            _ => {}
        }
    }

    fn drain_pastes(&mut self) {
        while let Ok((ticket, read)) = self.paste_rx.try_recv() {
            self.dirty.set(true);
            self.status_line = match self.state.complete_paste(ticket, read) {
                PasteOutcome::Applied { cell, changed, .. } => {
                    if changed {
                        format!("Pasted into {cell}")
                    } else {
                        format!("{cell} already holds the clipboard value")
                    }
                }
                PasteOutcome::Stale { cell } => {
                    format!("Paste into {cell} dropped: selection moved")
                }
                PasteOutcome::TypeMismatch {
                    cell, expected, ..
                } => format!("Clipboard text is not a valid {expected} for {cell}"),
                PasteOutcome::ClipboardUnavailable => "Clipboard is unavailable".to_string(),
            };
        }
    }

    fn wheel(&mut self, down: bool) {
        let scroll = self.state.viewport().scroll();
        let (_, height) = self.state.viewport().viewport_size();
        let row_count = u64::try_from(self.state.row_count()).unwrap_or(u64::MAX);
        let max_top = row_count.saturating_sub(u64::from(height.saturating_sub(1)));
        let top = if down {
            (scroll.top + WHEEL_STEP).min(max_top)
        } else {
            scroll.top.saturating_sub(WHEEL_STEP)
        };
        self.state.set_scroll(ScrollOffset { top, ..scroll });
        let window = self.state.visible_row_window();
        self.window.set((window.start, window.end));
    }

    fn menu_column(&self) -> Option<usize> {
        self.state
            .focus()
            .map(|focus| focus.col)
            .or_else(|| self.state.selected_col_indices().first().copied())
    }

    fn open_menu(&mut self) {
        let Some(col) = self.menu_column() else {
            self.status_line = "Focus a column first".to_string();
            return;
        };
        match self
            .registry
            .header_menu(&self.state, col, self.table_name.as_deref())
        {
            Ok(items) => {
                let cursor = items.iter().position(HeaderMenu::selectable).unwrap_or(0);
                self.menu = Some(HeaderMenu { col, items, cursor });
            }
            Err(error) => warn!(%error, "header menu unavailable"),
        }
    }

    fn select_menu_item(&mut self) {
        let Some(menu) = &self.menu else {
            return;
        };
        let col = menu.col;
        let command = match menu.items.get(menu.cursor) {
            Some(MenuItem::Action {
                command,
                disabled: false,
                ..
            }) => command.clone(),
            _ => return,
        };
        self.menu = None;

        self.status_line = match apply_header_command(&mut self.state, &command) {
            Ok(HeaderCommandOutcome::PinChanged(Some(col))) => {
                format!("Pinned {}", self.header_label(col))
            }
            Ok(HeaderCommandOutcome::PinChanged(None)) => "Header unpinned".to_string(),
            Ok(HeaderCommandOutcome::SortRequested(options)) => {
                let order = options
                    .iter()
                    .map(|option| format!("{} {:?}", option.column_name, option.by))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Sort requested: {order}")
            }
            Ok(HeaderCommandOutcome::Extension { key, col }) if key == COPY_COLUMN_NAME_KEY => {
                let name = self.header_label(col);
                match self.clipboard.write_text(&name) {
                    Ok(()) => format!("Copied column name {name}"),
                    Err(error) => error.to_string(),
                }
            }
            Ok(HeaderCommandOutcome::Extension { key, .. }) => format!("No handler for {key}"),
            Err(error) => error.to_string(),
        };
        debug!(col, "header menu item applied");
    }

    fn header_label(&self, col: usize) -> String {
        self.state
            .matrix()
            .header(col)
            .map(|header| header.display.text.clone())
            .unwrap_or_default()
    }

    fn mouse(&mut self, mouse: MouseEvent, runtime: &tokio::runtime::Runtime) {
        match mouse.kind {
            MouseEventKind::ScrollDown => self.handle(Msg::Wheel { down: true }, runtime),
            MouseEventKind::ScrollUp => self.handle(Msg::Wheel { down: false }, runtime),
            MouseEventKind::Down(MouseButton::Left) => {
                if self.menu.is_some() {
                    self.menu = None;
                    return;
                }
                if let Some(input) = self.hit_test(mouse.column, mouse.row, to_modifiers(mouse.modifiers)) {
                    self.handle(Msg::Grid(input), runtime);
                }
            }
            _ => {}
        }
    }

    fn hit_test(&self, x: u16, y: u16, modifiers: Modifiers) -> Option<GridInput> {
        let body = grid_body(self.screen);
        if x < body.x + GUTTER_WIDTH || y < body.y || x >= body.right() || y >= body.bottom() {
            return None;
        }
        let relative_x = x - body.x - GUTTER_WIDTH;
        let slot = column_slots(&self.state, body.width.saturating_sub(GUTTER_WIDTH))
            .into_iter()
            .find(|slot| (slot.x..slot.x + slot.width).contains(&relative_x))?;

        if y == body.y {
            return Some(GridInput::HeaderMouseDown {
                col: slot.col,
                modifiers,
            });
        }
        let row = first_visible_row(&self.state) + usize::from(y - body.y - 1);
        (row < self.state.row_count()).then_some(GridInput::CellMouseDown {
            row,
            col: slot.col,
            modifiers,
        })
    }
}

pub fn run(session: GridSession) -> Result<(), TuiError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("dbstudio-clipboard")
        .build()?;
    let clipboard: Arc<dyn Clipboard> = if SystemClipboard::is_available() {
        Arc::new(SystemClipboard::new())
    } else {
        warn!("system clipboard unavailable; using in-process clipboard");
        Arc::new(MemoryClipboard::new())
    };

    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, TuiApp::new(session, clipboard), &runtime);
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

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: TuiApp,
    runtime: &tokio::runtime::Runtime,
) -> Result<(), TuiError> {
    let mut last_tick = Instant::now();

    loop {
        let size = terminal.size()?;
        let screen = Rect::new(0, 0, size.width, size.height);
        if screen != app.screen {
            app.resize(screen);
        }
        if app.needs_redraw() {
            terminal.draw(|frame| render(frame, &app))?;
        }

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    let editing = app.state.is_in_edit_mode();
                    if let Some(message) = map_key_event(key, editing, app.menu.is_some()) {
                        app.handle(message, runtime);
                    }
                }
                Event::Mouse(mouse) => app.mouse(mouse, runtime),
                Event::Resize(width, height) => app.resize(Rect::new(0, 0, width, height)),
                _ => {}
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.drain_pastes();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn fit(text: &str, width: u16) -> String {
    let width = usize::from(width);
    if width == 0 {
        return String::new();
    }
    let mut fitted = text
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .take(width - 1)
        .collect::<String>();
    let len = fitted.chars().count();
    fitted.extend(std::iter::repeat(' ').take(width - len));
    fitted
}

fn header_line(app: &TuiApp, slots: &[ColumnSlot]) -> Line<'static> {
    let touched = app.state.touched_col_indices();
    let mut spans = vec![Span::raw(fit("#", GUTTER_WIDTH))];
    let mut cursor = 0_u16;
    for slot in slots {
        if slot.x > cursor {
            spans.push(Span::raw(" ".repeat(usize::from(slot.x - cursor))));
        }
        let Some(header) = app.state.matrix().header(slot.col) else {
            continue;
        };
        let pin = if app.state.sticky_header() == Some(slot.col) {
            "^"
        } else {
            ""
        };
        let style = if app.state.is_full_selection_col(slot.col) {
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD)
        } else if touched.contains(&slot.col) {
            Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        spans.push(Span::styled(
            fit(&format!("{pin}{}", header.display.text), slot.width),
            style,
        ));
        cursor = slot.x + slot.width;
    }
    Line::from(spans)
}

fn row_line(app: &TuiApp, slots: &[ColumnSlot], row: usize) -> Line<'static> {
    let focus = app.state.focus();
    let editing = app.state.editing_cell();
    let mut spans = vec![Span::styled(
        fit(&(row + 1).to_string(), GUTTER_WIDTH),
        Style::default().fg(Color::DarkGray),
    )];
    let mut cursor = 0_u16;
    for slot in slots {
        if slot.x > cursor {
            spans.push(Span::raw(" ".repeat(usize::from(slot.x - cursor))));
        }
        let cell = CellAddress::new(row, slot.col);
        let text = if editing == Some(cell) {
            app.state.staged_value().unwrap_or_default().to_string()
        } else {
            app.state
                .value(row, slot.col)
                .map(|value| value.to_clipboard_text())
                .unwrap_or_default()
        };

        let mut style = Style::default();
        if app.state.matrix().original_value(cell).is_some() {
            style = style.fg(Color::Yellow);
        }
        if app.state.is_selected(row, slot.col) {
            style = style.bg(Color::DarkGray);
        }
        if focus == Some(cell) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        if editing == Some(cell) {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        spans.push(Span::styled(fit(&text, slot.width), style));
        cursor = slot.x + slot.width;
    }
    Line::from(spans)
}

fn render(frame: &mut Frame<'_>, app: &TuiApp) {
    let [title_area, grid_area, footer_area] = screen_layout(frame.area());

    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", app.title),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " {} rows x {} columns",
            app.state.row_count(),
            app.state.header_count()
        )),
        Span::raw(if app.state.matrix().has_changes() {
            " | unsaved changes (u to discard)"
        } else {
            ""
        }),
    ]);
    frame.render_widget(Paragraph::new(title), title_area);

    let body = grid_area.inner(Margin::new(1, 1));
    let slots = column_slots(&app.state, body.width.saturating_sub(GUTTER_WIDTH));
    let first_row = first_visible_row(&app.state);
    let body_rows = usize::from(body.height.saturating_sub(1));
    let last_row = first_row.saturating_add(body_rows).min(app.state.row_count());

    let mut lines = vec![header_line(app, &slots)];
    lines.extend((first_row..last_row).map(|row| row_line(app, &slots, row)));
    if app.state.row_count() == 0 {
        lines.push(Line::from("No rows"));
    }
    let grid = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Result"));
    frame.render_widget(grid, grid_area);

    let editor = match (app.state.editing_cell(), app.state.staged_value()) {
        (Some(cell), Some(staged)) => format!("Edit {cell}: {staged}_  (Enter commits, Esc cancels)"),
        _ => match app.state.focus() {
            Some(cell) => format!(
                "{cell}: {}",
                app.state
                    .value(cell.row, cell.col)
                    .map(|value| value.to_clipboard_text())
                    .unwrap_or_default()
            ),
            None => "No cell focused".to_string(),
        },
    };
    let footer = Paragraph::new(vec![
        Line::from(editor),
        Line::from(format!("Status: {}", app.status_line)),
    ])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, footer_area);

    if let Some(menu) = &app.menu {
        render_menu(frame, app, menu);
    }
    if app.show_help {
        render_help_popup(frame);
    }
}

fn render_menu(frame: &mut Frame<'_>, app: &TuiApp, menu: &HeaderMenu) {
    let lines = menu
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let marker = if index == menu.cursor { ">" } else { " " };
            match item {
                MenuItem::Separator => Line::from("  ────────────"),
                MenuItem::Custom { key, payload } => Line::from(format!("{marker} {key}: {payload}")),
                MenuItem::Action {
                    label,
                    disabled,
                    checked,
                    ..
                } => {
                    let check = if *checked { "[x] " } else { "" };
                    let style = if *disabled {
                        Style::default().fg(Color::DarkGray)
                    } else {
                        Style::default()
                    };
                    Line::from(Span::styled(format!("{marker} {check}{label}"), style))
                }
            }
        })
        .collect::<Vec<_>>();

    let height = u16::try_from(lines.len() + 2).unwrap_or(u16::MAX);
    let area = centered_rect(40, height, frame.area());
    frame.render_widget(Clear, area);
    let title = format!("Column {}", app.header_label(menu.col));
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(60, 14, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Grid keymap"),
        Line::from("q: quit    ?: toggle help"),
        Line::from("Arrows: move focus    Shift+Arrows: extend selection"),
        Line::from("Tab: next cell    Enter: edit / commit    Esc: cancel edit"),
        Line::from("Ctrl+C / Ctrl+V: copy / paste"),
        Line::from("m: column menu (pin, sort)    u: discard changes"),
        Line::from("Click header: select column (Shift extends, Ctrl adds)"),
        Line::from("Click cell: focus (Shift extends, Ctrl adds)"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height.min(area.height)),
            Constraint::Fill(1),
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
