use tracing::{trace, warn};

use crate::clipboard::{Clipboard, PasteTicket};
use crate::error::GridError;
use crate::grid_state::GridState;
use crate::input::{GridInput, Key, KeyBindings, KeyInput, Modifiers};
use crate::matrix::{CellAddress, ColumnType};
use crate::viewport::{HorizontalEdge, VerticalEdge};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::ArrowUp => Some(Self::Up),
            Key::ArrowDown => Some(Self::Down),
            Key::ArrowLeft => Some(Self::Left),
            Key::ArrowRight => Some(Self::Right),
            _ => None,
        }
    }

    /// One step from `from`, clamped to `rows` and walking `columns` in
    /// render order. A cell outside `columns` steps onto the first column.
    fn step(self, from: CellAddress, rows: usize, columns: &[usize]) -> CellAddress {
        let last_row = rows.saturating_sub(1);
        let last_index = columns.len().saturating_sub(1);
        let position = columns.iter().position(|col| *col == from.col);
        let column_at = |index: usize| columns.get(index).copied().unwrap_or(from.col);
        match self {
            Self::Up => CellAddress::new(from.row.saturating_sub(1), from.col),
            Self::Down => CellAddress::new((from.row + 1).min(last_row), from.col),
            Self::Left => CellAddress::new(
                from.row,
                column_at(position.map_or(0, |index| index.saturating_sub(1))),
            ),
            Self::Right => CellAddress::new(
                from.row,
                column_at(position.map_or(0, |index| (index + 1).min(last_index))),
            ),
        }
    }

    fn edges(self) -> (HorizontalEdge, VerticalEdge) {
        match self {
            Self::Right => (HorizontalEdge::Right, VerticalEdge::Top),
            Self::Left | Self::Up => (HorizontalEdge::Left, VerticalEdge::Top),
            Self::Down => (HorizontalEdge::Left, VerticalEdge::Bottom),
        }
    }
}

/// What the dispatcher did with an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridAction {
    MoveFocus(Direction),
    ExtendSelection(Direction),
    NextCell,
    EnterEditMode,
    CommitEdit,
    /// The staged text does not fit the column; the edit stays open.
    CommitRejected {
        cell: CellAddress,
        expected: ColumnType,
    },
    CancelEdit,
    Copy,
    Paste,
    SelectColumn(usize),
    ExtendColumns { from: usize, to: usize },
    AddColumn(usize),
    FocusCell(CellAddress),
    ExtendCells(CellAddress),
    AddCell(CellAddress),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatch {
    pub action: Option<GridAction>,
    /// The host should suppress its default handling of the event.
    pub prevent_default: bool,
    /// A paste that waits for the clipboard read. Resolve it with
    /// [`GridState::complete_paste`].
    pub pending_paste: Option<PasteTicket>,
}

impl Dispatch {
    fn ignored() -> Self {
        Self::default()
    }

    fn handled(action: GridAction) -> Self {
        Self {
            action: Some(action),
            prevent_default: true,
            pending_paste: None,
        }
    }

    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.action.is_some()
    }
}

/// Maps raw key and mouse input onto grid operations.
#[derive(Debug, Clone, Default)]
pub struct CommandDispatcher {
    bindings: KeyBindings,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    #[must_use]
    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Applies one input. Failures are logged and the input is treated as
    /// unhandled; nothing here propagates into the host's event loop.
    pub fn dispatch(
        &self,
        state: &mut GridState,
        input: &GridInput,
        clipboard: &dyn Clipboard,
    ) -> Dispatch {
        let result = match input {
            GridInput::Key(key) => self.dispatch_key(state, key, clipboard),
            GridInput::HeaderMouseDown { col, modifiers } => {
                header_mouse_down(state, *col, *modifiers)
            }
            GridInput::CellMouseDown {
                row,
                col,
                modifiers,
            } => cell_mouse_down(state, CellAddress::new(*row, *col), *modifiers),
        };

        match result {
            Ok(dispatch) => {
                trace!(?input, action = ?dispatch.action, "grid input dispatched");
                dispatch
            }
            Err(error) => {
                warn!(?input, %error, "grid input ignored");
                Dispatch::ignored()
            }
        }
    }

    fn dispatch_key(
        &self,
        state: &mut GridState,
        input: &KeyInput,
        clipboard: &dyn Clipboard,
    ) -> Result<Dispatch, GridError> {
        if state.is_in_edit_mode() {
            return edit_mode_key(state, input);
        }

        if self.bindings.is_copy(input) {
            if let Some(text) = state.copy_text() {
                if let Err(error) = clipboard.write_text(&text) {
                    warn!(%error, "copy skipped");
                }
            }
            return Ok(Dispatch::handled(GridAction::Copy));
        }

        if self.bindings.is_paste(input) {
            return Ok(Dispatch {
                pending_paste: state.begin_paste(),
                ..Dispatch::handled(GridAction::Paste)
            });
        }

        if let Some(direction) = Direction::from_key(input.key) {
            return if input.modifiers.shift {
                extend_selection(state, direction)
            } else {
                move_focus(state, direction)
            };
        }

        match input.key {
            Key::Tab => next_cell(state),
            Key::Enter => {
                if state.enter_edit_mode()? {
                    Ok(Dispatch::handled(GridAction::EnterEditMode))
                } else {
                    Ok(Dispatch::ignored())
                }
            }
            _ => Ok(Dispatch::ignored()),
        }
    }
}

fn edit_mode_key(state: &mut GridState, input: &KeyInput) -> Result<Dispatch, GridError> {
    match input.key {
        Key::Enter if input.modifiers == Modifiers::NONE => {
            let Some(cell) = state.editing_cell() else {
                return Ok(Dispatch::ignored());
            };
            match state.commit_edit() {
                Ok(_) => Ok(Dispatch::handled(GridAction::CommitEdit)),
                Err(GridError::TypeMismatch {
                    column, expected, ..
                }) => {
                    warn!(%column, %expected, "commit rejected");
                    Ok(Dispatch::handled(GridAction::CommitRejected { cell, expected }))
                }
                Err(error) => Err(error),
            }
        }
        Key::Escape => {
            state.cancel_edit();
            Ok(Dispatch::handled(GridAction::CancelEdit))
        }
        _ => Ok(Dispatch::ignored()),
    }
}

fn move_focus(state: &mut GridState, direction: Direction) -> Result<Dispatch, GridError> {
    let Some(focus) = state.focus() else {
        return Ok(Dispatch::ignored());
    };
    let columns = state.render_columns();
    let target = direction.step(focus, state.row_count(), &columns);
    if target != focus {
        state.collapse_to(target.row, target.col)?;
        let (horizontal, vertical) = direction.edges();
        state.scroll_to_cell(horizontal, vertical, target)?;
    }
    Ok(Dispatch::handled(GridAction::MoveFocus(direction)))
}

fn extend_selection(state: &mut GridState, direction: Direction) -> Result<Dispatch, GridError> {
    let (Some(focus), Some(anchor)) = (state.focus(), state.derive_anchor()) else {
        return Ok(Dispatch::ignored());
    };
    let columns = state.render_columns();
    let target = direction.step(anchor, state.row_count(), &columns);
    state.select_cell_range(focus.row, focus.col, target.row, target.col)?;
    state.set_last_move(target.row, target.col)?;
    let (horizontal, vertical) = direction.edges();
    state.scroll_to_cell(horizontal, vertical, target)?;
    Ok(Dispatch::handled(GridAction::ExtendSelection(direction)))
}

fn next_cell(state: &mut GridState) -> Result<Dispatch, GridError> {
    let Some(focus) = state.focus() else {
        return Ok(Dispatch::ignored());
    };
    let columns = state.render_columns();
    let Some(&first) = columns.first() else {
        return Ok(Dispatch::ignored());
    };
    let target = match columns.iter().position(|col| *col == focus.col) {
        Some(index) if index + 1 < columns.len() => {
            CellAddress::new(focus.row, columns[index + 1])
        }
        Some(_) => CellAddress::new(focus.row + 1, first),
        None => CellAddress::new(focus.row, first),
    };
    if target.row >= state.row_count() {
        // Past the last cell the host keeps its default Tab behavior.
        return Ok(Dispatch::ignored());
    }

    state.collapse_to(target.row, target.col)?;
    let horizontal = if target.col == first {
        HorizontalEdge::Left
    } else {
        HorizontalEdge::Right
    };
    state.scroll_to_cell(horizontal, VerticalEdge::Bottom, target)?;
    Ok(Dispatch::handled(GridAction::NextCell))
}

fn header_mouse_down(
    state: &mut GridState,
    col: usize,
    modifiers: Modifiers,
) -> Result<Dispatch, GridError> {
    if modifiers.shift {
        if let Some(focus) = state.focus() {
            state.select_col_range(focus.col, col)?;
            return Ok(Dispatch::handled(GridAction::ExtendColumns {
                from: focus.col,
                to: col,
            }));
        }
    }

    if modifiers.is_command() {
        state.add_selection_col(col)?;
        focus_column_top(state, col)?;
        return Ok(Dispatch::handled(GridAction::AddColumn(col)));
    }

    state.select_column(col)?;
    focus_column_top(state, col)?;
    Ok(Dispatch::handled(GridAction::SelectColumn(col)))
}

fn focus_column_top(state: &mut GridState, col: usize) -> Result<(), GridError> {
    if state.row_count() > 0 {
        state.set_focus(0, col)?;
    }
    Ok(())
}

fn cell_mouse_down(
    state: &mut GridState,
    cell: CellAddress,
    modifiers: Modifiers,
) -> Result<Dispatch, GridError> {
    if state.editing_cell() == Some(cell) {
        return Ok(Dispatch::ignored());
    }

    if modifiers.shift {
        if let Some(focus) = state.focus() {
            state.select_cell_range(focus.row, focus.col, cell.row, cell.col)?;
            state.set_last_move(cell.row, cell.col)?;
            return Ok(Dispatch::handled(GridAction::ExtendCells(cell)));
        }
    }

    if modifiers.is_command() {
        state.set_focus(cell.row, cell.col)?;
        state.add_cell_range(cell.row, cell.col, cell.row, cell.col)?;
        state.clear_last_move();
        return Ok(Dispatch::handled(GridAction::AddCell(cell)));
    }

    state.collapse_to(cell.row, cell.col)?;
    Ok(Dispatch::handled(GridAction::FocusCell(cell)))
}

#[cfg(test)]
mod tests {
    use super::{CommandDispatcher, Direction, GridAction};
    use crate::clipboard::{Clipboard, MemoryClipboard, PasteOutcome};
    use crate::grid_state::GridState;
    use crate::input::{GridInput, Key, KeyInput, Modifiers};
    use crate::matrix::{CellAddress, CellValue, ColumnDefinition, ColumnType, ResultSet};
    use crate::selection::CellRange;
    use crate::viewport::{ScrollOffset, ViewportConfig};

    fn grid(rows: usize, cols: usize) -> GridState {
        let columns = (0..cols)
            .map(|col| ColumnDefinition::new(format!("c{col}"), ColumnType::Text))
            .collect();
        let rows = (0..rows)
            .map(|row| {
                (0..cols)
                    .map(|col| CellValue::Text(format!("r{row}c{col}")))
                    .collect()
            })
            .collect();
        GridState::new(ResultSet::new(columns, rows), ViewportConfig::default())
    }

    fn key(key: Key) -> GridInput {
        GridInput::Key(KeyInput::plain(key))
    }

    fn shift(key: Key) -> GridInput {
        GridInput::Key(KeyInput::new(key, Modifiers::SHIFT))
    }

    #[test]
    fn arrow_moves_focus_and_collapses_selection() {
        let mut state = grid(4, 4);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();
        state.select_cell_range(1, 1, 2, 2).expect("range should be valid");

        let dispatch = dispatcher.dispatch(&mut state, &key(Key::ArrowDown), &clipboard);
        assert!(dispatch.prevent_default);
        assert_eq!(dispatch.action, Some(GridAction::MoveFocus(Direction::Down)));
        assert_eq!(state.focus(), Some(CellAddress::new(2, 1)));
        assert_eq!(state.selection_range(2, 1), Some(CellRange::new(2, 1, 2, 1)));
        assert_eq!(state.selection_range(1, 1), None);
    }

    #[test]
    fn arrow_at_edge_is_handled_without_moving() {
        let mut state = grid(2, 2);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();
        state.set_focus(1, 1).expect("focus should be valid");

        for input in [key(Key::ArrowDown), key(Key::ArrowRight)] {
            let dispatch = dispatcher.dispatch(&mut state, &input, &clipboard);
            assert!(dispatch.prevent_default);
        }
        assert_eq!(state.focus(), Some(CellAddress::new(1, 1)));
    }

    #[test]
    fn shift_extension_resumes_from_existing_range() {
        let mut state = grid(6, 6);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();
        state.set_focus(1, 1).expect("focus should be valid");
        state.select_cell_range(1, 1, 3, 3).expect("range should be valid");

        dispatcher.dispatch(&mut state, &shift(Key::ArrowDown), &clipboard);
        assert_eq!(state.selection_range(1, 1), Some(CellRange::new(1, 1, 4, 3)));
        assert_eq!(state.last_move(), Some(CellAddress::new(4, 3)));

        dispatcher.dispatch(&mut state, &shift(Key::ArrowLeft), &clipboard);
        assert_eq!(state.selection_range(1, 1), Some(CellRange::new(1, 1, 4, 2)));
        assert_eq!(state.focus(), Some(CellAddress::new(1, 1)));
    }

    #[test]
    fn shift_extension_can_cross_the_focus() {
        let mut state = grid(5, 5);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();
        state.set_focus(2, 2).expect("focus should be valid");

        dispatcher.dispatch(&mut state, &shift(Key::ArrowUp), &clipboard);
        dispatcher.dispatch(&mut state, &shift(Key::ArrowUp), &clipboard);
        assert_eq!(state.selection_range(2, 2), Some(CellRange::new(0, 2, 2, 2)));
        assert_eq!(state.last_move(), Some(CellAddress::new(0, 2)));
    }

    #[test]
    fn copy_writes_focused_value_and_swallows_clipboard_errors() {
        let mut state = grid(2, 2);
        let dispatcher = CommandDispatcher::default();
        state.set_focus(1, 0).expect("focus should be valid");

        let clipboard = MemoryClipboard::new();
        let copy = GridInput::Key(KeyInput::new(Key::Char('c'), Modifiers::CTRL));
        let dispatch = dispatcher.dispatch(&mut state, &copy, &clipboard);
        assert_eq!(dispatch.action, Some(GridAction::Copy));
        assert_eq!(clipboard.contents().as_deref(), Some("r1c0"));

        let denied = MemoryClipboard::unavailable();
        let dispatch = dispatcher.dispatch(&mut state, &copy, &denied);
        assert!(dispatch.prevent_default);
    }

    #[tokio::test]
    async fn paste_returns_ticket_resolved_against_the_clipboard() {
        let mut state = grid(2, 2);
        let dispatcher = CommandDispatcher::default();
        let clipboard = MemoryClipboard::with_text("pasted");
        state.set_focus(0, 1).expect("focus should be valid");

        let paste = GridInput::Key(KeyInput::new(Key::Char('v'), Modifiers::META));
        let dispatch = dispatcher.dispatch(&mut state, &paste, &clipboard);
        let ticket = dispatch.pending_paste.expect("paste should be pending");
        assert_eq!(ticket.target(), CellAddress::new(0, 1));

        let outcome = state.complete_paste(ticket, clipboard.read_text().await);
        assert!(matches!(outcome, PasteOutcome::Applied { changed: true, .. }));
        assert_eq!(state.value(0, 1), Ok(&CellValue::Text("pasted".to_string())));
    }

    #[test]
    fn edit_mode_routes_enter_and_escape() {
        let mut state = grid(2, 2);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();
        state.set_focus(0, 0).expect("focus should be valid");

        dispatcher.dispatch(&mut state, &key(Key::Enter), &clipboard);
        assert!(state.is_in_edit_mode());
        state.set_staged_value("edited").expect("should be editing");

        let ignored = dispatcher.dispatch(&mut state, &key(Key::Tab), &clipboard);
        assert!(!ignored.prevent_default);
        assert_eq!(state.focus(), Some(CellAddress::new(0, 0)));

        let commit = dispatcher.dispatch(&mut state, &key(Key::Enter), &clipboard);
        assert_eq!(commit.action, Some(GridAction::CommitEdit));
        assert_eq!(state.value(0, 0), Ok(&CellValue::Text("edited".to_string())));

        dispatcher.dispatch(&mut state, &key(Key::Enter), &clipboard);
        state.set_staged_value("dropped").expect("should be editing");
        dispatcher.dispatch(&mut state, &key(Key::Escape), &clipboard);
        assert!(!state.is_in_edit_mode());
        assert_eq!(state.value(0, 0), Ok(&CellValue::Text("edited".to_string())));
    }

    #[test]
    fn enter_without_an_edit_to_start_is_not_handled() {
        let mut state = grid(2, 2);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();

        let dispatch = dispatcher.dispatch(&mut state, &key(Key::Enter), &clipboard);
        assert_eq!(dispatch.action, None);
        assert!(!dispatch.prevent_default);
        assert!(!state.is_in_edit_mode());
    }

    #[test]
    fn rejected_commit_is_handled_and_keeps_the_edit_open() {
        let columns = vec![ColumnDefinition::new("n", ColumnType::Integer)];
        let mut state = GridState::new(
            ResultSet::new(columns, vec![vec![CellValue::Integer(1)]]),
            ViewportConfig::default(),
        );
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();
        state.set_focus(0, 0).expect("focus should be valid");

        dispatcher.dispatch(&mut state, &key(Key::Enter), &clipboard);
        state.set_staged_value("one").expect("should be editing");
        let dispatch = dispatcher.dispatch(&mut state, &key(Key::Enter), &clipboard);

        assert!(dispatch.prevent_default);
        assert_eq!(
            dispatch.action,
            Some(GridAction::CommitRejected {
                cell: CellAddress::new(0, 0),
                expected: ColumnType::Integer
            })
        );
        assert!(state.is_in_edit_mode());
        assert_eq!(state.value(0, 0), Ok(&CellValue::Integer(1)));
    }

    #[test]
    fn navigation_follows_render_order_and_skips_hidden_columns() {
        let mut state = grid(3, 3);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();
        state
            .set_visible_columns(Some(vec![0, 2]))
            .expect("arrangement should be accepted");
        state.set_focus(0, 0).expect("focus should be valid");

        dispatcher.dispatch(&mut state, &key(Key::ArrowRight), &clipboard);
        assert_eq!(state.focus(), Some(CellAddress::new(0, 2)));
        dispatcher.dispatch(&mut state, &key(Key::ArrowRight), &clipboard);
        assert_eq!(state.focus(), Some(CellAddress::new(0, 2)));

        let tab = dispatcher.dispatch(&mut state, &key(Key::Tab), &clipboard);
        assert_eq!(tab.action, Some(GridAction::NextCell));
        assert_eq!(state.focus(), Some(CellAddress::new(1, 0)));

        state
            .set_visible_columns(None)
            .expect("arrangement should be accepted");
        state
            .set_sticky_header(Some(2))
            .expect("sticky header should be accepted");
        state.set_focus(1, 2).expect("focus should be valid");
        dispatcher.dispatch(&mut state, &key(Key::ArrowRight), &clipboard);
        assert_eq!(state.focus(), Some(CellAddress::new(1, 0)));
        dispatcher.dispatch(&mut state, &key(Key::ArrowLeft), &clipboard);
        assert_eq!(state.focus(), Some(CellAddress::new(1, 2)));
    }

    #[test]
    fn header_clicks_follow_modifier_rules() {
        let mut state = grid(3, 5);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();

        dispatcher.dispatch(
            &mut state,
            &GridInput::HeaderMouseDown {
                col: 1,
                modifiers: Modifiers::NONE,
            },
            &clipboard,
        );
        assert_eq!(state.focus(), Some(CellAddress::new(0, 1)));
        assert_eq!(state.selected_col_indices(), vec![1]);

        dispatcher.dispatch(
            &mut state,
            &GridInput::HeaderMouseDown {
                col: 3,
                modifiers: Modifiers::SHIFT,
            },
            &clipboard,
        );
        assert_eq!(state.selected_col_indices(), vec![1, 2, 3]);
        assert_eq!(state.focus(), Some(CellAddress::new(0, 1)));

        dispatcher.dispatch(
            &mut state,
            &GridInput::HeaderMouseDown {
                col: 0,
                modifiers: Modifiers::CTRL,
            },
            &clipboard,
        );
        assert_eq!(state.selected_col_indices(), vec![0, 1, 2, 3]);
        assert_eq!(state.focus(), Some(CellAddress::new(0, 0)));
    }

    #[test]
    fn cell_clicks_focus_extend_and_add() {
        let mut state = grid(4, 4);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();
        let click = |row, col, modifiers| GridInput::CellMouseDown {
            row,
            col,
            modifiers,
        };

        dispatcher.dispatch(&mut state, &click(1, 1, Modifiers::NONE), &clipboard);
        assert_eq!(state.focus(), Some(CellAddress::new(1, 1)));

        dispatcher.dispatch(&mut state, &click(3, 2, Modifiers::SHIFT), &clipboard);
        assert_eq!(state.selection_range(2, 2), Some(CellRange::new(1, 1, 3, 2)));
        assert_eq!(state.last_move(), Some(CellAddress::new(3, 2)));

        dispatcher.dispatch(&mut state, &click(0, 3, Modifiers::CTRL), &clipboard);
        assert_eq!(state.focus(), Some(CellAddress::new(0, 3)));
        assert!(state.is_selected(2, 2));
        assert!(state.is_selected(0, 3));
    }

    #[test]
    fn out_of_range_click_is_ignored() {
        let mut state = grid(2, 2);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();

        let dispatch = dispatcher.dispatch(
            &mut state,
            &GridInput::CellMouseDown {
                row: 9,
                col: 0,
                modifiers: Modifiers::NONE,
            },
            &clipboard,
        );
        assert!(!dispatch.is_handled());
        assert_eq!(state.focus(), None);
    }

    #[test]
    fn moving_down_past_the_viewport_scrolls_by_bottom_edge() {
        let mut state = grid(100, 2);
        state.set_viewport_size(300, 35 * 4);
        let clipboard = MemoryClipboard::new();
        let dispatcher = CommandDispatcher::default();
        state.set_focus(2, 0).expect("focus should be valid");

        dispatcher.dispatch(&mut state, &key(Key::ArrowDown), &clipboard);
        assert_eq!(state.viewport().scroll(), ScrollOffset { left: 0, top: 35 });
    }
}
