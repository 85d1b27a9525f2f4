use std::fmt;
use std::ops::Range;

use tracing::{debug, warn};

use crate::clipboard::{Clipboard, ClipboardError, PasteOutcome, PasteTicket};
use crate::edit_session::EditSession;
use crate::error::GridError;
use crate::matrix::{CellAddress, CellValue, ColumnType, Header, ResultMatrix, ResultSet};
use crate::selection::{CellRange, Selection, SelectionModel, SelectionRange};
use crate::viewport::{
    HorizontalEdge, ScrollOffset, VerticalEdge, ViewportConfig, ViewportController,
};

pub type SubscriptionId = u64;

type Listener = Box<dyn FnMut(&GridEvent)>;

#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    FocusChanged {
        from: Option<CellAddress>,
        to: Option<CellAddress>,
    },
    SelectionChanged,
    CellChanged {
        cell: CellAddress,
    },
    EditModeChanged {
        editing: Option<CellAddress>,
    },
    ScrollRequested {
        cell: CellAddress,
        horizontal: HorizontalEdge,
        vertical: VerticalEdge,
        offset: ScrollOffset,
    },
    StickyHeaderChanged(Option<usize>),
    ColumnsArranged,
    RowsAppended(Range<usize>),
    Reloaded {
        rows: usize,
        cols: usize,
    },
}

impl GridEvent {
    /// Whether a renderer showing `window` has to repaint for this event.
    #[must_use]
    pub fn touches_rows(&self, window: &Range<usize>) -> bool {
        match self {
            Self::FocusChanged { from, to } => [from, to]
                .into_iter()
                .flatten()
                .any(|cell| window.contains(&cell.row)),
            Self::CellChanged { cell } => window.contains(&cell.row),
            Self::EditModeChanged { editing } => {
                editing.map_or(true, |cell| window.contains(&cell.row))
            }
            Self::RowsAppended(rows) => rows.start < window.end && window.start < rows.end,
            Self::SelectionChanged
            | Self::ScrollRequested { .. }
            | Self::StickyHeaderChanged(_)
            | Self::ColumnsArranged
            | Self::Reloaded { .. } => true,
        }
    }
}

/// Interactive state of one result grid: the matrix plus focus, selection,
/// edit session and viewport. One instance per grid view.
pub struct GridState {
    matrix: ResultMatrix,
    selection: SelectionModel,
    edit: EditSession,
    viewport: ViewportController,
    generation: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl fmt::Debug for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridState")
            .field("rows", &self.matrix.row_count())
            .field("cols", &self.matrix.header_count())
            .field("selection", &self.selection)
            .field("edit", &self.edit)
            .field("generation", &self.generation)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl GridState {
    #[must_use]
    pub fn new(result: ResultSet, config: ViewportConfig) -> Self {
        let matrix = ResultMatrix::from_result_set(result);
        let mut viewport = ViewportController::new(config);
        viewport.reset_columns(matrix.header_count());
        Self {
            matrix,
            selection: SelectionModel::default(),
            edit: EditSession::default(),
            viewport,
            generation: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&GridEvent) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: &GridEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    // Result matrix

    #[must_use]
    pub fn matrix(&self) -> &ResultMatrix {
        &self.matrix
    }

    #[must_use]
    pub fn headers(&self) -> &[Header] {
        self.matrix.headers()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.matrix.row_count()
    }

    #[must_use]
    pub fn header_count(&self) -> usize {
        self.matrix.header_count()
    }

    pub fn value(&self, row: usize, col: usize) -> Result<&CellValue, GridError> {
        self.matrix.value(row, col)
    }

    /// Writes a value and notifies subscribers. Writing the value a cell already
    /// holds is a no-op that returns `false`.
    pub fn change_value(
        &mut self,
        row: usize,
        col: usize,
        value: CellValue,
    ) -> Result<bool, GridError> {
        let changed = self.matrix.change_value(row, col, value)?;
        if changed {
            debug!(row, col, "cell value changed");
            self.emit(&GridEvent::CellChanged {
                cell: CellAddress::new(row, col),
            });
        }
        Ok(changed)
    }

    pub fn discard_changes(&mut self) -> usize {
        let restored = self.matrix.discard_changes();
        for cell in &restored {
            self.emit(&GridEvent::CellChanged { cell: *cell });
        }
        restored.len()
    }

    /// Replaces the whole result set. Focus, selection, edit session and
    /// pending pastes are dropped.
    pub fn reload(&mut self, result: ResultSet) {
        self.matrix = ResultMatrix::from_result_set(result);
        self.selection.reset();
        self.edit = EditSession::default();
        self.viewport.reset_columns(self.matrix.header_count());
        self.bump_generation();
        debug!(
            rows = self.matrix.row_count(),
            cols = self.matrix.header_count(),
            "result grid reloaded"
        );
        self.emit(&GridEvent::Reloaded {
            rows: self.matrix.row_count(),
            cols: self.matrix.header_count(),
        });
    }

    pub fn append_rows(&mut self, rows: Vec<Vec<CellValue>>) -> Range<usize> {
        let added = self.matrix.append_rows(rows);
        if !added.is_empty() {
            self.emit(&GridEvent::RowsAppended(added.clone()));
        }
        added
    }

    // Focus and selection

    #[must_use]
    pub fn focus(&self) -> Option<CellAddress> {
        self.selection.focus()
    }

    /// Moves focus without touching the selection ranges. Leaving a cell that
    /// is being edited cancels the edit.
    pub fn set_focus(&mut self, row: usize, col: usize) -> Result<(), GridError> {
        let cell = self.matrix.validate(row, col)?;
        self.apply_focus(cell);
        Ok(())
    }

    fn apply_focus(&mut self, cell: CellAddress) {
        if self.edit.cell().is_some_and(|editing| editing != cell) {
            self.cancel_edit();
        }
        let previous = self.selection.focus();
        if previous == Some(cell) {
            return;
        }
        self.selection.set_focus(cell);
        self.bump_generation();
        self.emit(&GridEvent::FocusChanged {
            from: previous,
            to: Some(cell),
        });
    }

    fn ensure_focus(&mut self, cell: CellAddress) {
        if self.selection.focus().is_none() && cell.row < self.matrix.row_count() {
            self.apply_focus(cell);
        }
    }

    fn selection_changed(&mut self) {
        self.bump_generation();
        self.emit(&GridEvent::SelectionChanged);
    }

    /// Focuses a cell and makes it the only selected cell.
    pub fn collapse_to(&mut self, row: usize, col: usize) -> Result<(), GridError> {
        let cell = self.matrix.validate(row, col)?;
        self.apply_focus(cell);
        self.selection.collapse_to(cell);
        self.selection_changed();
        Ok(())
    }

    pub fn select_column(&mut self, col: usize) -> Result<(), GridError> {
        self.select_col_range(col, col)
    }

    pub fn select_col_range(&mut self, from_col: usize, to_col: usize) -> Result<(), GridError> {
        self.matrix.validate_col(from_col)?;
        self.matrix.validate_col(to_col)?;
        self.selection
            .replace_selection(SelectionRange::columns(from_col, to_col));
        self.selection.set_last_move(None);
        self.ensure_focus(CellAddress::new(0, from_col));
        self.selection_changed();
        Ok(())
    }

    pub fn add_selection_col(&mut self, col: usize) -> Result<(), GridError> {
        self.matrix.validate_col(col)?;
        self.selection.add_selection(SelectionRange::columns(col, col));
        self.selection.set_last_move(None);
        self.ensure_focus(CellAddress::new(0, col));
        self.selection_changed();
        Ok(())
    }

    pub fn select_row(&mut self, row: usize) -> Result<(), GridError> {
        self.select_row_range(row, row)
    }

    pub fn select_row_range(&mut self, from_row: usize, to_row: usize) -> Result<(), GridError> {
        self.matrix.validate_row(from_row)?;
        self.matrix.validate_row(to_row)?;
        self.selection
            .replace_selection(SelectionRange::rows(from_row, to_row));
        self.selection.set_last_move(None);
        if self.matrix.header_count() > 0 {
            self.ensure_focus(CellAddress::new(from_row, 0));
        }
        self.selection_changed();
        Ok(())
    }

    pub fn add_selection_row(&mut self, row: usize) -> Result<(), GridError> {
        self.matrix.validate_row(row)?;
        self.selection.add_selection(SelectionRange::rows(row, row));
        self.selection.set_last_move(None);
        if self.matrix.header_count() > 0 {
            self.ensure_focus(CellAddress::new(row, 0));
        }
        self.selection_changed();
        Ok(())
    }

    /// Replaces the selection with one rectangle; corners may come in any order.
    pub fn select_cell_range(
        &mut self,
        y1: usize,
        x1: usize,
        y2: usize,
        x2: usize,
    ) -> Result<(), GridError> {
        let first = self.matrix.validate(y1, x1)?;
        self.matrix.validate(y2, x2)?;
        self.selection
            .replace_selection(SelectionRange::cells(y1, x1, y2, x2));
        self.ensure_focus(first);
        self.selection_changed();
        Ok(())
    }

    /// Adds a rectangle without clearing the existing ranges.
    pub fn add_cell_range(
        &mut self,
        y1: usize,
        x1: usize,
        y2: usize,
        x2: usize,
    ) -> Result<(), GridError> {
        let first = self.matrix.validate(y1, x1)?;
        self.matrix.validate(y2, x2)?;
        self.selection
            .add_selection(SelectionRange::cells(y1, x1, y2, x2));
        self.ensure_focus(first);
        self.selection_changed();
        Ok(())
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        self.selection.selection()
    }

    #[must_use]
    pub fn is_selected(&self, row: usize, col: usize) -> bool {
        self.selection.selection().contains(row, col)
    }

    #[must_use]
    pub fn selected_col_indices(&self) -> Vec<usize> {
        self.selection
            .selection()
            .selected_col_indices(self.matrix.header_count())
    }

    #[must_use]
    pub fn touched_col_indices(&self) -> Vec<usize> {
        self.selection
            .selection()
            .touched_col_indices(self.matrix.row_count(), self.matrix.header_count())
    }

    #[must_use]
    pub fn is_full_selection_col(&self, col: usize) -> bool {
        col < self.matrix.header_count()
            && self
                .selection
                .selection()
                .is_full_selection_col(col, self.matrix.row_count())
    }

    #[must_use]
    pub fn selection_range(&self, row: usize, col: usize) -> Option<CellRange> {
        self.selection.selection().range_containing(
            row,
            col,
            self.matrix.row_count(),
            self.matrix.header_count(),
        )
    }

    #[must_use]
    pub fn last_move(&self) -> Option<CellAddress> {
        self.selection.last_move()
    }

    pub fn set_last_move(&mut self, row: usize, col: usize) -> Result<(), GridError> {
        let cell = self.matrix.validate(row, col)?;
        self.selection.set_last_move(Some(cell));
        Ok(())
    }

    pub fn clear_last_move(&mut self) {
        self.selection.set_last_move(None);
    }

    #[must_use]
    pub fn derive_anchor(&self) -> Option<CellAddress> {
        self.selection.derive_anchor()
    }

    // Edit session

    #[must_use]
    pub fn is_in_edit_mode(&self) -> bool {
        self.edit.is_editing()
    }

    #[must_use]
    pub fn editing_cell(&self) -> Option<CellAddress> {
        self.edit.cell()
    }

    #[must_use]
    pub fn staged_value(&self) -> Option<&str> {
        self.edit.staged_value()
    }

    /// Enters edit mode on the focused cell. Returns `false` without focus.
    pub fn enter_edit_mode(&mut self) -> Result<bool, GridError> {
        match self.selection.focus() {
            Some(cell) => self.enter_edit_mode_at(cell.row, cell.col),
            None => Ok(false),
        }
    }

    /// Enters edit mode on a cell, focusing it. Rejected with
    /// [`GridError::EditConflict`] while another cell is being edited.
    /// Binary cells have no text form and are never opened for editing.
    pub fn enter_edit_mode_at(&mut self, row: usize, col: usize) -> Result<bool, GridError> {
        let cell = self.matrix.validate(row, col)?;
        if let Some(editing) = self.edit.cell() {
            if editing != cell {
                return Err(GridError::EditConflict {
                    editing,
                    requested: cell,
                });
            }
            return Ok(false);
        }

        let value = self.matrix.value(row, col)?;
        let binary_column = self
            .matrix
            .header(col)
            .is_some_and(|header| header.column_type == ColumnType::Binary);
        if binary_column || matches!(value, CellValue::Binary(_)) {
            debug!(row, col, "binary cell is not editable");
            return Ok(false);
        }
        let initial = value.to_clipboard_text();

        self.apply_focus(cell);
        let started = self.edit.begin(cell, initial)?;
        self.bump_generation();
        self.emit(&GridEvent::EditModeChanged {
            editing: Some(cell),
        });
        Ok(started)
    }

    pub fn set_staged_value(&mut self, text: impl Into<String>) -> Result<(), GridError> {
        *self.edit.staged_mut()? = text.into();
        Ok(())
    }

    pub fn update_staged_value(&mut self, update: impl FnOnce(&mut String)) -> Result<(), GridError> {
        update(self.edit.staged_mut()?);
        Ok(())
    }

    /// Writes the staged text back through [`GridState::change_value`].
    ///
    /// Staged text equal to the text the edit started with closes the session
    /// without touching the cell. On a type mismatch the session stays open
    /// so the user can fix the text.
    pub fn commit_edit(&mut self) -> Result<bool, GridError> {
        let (Some(cell), Some(staged)) = (self.edit.cell(), self.edit.staged_value()) else {
            return Err(GridError::NotEditing);
        };
        if !self.edit.is_modified() {
            self.edit.finish();
            debug!(row = cell.row, col = cell.col, "edit closed without changes");
            self.emit(&GridEvent::EditModeChanged { editing: None });
            return Ok(false);
        }

        let header = self
            .matrix
            .header(cell.col)
            .ok_or(GridError::ColumnOutOfRange {
                col: cell.col,
                cols: self.matrix.header_count(),
            })?;
        let column_type = header.column_type;
        let Some(value) = CellValue::coerce(staged, column_type) else {
            return Err(GridError::TypeMismatch {
                column: header.name.clone(),
                expected: column_type,
                text: staged.to_string(),
            });
        };

        self.edit.finish();
        let changed = self.change_value(cell.row, cell.col, value)?;
        debug!(row = cell.row, col = cell.col, changed, "edit committed");
        self.emit(&GridEvent::EditModeChanged { editing: None });
        Ok(changed)
    }

    pub fn cancel_edit(&mut self) -> Option<CellAddress> {
        let cell = self.edit.cancel()?;
        debug!(row = cell.row, col = cell.col, "edit cancelled");
        self.emit(&GridEvent::EditModeChanged { editing: None });
        Some(cell)
    }

    // Clipboard

    /// Text for a copy: the rectangle holding the focus as tab-separated
    /// lines when it spans several cells, otherwise the focused cell.
    #[must_use]
    pub fn copy_text(&self) -> Option<String> {
        let focus = self.selection.focus()?;
        let range = self
            .selection
            .selection()
            .cell_range_containing(focus.row, focus.col)
            .filter(|range| !range.is_single_cell())
            .unwrap_or_else(|| CellRange::single(focus));

        let mut lines = Vec::with_capacity(range.row_span());
        for row in range.y1..=range.y2 {
            let values = self.matrix.row_values(row).ok()?;
            let line = values[range.x1..=range.x2]
                .iter()
                .map(CellValue::to_clipboard_text)
                .collect::<Vec<_>>()
                .join("\t");
            lines.push(line);
        }
        Some(lines.join("\n"))
    }

    /// Starts a paste into the focused cell. Any earlier pending paste becomes stale.
    pub fn begin_paste(&mut self) -> Option<PasteTicket> {
        let target = self.selection.focus()?;
        self.bump_generation();
        Some(PasteTicket {
            generation: self.generation,
            target,
        })
    }

    /// Applies a resolved clipboard read. Results for tickets that were
    /// overtaken by focus, selection, edit, reload or paste activity are dropped.
    pub fn complete_paste(
        &mut self,
        ticket: PasteTicket,
        read: Result<String, ClipboardError>,
    ) -> PasteOutcome {
        let cell = ticket.target;
        if ticket.generation != self.generation {
            warn!(row = cell.row, col = cell.col, "discarding stale paste");
            return PasteOutcome::Stale { cell };
        }

        let text = match read {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "paste skipped");
                return PasteOutcome::ClipboardUnavailable;
            }
        };

        let Some(column_type) = self.matrix.header(cell.col).map(|header| header.column_type)
        else {
            return PasteOutcome::Stale { cell };
        };
        let Some(value) = CellValue::coerce(&text, column_type) else {
            warn!(row = cell.row, col = cell.col, %column_type, "pasted text does not fit column");
            return PasteOutcome::TypeMismatch {
                cell,
                expected: column_type,
                text,
            };
        };

        match self.change_value(cell.row, cell.col, value.clone()) {
            Ok(changed) => PasteOutcome::Applied {
                cell,
                value,
                changed,
            },
            Err(_) => PasteOutcome::Stale { cell },
        }
    }

    /// Reads the clipboard and pastes into the focused cell.
    pub async fn paste_from(&mut self, clipboard: &dyn Clipboard) -> Option<PasteOutcome> {
        let ticket = self.begin_paste()?;
        let read = clipboard.read_text().await;
        Some(self.complete_paste(ticket, read))
    }

    // Viewport

    #[must_use]
    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.viewport.set_viewport_size(width, height);
    }

    pub fn set_scroll(&mut self, offset: ScrollOffset) {
        self.viewport.set_scroll(offset);
    }

    pub fn set_column_width(&mut self, col: usize, width: u32) -> Result<(), GridError> {
        self.viewport.set_column_width(col, width)?;
        self.emit(&GridEvent::ColumnsArranged);
        Ok(())
    }

    #[must_use]
    pub fn visible_row_window(&self) -> Range<usize> {
        self.viewport.visible_row_window(self.matrix.row_count())
    }

    #[must_use]
    pub fn render_columns(&self) -> Vec<usize> {
        self.viewport.render_columns()
    }

    /// Requests that a cell become visible. Returns the new scroll offset when
    /// the render layer has to move.
    pub fn scroll_to_cell(
        &mut self,
        horizontal: HorizontalEdge,
        vertical: VerticalEdge,
        cell: CellAddress,
    ) -> Result<Option<ScrollOffset>, GridError> {
        self.matrix.validate(cell.row, cell.col)?;
        let target = self.viewport.scroll_to_cell(
            horizontal,
            vertical,
            cell,
            self.matrix.row_count(),
        );
        if let Some(offset) = target {
            self.emit(&GridEvent::ScrollRequested {
                cell,
                horizontal,
                vertical,
                offset,
            });
        }
        Ok(target)
    }

    pub fn set_visible_columns(&mut self, order: Option<Vec<usize>>) -> Result<(), GridError> {
        let sticky_dropped = self.viewport.set_visible_columns(order)?;
        self.emit(&GridEvent::ColumnsArranged);
        if sticky_dropped {
            self.emit(&GridEvent::StickyHeaderChanged(None));
        }
        Ok(())
    }

    #[must_use]
    pub fn sticky_header(&self) -> Option<usize> {
        self.viewport.sticky_header()
    }

    pub fn set_sticky_header(&mut self, col: Option<usize>) -> Result<(), GridError> {
        if let Some(col) = col {
            self.matrix.validate_col(col)?;
        }
        if self.viewport.sticky_header() == col {
            return Ok(());
        }
        self.viewport.set_sticky_header(col)?;
        self.emit(&GridEvent::StickyHeaderChanged(col));
        Ok(())
    }

    /// Pins the column, or unpins it when it is already pinned.
    pub fn toggle_sticky_header(&mut self, col: usize) -> Result<Option<usize>, GridError> {
        let next = if self.viewport.sticky_header() == Some(col) {
            None
        } else {
            Some(col)
        };
        self.set_sticky_header(next)?;
        Ok(next)
    }
}
