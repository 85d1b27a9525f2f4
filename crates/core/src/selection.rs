use std::collections::BTreeSet;

use crate::matrix::CellAddress;

/// Rectangular cell range with normalized corners: `y1 <= y2` and `x1 <= x2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub y1: usize,
    pub x1: usize,
    pub y2: usize,
    pub x2: usize,
}

impl CellRange {
    #[must_use]
    pub fn new(y1: usize, x1: usize, y2: usize, x2: usize) -> Self {
        Self {
            y1: y1.min(y2),
            x1: x1.min(x2),
            y2: y1.max(y2),
            x2: x1.max(x2),
        }
    }

    #[must_use]
    pub fn single(cell: CellAddress) -> Self {
        Self::new(cell.row, cell.col, cell.row, cell.col)
    }

    #[must_use]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.y1..=self.y2).contains(&row) && (self.x1..=self.x2).contains(&col)
    }

    #[must_use]
    pub fn is_single_cell(&self) -> bool {
        self.y1 == self.y2 && self.x1 == self.x2
    }

    #[must_use]
    pub fn row_span(&self) -> usize {
        self.y2 - self.y1 + 1
    }

    #[must_use]
    pub fn col_span(&self) -> usize {
        self.x2 - self.x1 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionRange {
    Columns { from: usize, to: usize },
    Rows { from: usize, to: usize },
    Cells(CellRange),
}

impl SelectionRange {
    #[must_use]
    pub fn columns(a: usize, b: usize) -> Self {
        Self::Columns {
            from: a.min(b),
            to: a.max(b),
        }
    }

    #[must_use]
    pub fn rows(a: usize, b: usize) -> Self {
        Self::Rows {
            from: a.min(b),
            to: a.max(b),
        }
    }

    #[must_use]
    pub fn cells(y1: usize, x1: usize, y2: usize, x2: usize) -> Self {
        Self::Cells(CellRange::new(y1, x1, y2, x2))
    }

    #[must_use]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        match self {
            Self::Columns { from, to } => (*from..=*to).contains(&col),
            Self::Rows { from, to } => (*from..=*to).contains(&row),
            Self::Cells(range) => range.contains(row, col),
        }
    }

    /// The rectangle this range covers in a `rows` x `cols` matrix.
    #[must_use]
    pub fn bounds(&self, rows: usize, cols: usize) -> Option<CellRange> {
        if rows == 0 || cols == 0 {
            return None;
        }
        match *self {
            Self::Columns { from, to } => (from < cols)
                .then(|| CellRange::new(0, from, rows - 1, to.min(cols - 1))),
            Self::Rows { from, to } => {
                (from < rows).then(|| CellRange::new(from, 0, to.min(rows - 1), cols - 1))
            }
            Self::Cells(range) => (range.y1 < rows && range.x1 < cols).then(|| {
                CellRange::new(
                    range.y1,
                    range.x1,
                    range.y2.min(rows - 1),
                    range.x2.min(cols - 1),
                )
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ranges: Vec<SelectionRange>,
}

impl Selection {
    #[must_use]
    pub fn ranges(&self) -> &[SelectionRange] {
        &self.ranges
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    pub fn replace(&mut self, range: SelectionRange) {
        self.ranges.clear();
        self.ranges.push(range);
    }

    pub fn add(&mut self, range: SelectionRange) {
        if !self.ranges.contains(&range) {
            self.ranges.push(range);
        }
    }

    #[must_use]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.ranges.iter().any(|range| range.contains(row, col))
    }

    /// Columns covered by a full-column range, ascending.
    #[must_use]
    pub fn selected_col_indices(&self, cols: usize) -> Vec<usize> {
        let mut indices = BTreeSet::new();
        for range in &self.ranges {
            if let SelectionRange::Columns { from, to } = *range {
                indices.extend(from..=to.min(cols.saturating_sub(1)));
            }
        }
        indices.retain(|col| *col < cols);
        indices.into_iter().collect()
    }

    /// Columns intersecting any range, ascending.
    #[must_use]
    pub fn touched_col_indices(&self, rows: usize, cols: usize) -> Vec<usize> {
        let mut indices = BTreeSet::new();
        for range in &self.ranges {
            if let Some(bounds) = range.bounds(rows, cols) {
                indices.extend(bounds.x1..=bounds.x2);
            }
        }
        indices.into_iter().collect()
    }

    /// True iff every one of the `rows` rows is selected in column `col`.
    #[must_use]
    pub fn is_full_selection_col(&self, col: usize, rows: usize) -> bool {
        if rows == 0 {
            return false;
        }

        let mut spans = Vec::new();
        for range in &self.ranges {
            match *range {
                SelectionRange::Columns { from, to } if (from..=to).contains(&col) => return true,
                SelectionRange::Columns { .. } => {}
                SelectionRange::Rows { from, to } => spans.push((from, to)),
                SelectionRange::Cells(cells) if (cells.x1..=cells.x2).contains(&col) => {
                    spans.push((cells.y1, cells.y2));
                }
                SelectionRange::Cells(_) => {}
            }
        }

        spans.sort_unstable();
        let mut next_uncovered = 0_usize;
        for (from, to) in spans {
            if from > next_uncovered {
                return false;
            }
            next_uncovered = next_uncovered.max(to.saturating_add(1));
            if next_uncovered >= rows {
                return true;
            }
        }
        false
    }

    /// The most recently added range containing the cell, as a rectangle.
    #[must_use]
    pub fn range_containing(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Option<CellRange> {
        self.ranges
            .iter()
            .rev()
            .filter_map(|range| range.bounds(rows, cols))
            .find(|bounds| bounds.contains(row, col))
    }

    /// The most recently added rectangular cell range containing the cell.
    #[must_use]
    pub fn cell_range_containing(&self, row: usize, col: usize) -> Option<CellRange> {
        self.ranges.iter().rev().find_map(|range| match range {
            SelectionRange::Cells(cells) if cells.contains(row, col) => Some(*cells),
            _ => None,
        })
    }
}

/// Endpoint from which the next shift-extension step continues.
///
/// An explicit last-move anchor wins; otherwise the far corner of a rectangular
/// range holding the focus; otherwise the focus itself.
#[must_use]
pub fn derive_anchor(
    focus: CellAddress,
    last_move: Option<CellAddress>,
    selection: &Selection,
) -> CellAddress {
    if let Some(anchor) = last_move {
        return anchor;
    }
    selection
        .cell_range_containing(focus.row, focus.col)
        .map_or(focus, |range| CellAddress::new(range.y2, range.x2))
}

/// Focus, selection ranges and the last-move anchor of one grid view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionModel {
    focus: Option<CellAddress>,
    selection: Selection,
    last_move: Option<CellAddress>,
}

impl SelectionModel {
    #[must_use]
    pub fn focus(&self) -> Option<CellAddress> {
        self.focus
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn last_move(&self) -> Option<CellAddress> {
        self.last_move
    }

    pub fn set_focus(&mut self, cell: CellAddress) {
        self.focus = Some(cell);
    }

    pub fn set_last_move(&mut self, cell: Option<CellAddress>) {
        self.last_move = cell;
    }

    pub fn replace_selection(&mut self, range: SelectionRange) {
        self.selection.replace(range);
    }

    pub fn add_selection(&mut self, range: SelectionRange) {
        self.selection.add(range);
    }

    /// Focuses `cell`, selects only that cell and forgets the last-move anchor.
    pub fn collapse_to(&mut self, cell: CellAddress) {
        self.focus = Some(cell);
        self.selection.replace(SelectionRange::Cells(CellRange::single(cell)));
        self.last_move = None;
    }

    #[must_use]
    pub fn derive_anchor(&self) -> Option<CellAddress> {
        self.focus
            .map(|focus| derive_anchor(focus, self.last_move, &self.selection))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
