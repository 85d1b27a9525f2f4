use std::collections::HashSet;
use std::ops::Range;

use crate::error::GridError;
use crate::matrix::CellAddress;

pub const DEFAULT_RENDER_AHEAD: usize = 20;
pub const DEFAULT_ROW_HEIGHT: u32 = 35;
pub const DEFAULT_HEADER_HEIGHT: u32 = 35;
pub const DEFAULT_COLUMN_WIDTH: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalEdge {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollOffset {
    pub left: u64,
    pub top: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportConfig {
    pub render_ahead: usize,
    pub row_height: u32,
    pub header_height: u32,
    pub default_column_width: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            render_ahead: DEFAULT_RENDER_AHEAD,
            row_height: DEFAULT_ROW_HEIGHT,
            header_height: DEFAULT_HEADER_HEIGHT,
            default_column_width: DEFAULT_COLUMN_WIDTH,
        }
    }
}

/// Computes scroll targets and the row window to render. The scroll surface
/// itself belongs to the rendering layer, which reports its offsets back
/// through [`ViewportController::set_scroll`].
#[derive(Debug, Clone)]
pub struct ViewportController {
    config: ViewportConfig,
    column_widths: Vec<u32>,
    arrangement: Option<Vec<usize>>,
    sticky: Option<usize>,
    width: u32,
    height: u32,
    scroll: ScrollOffset,
}

impl ViewportController {
    #[must_use]
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            column_widths: Vec::new(),
            arrangement: None,
            sticky: None,
            width: 0,
            height: 0,
            scroll: ScrollOffset::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> ViewportConfig {
        self.config
    }

    #[must_use]
    pub fn render_ahead(&self) -> usize {
        self.config.render_ahead
    }

    /// Resizes the column table after a reload. Arrangement and sticky header
    /// survive only when they still address existing columns.
    pub fn reset_columns(&mut self, column_count: usize) {
        self.column_widths = vec![self.config.default_column_width; column_count];
        if self
            .arrangement
            .as_ref()
            .is_some_and(|order| order.iter().any(|col| *col >= column_count))
        {
            self.arrangement = None;
        }
        if self.sticky.is_some_and(|col| col >= column_count) {
            self.sticky = None;
        }
        self.scroll = ScrollOffset::default();
    }

    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    #[must_use]
    pub fn viewport_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_scroll(&mut self, offset: ScrollOffset) {
        self.scroll = offset;
    }

    #[must_use]
    pub fn scroll(&self) -> ScrollOffset {
        self.scroll
    }

    #[must_use]
    pub fn column_width(&self, col: usize) -> u32 {
        self.column_widths
            .get(col)
            .copied()
            .unwrap_or(self.config.default_column_width)
    }

    pub fn set_column_width(&mut self, col: usize, width: u32) -> Result<(), GridError> {
        let cols = self.column_widths.len();
        let slot = self
            .column_widths
            .get_mut(col)
            .ok_or(GridError::ColumnOutOfRange { col, cols })?;
        *slot = width;
        Ok(())
    }

    /// Sets the visible column order; `None` shows every column in load order.
    /// Returns `true` when the sticky header had to be dropped.
    pub fn set_visible_columns(&mut self, order: Option<Vec<usize>>) -> Result<bool, GridError> {
        if let Some(order) = &order {
            let cols = self.column_widths.len();
            let mut seen = HashSet::with_capacity(order.len());
            for col in order {
                if *col >= cols {
                    return Err(GridError::ColumnOutOfRange { col: *col, cols });
                }
                if !seen.insert(*col) {
                    return Err(GridError::DuplicateColumn(*col));
                }
            }
        }

        self.arrangement = order;
        let sticky_hidden = self
            .sticky
            .is_some_and(|col| !self.visible_columns().contains(&col));
        if sticky_hidden {
            self.sticky = None;
        }
        Ok(sticky_hidden)
    }

    #[must_use]
    pub fn visible_columns(&self) -> Vec<usize> {
        self.arrangement
            .clone()
            .unwrap_or_else(|| (0..self.column_widths.len()).collect())
    }

    #[must_use]
    pub fn sticky_header(&self) -> Option<usize> {
        self.sticky
    }

    pub fn set_sticky_header(&mut self, col: Option<usize>) -> Result<(), GridError> {
        if let Some(col) = col {
            if !self.visible_columns().contains(&col) {
                return Err(GridError::ColumnOutOfRange {
                    col,
                    cols: self.column_widths.len(),
                });
            }
        }
        self.sticky = col;
        Ok(())
    }

    /// Columns in render order: the sticky header first, then the visible order.
    #[must_use]
    pub fn render_columns(&self) -> Vec<usize> {
        let visible = self.visible_columns();
        match self.sticky {
            Some(sticky) => std::iter::once(sticky)
                .chain(visible.into_iter().filter(|col| *col != sticky))
                .collect(),
            None => visible,
        }
    }

    fn body_height(&self) -> u64 {
        u64::from(self.height.saturating_sub(self.config.header_height))
    }

    fn sticky_width(&self) -> u64 {
        self.sticky
            .map_or(0, |col| u64::from(self.column_width(col)))
    }

    /// Offset of a non-sticky column inside the horizontally scrolling area.
    fn scrolling_column_x(&self, col: usize) -> Option<u64> {
        let mut x = 0_u64;
        for candidate in self.visible_columns() {
            if Some(candidate) == self.sticky {
                continue;
            }
            if candidate == col {
                return Some(x);
            }
            x += u64::from(self.column_width(candidate));
        }
        None
    }

    fn scrolling_content_width(&self) -> u64 {
        self.visible_columns()
            .into_iter()
            .filter(|col| Some(*col) != self.sticky)
            .map(|col| u64::from(self.column_width(col)))
            .sum()
    }

    /// Rows to render: the visible rows plus `render_ahead` rows on each side.
    #[must_use]
    pub fn visible_row_window(&self, row_count: usize) -> Range<usize> {
        let row_height = u64::from(self.config.row_height);
        if row_height == 0 || row_count == 0 {
            return 0..row_count;
        }

        let first = usize::try_from(self.scroll.top / row_height).unwrap_or(usize::MAX);
        let last = usize::try_from((self.scroll.top + self.body_height()).div_ceil(row_height))
            .unwrap_or(usize::MAX);
        let start = first
            .saturating_sub(self.config.render_ahead)
            .min(row_count);
        let end = last
            .saturating_add(self.config.render_ahead)
            .min(row_count);
        start..end.max(start)
    }

    /// Computes the scroll offset that brings `cell` into view, aligning the
    /// requested cell edges with the matching viewport edges. Returns `None`
    /// when the cell is already fully visible. A hidden column only moves
    /// the vertical offset.
    pub fn scroll_to_cell(
        &mut self,
        horizontal: HorizontalEdge,
        vertical: VerticalEdge,
        cell: CellAddress,
        row_count: usize,
    ) -> Option<ScrollOffset> {
        let mut target = self.scroll;

        let row_height = u64::from(self.config.row_height);
        let body_height = self.body_height();
        let cell_top = cell.row as u64 * row_height;
        let cell_bottom = cell_top + row_height;
        if cell_top < target.top || cell_bottom > target.top + body_height {
            target.top = match vertical {
                VerticalEdge::Top => cell_top,
                VerticalEdge::Bottom => cell_bottom.saturating_sub(body_height),
            };
        }
        let max_top = (row_count as u64 * row_height).saturating_sub(body_height);
        target.top = target.top.min(max_top);

        let scrolling_x = if Some(cell.col) == self.sticky {
            None
        } else {
            self.scrolling_column_x(cell.col)
        };
        if let Some(cell_left) = scrolling_x {
            let cell_right = cell_left + u64::from(self.column_width(cell.col));
            let area = u64::from(self.width).saturating_sub(self.sticky_width());
            if cell_left < target.left || cell_right > target.left + area {
                target.left = match horizontal {
                    HorizontalEdge::Left => cell_left,
                    HorizontalEdge::Right => cell_right.saturating_sub(area),
                };
            }
            let max_left = self.scrolling_content_width().saturating_sub(area);
            target.left = target.left.min(max_left);
        }

        if target == self.scroll {
            return None;
        }
        self.scroll = target;
        Some(target)
    }
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}
