//! Terminal grid: a ring of rows holding the screen and its scrollback.
//!
//! The ring has a fixed capacity. The live screen is the `rows` consecutive
//! ring slots starting at `offset`; the slots behind it hold scrollback, up to
//! `capacity - rows` of them. Scrolling the full screen advances `offset`
//! instead of moving rows, and a partial scroll region swaps rows in place, so
//! cell storage is never copied by a scroll.
//!
//! Coordinates passed to grid methods are screen-relative (`0..rows`) unless a
//! method says otherwise. "Absolute" line numbers count from the oldest
//! scrollback line (0) to the bottom of the screen.

use crate::cell::{Cell, Color, HyperlinkId, SgrAttrs};
use crate::charset::Charsets;

/// Which screen a grid backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Primary,
    Alternate,
}

/// Cursor position on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
    /// Set after printing into the last column with autowrap on: the next
    /// printable wraps first.
    pub pending_wrap: bool,
}

/// State saved by DECSC and restored by DECRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SavedCursor {
    pub cursor: Cursor,
    pub attrs: SgrAttrs,
    pub charsets: Charsets,
    pub origin: bool,
    pub autowrap: bool,
}

/// Scroll region in screen rows, `bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRegion {
    pub top: u16,
    pub bottom: u16,
}

impl ScrollRegion {
    pub fn full(rows: u16) -> Self {
        Self {
            top: 0,
            bottom: rows,
        }
    }

    pub fn is_full(&self, rows: u16) -> bool {
        self.top == 0 && self.bottom == rows
    }

    pub fn contains(&self, row: u16) -> bool {
        row >= self.top && row < self.bottom
    }
}

/// A single row of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    cells: Vec<Cell>,
    seq: u64,
    /// Changed since the last frame.
    pub dirty: bool,
    /// Set by OSC 133;A on the row where a shell prompt starts.
    pub prompt_marker: bool,
    /// The text of this row continues on the next row (soft wrap).
    pub wrapped: bool,
}

impl Row {
    fn blank(cols: u16, seq: u64) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            seq,
            dirty: true,
            prompt_marker: false,
            wrapped: false,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        self.dirty = true;
        &mut self.cells
    }

    /// Sequence number assigned when the row was last recycled or reflowed.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether the row holds nothing but default blank cells.
    pub fn is_blank(&self) -> bool {
        !self.wrapped
            && self
                .cells
                .iter()
                .all(|c| c.is_blank() && c.attrs.bg == Color::Default)
    }

    fn reset(&mut self, bg: Color, seq: u64) {
        for cell in &mut self.cells {
            cell.erase(bg);
        }
        self.seq = seq;
        self.dirty = true;
        self.prompt_marker = false;
        self.wrapped = false;
    }

    /// Erase `[start, end)`, repairing wide glyphs cut by either edge.
    fn erase_range(&mut self, start: usize, end: usize, bg: Color) {
        let cols = self.cells.len();
        let start = start.min(cols);
        let end = end.min(cols);
        if start >= end {
            return;
        }
        if start > 0 && self.cells[start].is_wide_continuation() {
            let head_bg = self.cells[start - 1].attrs.bg;
            self.cells[start - 1].erase(head_bg);
        }
        if end < cols && self.cells[end].is_wide_continuation() {
            let cont_bg = self.cells[end].attrs.bg;
            self.cells[end].erase(cont_bg);
        }
        for cell in &mut self.cells[start..end] {
            cell.erase(bg);
        }
        self.dirty = true;
    }
}

/// Ring-backed terminal grid.
#[derive(Debug, Clone)]
pub struct Grid {
    kind: ScreenKind,
    rows: Vec<Row>,
    cols: u16,
    screen_rows: u16,
    /// Ring index of screen row 0.
    offset: usize,
    /// Ring index of the first displayed row. Equals `offset` unless the
    /// user scrolled back.
    view: usize,
    /// Valid scrollback rows behind `offset`.
    history: usize,
    scrollback_lines: usize,
    region: ScrollRegion,
    pub cursor: Cursor,
    pub saved: SavedCursor,
    next_seq: u64,
}

impl Grid {
    /// Create a primary grid with room for `scrollback_lines` of history.
    ///
    /// Capacity is rounded up to a power of two.
    pub fn new(cols: u16, rows: u16, scrollback_lines: usize) -> Self {
        Self::with_kind(ScreenKind::Primary, cols, rows, scrollback_lines)
    }

    /// Create an alternate grid: capacity equals the screen height.
    pub fn new_alternate(cols: u16, rows: u16) -> Self {
        Self::with_kind(ScreenKind::Alternate, cols, rows, 0)
    }

    fn with_kind(kind: ScreenKind, cols: u16, rows: u16, scrollback_lines: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let capacity = Self::capacity_for(kind, rows, scrollback_lines);
        let mut grid = Self {
            kind,
            rows: Vec::with_capacity(capacity),
            cols,
            screen_rows: rows,
            offset: 0,
            view: 0,
            history: 0,
            scrollback_lines,
            region: ScrollRegion::full(rows),
            cursor: Cursor::default(),
            saved: SavedCursor {
                autowrap: true,
                ..SavedCursor::default()
            },
            next_seq: 0,
        };
        for _ in 0..capacity {
            let seq = grid.bump_seq();
            grid.rows.push(Row::blank(cols, seq));
        }
        grid
    }

    fn capacity_for(kind: ScreenKind, rows: u16, scrollback_lines: usize) -> usize {
        match kind {
            ScreenKind::Primary => (scrollback_lines + rows as usize).next_power_of_two(),
            ScreenKind::Alternate => rows as usize,
        }
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn kind(&self) -> ScreenKind {
        self.kind
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Visible screen height.
    pub fn rows(&self) -> u16 {
        self.screen_rows
    }

    /// Total ring capacity (screen + scrollback slots).
    pub fn capacity(&self) -> usize {
        self.rows.len()
    }

    /// Ring index of screen row 0.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Ring index of the first displayed row.
    pub fn view(&self) -> usize {
        self.view
    }

    pub(crate) fn set_view(&mut self, view: usize) {
        self.view = view % self.capacity();
        self.mark_all_dirty();
    }

    /// Number of rows currently held in scrollback.
    pub fn history(&self) -> usize {
        self.history
    }

    fn ring_index(&self, screen_row: u16) -> usize {
        (self.offset + screen_row as usize) % self.capacity()
    }

    /// Ring index of an absolute line number.
    pub(crate) fn abs_index(&self, line: usize) -> usize {
        let cap = self.capacity();
        (self.offset + cap - self.history + line) % cap
    }

    // ── Row and cell access ─────────────────────────────────────────

    /// A screen row.
    pub fn row(&self, row: u16) -> Option<&Row> {
        (row < self.screen_rows).then(|| &self.rows[self.ring_index(row)])
    }

    /// A screen row, marked dirty.
    pub fn row_mut(&mut self, row: u16) -> Option<&mut Row> {
        if row >= self.screen_rows {
            return None;
        }
        let idx = self.ring_index(row);
        let r = &mut self.rows[idx];
        r.dirty = true;
        Some(r)
    }

    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.row(row)?.cells.get(col as usize)
    }

    pub fn cell_mut(&mut self, row: u16, col: u16) -> Option<&mut Cell> {
        self.row_mut(row)?.cells.get_mut(col as usize)
    }

    /// Scrollback lines plus screen rows.
    pub fn total_lines(&self) -> usize {
        self.history + self.screen_rows as usize
    }

    /// A line by absolute number: 0 is the oldest scrollback line.
    pub fn line(&self, line: usize) -> Option<&Row> {
        (line < self.total_lines()).then(|| &self.rows[self.abs_index(line)])
    }

    pub(crate) fn line_mut(&mut self, line: usize) -> Option<&mut Row> {
        if line >= self.total_lines() {
            return None;
        }
        let idx = self.abs_index(line);
        Some(&mut self.rows[idx])
    }

    /// Rows currently displayed, top to bottom (follows the scrollback view).
    pub fn visible_rows(&self) -> impl Iterator<Item = &Row> + '_ {
        let cap = self.capacity();
        (0..self.screen_rows as usize).map(move |r| &self.rows[(self.view + r) % cap])
    }

    pub fn mark_all_dirty(&mut self) {
        for row in &mut self.rows {
            row.dirty = true;
        }
    }

    pub fn any_dirty(&self) -> bool {
        (0..self.screen_rows).any(|r| self.rows[self.ring_index(r)].dirty)
    }

    pub fn clear_dirty(&mut self) {
        for row in &mut self.rows {
            row.dirty = false;
        }
    }

    // ── Cursor and region ───────────────────────────────────────────

    /// Move the cursor, clamped to the screen. Clears a pending wrap.
    pub fn set_cursor(&mut self, row: u16, col: u16) {
        self.cursor = Cursor {
            row: row.min(self.screen_rows - 1),
            col: col.min(self.cols - 1),
            pending_wrap: false,
        };
    }

    pub fn scroll_region(&self) -> ScrollRegion {
        self.region
    }

    /// Set the scroll region. Invalid regions (`top >= bottom`) are ignored.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let bottom = bottom.min(self.screen_rows);
        if top < bottom {
            self.region = ScrollRegion { top, bottom };
        }
    }

    // ── Scroll operations ───────────────────────────────────────────

    /// Scroll the region up by `n` rows, exposing erased rows at its bottom.
    ///
    /// With a full-screen region the ring rotates: on the primary screen the
    /// rows scrolled off become scrollback; the alternate screen keeps none.
    /// A partial region loses the rows it scrolls out.
    pub fn scroll_up(&mut self, n: u16, bg: Color) {
        if self.region.is_full(self.screen_rows) {
            self.rotate_up(n, bg);
        } else {
            let ScrollRegion { top, bottom } = self.region;
            self.shift_up(top, bottom, n, bg);
        }
    }

    /// Scroll the region down by `n` rows, exposing erased rows at its top.
    /// Rows pushed past the bottom of the region are lost.
    pub fn scroll_down(&mut self, n: u16, bg: Color) {
        let ScrollRegion { top, bottom } = self.region;
        self.shift_down(top, bottom, n, bg);
    }

    fn rotate_up(&mut self, n: u16, bg: Color) {
        let n = n.min(self.screen_rows);
        if n == 0 {
            return;
        }
        let cap = self.capacity();
        let max_history = cap - self.screen_rows as usize;
        let at_bottom = self.view == self.offset;

        for _ in 0..n {
            self.offset = (self.offset + 1) % cap;
            self.history = (self.history + 1).min(max_history);
            let exposed = self.ring_index(self.screen_rows - 1);
            let seq = self.bump_seq();
            self.rows[exposed].reset(bg, seq);
        }

        if at_bottom {
            self.view = self.offset;
        } else {
            let back = (self.offset + cap - self.view) % cap;
            if back > self.history {
                self.view = (self.offset + cap - self.history) % cap;
            }
        }
        for r in 0..self.screen_rows {
            let idx = self.ring_index(r);
            self.rows[idx].dirty = true;
        }
    }

    fn shift_up(&mut self, top: u16, bottom: u16, n: u16, bg: Color) {
        let bottom = bottom.min(self.screen_rows);
        if top >= bottom || n == 0 {
            return;
        }
        let n = n.min(bottom - top);
        for r in top..bottom - n {
            let (a, b) = (self.ring_index(r), self.ring_index(r + n));
            self.rows.swap(a, b);
        }
        for r in bottom - n..bottom {
            let idx = self.ring_index(r);
            let seq = self.bump_seq();
            self.rows[idx].reset(bg, seq);
        }
        for r in top..bottom {
            let idx = self.ring_index(r);
            self.rows[idx].dirty = true;
        }
    }

    fn shift_down(&mut self, top: u16, bottom: u16, n: u16, bg: Color) {
        let bottom = bottom.min(self.screen_rows);
        if top >= bottom || n == 0 {
            return;
        }
        let n = n.min(bottom - top);
        for r in (top + n..bottom).rev() {
            let (a, b) = (self.ring_index(r), self.ring_index(r - n));
            self.rows.swap(a, b);
        }
        for r in top..top + n {
            let idx = self.ring_index(r);
            let seq = self.bump_seq();
            self.rows[idx].reset(bg, seq);
        }
        for r in top..bottom {
            let idx = self.ring_index(r);
            self.rows[idx].dirty = true;
        }
    }

    /// IL: insert `n` blank lines at the cursor row, inside the region.
    /// The cursor moves to column 0.
    pub fn insert_lines(&mut self, n: u16, bg: Color) {
        if !self.region.contains(self.cursor.row) {
            return;
        }
        self.shift_down(self.cursor.row, self.region.bottom, n, bg);
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    /// DL: delete `n` lines at the cursor row, inside the region.
    /// The cursor moves to column 0.
    pub fn delete_lines(&mut self, n: u16, bg: Color) {
        if !self.region.contains(self.cursor.row) {
            return;
        }
        self.shift_up(self.cursor.row, self.region.bottom, n, bg);
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    // ── Erase operations ────────────────────────────────────────────

    /// ED. Mode 0 erases below the cursor, 1 above, 2 the whole screen and
    /// 3 the scrollback.
    pub fn erase_display(&mut self, mode: u16, bg: Color) {
        let Cursor { row, col, .. } = self.cursor;
        match mode {
            0 => {
                self.erase_in_row(row, col, self.cols, bg);
                self.clear_wrap(row);
                for r in row + 1..self.screen_rows {
                    self.erase_full_row(r, bg);
                }
            }
            1 => {
                for r in 0..row {
                    self.erase_full_row(r, bg);
                }
                self.erase_in_row(row, 0, col + 1, bg);
            }
            2 => {
                for r in 0..self.screen_rows {
                    self.erase_full_row(r, bg);
                }
            }
            3 => self.erase_scrollback(),
            _ => tracing::debug!(mode, "unknown ED mode"),
        }
    }

    /// EL. Mode 0 erases right of the cursor, 1 left of it, 2 the whole line.
    pub fn erase_line(&mut self, mode: u16, bg: Color) {
        let Cursor { row, col, .. } = self.cursor;
        match mode {
            0 => {
                self.erase_in_row(row, col, self.cols, bg);
                self.clear_wrap(row);
            }
            1 => self.erase_in_row(row, 0, col + 1, bg),
            2 => self.erase_full_row(row, bg),
            _ => tracing::debug!(mode, "unknown EL mode"),
        }
    }

    /// ECH: erase `n` cells starting at the cursor without moving anything.
    pub fn erase_chars(&mut self, n: u16, bg: Color) {
        let Cursor { row, col, .. } = self.cursor;
        let end = col.saturating_add(n.max(1)).min(self.cols);
        self.erase_in_row(row, col, end, bg);
    }

    /// Drop every scrollback line (ED 3).
    pub fn erase_scrollback(&mut self) {
        let cap = self.capacity();
        for line in 0..self.history {
            let idx = (self.offset + cap - self.history + line) % cap;
            let seq = self.bump_seq();
            self.rows[idx].reset(Color::Default, seq);
        }
        self.history = 0;
        self.view = self.offset;
    }

    fn erase_in_row(&mut self, row: u16, start: u16, end: u16, bg: Color) {
        if let Some(r) = self.row_mut(row) {
            r.erase_range(start as usize, end as usize, bg);
        }
    }

    fn erase_full_row(&mut self, row: u16, bg: Color) {
        if row >= self.screen_rows {
            return;
        }
        let idx = self.ring_index(row);
        let seq = self.rows[idx].seq;
        self.rows[idx].reset(bg, seq);
    }

    fn clear_wrap(&mut self, row: u16) {
        if let Some(r) = self.row_mut(row) {
            r.wrapped = false;
        }
    }

    /// Reset every row and the cursor (RIS).
    pub fn clear_all(&mut self) {
        for idx in 0..self.rows.len() {
            let seq = self.bump_seq();
            self.rows[idx].reset(Color::Default, seq);
        }
        self.history = 0;
        self.view = self.offset;
        self.region = ScrollRegion::full(self.screen_rows);
        self.cursor = Cursor::default();
        self.saved = SavedCursor {
            autowrap: true,
            ..SavedCursor::default()
        };
    }

    /// DECALN: fill the screen with `ch` in default rendition.
    pub fn fill(&mut self, ch: char) {
        for r in 0..self.screen_rows {
            if let Some(row) = self.row_mut(r) {
                row.wrapped = false;
                for cell in &mut row.cells {
                    *cell = Cell::new(ch);
                }
            }
        }
    }

    // ── Insert / delete characters ──────────────────────────────────

    /// ICH: insert `n` blank cells at the cursor, shifting the rest of the
    /// row right. Cells pushed past the right margin are lost.
    pub fn insert_chars(&mut self, n: u16, bg: Color) {
        let Cursor { row, col, .. } = self.cursor;
        let cols = self.cols as usize;
        let c = col as usize;
        let Some(r) = self.row_mut(row) else {
            return;
        };
        if c >= cols || n == 0 {
            return;
        }
        let n = (n as usize).min(cols - c);
        let cells = &mut r.cells;

        let was_continuation = cells[c].is_wide_continuation();
        if was_continuation && c > 0 {
            cells[c - 1].erase(bg);
        }
        cells[c..].rotate_right(n);
        for cell in &mut cells[c..c + n] {
            cell.erase(bg);
        }
        if was_continuation && c + n < cols && cells[c + n].is_wide_continuation() {
            cells[c + n].erase(bg);
        }
        if cells[cols - 1].is_wide() {
            cells[cols - 1].erase(bg);
        }
    }

    /// DCH: delete `n` cells at the cursor, shifting the rest left and
    /// filling the right margin with blanks.
    pub fn delete_chars(&mut self, n: u16, bg: Color) {
        let Cursor { row, col, .. } = self.cursor;
        let cols = self.cols as usize;
        let c = col as usize;
        let Some(r) = self.row_mut(row) else {
            return;
        };
        if c >= cols || n == 0 {
            return;
        }
        let n = (n as usize).min(cols - c);
        let cells = &mut r.cells;

        if cells[c].is_wide_continuation() && c > 0 {
            cells[c - 1].erase(bg);
        }
        cells[c..].rotate_left(n);
        for cell in &mut cells[cols - n..] {
            cell.erase(bg);
        }
        if cells[c].is_wide_continuation() {
            cells[c].erase(bg);
        }
    }

    // ── Writing cells ───────────────────────────────────────────────

    /// Write a key of width 1 or 2 at `(row, col)`.
    ///
    /// Wide glyphs partially overwritten by the write are erased. A wide
    /// write that does not fit before the right margin returns `false` and
    /// leaves the row unchanged.
    pub fn write_cell(
        &mut self,
        row: u16,
        col: u16,
        key: u32,
        width: u8,
        attrs: SgrAttrs,
        hyperlink: HyperlinkId,
    ) -> bool {
        let cols = self.cols as usize;
        let c = col as usize;
        let width = width.clamp(1, 2);
        if c >= cols || (width == 2 && c + 1 >= cols) {
            return false;
        }
        let Some(r) = self.row_mut(row) else {
            return false;
        };
        let cells = &mut r.cells;

        Self::split_wide_at(cells, c);
        if width == 2 {
            Self::split_wide_at(cells, c + 1);
        }

        let mut head = Cell::with_key(key, width, attrs);
        head.hyperlink = hyperlink;
        cells[c] = head;
        if width == 2 {
            let mut cont = Cell::continuation(attrs);
            cont.hyperlink = hyperlink;
            cells[c + 1] = cont;
        }
        true
    }

    /// Erase the other half of any wide glyph that covers column `c`.
    fn split_wide_at(cells: &mut [Cell], c: usize) {
        if cells[c].is_wide_continuation() && c > 0 {
            let bg = cells[c - 1].attrs.bg;
            cells[c - 1].erase(bg);
        }
        if cells[c].is_wide() && c + 1 < cells.len() {
            let bg = cells[c + 1].attrs.bg;
            cells[c + 1].erase(bg);
        }
    }

    /// Replace the key of an existing cell after grapheme composition.
    ///
    /// Growing to width 2 claims the next column when it exists; at the right
    /// margin the cell stays narrow. Returns the width actually applied.
    pub fn set_cluster(&mut self, row: u16, col: u16, key: u32, width: u8) -> u8 {
        let cols = self.cols as usize;
        let c = col as usize;
        let Some(r) = self.row_mut(row) else {
            return 0;
        };
        let Some(cell) = r.cells.get(c).copied() else {
            return 0;
        };
        let width = if width >= 2 && c + 1 < cols { 2 } else { 1 };
        if width == 2 && !cell.is_wide() {
            Self::split_wide_at(&mut r.cells, c + 1);
            let mut cont = Cell::continuation(cell.attrs);
            cont.hyperlink = cell.hyperlink;
            r.cells[c + 1] = cont;
        }
        let width = if cell.is_wide() { 2 } else { width };
        r.cells[c].set_key(key, width);
        width
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Resize the screen.
    ///
    /// With `reflow`, soft-wrapped rows are joined into logical lines and
    /// re-split at the new width; otherwise rows are truncated or padded.
    /// Blank rows below the cursor are dropped first, then the bottom `rows`
    /// rows become the screen and the rest scrollback.
    pub fn resize(&mut self, rows: u16, cols: u16, reflow: bool) {
        let rows = rows.max(1);
        let cols = cols.max(1);
        if rows == self.screen_rows && cols == self.cols {
            return;
        }

        let total = self.total_lines();
        let cursor_line = self.history + self.cursor.row as usize;
        let cursor_col = self.cursor.col as usize;

        let old: Vec<Row> = (0..total)
            .map(|line| {
                let idx = self.abs_index(line);
                std::mem::replace(&mut self.rows[idx], Row::blank(0, 0))
            })
            .collect();

        let (mut lines, cursor_pos) = if reflow && cols != self.cols {
            reflow_rows(old, cols, cursor_line, cursor_col)
        } else {
            let lines: Vec<Row> = old
                .into_iter()
                .map(|mut row| {
                    fit_row(&mut row.cells, cols);
                    row
                })
                .collect();
            (lines, (cursor_line, cursor_col.min(cols as usize - 1)))
        };
        let (mut cursor_line, cursor_col) = cursor_pos;

        while lines.len() > cursor_line + 1 && lines.last().is_some_and(Row::is_blank) {
            lines.pop();
        }
        while lines.len() < rows as usize {
            lines.push(Row::blank(cols, 0));
        }
        if lines.len() > cursor_line + rows as usize {
            // Cursor would fall above the screen: drop rows below it.
            lines.truncate(cursor_line + rows as usize);
        }

        let capacity = Self::capacity_for(self.kind, rows, self.scrollback_lines);
        let max_history = capacity - rows as usize;
        let mut history = lines.len() - rows as usize;
        if history > max_history {
            let drop = history - max_history;
            lines.drain(..drop);
            cursor_line -= drop;
            history = max_history;
        }

        self.rows = Vec::with_capacity(capacity);
        for mut row in lines {
            row.seq = self.bump_seq();
            row.dirty = true;
            self.rows.push(row);
        }
        while self.rows.len() < capacity {
            let seq = self.bump_seq();
            self.rows.push(Row::blank(cols, seq));
        }

        self.cols = cols;
        self.screen_rows = rows;
        self.history = history;
        self.offset = history % capacity;
        self.view = self.offset;
        self.region = ScrollRegion::full(rows);
        self.cursor = Cursor {
            row: (cursor_line - history) as u16,
            col: cursor_col.min(cols as usize - 1) as u16,
            pending_wrap: false,
        };
        self.saved.cursor.row = self.saved.cursor.row.min(rows - 1);
        self.saved.cursor.col = self.saved.cursor.col.min(cols - 1);
        self.saved.cursor.pending_wrap = false;
    }
}

/// Truncate or pad a row to `cols`, dropping a wide head cut in half.
fn fit_row(cells: &mut Vec<Cell>, cols: u16) {
    let cols = cols as usize;
    if cells.len() > cols {
        cells.truncate(cols);
        if let Some(last) = cells.last_mut()
            && last.is_wide()
        {
            let bg = last.attrs.bg;
            last.erase(bg);
        }
    } else {
        cells.resize(cols, Cell::default());
    }
}

/// Join soft-wrapped rows into logical lines and re-split them at `cols`.
///
/// Returns the new rows and the cursor's new `(line, col)`.
fn reflow_rows(
    old: Vec<Row>,
    cols: u16,
    cursor_line: usize,
    cursor_col: usize,
) -> (Vec<Row>, (usize, usize)) {
    let cols = cols as usize;
    let mut out: Vec<Row> = Vec::with_capacity(old.len());
    let mut cursor = (0, 0);

    let mut logical: Vec<Cell> = Vec::new();
    let mut prompt = false;
    let mut cursor_off: Option<usize> = None;

    for (line_no, row) in old.into_iter().enumerate() {
        if logical.is_empty() && cursor_off.is_none() {
            prompt = row.prompt_marker;
        }
        if line_no == cursor_line {
            cursor_off = Some(logical.len() + cursor_col);
        }
        let wrapped = row.wrapped;
        logical.extend(row.cells);
        if wrapped {
            continue;
        }

        let keep = cursor_off.map_or(0, |off| off + 1);
        while logical.len() > keep
            && logical
                .last()
                .is_some_and(|c| c.is_blank() && c.attrs.bg == Color::Default)
        {
            logical.pop();
        }

        let first = out.len();
        let pos = split_line(&logical, cols, cursor_off, &mut out);
        if let Some(pos) = pos {
            cursor = pos;
        }
        if let Some(row) = out.get_mut(first) {
            row.prompt_marker = prompt;
        }
        logical.clear();
        cursor_off = None;
        prompt = false;
    }

    // A trailing wrapped row with no terminator.
    if !logical.is_empty() || cursor_off.is_some() {
        if let Some(pos) = split_line(&logical, cols, cursor_off, &mut out) {
            cursor = pos;
        }
    }

    (out, cursor)
}

/// Split one logical line into rows of `cols` cells, appended to `out`.
/// Returns the cursor position when `cursor_off` falls inside the line.
fn split_line(
    cells: &[Cell],
    cols: usize,
    cursor_off: Option<usize>,
    out: &mut Vec<Row>,
) -> Option<(usize, usize)> {
    let mut current: Vec<Cell> = Vec::with_capacity(cols);
    let mut cursor = None;

    let push_row = |current: &mut Vec<Cell>, out: &mut Vec<Row>, wrapped: bool| {
        let mut row = Row::blank(0, 0);
        row.cells = std::mem::take(current);
        row.cells.resize(cols, Cell::default());
        row.wrapped = wrapped;
        out.push(row);
    };

    let mut i = 0;
    while i < cells.len() {
        let cell = cells[i];
        if cell.is_wide_continuation() {
            if cursor_off == Some(i) && cursor.is_none() {
                cursor = Some((out.len(), current.len().saturating_sub(1)));
            }
            i += 1;
            continue;
        }
        let need = if cell.is_wide() && cols >= 2 { 2 } else { 1 };
        if current.len() + need > cols {
            push_row(&mut current, out, true);
        }
        if cursor_off == Some(i) {
            cursor = Some((out.len(), current.len()));
        }
        if need == 2 {
            current.push(cell);
            current.push(cells.get(i + 1).copied().unwrap_or(Cell::continuation(cell.attrs)));
            i += 2;
            if cursor_off == Some(i - 1) {
                cursor = Some((out.len(), current.len() - 1));
            }
        } else {
            let mut cell = cell;
            if cell.is_wide() {
                // One-column grid: the glyph cannot be shown.
                cell.erase(cell.attrs.bg);
                i += 2;
            } else {
                i += 1;
            }
            current.push(cell);
        }
    }
    if cursor.is_none()
        && let Some(off) = cursor_off
    {
        // Cursor past the end of content: keep its column offset.
        let extra = off.saturating_sub(cells.len());
        let mut col = current.len() + extra;
        while col >= cols {
            push_row(&mut current, out, true);
            col -= cols;
        }
        cursor = Some((out.len(), col));
    }
    push_row(&mut current, out, false);
    cursor
}
