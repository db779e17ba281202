#![forbid(unsafe_code)]
//! Selection model and text extraction over the grid ring.
//!
//! Coordinates are absolute lines: `0..history` are scrollback lines (oldest
//! first), followed by the screen rows. Cluster keys are expanded through the
//! grapheme table, so extracted text contains every code point of a cluster.

use crate::cell::Cell;
use crate::grapheme::GraphemeTable;
use crate::grid::Grid;

/// A cell position in the combined buffer (scrollback + screen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferPos {
    pub line: usize,
    pub col: u16,
}

impl BufferPos {
    #[must_use]
    pub const fn new(line: usize, col: u16) -> Self {
        Self { line, col }
    }

    /// Convert a screen `(row, col)` into a combined-buffer position.
    #[must_use]
    pub fn from_screen(grid: &Grid, row: u16, col: u16) -> Self {
        Self {
            line: grid.history() + row as usize,
            col,
        }
    }
}

/// Inclusive selection over the combined buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: BufferPos,
    pub end: BufferPos,
}

impl Selection {
    #[must_use]
    pub const fn new(start: BufferPos, end: BufferPos) -> Self {
        Self { start, end }
    }

    /// Order start before end.
    #[must_use]
    pub fn normalized(self) -> Self {
        if (self.start.line, self.start.col) <= (self.end.line, self.end.col) {
            self
        } else {
            Self {
                start: self.end,
                end: self.start,
            }
        }
    }

    /// Select the whole line.
    #[must_use]
    pub fn line_at(line: usize, grid: &Grid) -> Self {
        let line = line.min(grid.total_lines().saturating_sub(1));
        Self::new(
            BufferPos::new(line, 0),
            BufferPos::new(line, grid.cols().saturating_sub(1)),
        )
    }

    /// Select the run of same-class characters around `pos`.
    ///
    /// Word characters are tuned for code and paths: alphanumerics plus
    /// `_ - . / \ : @`.
    #[must_use]
    pub fn word_at(pos: BufferPos, grid: &Grid) -> Self {
        let cols = grid.cols();
        let line = pos.line.min(grid.total_lines().saturating_sub(1));
        let col = normalize_to_wide_lead(grid, line, pos.col.min(cols.saturating_sub(1)));
        let class = cell_class(grid, line, col);

        let mut start_col = col;
        while start_col > 0 {
            let probe = normalize_to_wide_lead(grid, line, start_col - 1);
            if cell_class(grid, line, probe) != class {
                break;
            }
            start_col = probe;
        }

        let mut end_col = wide_end_col(grid, line, col);
        while end_col + 1 < cols {
            let next = end_col + 1;
            if cell_class(grid, line, next) != class {
                break;
            }
            end_col = wide_end_col(grid, line, next);
        }

        Self::new(
            BufferPos::new(line, start_col),
            BufferPos::new(line, end_col),
        )
    }

    /// Extract the selected text.
    ///
    /// - Wide continuation cells are skipped.
    /// - Trailing spaces on each emitted line are trimmed.
    /// - A soft-wrapped line is joined to the next without a newline.
    #[must_use]
    pub fn extract_text(&self, grid: &Grid, graphemes: &GraphemeTable) -> String {
        let total = grid.total_lines();
        if total == 0 {
            return String::new();
        }
        let cols = grid.cols();
        let sel = self.normalized();
        let start_line = sel.start.line.min(total - 1);
        let end_line = sel.end.line.min(total - 1);

        let mut out = String::new();
        for line in start_line..=end_line {
            let Some(row) = grid.line(line) else {
                break;
            };
            let sc = if line == start_line {
                sel.start.col.min(cols.saturating_sub(1))
            } else {
                0
            };
            let ec = if line == end_line {
                sel.end.col.min(cols.saturating_sub(1))
            } else {
                cols.saturating_sub(1)
            };

            let mut line_buf = String::new();
            if sc <= ec {
                for cell in &row.cells()[sc as usize..=ec as usize] {
                    if cell.is_wide_continuation() {
                        continue;
                    }
                    graphemes.push_text(cell.key(), &mut line_buf);
                }
            }
            if !row.wrapped || line == end_line {
                trim_trailing_spaces(&mut line_buf);
            }
            out.push_str(&line_buf);

            if line != end_line && !row.wrapped {
                out.push('\n');
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Word,
    Whitespace,
    Other,
}

fn classify_char(ch: char) -> CharClass {
    if ch.is_whitespace() {
        CharClass::Whitespace
    } else if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/' | '\\' | ':' | '@') {
        CharClass::Word
    } else {
        CharClass::Other
    }
}

fn trim_trailing_spaces(s: &mut String) {
    let len = s.trim_end_matches(' ').len();
    s.truncate(len);
}

fn cell_at(grid: &Grid, line: usize, col: u16) -> Option<&Cell> {
    grid.line(line)?.cells().get(col as usize)
}

/// Clusters count as word characters.
fn cell_class(grid: &Grid, line: usize, col: u16) -> CharClass {
    match cell_at(grid, line, col) {
        Some(cell) if cell.is_cluster() => CharClass::Word,
        Some(cell) => classify_char(cell.char().unwrap_or(' ')),
        None => CharClass::Whitespace,
    }
}

fn normalize_to_wide_lead(grid: &Grid, line: usize, col: u16) -> u16 {
    match cell_at(grid, line, col) {
        Some(cell) if col > 0 && cell.is_wide_continuation() => col - 1,
        _ => col,
    }
}

fn wide_end_col(grid: &Grid, line: usize, lead: u16) -> u16 {
    match cell_at(grid, line, lead) {
        Some(cell) if cell.is_wide() => (lead + 1).min(grid.cols() - 1),
        _ => lead,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Color, SgrAttrs};
    use crate::grapheme::GraphemeWidthMethod;

    fn grid_from_lines(cols: u16, lines: &[&str]) -> Grid {
        let mut g = Grid::new(cols, lines.len() as u16, 16);
        for (r, text) in lines.iter().enumerate() {
            let mut c = 0u16;
            for ch in text.chars() {
                let w = Cell::display_width(ch).max(1);
                g.write_cell(r as u16, c, ch as u32, w, SgrAttrs::default(), 0);
                c += w as u16;
            }
        }
        g
    }

    #[test]
    fn extract_spans_lines_with_newlines() {
        let grid = grid_from_lines(10, &["aa", "bb", "cc"]);
        let sel = Selection::new(BufferPos::new(0, 0), BufferPos::new(2, 1));
        assert_eq!(sel.extract_text(&grid, &GraphemeTable::new()), "aa\nbb\ncc");
    }

    #[test]
    fn extract_joins_soft_wrapped_rows() {
        let mut grid = grid_from_lines(3, &["foo", "bar"]);
        grid.row_mut(0).unwrap().wrapped = true;
        let sel = Selection::new(BufferPos::new(0, 0), BufferPos::new(1, 2));
        assert_eq!(sel.extract_text(&grid, &GraphemeTable::new()), "foobar");
    }

    #[test]
    fn extract_reaches_into_scrollback() {
        let mut grid = grid_from_lines(5, &["top", "mid"]);
        grid.scroll_up(1, Color::Default);
        assert_eq!(grid.history(), 1);
        let sel = Selection::line_at(0, &grid);
        assert_eq!(sel.extract_text(&grid, &GraphemeTable::new()), "top");
        let start = BufferPos::from_screen(&grid, 0, 0);
        assert_eq!(start.line, 1);
    }

    #[test]
    fn wide_chars_appear_once() {
        let grid = grid_from_lines(10, &["a中b"]);
        let sel = Selection::line_at(0, &grid);
        assert_eq!(sel.extract_text(&grid, &GraphemeTable::new()), "a中b");
    }

    #[test]
    fn clusters_expand_to_all_code_points() {
        let mut table = GraphemeTable::new();
        let (key, _) = table
            .append('e' as u32, '\u{301}', GraphemeWidthMethod::Double)
            .unwrap();
        let mut grid = grid_from_lines(4, &["x"]);
        grid.write_cell(0, 1, key, 1, SgrAttrs::default(), 0);
        let sel = Selection::line_at(0, &grid);
        assert_eq!(sel.extract_text(&grid, &table), "xe\u{301}");
    }

    #[test]
    fn reversed_selection_is_normalized() {
        let grid = grid_from_lines(10, &["hello"]);
        let sel = Selection::new(BufferPos::new(0, 3), BufferPos::new(0, 1));
        assert_eq!(sel.extract_text(&grid, &GraphemeTable::new()), "ell");
    }

    #[test]
    fn word_selection_is_tuned_for_paths() {
        let grid = grid_from_lines(40, &["foo-bar/baz qux"]);
        let sel = Selection::word_at(BufferPos::new(0, 4), &grid);
        assert_eq!(sel.extract_text(&grid, &GraphemeTable::new()), "foo-bar/baz");
    }

    #[test]
    fn word_selection_stops_at_whitespace() {
        let grid = grid_from_lines(40, &["abc def"]);
        let sel = Selection::word_at(BufferPos::new(0, 5), &grid);
        assert_eq!(sel.extract_text(&grid, &GraphemeTable::new()), "def");
    }

    #[test]
    fn word_selection_clamps_past_the_right_edge() {
        let grid = grid_from_lines(1, &["x"]);
        let sel = Selection::word_at(BufferPos::new(0, 9), &grid);
        assert_eq!(sel.extract_text(&grid, &GraphemeTable::new()), "x");
    }
}
