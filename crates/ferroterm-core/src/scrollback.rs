//! Scrollback view navigation over the grid ring.
//!
//! Scrollback is not a separate buffer: it is the ring slots behind the live
//! screen. Navigation moves the grid's view index between the oldest stored
//! line and the live screen; shell-integration prompt markers give jump
//! targets.

use crate::grid::Grid;

impl Grid {
    /// How many lines the view is scrolled back from the live screen.
    #[must_use]
    pub fn view_distance(&self) -> usize {
        let cap = self.capacity();
        (self.offset() + cap - self.view()) % cap
    }

    /// Whether the view shows the live screen.
    #[must_use]
    pub fn view_at_bottom(&self) -> bool {
        self.view() == self.offset()
    }

    /// Absolute line number of the top displayed row.
    #[must_use]
    pub fn view_top_line(&self) -> usize {
        self.history() - self.view_distance()
    }

    /// Scroll the view back by up to `n` lines. Returns the lines moved.
    pub fn view_up(&mut self, n: usize) -> usize {
        let moved = n.min(self.history() - self.view_distance());
        if moved > 0 {
            let cap = self.capacity();
            self.set_view((self.view() + cap - moved) % cap);
        }
        moved
    }

    /// Scroll the view toward the live screen by up to `n` lines.
    pub fn view_down(&mut self, n: usize) -> usize {
        let moved = n.min(self.view_distance());
        if moved > 0 {
            self.set_view(self.view() + moved);
        }
        moved
    }

    /// Snap the view back to the live screen.
    pub fn view_to_bottom(&mut self) {
        if !self.view_at_bottom() {
            self.set_view(self.offset());
        }
    }

    /// Scroll so the nearest prompt line above the current view top becomes
    /// the top row. Returns `false` when there is none.
    pub fn jump_to_prev_prompt(&mut self) -> bool {
        let top = self.view_top_line();
        let Some(target) = (0..top)
            .rev()
            .find(|&line| self.line(line).is_some_and(|r| r.prompt_marker))
        else {
            return false;
        };
        self.view_up(top - target);
        true
    }

    /// Scroll so the nearest prompt line below the current view top becomes
    /// the top row, or to the live screen when it lies there.
    pub fn jump_to_next_prompt(&mut self) -> bool {
        let top = self.view_top_line();
        let Some(target) = (top + 1..self.total_lines())
            .find(|&line| self.line(line).is_some_and(|r| r.prompt_marker))
        else {
            return false;
        };
        let wanted = target - top;
        self.view_down(wanted);
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::cell::{Color, SgrAttrs};
    use crate::grid::Grid;

    fn push_lines(grid: &mut Grid, n: usize) {
        for i in 0..n {
            let last = grid.rows() - 1;
            let ch = char::from(b'a' + (i % 26) as u8);
            grid.write_cell(last, 0, ch as u32, 1, SgrAttrs::default(), 0);
            grid.scroll_up(1, Color::Default);
        }
    }

    #[test]
    fn view_up_is_bounded_by_history() {
        let mut grid = Grid::new(4, 3, 16);
        push_lines(&mut grid, 5);
        assert_eq!(grid.history(), 5);
        assert_eq!(grid.view_up(100), 5);
        assert_eq!(grid.view_distance(), 5);
        assert_eq!(grid.view_top_line(), 0);
        assert_eq!(grid.view_up(1), 0);
    }

    #[test]
    fn view_down_and_bottom() {
        let mut grid = Grid::new(4, 3, 16);
        push_lines(&mut grid, 5);
        grid.view_up(4);
        assert_eq!(grid.view_down(1), 1);
        assert_eq!(grid.view_distance(), 3);
        grid.view_to_bottom();
        assert!(grid.view_at_bottom());
        assert_eq!(grid.view_down(3), 0);
    }

    #[test]
    fn visible_rows_follow_view() {
        let mut grid = Grid::new(4, 2, 16);
        push_lines(&mut grid, 3);
        grid.view_up(3);
        let first = grid.visible_rows().next().unwrap();
        // Lines were written on the bottom row before scrolling, so the
        // oldest history line is the blank top row from before the first write.
        assert_eq!(first.cells()[0].char(), Some(' '));
        grid.view_down(1);
        let first = grid.visible_rows().next().unwrap();
        assert_eq!(first.cells()[0].char(), Some('a'));
    }

    #[test]
    fn prompt_jumps() {
        let mut grid = Grid::new(4, 2, 16);
        push_lines(&mut grid, 6);
        grid.line_mut(1).unwrap().prompt_marker = true;
        grid.line_mut(4).unwrap().prompt_marker = true;

        // Top is line 6 (the live screen).
        assert!(grid.jump_to_prev_prompt());
        assert_eq!(grid.view_top_line(), 4);
        assert!(grid.jump_to_prev_prompt());
        assert_eq!(grid.view_top_line(), 1);
        assert!(!grid.jump_to_prev_prompt());

        assert!(grid.jump_to_next_prompt());
        assert_eq!(grid.view_top_line(), 4);
        assert!(!grid.jump_to_next_prompt());
    }
}
