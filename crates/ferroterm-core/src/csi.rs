//! CSI dispatch: cursor motion, erasure, editing, SGR, modes and reports.
//!
//! Dispatch keys on `(private marker, intermediates, final byte)`. Unknown
//! combinations are logged at `debug` and ignored. Replies go to the
//! terminal's reply queue in the order the sequences arrive.

use std::time::Instant;

use crate::cell::{Color, SgrFlags, UnderlineStyle};
use crate::config::CursorShape;
use crate::grapheme::GraphemeWidthMethod;
use crate::modes::{DecModes, ModeStatus};
use crate::parser::{CsiSequence, Params};
use crate::terminal::{TITLE_STACK_MAX, Terminal};

const APP_NAME: &str = "ferroterm";

impl Terminal {
    pub(crate) fn csi_dispatch(&mut self, seq: &CsiSequence, now: Instant) {
        let p = &seq.params;
        if p.overflowed() {
            tracing::debug!(sequence = %format_csi(seq), "CSI parameter overflow, ignoring");
            return;
        }

        match (seq.private, seq.intermediates.as_slice(), seq.final_byte) {
            (None, [], b'@') => {
                let bg = self.attrs.bg;
                let grid = self.grid_mut();
                grid.insert_chars(p.get(0, 1), bg);
                grid.cursor.pending_wrap = false;
            }
            (None, [], b'A') => self.cursor_up(p.get(0, 1)),
            (None, [], b'B' | b'e') => self.cursor_down(p.get(0, 1)),
            (None, [], b'C' | b'a') => self.cursor_right(p.get(0, 1)),
            (None, [], b'D') => self.cursor_left(p.get(0, 1)),
            (None, [], b'E') => {
                self.cursor_down(p.get(0, 1));
                self.carriage_return();
            }
            (None, [], b'F') => {
                self.cursor_up(p.get(0, 1));
                self.carriage_return();
            }
            (None, [], b'G' | b'`') => {
                let grid = self.grid_mut();
                let col = p.get(0, 1).min(grid.cols()) - 1;
                let row = grid.cursor.row;
                grid.set_cursor(row, col);
            }
            (None, [], b'H' | b'f') => self.goto(p.get(0, 1) - 1, p.get(1, 1) - 1),
            (None, [], b'I') => {
                let pending = self.grid().cursor.pending_wrap;
                self.tab_forward(p.get(0, 1));
                self.grid_mut().cursor.pending_wrap = pending;
            }
            (None, [], b'J') => {
                let bg = self.attrs.bg;
                let grid = self.grid_mut();
                grid.erase_display(p.raw(0), bg);
                grid.cursor.pending_wrap = false;
            }
            (None, [], b'K') => {
                let bg = self.attrs.bg;
                let grid = self.grid_mut();
                grid.erase_line(p.raw(0), bg);
                grid.cursor.pending_wrap = false;
            }
            (None, [], b'L' | b'M') => {
                let bg = self.attrs.bg;
                let grid = self.grid_mut();
                let region = grid.scroll_region();
                let row = grid.cursor.row;
                if region.contains(row) {
                    let count = p.get(0, 1).min(region.bottom - row);
                    if seq.final_byte == b'L' {
                        grid.insert_lines(count, bg);
                    } else {
                        grid.delete_lines(count, bg);
                    }
                }
            }
            (None, [], b'P') => {
                let bg = self.attrs.bg;
                let grid = self.grid_mut();
                grid.delete_chars(p.get(0, 1), bg);
                grid.cursor.pending_wrap = false;
            }
            (None, [], b'S' | b'T') => {
                let bg = self.attrs.bg;
                let grid = self.grid_mut();
                let region = grid.scroll_region();
                let amount = p.get(0, 1).min(region.bottom - region.top);
                if seq.final_byte == b'S' {
                    grid.scroll_up(amount, bg);
                } else {
                    grid.scroll_down(amount, bg);
                }
            }
            (None, [], b'X') => {
                let bg = self.attrs.bg;
                let grid = self.grid_mut();
                grid.erase_chars(p.get(0, 1), bg);
                grid.cursor.pending_wrap = false;
            }
            (None, [], b'Z') => self.tab_backward(p.get(0, 1)),
            (None, [], b'b') => self.repeat_last(p.get(0, 1)),
            (None, [], b'c') => {
                if p.raw(0) == 0 {
                    let reply = if self.config.sixel {
                        "\x1b[?62;4;22c"
                    } else {
                        "\x1b[?62;22c"
                    };
                    self.replies.push_str(reply);
                }
            }
            (None, [], b'd') => {
                let col = self.grid().cursor.col;
                self.goto(p.get(0, 1) - 1, col);
            }
            (None, [], b'g') => match p.raw(0) {
                0 => {
                    let col = self.grid().cursor.col;
                    self.tab_stops.remove(&col);
                }
                3 => self.tab_stops.clear(),
                mode => tracing::debug!(mode, "TBC: unknown mode"),
            },
            (None, [], b'h' | b'l') => {
                let enable = seq.final_byte == b'h';
                for param in p.iter() {
                    let mode = param.value();
                    if !self.modes.set_ansi(mode, enable) {
                        if enable {
                            tracing::warn!(mode, "SM with unimplemented mode");
                        } else {
                            tracing::debug!(mode, "RM with unimplemented mode");
                        }
                    }
                }
            }
            (None, [], b'm') => self.sgr(p),
            (None, [], b'n') => match p.raw(0) {
                5 => self.replies.push_str("\x1b[0n"),
                6 => {
                    let (row, col) = self.report_position();
                    self.replies.push_str(&format!("\x1b[{row};{col}R"));
                }
                status => tracing::debug!(status, "DSR: unknown status"),
            },
            (None, [], b'r') => {
                let rows = self.grid().rows();
                let top = p.get(0, 1);
                let bottom = p.get(1, rows).min(rows);
                if bottom > top {
                    self.grid_mut().set_scroll_region(top - 1, bottom);
                    self.goto(0, 0);
                }
            }
            (None, [], b's') => {
                if p.is_empty() {
                    self.save_cursor();
                } else {
                    // Left/right margins need DECLRMM, which is never set.
                    tracing::debug!(sequence = %format_csi(seq), "DECSLRM without DECLRMM");
                }
            }
            (None, [], b't') => self.window_op(p),
            (None, [], b'u') => self.restore_cursor(),

            (Some(b'?'), [], b'h' | b'l') => {
                let enable = seq.final_byte == b'h';
                for param in p.iter() {
                    self.set_dec_mode(param.value(), enable, now);
                }
            }
            (Some(b'?'), [], b's') => {
                for param in p.iter() {
                    self.xtsave(param.value());
                }
            }
            (Some(b'?'), [], b'r') => {
                for param in p.iter() {
                    self.xtrestore(param.value(), now);
                }
            }
            (Some(b'?'), [], b'n') if p.raw(0) == 6 => {
                let (row, col) = self.report_position();
                self.replies.push_str(&format!("\x1b[?{row};{col}R"));
            }
            (Some(b'?'), [b'$'], b'p') => {
                let mode = p.raw(0);
                let status = self.dec_mode_status(mode) as u8;
                self.replies.push_str(&format!("\x1b[?{mode};{status}$y"));
            }
            (None, [b'$'], b'p') => {
                let mode = p.raw(0);
                let status = self.modes.ansi_status(mode) as u8;
                self.replies.push_str(&format!("\x1b[{mode};{status}$y"));
            }
            (Some(b'>'), [], b'c') => {
                if p.raw(0) == 0 {
                    let (major, minor, patch) = version();
                    self.replies
                        .push_str(&format!("\x1b[>1;{major:02}{minor:02}{patch:02};0c"));
                }
            }
            (Some(b'>'), [], b'q') => {
                if p.raw(0) == 0 {
                    let reply = format!(
                        "\x1bP>|{APP_NAME}({})\x1b\\",
                        env!("CARGO_PKG_VERSION")
                    );
                    self.replies.push_str(&reply);
                }
            }
            (Some(b'='), [], b'c') => {
                if p.raw(0) == 0 {
                    let id: String = APP_NAME.bytes().map(|b| format!("{b:02x}")).collect();
                    self.replies.push_str(&format!("\x1bP!|{id}\x1b\\"));
                }
            }
            (None, [b' '], b'q') => self.set_cursor_style(p.raw(0)),
            (None, [b'!'], b'p') => self.soft_reset(),

            _ => tracing::debug!(sequence = %format_csi(seq), "unhandled CSI"),
        }
    }

    // ── Cursor motion ───────────────────────────────────────────────

    fn cursor_up(&mut self, n: u16) {
        let top = if self.modes.dec.contains(DecModes::ORIGIN) {
            self.grid().scroll_region().top
        } else {
            0
        };
        let grid = self.grid_mut();
        let span = grid.cursor.row.saturating_sub(top);
        let row = grid.cursor.row - n.min(span);
        let col = grid.cursor.col;
        grid.set_cursor(row, col);
    }

    fn cursor_down(&mut self, n: u16) {
        let bottom = if self.modes.dec.contains(DecModes::ORIGIN) {
            self.grid().scroll_region().bottom - 1
        } else {
            self.grid().rows() - 1
        };
        let grid = self.grid_mut();
        let span = bottom.saturating_sub(grid.cursor.row);
        let row = grid.cursor.row + n.min(span);
        let col = grid.cursor.col;
        grid.set_cursor(row, col);
    }

    fn cursor_right(&mut self, n: u16) {
        let grid = self.grid_mut();
        let row = grid.cursor.row;
        let col = grid.cursor.col.saturating_add(n);
        grid.set_cursor(row, col);
    }

    fn cursor_left(&mut self, n: u16) {
        let grid = self.grid_mut();
        let row = grid.cursor.row;
        let col = grid.cursor.col.saturating_sub(n);
        grid.set_cursor(row, col);
    }

    /// One-based cursor position for CPR, origin-relative in origin mode.
    fn report_position(&self) -> (u16, u16) {
        let grid = self.grid();
        let mut row = grid.cursor.row;
        if self.modes.dec.contains(DecModes::ORIGIN) {
            row = row.saturating_sub(grid.scroll_region().top);
        }
        (row + 1, grid.cursor.col + 1)
    }

    fn repeat_last(&mut self, count: u16) {
        let Some(ch) = self.last_printed else {
            return;
        };
        let width = crate::cell::Cell::display_width(ch);
        if width == 0 {
            return;
        }
        for _ in 0..count {
            self.print_char(ch, width);
        }
    }

    // ── SGR ─────────────────────────────────────────────────────────

    pub(crate) fn sgr(&mut self, params: &Params) {
        if params.is_empty() {
            self.attrs.reset();
            return;
        }

        let mut i = 0;
        while i < params.len() {
            let Some(param) = params.param(i) else {
                break;
            };
            let attrs = &mut self.attrs;
            let mut skip = 0;
            match param.value() {
                0 => attrs.reset(),
                1 => attrs.flags.insert(SgrFlags::BOLD),
                2 => attrs.flags.insert(SgrFlags::DIM),
                3 => attrs.flags.insert(SgrFlags::ITALIC),
                4 => match param.subs().first() {
                    None => attrs.underline = UnderlineStyle::Single,
                    Some(&n) => match UnderlineStyle::from_sgr_sub(n) {
                        Some(style) => attrs.underline = style,
                        None => tracing::debug!(style = n, "SGR: unknown underline style"),
                    },
                },
                5 => attrs.flags.insert(SgrFlags::BLINK),
                6 => tracing::debug!("SGR: ignored: rapid blink"),
                7 => attrs.flags.insert(SgrFlags::INVERSE),
                8 => attrs.flags.insert(SgrFlags::HIDDEN),
                9 => attrs.flags.insert(SgrFlags::STRIKETHROUGH),
                21 | 26 => tracing::debug!(param = param.value(), "SGR: ignored"),
                22 => attrs.flags.remove(SgrFlags::BOLD | SgrFlags::DIM),
                23 => attrs.flags.remove(SgrFlags::ITALIC),
                24 => attrs.underline = UnderlineStyle::None,
                25 => attrs.flags.remove(SgrFlags::BLINK),
                27 => attrs.flags.remove(SgrFlags::INVERSE),
                28 => attrs.flags.remove(SgrFlags::HIDDEN),
                29 => attrs.flags.remove(SgrFlags::STRIKETHROUGH),
                n @ 30..=37 => attrs.fg = Color::Named((n - 30) as u8),
                39 => attrs.fg = Color::Default,
                n @ 40..=47 => attrs.bg = Color::Named((n - 40) as u8),
                49 => attrs.bg = Color::Default,
                n @ 90..=97 => attrs.fg = Color::Named((n - 90 + 8) as u8),
                n @ 100..=107 => attrs.bg = Color::Named((n - 100 + 8) as u8),
                59 => attrs.underline_color = None,
                which @ (38 | 48 | 58) => match extended_color(params, i) {
                    Some((color, consumed)) => {
                        skip = consumed;
                        match which {
                            38 => attrs.fg = color,
                            48 => attrs.bg = color,
                            _ => attrs.underline_color = Some(color),
                        }
                    }
                    None => tracing::debug!(param = which, "SGR: unhandled color form"),
                },
                other => tracing::debug!(param = other, "SGR: unhandled parameter"),
            }
            i += 1 + skip;
        }
    }

    // ── Modes ───────────────────────────────────────────────────────

    /// DECSET / DECRST for a single mode.
    pub(crate) fn set_dec_mode(&mut self, mode: u16, enable: bool, now: Instant) {
        match mode {
            5 => {
                self.modes.dec.set(DecModes::REVERSE_VIDEO, enable);
                self.grid_mut().mark_all_dirty();
            }
            6 => {
                self.modes.dec.set(DecModes::ORIGIN, enable);
                self.goto(0, 0);
            }
            7 => {
                self.modes.dec.set(DecModes::AUTOWRAP, enable);
                self.grid_mut().cursor.pending_wrap = false;
            }
            9 | 1001 | 1005 => {
                if enable {
                    tracing::warn!(mode, "unimplemented: DEC private mode");
                }
            }
            47 | 1047 => {
                if enable {
                    self.enter_alternate_screen(false);
                } else {
                    self.leave_alternate_screen(false);
                }
            }
            1049 => {
                if enable {
                    self.enter_alternate_screen(true);
                } else {
                    self.leave_alternate_screen(true);
                }
            }
            1048 => {
                if enable {
                    self.save_cursor();
                } else {
                    self.restore_cursor();
                }
            }
            2026 => {
                if enable {
                    self.begin_sync(now);
                } else {
                    self.end_sync();
                }
            }
            _ => {
                if !self.modes.set_dec(mode, enable) {
                    if enable {
                        tracing::warn!(mode, "unimplemented: DECSET");
                    } else {
                        tracing::debug!(mode, "unimplemented: DECRST");
                    }
                }
            }
        }
    }

    /// DECRQM status for a DEC private mode.
    pub(crate) fn dec_mode_status(&self, mode: u16) -> ModeStatus {
        match mode {
            47 | 1047 | 1049 => ModeStatus::from_bool(self.is_alternate_screen()),
            2026 => ModeStatus::from_bool(self.is_syncing()),
            2027 if self.config.grapheme_width_method != GraphemeWidthMethod::Double => {
                ModeStatus::PermanentlyReset
            }
            // DECLRMM: left/right margins are not supported.
            69 => ModeStatus::PermanentlyReset,
            _ => self.modes.dec_status(mode),
        }
    }

    fn xtsave(&mut self, mode: u16) {
        if mode == 1048 {
            self.save_cursor();
            return;
        }
        match self.dec_mode_status(mode) {
            ModeStatus::Set => {
                self.xtsave.insert(mode, true);
            }
            ModeStatus::Reset => {
                self.xtsave.insert(mode, false);
            }
            _ => tracing::debug!(mode, "XTSAVE: mode cannot be saved"),
        }
    }

    fn xtrestore(&mut self, mode: u16, now: Instant) {
        if mode == 1048 {
            self.restore_cursor();
            return;
        }
        match self.xtsave.get(&mode).copied() {
            Some(enable) => self.set_dec_mode(mode, enable, now),
            None => tracing::debug!(mode, "XTRESTORE: mode was never saved"),
        }
    }

    fn set_cursor_style(&mut self, style: u16) {
        let shape = match style {
            0 => {
                self.cursor_shape = self.config.cursor_style;
                self.cursor_blink = self.config.cursor_blink;
                return;
            }
            1 | 2 => CursorShape::Block,
            3 | 4 => CursorShape::Underline,
            5 | 6 => CursorShape::Beam,
            _ => {
                tracing::debug!(style, "DECSCUSR: unknown style");
                return;
            }
        };
        self.cursor_shape = shape;
        self.cursor_blink = style & 1 == 1;
    }

    // ── Window operations ───────────────────────────────────────────

    fn window_op(&mut self, p: &Params) {
        let (cell_w, cell_h) = self.config.cell_size_px;
        let (cols, rows) = (self.cols(), self.rows());
        let op = p.raw(0);
        match op {
            11 => self.replies.push_str("\x1b[1t"),
            13 if matches!(p.raw(1), 0 | 2) => self.replies.push_str("\x1b[3;0;0t"),
            14 => {
                let height = u32::from(rows) * u32::from(cell_h);
                let width = u32::from(cols) * u32::from(cell_w);
                self.replies.push_str(&format!("\x1b[4;{height};{width}t"));
            }
            15 => self.replies.push_str("\x1b[5;0;0t"),
            16 => self.replies.push_str(&format!("\x1b[6;{cell_h};{cell_w}t")),
            18 => self.replies.push_str(&format!("\x1b[8;{rows};{cols}t")),
            19 => self.replies.push_str("\x1b[9;0;0t"),
            22 if matches!(p.raw(1), 0 | 2) => {
                if self.title_stack.len() >= TITLE_STACK_MAX {
                    self.title_stack.remove(0);
                }
                self.title_stack.push(self.title.clone());
            }
            23 if matches!(p.raw(1), 0 | 2) => {
                if let Some(title) = self.title_stack.pop() {
                    self.set_title(title);
                }
            }
            1..=10 | 20 | 21 | 24 => tracing::warn!(op, "unimplemented: window operation"),
            _ => tracing::debug!(op, "ignoring window operation"),
        }
    }
}

/// Decode the color following a `38`, `48` or `58` at index `i`. Returns the
/// color and how many extra top-level parameters it consumed.
fn extended_color(params: &Params, i: usize) -> Option<(Color, usize)> {
    let param = params.param(i)?;
    let subs = param.subs();
    let clamp = |v: u16| v.min(255) as u8;

    if !subs.is_empty() {
        return match subs {
            [5, index, ..] => Some((Color::Indexed(clamp(*index)), 0)),
            [2, _space, r, g, b, ..] => Some((Color::Rgb(clamp(*r), clamp(*g), clamp(*b)), 0)),
            [2, r, g, b] => Some((Color::Rgb(clamp(*r), clamp(*g), clamp(*b)), 0)),
            _ => None,
        };
    }

    let remaining = params.len() - i - 1;
    match params.raw(i + 1) {
        5 if remaining >= 2 => Some((Color::Indexed(clamp(params.raw(i + 2))), 2)),
        2 if remaining >= 4 => Some((
            Color::Rgb(
                clamp(params.raw(i + 2)),
                clamp(params.raw(i + 3)),
                clamp(params.raw(i + 4)),
            ),
            4,
        )),
        _ => None,
    }
}

fn version() -> (u32, u32, u32) {
    let part = |s: &str| s.parse::<u32>().unwrap_or(0);
    (
        part(env!("CARGO_PKG_VERSION_MAJOR")),
        part(env!("CARGO_PKG_VERSION_MINOR")),
        part(env!("CARGO_PKG_VERSION_PATCH")),
    )
}

fn format_csi(seq: &CsiSequence) -> String {
    let mut s = String::from("CSI ");
    if let Some(private) = seq.private {
        s.push(char::from(private));
    }
    let params: Vec<String> = seq
        .params
        .iter()
        .map(|p| {
            let mut text = p.value().to_string();
            for sub in p.subs() {
                text.push(':');
                text.push_str(&sub.to_string());
            }
            text
        })
        .collect();
    s.push_str(&params.join(";"));
    s.extend(seq.intermediates.as_slice().iter().map(|&b| char::from(b)));
    s.push(char::from(seq.final_byte));
    s
}

#[cfg(test)]
mod tests {
    use crate::cell::{Color, SgrAttrs, SgrFlags, UnderlineStyle};
    use crate::config::{CursorShape, TermConfig};
    use crate::grid::Cursor;
    use crate::terminal::Terminal;

    fn term(cols: u16, rows: u16) -> Terminal {
        Terminal::new(TermConfig::default().with_size(cols, rows))
    }

    fn replies(t: &mut Terminal, input: &str) -> String {
        t.feed_str(input);
        String::from_utf8(t.take_replies()).unwrap()
    }

    fn pos(t: &Terminal) -> (u16, u16) {
        let c = t.cursor();
        (c.row, c.col)
    }

    // ── Cursor motion ───────────────────────────────────────────────

    #[test]
    fn cup_is_one_based_and_clamped() {
        let mut t = term(10, 5);
        t.feed_str("\x1b[3;4H");
        assert_eq!(pos(&t), (2, 3));
        t.feed_str("\x1b[99;99H");
        assert_eq!(pos(&t), (4, 9));
        t.feed_str("\x1b[H");
        assert_eq!(pos(&t), (0, 0));
    }

    #[test]
    fn relative_motion_stops_at_edges() {
        let mut t = term(10, 5);
        t.feed_str("\x1b[2;2H\x1b[5A");
        assert_eq!(pos(&t), (0, 1));
        t.feed_str("\x1b[9B\x1b[20C");
        assert_eq!(pos(&t), (4, 9));
        t.feed_str("\x1b[3D");
        assert_eq!(pos(&t), (4, 6));
    }

    #[test]
    fn next_and_previous_line() {
        let mut t = term(10, 5);
        t.feed_str("\x1b[2;5H\x1b[2E");
        assert_eq!(pos(&t), (3, 0));
        t.feed_str("\x1b[5G\x1b[F");
        assert_eq!(pos(&t), (2, 0));
    }

    #[test]
    fn column_and_row_absolute() {
        let mut t = term(10, 5);
        t.feed_str("\x1b[7G");
        assert_eq!(pos(&t), (0, 6));
        t.feed_str("\x1b[3d");
        assert_eq!(pos(&t), (2, 6));
        t.feed_str("\x1b[50`");
        assert_eq!(pos(&t), (2, 9));
    }

    #[test]
    fn origin_mode_confines_cursor() {
        let mut t = term(10, 10);
        t.feed_str("\x1b[3;6r\x1b[?6h");
        assert_eq!(pos(&t), (2, 0));
        t.feed_str("\x1b[10;1H");
        assert_eq!(pos(&t), (5, 0));
        t.feed_str("\x1b[10A");
        assert_eq!(pos(&t), (2, 0));
        assert_eq!(replies(&mut t, "\x1b[2;3H\x1b[6n"), "\x1b[2;3R");
    }

    #[test]
    fn tab_stops_forward_backward_and_clear() {
        let mut t = term(30, 1);
        t.feed_str("\x1b[2I");
        assert_eq!(pos(&t), (0, 16));
        t.feed_str("\x1b[Z");
        assert_eq!(pos(&t), (0, 8));
        t.feed_str("\x1b[g\r\t");
        assert_eq!(pos(&t), (0, 16));
        t.feed_str("\x1b[3g\r\t");
        assert_eq!(pos(&t), (0, 29));
    }

    // ── Erase and edit ──────────────────────────────────────────────

    #[test]
    fn erase_in_line_and_display() {
        let mut t = term(5, 3);
        t.feed_str("abcde\r\nfghij\r\nklmno\x1b[2;3H\x1b[K");
        assert_eq!(t.row_text(1), "fg");
        t.feed_str("\x1b[1J");
        assert_eq!(t.row_text(0), "");
        assert_eq!(t.row_text(2), "klmno");
        t.feed_str("\x1b[2J");
        assert_eq!(t.row_text(2), "");
    }

    #[test]
    fn erase_uses_current_background() {
        let mut t = term(5, 1);
        t.feed_str("abc\x1b[44m\x1b[1K");
        let cell = t.grid().cell(0, 0).unwrap();
        assert_eq!(cell.attrs.bg, Color::Named(4));
    }

    #[test]
    fn insert_delete_and_erase_chars() {
        let mut t = term(6, 1);
        t.feed_str("abcdef\x1b[1;2H\x1b[2@");
        assert_eq!(t.row_text(0), "a  bcd");
        t.feed_str("\x1b[3P");
        assert_eq!(t.row_text(0), "acd");
        t.feed_str("\x1b[X");
        assert_eq!(t.row_text(0), "a d");
    }

    #[test]
    fn insert_and_delete_lines_inside_region() {
        let mut t = term(3, 4);
        t.feed_str("a\r\nb\r\nc\r\nd\x1b[2;3r\x1b[2;2H\x1b[L");
        assert_eq!(
            (0..4).map(|r| t.row_text(r)).collect::<Vec<_>>(),
            vec!["a", "", "b", "d"]
        );
        assert_eq!(pos(&t), (1, 0));
        t.feed_str("\x1b[M");
        assert_eq!(
            (0..4).map(|r| t.row_text(r)).collect::<Vec<_>>(),
            vec!["a", "b", "", "d"]
        );
    }

    #[test]
    fn scroll_up_and_down_in_region() {
        let mut t = term(3, 4);
        t.feed_str("a\r\nb\r\nc\r\nd\x1b[2;3r\x1b[S");
        assert_eq!(
            (0..4).map(|r| t.row_text(r)).collect::<Vec<_>>(),
            vec!["a", "c", "", "d"]
        );
        t.feed_str("\x1b[9T");
        assert_eq!(t.row_text(1), "");
        assert_eq!(t.row_text(3), "d");
    }

    #[test]
    fn invalid_region_is_ignored() {
        let mut t = term(5, 5);
        t.feed_str("\x1b[2;4r\x1b[4;2r");
        let region = t.grid().scroll_region();
        assert_eq!((region.top, region.bottom), (1, 4));
    }

    #[test]
    fn repeat_last_character() {
        let mut t = term(10, 1);
        t.feed_str("x\x1b[3b");
        assert_eq!(t.row_text(0), "xxxx");
    }

    // ── SGR ─────────────────────────────────────────────────────────

    #[test]
    fn sgr_basic_colors() {
        let mut t = term(5, 1);
        t.feed_str("\x1b[1;31;104m");
        let a = t.attrs();
        assert!(a.flags.contains(SgrFlags::BOLD));
        assert_eq!(a.fg, Color::Named(1));
        assert_eq!(a.bg, Color::Named(12));
        t.feed_str("\x1b[m");
        assert_eq!(*t.attrs(), SgrAttrs::default());
    }

    #[test]
    fn sgr_extended_colors() {
        let mut t = term(5, 1);
        t.feed_str("\x1b[38;5;200;48;2;1;2;3m");
        assert_eq!(t.attrs().fg, Color::Indexed(200));
        assert_eq!(t.attrs().bg, Color::Rgb(1, 2, 3));

        t.feed_str("\x1b[38:2::10:20:30;48:5:7;58:2:4:5:6m");
        assert_eq!(t.attrs().fg, Color::Rgb(10, 20, 30));
        assert_eq!(t.attrs().bg, Color::Indexed(7));
        assert_eq!(t.attrs().underline_color, Some(Color::Rgb(4, 5, 6)));

        t.feed_str("\x1b[59;39;49m");
        assert_eq!(*t.attrs(), SgrAttrs::default());
    }

    #[test]
    fn sgr_truncated_color_falls_through() {
        let mut t = term(5, 1);
        // "38;5" lacks the index: 5 is then read as blink.
        t.feed_str("\x1b[38;5m");
        assert_eq!(t.attrs().fg, Color::Default);
        assert!(t.attrs().flags.contains(SgrFlags::BLINK));
    }

    #[test]
    fn sgr_underline_styles() {
        let mut t = term(5, 1);
        t.feed_str("\x1b[4:3m");
        assert_eq!(t.attrs().underline, UnderlineStyle::Curly);
        t.feed_str("\x1b[4:0m");
        assert_eq!(t.attrs().underline, UnderlineStyle::None);
        t.feed_str("\x1b[4m\x1b[24m");
        assert_eq!(t.attrs().underline, UnderlineStyle::None);
    }

    #[test]
    fn sgr_22_clears_bold_and_dim() {
        let mut t = term(5, 1);
        t.feed_str("\x1b[1;2;3m\x1b[22m");
        assert_eq!(t.attrs().flags, SgrFlags::ITALIC);
    }

    // ── Modes ───────────────────────────────────────────────────────

    #[test]
    fn alternate_screen_round_trip() {
        let mut t = term(10, 3);
        t.feed_str("hello\x1b[31m\x1b[?1049h");
        assert!(t.is_alternate_screen());
        assert_eq!(t.row_text(0), "");
        t.feed_str("\x1b[0mjunk\x1b[?1049l");
        assert!(!t.is_alternate_screen());
        assert_eq!(t.row_text(0), "hello");
        assert_eq!(t.cursor(), Cursor { row: 0, col: 5, pending_wrap: false });
        assert_eq!(t.attrs().fg, Color::Named(1));
    }

    #[test]
    fn mode_47_keeps_cursor_without_restore() {
        let mut t = term(10, 3);
        t.feed_str("ab\x1b[?47h\x1b[2;2H\x1b[?47l");
        assert_eq!(t.cursor(), Cursor { row: 1, col: 1, pending_wrap: false });
    }

    #[test]
    fn decrqm_reports_modes() {
        let mut t = term(10, 3);
        assert_eq!(replies(&mut t, "\x1b[?7$p"), "\x1b[?7;1$y");
        assert_eq!(replies(&mut t, "\x1b[?2004$p"), "\x1b[?2004;2$y");
        assert_eq!(replies(&mut t, "\x1b[?1049h\x1b[?1049$p"), "\x1b[?1049;1$y");
        assert_eq!(replies(&mut t, "\x1b[?2026h\x1b[?2026$p"), "\x1b[?2026;1$y");
        assert_eq!(replies(&mut t, "\x1b[?4242$p"), "\x1b[?4242;0$y");
        assert_eq!(replies(&mut t, "\x1b[?69$p"), "\x1b[?69;4$y");
        assert_eq!(replies(&mut t, "\x1b[4h\x1b[4$p"), "\x1b[4;1$y");
    }

    #[test]
    fn grapheme_mode_is_permanent_without_double_width() {
        use crate::grapheme::GraphemeWidthMethod;
        let config = TermConfig::default().with_grapheme_width_method(GraphemeWidthMethod::Max);
        let mut t = Terminal::new(config);
        assert_eq!(replies(&mut t, "\x1b[?2027$p"), "\x1b[?2027;4$y");
    }

    #[test]
    fn xtsave_and_xtrestore() {
        let mut t = term(10, 3);
        t.feed_str("\x1b[?2004h\x1b[?2004s\x1b[?2004l");
        assert!(!t.modes().dec.contains(crate::modes::DecModes::BRACKETED_PASTE));
        t.feed_str("\x1b[?2004r");
        assert!(t.modes().dec.contains(crate::modes::DecModes::BRACKETED_PASTE));
    }

    #[test]
    fn ansi_insert_mode_set_and_reset() {
        let mut t = term(10, 3);
        t.feed_str("\x1b[4h");
        assert!(t.modes().ansi.contains(crate::modes::AnsiModes::INSERT));
        t.feed_str("\x1b[4l");
        assert!(t.modes().ansi.is_empty());
    }

    #[test]
    fn decscusr_sets_shape_and_blink() {
        let mut t = term(10, 3);
        t.feed_str("\x1b[5 q");
        assert_eq!(t.cursor_style(), (CursorShape::Beam, true));
        t.feed_str("\x1b[4 q");
        assert_eq!(t.cursor_style(), (CursorShape::Underline, false));
        t.feed_str("\x1b[0 q");
        assert_eq!(t.cursor_style(), (CursorShape::Block, false));
    }

    #[test]
    fn soft_reset_keeps_text() {
        let mut t = term(10, 3);
        t.feed_str("hi\x1b[1m\x1b[?6h\x1b[2;3r\x1b[!p");
        assert_eq!(t.row_text(0), "hi");
        assert_eq!(*t.attrs(), SgrAttrs::default());
        assert!(!t.modes().dec.contains(crate::modes::DecModes::ORIGIN));
        assert_eq!(t.grid().scroll_region().bottom, 3);
    }

    // ── Reports ─────────────────────────────────────────────────────

    #[test]
    fn device_attributes() {
        let mut t = term(10, 3);
        assert_eq!(replies(&mut t, "\x1b[c"), "\x1b[?62;4;22c");
        let mut plain = Terminal::new(TermConfig::default().with_sixel(false));
        assert_eq!(replies(&mut plain, "\x1b[0c"), "\x1b[?62;22c");
        assert!(replies(&mut t, "\x1b[>c").starts_with("\x1b[>1;"));
        assert_eq!(replies(&mut t, "\x1b[=c"), "\x1bP!|666572726f7465726d\x1b\\");
    }

    #[test]
    fn xtversion_names_the_terminal() {
        let mut t = term(10, 3);
        let reply = replies(&mut t, "\x1b[>q");
        assert_eq!(
            reply,
            format!("\x1bP>|ferroterm({})\x1b\\", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn status_and_position_reports() {
        let mut t = term(10, 5);
        assert_eq!(replies(&mut t, "\x1b[5n"), "\x1b[0n");
        assert_eq!(replies(&mut t, "\x1b[3;7H\x1b[6n"), "\x1b[3;7R");
        assert_eq!(replies(&mut t, "\x1b[?6n"), "\x1b[?3;7R");
    }

    #[test]
    fn window_size_reports() {
        let mut t = term(80, 24);
        assert_eq!(replies(&mut t, "\x1b[18t"), "\x1b[8;24;80t");
        assert_eq!(replies(&mut t, "\x1b[14t"), "\x1b[4;384;640t");
        assert_eq!(replies(&mut t, "\x1b[16t"), "\x1b[6;16;8t");
        assert_eq!(replies(&mut t, "\x1b[11t"), "\x1b[1t");
        assert_eq!(replies(&mut t, "\x1b[3t"), "");
    }

    #[test]
    fn title_stack_push_pop() {
        let mut t = term(10, 3);
        t.feed_str("\x1b]2;one\x07\x1b[22t\x1b]2;two\x07");
        assert_eq!(t.title(), "two");
        t.feed_str("\x1b[23t");
        assert_eq!(t.title(), "one");
    }

    #[test]
    fn title_stack_is_bounded() {
        let mut t = term(10, 3);
        for i in 0..20 {
            t.feed_str(&format!("\x1b]2;{i}\x07\x1b[22;0t"));
        }
        for _ in 0..20 {
            t.feed_str("\x1b[23t");
        }
        // Only the newest sixteen survive; the oldest left is "4".
        assert_eq!(t.title(), "4");
    }

    #[test]
    fn overflowed_parameters_void_the_sequence() {
        let mut t = term(10, 5);
        t.feed_str("\x1b[99999;2H");
        assert_eq!(pos(&t), (0, 0));
    }
}
