//! Terminal state and the byte-stream entry point.
//!
//! A [`Terminal`] owns both screens, the current rendition, mode flags, the
//! parser and everything a handler may touch. [`Terminal::feed`] runs the
//! parser over a chunk of child output and applies every resulting action in
//! order; nothing here blocks or performs I/O.
//!
//! Output for the child (device attributes, reports, DCS replies) collects in
//! a [`ReplyQueue`], and host-facing notifications (bell, title, clipboard)
//! collect as [`TermEvent`]s. The host drains both after each feed.
//!
//! # Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Cursor lies on the active screen | `Grid::set_cursor` clamps; every motion goes through it or checks bounds |
//! | Both screens share one size | `resize` applies to primary and alternate together |
//! | Replies keep generation order | single FIFO, appended only by handlers |
//! | Title stack depth ≤ 16 | oldest entry dropped on push |
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Unknown sequence | `debug!` and ignored |
//! | Parameter overflow | whole CSI ignored |
//! | Grapheme table full | extender dropped, `warn!` once |
//! | Wide glyph on a one-column screen | glyph dropped |

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use crate::cell::{Cell, Color, HyperlinkId, HyperlinkRegistry, SgrAttrs};
use crate::charset::Charsets;
use crate::config::{CursorShape, TermConfig};
use crate::dcs::{self, SettingsReport};
use crate::grapheme::GraphemeTable;
use crate::grid::{Cursor, Grid, SavedCursor, ScreenKind};
use crate::modes::{AnsiModes, DecModes, Modes};
use crate::parser::{Action, DcsRequest, EscSequence, Parser};
use crate::render::RenderScheduler;
use crate::reply::ReplyQueue;

/// Depth of the XTWINOPS title stack.
pub const TITLE_STACK_MAX: usize = 16;

/// Notifications for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermEvent {
    Bell,
    TitleChanged(String),
    /// OSC 7 with the decoded path.
    CwdChanged(String),
    /// OSC 9 / OSC 777 desktop notification.
    Notify { title: String, body: String },
    /// OSC 52 write: selection targets and decoded data.
    ClipboardSet { targets: String, data: Vec<u8> },
    /// OSC 555.
    Flash,
}

/// Receives Sixel data streamed out of a DCS sequence.
pub trait SixelDecoder: Send {
    fn start(&mut self, p1: u16, p2: u16, p3: u16);
    fn put(&mut self, byte: u8);
    fn finish(&mut self);
}

/// Dynamic colors, packed `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colors {
    pub palette: [u32; 256],
    pub fg: u32,
    pub bg: u32,
    /// `None` draws the cursor by inverting the cell.
    pub cursor: Option<u32>,
}

impl Colors {
    fn from_config(config: &TermConfig) -> Self {
        Self {
            palette: config.palette,
            fg: config.default_fg,
            bg: config.default_bg,
            cursor: None,
        }
    }
}

pub struct Terminal {
    pub(crate) config: TermConfig,
    parser: Parser,
    primary: Grid,
    alternate: Grid,
    screen: ScreenKind,
    pub(crate) attrs: SgrAttrs,
    pub(crate) charsets: Charsets,
    pub(crate) modes: Modes,
    pub(crate) tab_stops: BTreeSet<u16>,
    graphemes: GraphemeTable,
    pub(crate) hyperlinks: HyperlinkRegistry,
    pub(crate) hyperlink: HyperlinkId,
    pub(crate) replies: ReplyQueue,
    render: RenderScheduler,
    pub(crate) colors: Colors,
    pub(crate) title: String,
    pub(crate) title_stack: Vec<String>,
    pub(crate) cwd: Option<String>,
    pub(crate) pointer_shape: Option<String>,
    pub(crate) clipboard: Option<Vec<u8>>,
    pub(crate) cursor_shape: CursorShape,
    pub(crate) cursor_blink: bool,
    /// Last printed character, for REP.
    pub(crate) last_printed: Option<char>,
    /// Cell that received the last printed character, while nothing else
    /// has happened since. Combining characters attach here.
    compose_at: Option<(u16, u16)>,
    pub(crate) xtsave: BTreeMap<u16, bool>,
    /// OSC 99 title and body collected until the final chunk.
    pub(crate) pending_notification: Option<(String, String)>,
    events: Vec<TermEvent>,
    bell_count: u64,
    sixel: Option<Box<dyn SixelDecoder>>,
    scratch: Vec<Action>,
}

impl fmt::Debug for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminal")
            .field("cols", &self.cols())
            .field("rows", &self.rows())
            .field("screen", &self.screen)
            .field("cursor", &self.cursor())
            .field("attrs", &self.attrs)
            .field("modes", &self.modes)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

impl Terminal {
    #[must_use]
    pub fn new(config: TermConfig) -> Self {
        let (cols, rows) = config.initial_size;
        let mut parser = Parser::new();
        parser.set_sixel(config.sixel);
        let mut modes = Modes::default();
        modes
            .dec
            .set(DecModes::GRAPHEME_SHAPING, config.grapheme_shaping);
        let primary = Grid::new(cols, rows, config.scrollback_lines);
        let alternate = Grid::new_alternate(cols, rows);
        let cols = primary.cols();

        Self {
            parser,
            primary,
            alternate,
            screen: ScreenKind::Primary,
            attrs: SgrAttrs::default(),
            charsets: Charsets::default(),
            modes,
            tab_stops: default_tab_stops(0, cols),
            graphemes: GraphemeTable::new(),
            hyperlinks: HyperlinkRegistry::new(),
            hyperlink: 0,
            replies: ReplyQueue::new(),
            render: RenderScheduler::new(&config),
            colors: Colors::from_config(&config),
            title: config.title.clone().unwrap_or_default(),
            title_stack: Vec::new(),
            cwd: None,
            pointer_shape: None,
            clipboard: None,
            cursor_shape: config.cursor_style,
            cursor_blink: config.cursor_blink,
            last_printed: None,
            compose_at: None,
            xtsave: BTreeMap::new(),
            pending_notification: None,
            events: Vec::new(),
            bell_count: 0,
            sixel: None,
            scratch: Vec::new(),
            config,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn config(&self) -> &TermConfig {
        &self.config
    }

    pub fn cols(&self) -> u16 {
        self.primary.cols()
    }

    pub fn rows(&self) -> u16 {
        self.primary.rows()
    }

    /// The active screen.
    pub fn grid(&self) -> &Grid {
        match self.screen {
            ScreenKind::Primary => &self.primary,
            ScreenKind::Alternate => &self.alternate,
        }
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        match self.screen {
            ScreenKind::Primary => &mut self.primary,
            ScreenKind::Alternate => &mut self.alternate,
        }
    }

    pub fn primary(&self) -> &Grid {
        &self.primary
    }

    pub fn alternate(&self) -> &Grid {
        &self.alternate
    }

    pub fn screen(&self) -> ScreenKind {
        self.screen
    }

    pub fn is_alternate_screen(&self) -> bool {
        self.screen == ScreenKind::Alternate
    }

    pub fn cursor(&self) -> Cursor {
        self.grid().cursor
    }

    /// Current rendition.
    pub fn attrs(&self) -> &SgrAttrs {
        &self.attrs
    }

    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn graphemes(&self) -> &GraphemeTable {
        &self.graphemes
    }

    pub fn hyperlinks(&self) -> &HyperlinkRegistry {
        &self.hyperlinks
    }

    pub fn colors(&self) -> &Colors {
        &self.colors
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    pub fn pointer_shape(&self) -> Option<&str> {
        self.pointer_shape.as_deref()
    }

    /// Cursor shape and blink as selected by DECSCUSR.
    pub fn cursor_style(&self) -> (CursorShape, bool) {
        (self.cursor_shape, self.cursor_blink)
    }

    pub fn bell_count(&self) -> u64 {
        self.bell_count
    }

    /// Columns with a tab stop.
    pub fn tab_stops(&self) -> impl Iterator<Item = u16> + '_ {
        self.tab_stops.iter().copied()
    }

    pub fn replies(&self) -> &ReplyQueue {
        &self.replies
    }

    pub fn replies_mut(&mut self) -> &mut ReplyQueue {
        &mut self.replies
    }

    /// Take every queued reply byte.
    pub fn take_replies(&mut self) -> Vec<u8> {
        self.replies.take()
    }

    pub fn take_events(&mut self) -> Vec<TermEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn render(&self) -> &RenderScheduler {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut RenderScheduler {
        &mut self.render
    }

    pub fn is_syncing(&self) -> bool {
        self.render.is_syncing()
    }

    /// Contents of the clipboard as last written by OSC 52 or the host.
    pub fn clipboard(&self) -> Option<&[u8]> {
        self.clipboard.as_deref()
    }

    /// Update the cached clipboard contents answered to OSC 52 queries.
    pub fn set_clipboard(&mut self, data: Vec<u8>) {
        self.clipboard = Some(data);
    }

    pub fn set_sixel_decoder(&mut self, decoder: Box<dyn SixelDecoder>) {
        self.sixel = Some(decoder);
    }

    /// Text of screen row `row` with clusters expanded and wide continuations
    /// skipped; trailing blanks are trimmed.
    pub fn row_text(&self, row: u16) -> String {
        let mut out = String::new();
        if let Some(r) = self.grid().row(row) {
            for cell in r.cells() {
                self.graphemes.push_text(cell.key(), &mut out);
            }
        }
        out.truncate(out.trim_end().len());
        out
    }

    // ── Input ───────────────────────────────────────────────────────

    /// Parse and apply a chunk of child output.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.feed_at(bytes, Instant::now());
    }

    /// [`feed`](Self::feed) with an explicit clock, for deterministic timers.
    pub fn feed_at(&mut self, bytes: &[u8], now: Instant) {
        let mut actions = std::mem::take(&mut self.scratch);
        actions.clear();
        self.parser.feed_into(bytes, &mut actions);
        for action in actions.drain(..) {
            self.perform(action, now);
        }
        self.scratch = actions;
        if !bytes.is_empty() {
            self.render.on_output(now);
        }
    }

    pub fn feed_str(&mut self, s: &str) {
        self.feed(s.as_bytes());
    }

    fn perform(&mut self, action: Action, now: Instant) {
        if let Action::Print(ch) = action {
            self.print(ch);
            return;
        }
        self.compose_at = None;
        match action {
            Action::Print(_) => {}
            Action::Execute(byte) => self.execute(byte),
            Action::Esc(seq) => self.esc_dispatch(&seq),
            Action::Csi(seq) => self.csi_dispatch(&seq, now),
            Action::Osc { data, bel } => self.osc_dispatch(&data, bel),
            Action::SixelStart { p1, p2, p3 } => {
                if let Some(decoder) = self.sixel.as_mut() {
                    decoder.start(p1, p2, p3);
                }
            }
            Action::SixelData(byte) => {
                if let Some(decoder) = self.sixel.as_mut() {
                    decoder.put(byte);
                }
            }
            Action::SixelEnd => {
                if let Some(decoder) = self.sixel.as_mut() {
                    decoder.finish();
                }
            }
            Action::Dcs(request) => self.dcs_dispatch(request, now),
        }
    }

    // ── Printing ────────────────────────────────────────────────────

    fn print(&mut self, ch: char) {
        let ch = self.charsets.translate(ch);
        let width = Cell::display_width(ch);

        if let Some((row, col)) = self.compose_at
            && self.attaches_to(row, col, ch, width)
        {
            self.compose(row, col, ch);
            return;
        }
        if width == 0 {
            // Nothing to attach to.
            return;
        }
        self.print_char(ch, width);
    }

    /// Whether `ch` joins the cell at `(row, col)` instead of taking a new one.
    fn attaches_to(&self, row: u16, col: u16, ch: char, width: u8) -> bool {
        let Some(cell) = self.grid().cell(row, col) else {
            return false;
        };
        let key = cell.key();
        if key == 0 {
            return false;
        }
        if width == 0 {
            return true;
        }
        if !self.modes.dec.contains(DecModes::GRAPHEME_SHAPING) {
            return false;
        }
        if ch.is_ascii() && key < 0x80 {
            return false;
        }
        self.graphemes.extends(key, ch)
    }

    fn compose(&mut self, row: u16, col: u16, ch: char) {
        let method = self.config.grapheme_width_method;
        let Some(cell) = self.grid().cell(row, col).copied() else {
            return;
        };
        let Some((key, width)) = self.graphemes.append(cell.key(), ch, method) else {
            return;
        };
        let grid = self.grid_mut();
        let applied = grid.set_cluster(row, col, key, width);
        if applied > cell.width() {
            // The cluster grew into the next column: the cursor follows it.
            let cols = grid.cols();
            let next = col + u16::from(applied);
            if next >= cols {
                grid.cursor = Cursor {
                    row,
                    col: cols - 1,
                    pending_wrap: true,
                };
            } else if grid.cursor.row == row && grid.cursor.col < next {
                grid.cursor = Cursor {
                    row,
                    col: next,
                    pending_wrap: false,
                };
            }
        }
    }

    /// Write a character of width 1 or 2 at the cursor.
    pub(crate) fn print_char(&mut self, ch: char, width: u8) {
        let autowrap = self.modes.dec.contains(DecModes::AUTOWRAP);
        let insert = self.modes.ansi.contains(AnsiModes::INSERT);
        let attrs = self.attrs;
        let link = self.hyperlink;
        let cols = self.grid().cols();

        if width == 2 && cols < 2 {
            tracing::debug!(?ch, "wide character does not fit");
            return;
        }
        if self.grid().cursor.pending_wrap && autowrap {
            self.wrap_line();
        }

        let mut col = self.grid().cursor.col;
        if width == 2 && col + 1 >= cols {
            if autowrap {
                self.wrap_line();
                col = 0;
            } else {
                col = cols - 2;
            }
        }

        let grid = self.grid_mut();
        let row = grid.cursor.row;
        if insert {
            grid.cursor.col = col;
            grid.insert_chars(u16::from(width), attrs.bg);
        }
        grid.write_cell(row, col, ch as u32, width, attrs, link);

        let grid = self.grid_mut();
        let next = col + u16::from(width);
        grid.cursor = if next >= cols {
            Cursor {
                row,
                col: cols - 1,
                pending_wrap: true,
            }
        } else {
            Cursor {
                row,
                col: next,
                pending_wrap: false,
            }
        };
        self.last_printed = Some(ch);
        self.compose_at = Some((row, col));
    }

    /// Soft-wrap: mark the row as continued and move to the next line start.
    fn wrap_line(&mut self) {
        let grid = self.grid_mut();
        let row = grid.cursor.row;
        if let Some(r) = grid.row_mut(row) {
            r.wrapped = true;
        }
        self.linefeed();
        self.grid_mut().cursor.col = 0;
    }

    // ── Cursor movement primitives ──────────────────────────────────

    /// IND: move down one row, scrolling at the bottom of the region.
    pub(crate) fn linefeed(&mut self) {
        let bg = self.attrs.bg;
        let grid = self.grid_mut();
        let region = grid.scroll_region();
        let row = grid.cursor.row;
        if row + 1 == region.bottom {
            grid.scroll_up(1, bg);
        } else if row + 1 < grid.rows() {
            grid.cursor.row = row + 1;
        }
        grid.cursor.pending_wrap = false;
    }

    /// RI: move up one row, scrolling at the top of the region.
    pub(crate) fn reverse_index(&mut self) {
        let bg = self.attrs.bg;
        let grid = self.grid_mut();
        let region = grid.scroll_region();
        let row = grid.cursor.row;
        if row == region.top {
            grid.scroll_down(1, bg);
        } else if row > 0 {
            grid.cursor.row = row - 1;
        }
        grid.cursor.pending_wrap = false;
    }

    pub(crate) fn carriage_return(&mut self) {
        let cursor = &mut self.grid_mut().cursor;
        cursor.col = 0;
        cursor.pending_wrap = false;
    }

    fn backspace(&mut self) {
        let reverse_wrap = self.modes.dec.contains(DecModes::REVERSE_WRAP);
        let grid = self.grid_mut();
        let cols = grid.cols();
        let cursor = &mut grid.cursor;
        if cursor.pending_wrap {
            cursor.pending_wrap = false;
        } else if cursor.col > 0 {
            cursor.col -= 1;
        } else if reverse_wrap && cursor.row > 0 {
            cursor.row -= 1;
            cursor.col = cols - 1;
        }
    }

    /// Move to the next tab stop, or the last column.
    pub(crate) fn tab_forward(&mut self, count: u16) {
        let last = self.grid().cols() - 1;
        let mut col = self.grid().cursor.col;
        for _ in 0..count.max(1) {
            col = self
                .tab_stops
                .range(col + 1..)
                .next()
                .copied()
                .unwrap_or(last)
                .min(last);
            if col == last {
                break;
            }
        }
        self.grid_mut().cursor.col = col;
    }

    /// Move to the previous tab stop, or column 0.
    pub(crate) fn tab_backward(&mut self, count: u16) {
        let mut col = self.grid().cursor.col;
        for _ in 0..count.max(1) {
            col = self.tab_stops.range(..col).next_back().copied().unwrap_or(0);
            if col == 0 {
                break;
            }
        }
        let cursor = &mut self.grid_mut().cursor;
        cursor.col = col;
        cursor.pending_wrap = false;
    }

    /// Rows the cursor may address: the region in origin mode, else the
    /// whole screen. Bounds are inclusive.
    pub(crate) fn addressable_rows(&self) -> (u16, u16) {
        let grid = self.grid();
        if self.modes.dec.contains(DecModes::ORIGIN) {
            let region = grid.scroll_region();
            (region.top, region.bottom - 1)
        } else {
            (0, grid.rows() - 1)
        }
    }

    /// CUP: move to a position given relative to the origin.
    pub(crate) fn goto(&mut self, row: u16, col: u16) {
        let (top, bottom) = self.addressable_rows();
        let row = top.saturating_add(row).min(bottom);
        self.grid_mut().set_cursor(row, col);
    }

    // ── C0 ──────────────────────────────────────────────────────────

    fn execute(&mut self, byte: u8) {
        match byte {
            0x07 => {
                self.bell_count += 1;
                self.events.push(TermEvent::Bell);
            }
            0x08 => self.backspace(),
            0x09 => self.tab_forward(1),
            0x0a..=0x0c => {
                self.linefeed();
                if self.modes.ansi.contains(AnsiModes::NEWLINE) {
                    self.carriage_return();
                }
            }
            0x0d => self.carriage_return(),
            0x0e => self.charsets.select(1),
            0x0f => self.charsets.select(0),
            _ => tracing::debug!(byte = format_args!("{byte:#04x}"), "unhandled control"),
        }
    }

    fn set_tab_stop(&mut self) {
        let col = self.grid().cursor.col;
        self.tab_stops.insert(col);
    }

    // ── ESC ─────────────────────────────────────────────────────────

    fn esc_dispatch(&mut self, seq: &EscSequence) {
        match (seq.intermediates.as_slice(), seq.final_byte) {
            ([], b'7') => self.save_cursor(),
            ([], b'8') => self.restore_cursor(),
            ([], b'c') => self.hard_reset(),
            ([], b'D') => self.linefeed(),
            ([], b'E') => {
                self.carriage_return();
                self.linefeed();
            }
            ([], b'H') => self.set_tab_stop(),
            ([], b'M') => self.reverse_index(),
            ([], b'N') => self.charsets.single_shift(2),
            ([], b'O') => self.charsets.single_shift(3),
            ([], b'n') => self.charsets.select(2),
            ([], b'o') => self.charsets.select(3),
            ([], b'=') => self.modes.dec.insert(DecModes::APP_KEYPAD),
            ([], b'>') => self.modes.dec.remove(DecModes::APP_KEYPAD),
            ([], b'\\') => {}
            ([slot @ (b'(' | b')' | b'*' | b'+')], designator) => {
                self.charsets.designate(slot - b'(', designator);
            }
            ([b'#'], b'8') => self.screen_alignment(),
            (intermediates, final_byte) => tracing::debug!(
                sequence = %format_esc(intermediates, final_byte),
                "unhandled ESC"
            ),
        }
    }

    /// DECALN.
    fn screen_alignment(&mut self) {
        let rows = self.rows();
        let grid = self.grid_mut();
        grid.fill('E');
        grid.set_scroll_region(0, rows);
        grid.set_cursor(0, 0);
    }

    // ── Cursor save / restore ───────────────────────────────────────

    pub(crate) fn save_cursor(&mut self) {
        let saved = SavedCursor {
            cursor: self.grid().cursor,
            attrs: self.attrs,
            charsets: self.charsets,
            origin: self.modes.dec.contains(DecModes::ORIGIN),
            autowrap: self.modes.dec.contains(DecModes::AUTOWRAP),
        };
        self.grid_mut().saved = saved;
    }

    pub(crate) fn restore_cursor(&mut self) {
        let saved = self.grid().saved;
        self.attrs = saved.attrs;
        self.charsets = saved.charsets;
        self.modes.dec.set(DecModes::ORIGIN, saved.origin);
        self.modes.dec.set(DecModes::AUTOWRAP, saved.autowrap);
        let grid = self.grid_mut();
        grid.set_cursor(saved.cursor.row, saved.cursor.col);
        if grid.cursor.col == saved.cursor.col {
            grid.cursor.pending_wrap = saved.cursor.pending_wrap;
        }
    }

    // ── Screen switching ────────────────────────────────────────────

    /// Switch to the alternate screen and clear it. The cursor keeps its
    /// position; with `save` the primary cursor is saved first (1049).
    pub(crate) fn enter_alternate_screen(&mut self, save: bool) {
        if self.is_alternate_screen() {
            return;
        }
        if save {
            self.save_cursor();
        }
        let cursor = self.primary.cursor;
        let region = self.primary.scroll_region();
        self.screen = ScreenKind::Alternate;
        let alt = &mut self.alternate;
        alt.set_scroll_region(region.top, region.bottom);
        alt.set_cursor(cursor.row, cursor.col);
        alt.erase_display(2, Color::Default);
        alt.mark_all_dirty();
        tracing::debug!("entered alternate screen");
    }

    /// Return to the primary screen. With `restore` the cursor saved on
    /// entry is restored (1049).
    pub(crate) fn leave_alternate_screen(&mut self, restore: bool) {
        if !self.is_alternate_screen() {
            return;
        }
        let cursor = self.alternate.cursor;
        let region = self.alternate.scroll_region();
        self.screen = ScreenKind::Primary;
        self.primary.set_scroll_region(region.top, region.bottom);
        self.primary.set_cursor(cursor.row, cursor.col);
        if restore {
            self.restore_cursor();
        }
        self.primary.mark_all_dirty();
        tracing::debug!("left alternate screen");
    }

    // ── Resets ──────────────────────────────────────────────────────

    /// DECSTR: reset modes and rendition, keep the screen contents.
    pub(crate) fn soft_reset(&mut self) {
        let rows = self.rows();
        let dec = &mut self.modes.dec;
        dec.insert(DecModes::AUTOWRAP | DecModes::CURSOR_VISIBLE);
        dec.remove(DecModes::ORIGIN | DecModes::APP_CURSOR_KEYS | DecModes::APP_KEYPAD);
        self.modes.ansi = AnsiModes::empty();
        self.attrs.reset();
        self.charsets = Charsets::default();
        self.hyperlink = 0;
        let grid = self.grid_mut();
        grid.set_scroll_region(0, rows);
        grid.saved = SavedCursor {
            autowrap: true,
            ..SavedCursor::default()
        };
        grid.cursor.pending_wrap = false;
        self.render.end_sync();
    }

    /// RIS: return to the power-on state.
    pub(crate) fn hard_reset(&mut self) {
        self.leave_alternate_screen(false);
        self.primary.clear_all();
        self.alternate.clear_all();
        self.primary.view_to_bottom();
        self.attrs = SgrAttrs::default();
        self.charsets = Charsets::default();
        self.modes = Modes::default();
        self.modes
            .dec
            .set(DecModes::GRAPHEME_SHAPING, self.config.grapheme_shaping);
        self.tab_stops = default_tab_stops(0, self.cols());
        self.graphemes.clear();
        self.hyperlinks.clear();
        self.hyperlink = 0;
        self.colors = Colors::from_config(&self.config);
        self.title_stack.clear();
        self.cursor_shape = self.config.cursor_style;
        self.cursor_blink = self.config.cursor_blink;
        self.last_printed = None;
        self.xtsave.clear();
        self.render.end_sync();
        self.render.request_immediate();
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Resize both screens. The primary screen reflows when configured.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let old_cols = self.cols();
        if cols == old_cols && rows == self.rows() {
            return;
        }
        self.primary.resize(rows, cols, self.config.reflow);
        self.alternate.resize(rows, cols, false);
        self.tab_stops.retain(|&c| c < cols);
        if cols > old_cols {
            self.tab_stops.extend(default_tab_stops(old_cols, cols));
        }
        self.compose_at = None;
        self.grid_mut().mark_all_dirty();
        self.render.request_immediate();
        tracing::debug!(cols, rows, "terminal resized");
    }

    // ── DCS ─────────────────────────────────────────────────────────

    fn dcs_dispatch(&mut self, request: DcsRequest, now: Instant) {
        match request {
            DcsRequest::Decrqss(setting) => {
                let report = SettingsReport {
                    attrs: &self.attrs,
                    region: self.grid().scroll_region(),
                    cursor_shape: self.cursor_shape,
                    cursor_blink: self.cursor_blink,
                };
                let reply = dcs::decrqss_reply(&setting, &report);
                self.replies.push(&reply);
            }
            DcsRequest::Xtgettcap(payload) => {
                let reply = dcs::xtgettcap_replies(&payload, &self.config.term);
                self.replies.push(&reply);
            }
            DcsRequest::SyncBegin => self.begin_sync(now),
            DcsRequest::SyncEnd => self.end_sync(),
        }
    }

    pub(crate) fn begin_sync(&mut self, now: Instant) {
        tracing::trace!("synchronized update begins");
        self.render.begin_sync(now);
    }

    pub(crate) fn end_sync(&mut self) {
        tracing::trace!("synchronized update ends");
        self.render.end_sync();
    }

    // ── Helpers for handlers ────────────────────────────────────────

    pub(crate) fn push_event(&mut self, event: TermEvent) {
        self.events.push(event);
    }

    pub(crate) fn set_title(&mut self, title: String) {
        if self.title != title {
            self.title.clone_from(&title);
            self.events.push(TermEvent::TitleChanged(title));
        }
    }
}

/// Default stops every eight columns in `[from, cols)`.
fn default_tab_stops(from: u16, cols: u16) -> BTreeSet<u16> {
    (8..cols).step_by(8).filter(|&c| c >= from).collect()
}

pub(crate) fn format_esc(intermediates: &[u8], final_byte: u8) -> String {
    let mut s = String::from("ESC ");
    s.extend(intermediates.iter().map(|&b| char::from(b)));
    s.push(char::from(final_byte));
    s
}
