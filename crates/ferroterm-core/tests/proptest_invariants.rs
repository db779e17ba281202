//! Property-based invariant tests for ferroterm-core.
//!
//! These tests verify properties that must hold for **any** input:
//!
//! 1. Parser totality: arbitrary bytes never panic and leave the grid valid.
//! 2. SGR round-trip through DECRQSS.
//! 3. XTGETTCAP replies re-decode to the table value.
//! 4. Ring operations shift rows exactly like a plain row model.
//! 5. Resizing twice to the same size equals resizing once.
//! 6. A synchronized update without its end is released by its deadline.

use std::time::{Duration, Instant};

use ferroterm_core::captable::{self, CAPABILITIES};
use ferroterm_core::dcs::{hex_decode, hex_encode};
use ferroterm_core::parser::State;
use ferroterm_core::{Color, Grid, ScreenKind, SgrAttrs, TermConfig, Terminal};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Dimensions strategy: small enough for fast tests, large enough for edge cases.
fn dims() -> impl Strategy<Value = (u16, u16)> {
    (1u16..=120, 1u16..=60)
}

fn term(cols: u16, rows: u16) -> Terminal {
    Terminal::new(TermConfig::default().with_size(cols, rows).with_scrollback(64))
}

/// Byte soup biased towards escape-sequence structure.
fn vt_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    let byte = prop_oneof![
        4 => any::<u8>(),
        2 => prop::sample::select(b"\x1b[;?:$+=>!P\\]0123456789mhlqrsJKHABCDLM".to_vec()),
        1 => Just(0x07u8),
        1 => Just(b'\n'),
    ];
    prop::collection::vec(byte, 0..max_len)
}

fn assert_grid_valid(grid: &Grid) {
    let rows = grid.rows();
    let cols = grid.cols();
    match grid.kind() {
        ScreenKind::Primary => assert!(grid.capacity().is_power_of_two()),
        ScreenKind::Alternate => assert_eq!(grid.capacity(), rows as usize),
    }
    assert!(grid.history() + rows as usize <= grid.capacity());

    let cursor = grid.cursor;
    assert!(cursor.row < rows, "cursor row {} >= rows {rows}", cursor.row);
    assert!(cursor.col < cols, "cursor col {} >= cols {cols}", cursor.col);

    let region = grid.scroll_region();
    assert!(region.top < region.bottom && region.bottom <= rows);

    for r in 0..rows {
        let row = grid.row(r).expect("screen row");
        let cells = row.cells();
        assert_eq!(cells.len(), cols as usize, "row {r} has wrong width");
        for (c, cell) in cells.iter().enumerate() {
            if cell.is_wide() {
                assert!(
                    cells.get(c + 1).is_some_and(|n| n.is_wide_continuation()),
                    "wide head at ({r},{c}) without continuation"
                );
            }
            if cell.is_wide_continuation() {
                assert!(c > 0 && cells[c - 1].is_wide(), "orphan continuation at ({r},{c})");
            }
        }
    }
}

fn screen_text(t: &Terminal) -> Vec<String> {
    (0..t.rows()).map(|r| t.row_text(r)).collect()
}

/// SGR parameters for one generated rendition.
#[derive(Debug, Clone)]
struct Rendition {
    flags: Vec<u16>,
    underline: Option<u16>,
    fg: Option<String>,
    bg: Option<String>,
    underline_color: Option<String>,
}

impl Rendition {
    fn to_sgr(&self) -> String {
        let mut parts: Vec<String> = self.flags.iter().map(u16::to_string).collect();
        if let Some(style) = self.underline {
            parts.push(format!("4:{style}"));
        }
        parts.extend(self.fg.iter().cloned());
        parts.extend(self.bg.iter().cloned());
        parts.extend(self.underline_color.iter().cloned());
        format!("\x1b[{}m", parts.join(";"))
    }
}

fn color_param(base: u16, bright: u16, extended: u16) -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        (0u16..8).prop_map(move |n| Some((base + n).to_string())),
        (0u16..8).prop_map(move |n| Some((bright + n).to_string())),
        any::<u8>().prop_map(move |n| Some(format!("{extended}:5:{n}"))),
        (any::<u8>(), any::<u8>(), any::<u8>())
            .prop_map(move |(r, g, b)| Some(format!("{extended}:2::{r}:{g}:{b}"))),
    ]
}

fn rendition() -> impl Strategy<Value = Rendition> {
    let flags = prop::sample::subsequence(vec![1u16, 2, 3, 5, 7, 8, 9], 0..=7);
    let underline = prop::option::of(0u16..=5);
    let underline_color = prop_oneof![
        Just(None),
        any::<u8>().prop_map(|n| Some(format!("58:5:{n}"))),
        (any::<u8>(), any::<u8>(), any::<u8>())
            .prop_map(|(r, g, b)| Some(format!("58:2:{r}:{g}:{b}"))),
    ];
    (
        flags,
        underline,
        color_param(30, 90, 38),
        color_param(40, 100, 48),
        underline_color,
    )
        .prop_map(|(flags, underline, fg, bg, underline_color)| Rendition {
            flags,
            underline,
            fg,
            bg,
            underline_color,
        })
}

/// A grid operation for the ring model check.
#[derive(Debug, Clone, Copy)]
enum RingOp {
    ScrollUp(u16),
    ScrollDown(u16),
    InsertLines(u16, u16),
    DeleteLines(u16, u16),
}

fn ring_op(rows: u16) -> impl Strategy<Value = RingOp> {
    prop_oneof![
        (1..=rows).prop_map(RingOp::ScrollUp),
        (1..=rows).prop_map(RingOp::ScrollDown),
        (0..rows, 1..=rows).prop_map(|(at, n)| RingOp::InsertLines(at, n)),
        (0..rows, 1..=rows).prop_map(|(at, n)| RingOp::DeleteLines(at, n)),
    ]
}

fn grid_rows(grid: &Grid) -> Vec<String> {
    (0..grid.rows())
        .map(|r| {
            grid.row(r)
                .map(|row| row.cells().iter().filter_map(|c| c.char()).collect())
                .unwrap_or_default()
        })
        .collect()
}

fn labelled_grid(cols: u16, rows: u16, scrollback: usize) -> Grid {
    let mut grid = Grid::new(cols, rows, scrollback);
    for r in 0..rows {
        let ch = char::from(b'A' + (r % 26) as u8);
        for c in 0..cols {
            grid.write_cell(r, c, ch as u32, 1, SgrAttrs::default(), 0);
        }
    }
    grid
}

/// Shift `model[top..bottom]` by `n` rows, filling with blank rows.
fn model_shift(model: &mut [String], top: usize, bottom: usize, n: usize, up: bool, blank: &str) {
    if top >= bottom {
        return;
    }
    let n = n.min(bottom - top);
    let region = &mut model[top..bottom];
    if up {
        region.rotate_left(n);
        for row in &mut region[bottom - top - n..] {
            *row = blank.to_owned();
        }
    } else {
        region.rotate_right(n);
        for row in &mut region[..n] {
            *row = blank.to_owned();
        }
    }
}

// ── 1. Parser totality ──────────────────────────────────────────────────

#[test]
fn blank_terminal_with_odd_height_is_valid() {
    let t = term(1, 3);
    assert_grid_valid(t.primary());
    assert_grid_valid(t.alternate());
    assert_eq!(t.alternate().capacity(), 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn arbitrary_bytes_keep_grid_valid((cols, rows) in dims(), bytes in vt_bytes(512)) {
        let mut t = term(cols, rows);
        t.feed(&bytes);
        assert_grid_valid(t.grid());

        // CAN aborts whatever sequence was in progress.
        t.feed(b"\x18");
        prop_assert_eq!(t.parser().state(), State::Ground);
        assert_grid_valid(t.primary());
        assert_grid_valid(t.alternate());
    }

    #[test]
    fn parsing_is_deterministic(bytes in vt_bytes(256)) {
        let mut a = term(40, 10);
        let mut b = term(40, 10);
        a.feed(&bytes);
        b.feed(&bytes);
        prop_assert_eq!(screen_text(&a), screen_text(&b));
        prop_assert_eq!(a.cursor(), b.cursor());
        prop_assert_eq!(a.take_replies(), b.take_replies());
    }

    #[test]
    fn split_feeds_match_single_feed(bytes in vt_bytes(256), split in any::<prop::sample::Index>()) {
        let at = split.index(bytes.len() + 1);
        let mut whole = term(40, 10);
        let mut parts = term(40, 10);
        whole.feed(&bytes);
        parts.feed(&bytes[..at]);
        parts.feed(&bytes[at..]);
        prop_assert_eq!(screen_text(&whole), screen_text(&parts));
        prop_assert_eq!(whole.cursor(), parts.cursor());
    }
}

// ── 2. SGR round-trip ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn decrqss_sgr_reply_reconstructs_rendition(r in rendition()) {
        let mut t = term(10, 2);
        t.feed_str(&r.to_sgr());
        let applied = *t.attrs();
        t.feed(b"\x1bP$qm\x1b\\");
        let reply = t.take_replies();

        prop_assert!(reply.starts_with(b"\x1bP1$r"), "reply {:?}", String::from_utf8_lossy(&reply));
        prop_assert!(reply.ends_with(b"m\x1b\\"));
        let body = &reply[5..reply.len() - 2];

        let mut again = term(10, 2);
        again.feed(b"\x1b[");
        again.feed(body);
        prop_assert_eq!(*again.attrs(), applied);
    }
}

// ── 3. XTGETTCAP encoding ───────────────────────────────────────────────

proptest! {
    #[test]
    fn xtgettcap_known_names_decode_to_table_value(idx in 0..CAPABILITIES.len()) {
        let (name, value) = CAPABILITIES[idx];
        let hex_name = hex_encode(name.as_bytes());
        let mut t = term(10, 2);
        t.feed_str(&format!("\x1bP+q{hex_name}\x1b\\"));
        let reply = t.take_replies();

        let prefix = format!("\x1bP1+r{hex_name}");
        prop_assert!(reply.starts_with(prefix.as_bytes()));
        prop_assert!(reply.ends_with(b"\x1b\\"));
        let rest = &reply[prefix.len()..reply.len() - 2];
        let expected = value.render(&t.config().term);
        if expected.is_empty() && rest.is_empty() {
            return Ok(());
        }
        prop_assert!(rest.first() == Some(&b'='));
        let decoded = hex_decode(&rest[1..]).expect("hex value");
        prop_assert_eq!(decoded, expected.into_bytes());
    }

    #[test]
    fn xtgettcap_unknown_names_get_error_reply(name in "[a-z]{3,8}") {
        prop_assume!(captable::lookup(name.as_bytes()).is_none());
        let hex_name = hex_encode(name.as_bytes());
        let mut t = term(10, 2);
        t.feed_str(&format!("\x1bP+q{hex_name}\x1b\\"));
        prop_assert_eq!(t.take_replies(), format!("\x1bP0+r{hex_name}\x1b\\").into_bytes());
    }
}

// ── 4. Ring correctness ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn ring_ops_match_row_model(
        (cols, rows, region, ops) in (1u16..=20, 2u16..=16).prop_flat_map(|(cols, rows)| {
            (
                Just(cols),
                Just(rows),
                (0..rows).prop_flat_map(move |top| (Just(top), top + 1..=rows)),
                prop::collection::vec(ring_op(rows), 0..24),
            )
        })
    ) {
        let (top, bottom) = region;
        let mut grid = labelled_grid(cols, rows, 32);
        grid.set_scroll_region(top, bottom);
        let blank: String = " ".repeat(cols as usize);
        let mut model = grid_rows(&grid);

        for op in ops {
            match op {
                RingOp::ScrollUp(n) => {
                    grid.scroll_up(n, Color::Default);
                    model_shift(&mut model, top.into(), bottom.into(), n.into(), true, &blank);
                }
                RingOp::ScrollDown(n) => {
                    grid.scroll_down(n, Color::Default);
                    model_shift(&mut model, top.into(), bottom.into(), n.into(), false, &blank);
                }
                RingOp::InsertLines(at, n) => {
                    grid.set_cursor(at, 0);
                    grid.insert_lines(n, Color::Default);
                    if at >= top && at < bottom {
                        model_shift(&mut model, at.into(), bottom.into(), n.into(), false, &blank);
                    }
                }
                RingOp::DeleteLines(at, n) => {
                    grid.set_cursor(at, 0);
                    grid.delete_lines(n, Color::Default);
                    if at >= top && at < bottom {
                        model_shift(&mut model, at.into(), bottom.into(), n.into(), true, &blank);
                    }
                }
            }
            prop_assert_eq!(grid_rows(&grid), model.clone());
        }
    }

    #[test]
    fn zero_net_scroll_outside_exposed_rows_is_identity(
        (rows, n) in (2u16..=24).prop_flat_map(|rows| (Just(rows), 1..rows))
    ) {
        let mut grid = labelled_grid(8, rows, 64);
        let before = grid_rows(&grid);
        grid.scroll_up(n, Color::Default);
        grid.scroll_down(n, Color::Default);
        let after = grid_rows(&grid);
        // Rows that stayed on screen return to where they were.
        prop_assert_eq!(&after[n as usize..], &before[n as usize..]);
        for row in &after[..n as usize] {
            prop_assert!(row.trim().is_empty());
        }
    }
}

// ── 5. Resize idempotence ───────────────────────────────────────────────

proptest! {
    #[test]
    fn resize_twice_equals_resize_once(
        (cols, rows) in dims(),
        (new_cols, new_rows) in dims(),
        text in "[a-z \\n]{0,400}",
        reflow in any::<bool>(),
    ) {
        let config = TermConfig::default()
            .with_size(cols, rows)
            .with_scrollback(128)
            .with_reflow(reflow);
        let mut once = Terminal::new(config.clone());
        let mut twice = Terminal::new(config);
        let input = text.replace('\n', "\r\n");
        once.feed_str(&input);
        twice.feed_str(&input);

        once.resize(new_cols, new_rows);
        twice.resize(new_cols, new_rows);
        twice.resize(new_cols, new_rows);

        prop_assert_eq!(screen_text(&once), screen_text(&twice));
        prop_assert_eq!(once.cursor(), twice.cursor());
        prop_assert_eq!(once.grid().history(), twice.grid().history());
        assert_grid_valid(twice.grid());
    }
}

// ── 6. Synchronized update bound ────────────────────────────────────────

proptest! {
    #[test]
    fn unterminated_sync_is_released_by_deadline(
        timeout_ms in 1u64..=2000,
        via_dcs in any::<bool>(),
        output in "[ -~]{0,200}",
        late_ms in 0u64..=50,
    ) {
        let timeout = Duration::from_millis(timeout_ms);
        let config = TermConfig::default()
            .with_size(40, 5)
            .with_app_sync_timeout(timeout_ms * 1_000_000);
        let mut t = Terminal::new(config);
        let start = Instant::now();

        let begin: &[u8] = if via_dcs { b"\x1bP=1s\x1b\\" } else { b"\x1b[?2026h" };
        t.feed_at(begin, start);
        t.feed_at(output.as_bytes(), start + timeout / 2);
        prop_assert!(t.is_syncing());

        let deadline = t.render().next_deadline().expect("sync deadline");
        prop_assert!(deadline <= start + timeout);
        prop_assert!(!t.render_mut().poll(start + timeout / 2));

        let now = start + timeout + Duration::from_millis(late_ms);
        prop_assert!(t.render_mut().poll(now));
        prop_assert!(!t.is_syncing());
    }
}
