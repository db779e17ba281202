//! End-to-end scenarios: literal child output in, grid state and replies out.

use ferroterm_core::dcs::hex_encode;
use ferroterm_core::grapheme::CLUSTER_KEY_BASE;
use ferroterm_core::{Color, Cursor, SgrFlags, TermConfig, TermEvent, Terminal};

fn term_80x24() -> Terminal {
    Terminal::new(TermConfig::default())
}

fn cursor_at(t: &Terminal) -> (u16, u16) {
    let Cursor { row, col, .. } = t.cursor();
    (row, col)
}

// ── Printing ────────────────────────────────────────────────────────────

#[test]
fn plain_text_and_newline() {
    let mut t = term_80x24();
    t.feed(b"abc\r\n");
    let row = t.grid().row(0).expect("row 0");
    let chars: Vec<_> = row.cells()[..3].iter().map(|c| c.char()).collect();
    assert_eq!(chars, [Some('a'), Some('b'), Some('c')]);
    assert_eq!(cursor_at(&t), (1, 0));
}

#[test]
fn sgr_color_then_reset() {
    let mut t = term_80x24();
    t.feed(b"\x1b[31mX\x1b[0mY");
    let x = t.grid().cell(0, 0).expect("cell");
    let y = t.grid().cell(0, 1).expect("cell");
    assert_eq!(x.char(), Some('X'));
    assert_eq!(x.attrs.fg, Color::Named(1));
    assert_eq!(y.char(), Some('Y'));
    assert_eq!(y.attrs.fg, Color::Default);
}

#[test]
fn combining_acute_forms_one_cluster_cell() {
    let mut t = Terminal::new(TermConfig::default().with_grapheme_shaping(true));
    t.feed(b"A\xcc\x81");
    let cell = *t.grid().cell(0, 0).expect("cell");
    assert!(cell.key() >= CLUSTER_KEY_BASE);
    assert!(cell.is_cluster());
    assert_eq!(cell.width(), 1);
    let entry = t.graphemes().resolve(cell.key()).expect("interned");
    assert_eq!(entry.chars(), ['A', '\u{301}']);
    assert_eq!(cursor_at(&t), (0, 1));
    assert!(t.grid().cell(0, 1).expect("cell").is_blank());
}

// ── Alternate screen ────────────────────────────────────────────────────

#[test]
fn alternate_screen_round_trip_preserves_primary() {
    let mut t = term_80x24();
    t.feed(b"\x1b[1;32mhello");
    let attrs_before = *t.attrs();
    let cursor_before = cursor_at(&t);

    t.feed(b"\x1b[?1049h");
    assert!(t.is_alternate_screen());
    t.feed(b"\x1b[2J\x1b[Hscratch\x1b[0;7m");
    assert_eq!(t.row_text(0), "scratch");

    t.feed(b"\x1b[?1049l");
    assert!(!t.is_alternate_screen());
    assert_eq!(t.row_text(0), "hello");
    assert_eq!(cursor_at(&t), cursor_before);
    assert_eq!(*t.attrs(), attrs_before);

    // Re-entering shows a cleared alternate screen.
    t.feed(b"\x1b[?1049h");
    assert_eq!(t.row_text(0), "");
}

// ── DCS replies ─────────────────────────────────────────────────────────

#[test]
fn decrqss_sgr_reply_bytes() {
    let mut t = term_80x24();
    t.feed(b"\x1b[1;34m");
    assert!(t.attrs().flags.contains(SgrFlags::BOLD));
    t.feed(b"\x1bP$qm\x1b\\");
    assert_eq!(t.take_replies(), b"\x1bP1$r0;1;34m\x1b\\");
}

#[test]
fn xtgettcap_terminal_name() {
    let mut t = term_80x24();
    let request = format!("\x1bP+q{}\x1b\\", hex_encode(b"TN"));
    t.feed(request.as_bytes());
    let expected = format!("\x1bP1+r544E={}\x1b\\", hex_encode(b"ferroterm"));
    assert_eq!(t.take_replies(), expected.into_bytes());
}

#[test]
fn xtgettcap_multiple_names_reply_in_order() {
    let mut t = term_80x24();
    t.feed(b"\x1bP+q436F;7A7A\x1b\\");
    let expected = format!("\x1bP1+r436F={}\x1b\\\x1bP0+r7A7A\x1b\\", hex_encode(b"256"));
    assert_eq!(t.take_replies(), expected.into_bytes());
}

// ── Queries and events ──────────────────────────────────────────────────

#[test]
fn device_status_and_attributes() {
    let mut t = term_80x24();
    t.feed(b"\x1b[5;10H\x1b[6n\x1b[5n");
    assert_eq!(t.take_replies(), b"\x1b[5;10R\x1b[0n");
}

#[test]
fn title_and_bell_become_events() {
    let mut t = term_80x24();
    t.feed(b"\x1b]2;build\x07\x07");
    let events = t.take_events();
    assert!(events.contains(&TermEvent::TitleChanged("build".into())));
    assert!(events.contains(&TermEvent::Bell));
    assert_eq!(t.title(), "build");
    assert_eq!(t.bell_count(), 1);
}

#[test]
fn scrollback_keeps_lines_scrolled_off() {
    let mut t = Terminal::new(TermConfig::default().with_size(10, 3).with_scrollback(16));
    t.feed(b"one\r\ntwo\r\nthree\r\nfour");
    assert_eq!(t.row_text(0), "two");
    assert_eq!(t.grid().history(), 1);
    let oldest = t.grid().line(0).expect("history line");
    let text: String = oldest.cells().iter().filter_map(|c| c.char()).collect();
    assert_eq!(text.trim_end(), "one");
}
