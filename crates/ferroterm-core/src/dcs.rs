//! DCS replies: DECRQSS and XTGETTCAP.
//!
//! The parser buffers the request and hands it over on unhook; these
//! functions build the exact reply bytes. Valid DECRQSS replies use `1`,
//! invalid ones `0`, as real hardware does.

use std::fmt::Write as _;

use crate::captable::{self, CapValue};
use crate::cell::{Color, SgrAttrs, SgrFlags, UnderlineStyle};
use crate::config::CursorShape;
use crate::grid::ScrollRegion;

const DECRQSS_INVALID: &[u8] = b"\x1bP0$r\x1b\\";

/// Terminal settings a DECRQSS request can ask for.
#[derive(Debug, Clone, Copy)]
pub struct SettingsReport<'a> {
    pub attrs: &'a SgrAttrs,
    pub region: ScrollRegion,
    pub cursor_shape: CursorShape,
    pub cursor_blink: bool,
}

/// Build the DECRQSS reply for `request` (`m`, `r` or ` q`).
#[must_use]
pub fn decrqss_reply(request: &[u8], settings: &SettingsReport<'_>) -> Vec<u8> {
    let body = match request {
        b"r" => format!(
            "{};{}r",
            settings.region.top + 1,
            settings.region.bottom
        ),
        b"m" => sgr_report(settings.attrs),
        b" q" => {
            let mut mode = match settings.cursor_shape {
                CursorShape::Block => 2,
                CursorShape::Underline => 4,
                CursorShape::Beam => 6,
            };
            if settings.cursor_blink {
                mode -= 1;
            }
            format!("{mode} q")
        }
        _ => {
            tracing::debug!(request = %String::from_utf8_lossy(request), "DECRQSS: unsupported setting");
            return DECRQSS_INVALID.to_vec();
        }
    };
    let mut reply = Vec::with_capacity(body.len() + 7);
    reply.extend_from_slice(b"\x1bP1$r");
    reply.extend_from_slice(body.as_bytes());
    reply.extend_from_slice(b"\x1b\\");
    reply
}

/// Reconstruct the SGR sequence for `attrs`, starting with `0` and ending
/// with `m`.
#[must_use]
pub fn sgr_report(attrs: &SgrAttrs) -> String {
    let mut parts: Vec<String> = vec!["0".into()];
    let flags = attrs.flags;

    if flags.contains(SgrFlags::BOLD) {
        parts.push("1".into());
    }
    if flags.contains(SgrFlags::DIM) {
        parts.push("2".into());
    }
    if flags.contains(SgrFlags::ITALIC) {
        parts.push("3".into());
    }
    match attrs.underline {
        UnderlineStyle::None => {}
        UnderlineStyle::Single => parts.push("4".into()),
        style => parts.push(format!("4:{}", style.sgr_sub())),
    }
    if flags.contains(SgrFlags::BLINK) {
        parts.push("5".into());
    }
    if flags.contains(SgrFlags::INVERSE) {
        parts.push("7".into());
    }
    if flags.contains(SgrFlags::HIDDEN) {
        parts.push("8".into());
    }
    if flags.contains(SgrFlags::STRIKETHROUGH) {
        parts.push("9".into());
    }

    if let Some(fg) = color_param(attrs.fg, 30, 90, 38) {
        parts.push(fg);
    }
    if let Some(bg) = color_param(attrs.bg, 40, 100, 48) {
        parts.push(bg);
    }
    match attrs.underline_color {
        Some(Color::Named(n) | Color::Indexed(n)) => parts.push(format!("58:5:{n}")),
        Some(Color::Rgb(r, g, b)) => parts.push(format!("58:2::{r}:{g}:{b}")),
        Some(Color::Default) | None => {}
    }

    let mut out = parts.join(";");
    out.push('m');
    out
}

fn color_param(color: Color, base: u16, bright: u16, extended: u16) -> Option<String> {
    match color {
        Color::Default => None,
        Color::Named(n) if n >= 8 => Some((bright + u16::from(n) - 8).to_string()),
        Color::Named(n) => Some((base + u16::from(n)).to_string()),
        Color::Indexed(n) => Some(format!("{extended}:5:{n}")),
        Color::Rgb(r, g, b) => Some(format!("{extended}:2::{r}:{g}:{b}")),
    }
}

/// Build the XTGETTCAP replies for a `;`-separated list of hex-encoded
/// capability names. Every name gets exactly one reply.
///
/// An empty payload yields a single error reply with an empty name.
#[must_use]
pub fn xtgettcap_replies(payload: &[u8], term_name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for hex_name in payload.split(|&b| b == b';') {
        xtgettcap_reply(hex_name, term_name, &mut out);
    }
    out
}

fn xtgettcap_reply(hex_name: &[u8], term_name: &str, out: &mut Vec<u8>) {
    let value = hex_decode(hex_name).and_then(|name| captable::lookup(&name));
    let Some(value) = value else {
        tracing::debug!(name = %String::from_utf8_lossy(hex_name), "XTGETTCAP: unknown capability");
        out.extend_from_slice(b"\x1bP0+r");
        out.extend_from_slice(hex_name);
        out.extend_from_slice(b"\x1b\\");
        return;
    };

    out.extend_from_slice(b"\x1bP1+r");
    out.extend_from_slice(hex_name);
    if value != CapValue::Bool {
        out.push(b'=');
        out.extend_from_slice(hex_encode(value.render(term_name).as_bytes()).as_bytes());
    }
    out.extend_from_slice(b"\x1b\\");
}

/// Decode a hex string (either case). Odd lengths and non-hex digits fail.
#[must_use]
pub fn hex_decode(s: &[u8]) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.chunks_exact(2)
        .map(|pair| Some(nibble(pair[0])? << 4 | nibble(pair[1])?))
        .collect()
}

/// Encode bytes as uppercase hex.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
