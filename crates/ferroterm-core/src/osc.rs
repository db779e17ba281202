//! OSC dispatch: titles, colors, clipboard, hyperlinks and shell integration.
//!
//! The command number is the run of digits before the first `;`. Replies to
//! color and clipboard queries end with the same terminator as the request
//! (BEL or ST).

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::terminal::{TermEvent, Terminal};

impl Terminal {
    pub(crate) fn osc_dispatch(&mut self, data: &[u8], bel: bool) {
        let (number, rest) = match data.iter().position(|&b| b == b';') {
            Some(idx) => (&data[..idx], &data[idx + 1..]),
            None => (data, &data[data.len()..]),
        };
        let Some(command) = parse_number(number) else {
            tracing::debug!(osc = %String::from_utf8_lossy(data), "unhandled OSC");
            return;
        };
        let terminator = if bel { "\x07" } else { "\x1b\\" };

        match command {
            0 | 2 => self.set_title(String::from_utf8_lossy(rest).into_owned()),
            1 => {}
            4 => self.osc_palette(rest, terminator),
            7 => self.osc_cwd(rest),
            8 => self.osc_hyperlink(rest),
            9 => self.push_event(TermEvent::Notify {
                title: String::new(),
                body: String::from_utf8_lossy(rest).into_owned(),
            }),
            10 | 11 => {
                if rest == b"?" {
                    let color = if command == 10 {
                        self.colors.fg
                    } else {
                        self.colors.bg
                    };
                    let reply = format!("\x1b]{command};{}{terminator}", xparse_color(color));
                    self.replies.push_str(&reply);
                } else if let Some(color) = parse_color(rest) {
                    if command == 10 {
                        self.colors.fg = color;
                    } else {
                        self.colors.bg = color;
                    }
                    self.grid_mut().mark_all_dirty();
                }
            }
            12 => {
                if rest == b"?" {
                    let color = self.colors.cursor.unwrap_or(self.colors.fg);
                    let reply = format!("\x1b]12;{}{terminator}", xparse_color(color));
                    self.replies.push_str(&reply);
                } else if let Some(color) = parse_color(rest) {
                    self.colors.cursor = (color != 0).then_some(color);
                }
            }
            22 => self.pointer_shape = Some(String::from_utf8_lossy(rest).into_owned()),
            30 => {}
            52 => self.osc_clipboard(rest, terminator),
            99 => self.osc_kitty_notification(rest),
            104 => self.osc_reset_palette(rest),
            110 => self.colors.fg = self.config.default_fg,
            111 => self.colors.bg = self.config.default_bg,
            112 => self.colors.cursor = None,
            133 => {
                if rest.first() == Some(&b'A') {
                    let grid = self.grid_mut();
                    let row = grid.cursor.row;
                    if let Some(r) = grid.row_mut(row) {
                        r.prompt_marker = true;
                    }
                }
            }
            555 => self.push_event(TermEvent::Flash),
            777 => self.osc_notify(rest),
            _ => tracing::debug!(osc = %String::from_utf8_lossy(data), "unhandled OSC"),
        }
    }

    /// OSC 4: `idx;spec` pairs. `?` queries the entry.
    fn osc_palette(&mut self, rest: &[u8], terminator: &str) {
        let mut parts = rest.split(|&b| b == b';');
        while let (Some(idx), Some(spec)) = (parts.next(), parts.next()) {
            let Some(idx) = parse_number(idx) else {
                break;
            };
            if idx >= 256 {
                tracing::warn!(idx, "OSC 4: invalid palette index");
                break;
            }
            let idx = idx as usize;
            if spec == b"?" {
                let color = xparse_color(self.colors.palette[idx]);
                self.replies
                    .push_str(&format!("\x1b]4;{idx};{color}{terminator}"));
            } else if let Some(color) = parse_color(spec) {
                self.colors.palette[idx] = color;
                self.grid_mut().mark_all_dirty();
            }
        }
    }

    /// OSC 104: reset the listed entries, or the whole palette.
    fn osc_reset_palette(&mut self, rest: &[u8]) {
        let defaults = self.config.palette;
        if rest.is_empty() {
            self.colors.palette = defaults;
        } else {
            for idx in rest.split(|&b| b == b';') {
                match parse_number(idx) {
                    Some(i) if i < 256 => self.colors.palette[i as usize] = defaults[i as usize],
                    _ => tracing::warn!(idx = %String::from_utf8_lossy(idx), "OSC 104: invalid palette index"),
                }
            }
        }
        self.grid_mut().mark_all_dirty();
    }

    /// OSC 7: `file://host/path`. Only local hosts are accepted.
    fn osc_cwd(&mut self, rest: &[u8]) {
        let uri = String::from_utf8_lossy(rest);
        let Some(after_scheme) = uri.strip_prefix("file://") else {
            tracing::warn!(%uri, "OSC 7: not a file URI");
            return;
        };
        let (host, path) = match after_scheme.find('/') {
            Some(idx) => after_scheme.split_at(idx),
            None => (after_scheme, "/"),
        };
        let local = host.is_empty()
            || host == "localhost"
            || self.config.hostname.as_deref() == Some(host);
        if !local {
            tracing::debug!(host, "OSC 7: ignoring remote host");
            return;
        }
        let path = String::from_utf8_lossy(&percent_decode(path.as_bytes())).into_owned();
        self.cwd = Some(path.clone());
        self.push_event(TermEvent::CwdChanged(path));
    }

    /// OSC 8: `params;uri`. An empty URI ends the link.
    fn osc_hyperlink(&mut self, rest: &[u8]) {
        let Some(split) = rest.iter().position(|&b| b == b';') else {
            tracing::debug!("OSC 8: missing URI separator");
            return;
        };
        let uri = String::from_utf8_lossy(&rest[split + 1..]);
        self.hyperlink = if uri.is_empty() {
            0
        } else {
            self.hyperlinks.intern(&uri)
        };
    }

    /// OSC 52: `targets;base64` or `targets;?`.
    fn osc_clipboard(&mut self, rest: &[u8], terminator: &str) {
        let Some(split) = rest.iter().position(|&b| b == b';') else {
            tracing::debug!("OSC 52: missing data separator");
            return;
        };
        let (targets, payload) = (&rest[..split], &rest[split + 1..]);
        let targets: String = targets
            .iter()
            .filter(|b| b"cpqs01234567".contains(*b))
            .map(|&b| char::from(b))
            .collect();
        let targets = if targets.is_empty() {
            "c".to_string()
        } else {
            targets
        };

        if payload == b"?" {
            let target = targets.chars().next().unwrap_or('c');
            let encoded = self
                .clipboard
                .as_deref()
                .map(|data| STANDARD.encode(data))
                .unwrap_or_default();
            self.replies
                .push_str(&format!("\x1b]52;{target};{encoded}{terminator}"));
            return;
        }

        match STANDARD.decode(payload) {
            Ok(data) => {
                self.clipboard = Some(data.clone());
                self.push_event(TermEvent::ClipboardSet { targets, data });
            }
            Err(err) => tracing::warn!(%err, "OSC 52: invalid base64 payload"),
        }
    }

    /// OSC 777: `notify;title;body`.
    fn osc_notify(&mut self, rest: &[u8]) {
        let text = String::from_utf8_lossy(rest);
        let mut parts = text.splitn(3, ';');
        if parts.next() != Some("notify") {
            tracing::debug!(%text, "OSC 777: unsupported command");
            return;
        }
        let title = parts.next().unwrap_or_default().to_string();
        let body = parts.next().unwrap_or_default().to_string();
        self.push_event(TermEvent::Notify { title, body });
    }

    /// OSC 99: `metadata;payload`. Chunks marked `d=0` accumulate until the
    /// final one.
    fn osc_kitty_notification(&mut self, rest: &[u8]) {
        let text = String::from_utf8_lossy(rest);
        let (metadata, payload) = text.split_once(';').unwrap_or(("", &text));
        let mut done = true;
        let mut is_body = false;
        for item in metadata.split(':') {
            match item.split_once('=') {
                Some(("d", value)) => done = value != "0",
                Some(("p", value)) => is_body = value == "body",
                _ => {}
            }
        }
        let (title, body) = self.pending_notification.get_or_insert_default();
        if is_body {
            body.push_str(payload);
        } else {
            title.push_str(payload);
        }
        if done && let Some((title, body)) = self.pending_notification.take() {
            self.push_event(TermEvent::Notify { title, body });
        }
    }
}

fn parse_number(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// `rgb:RRRR/GGGG/BBBB`: each 8-bit channel repeated.
fn xparse_color(color: u32) -> String {
    let r = (color >> 16) & 0xff;
    let g = (color >> 8) & 0xff;
    let b = color & 0xff;
    format!("rgb:{r:02x}{r:02x}/{g:02x}{g:02x}/{b:02x}{b:02x}")
}

/// Parse an X11 color spec: `rgb:h/h/h`, `rgba:h/h/h/h` (alpha ignored) or
/// legacy `#hhh...`. Channels with fewer than four digits hold the most
/// significant bits. Returns `0xRRGGBB`.
pub fn parse_color(spec: &[u8]) -> Option<u32> {
    let spec = std::str::from_utf8(spec).ok()?;
    let [r, g, b] = if let Some(body) = spec.strip_prefix("rgba:") {
        let channels: Vec<&str> = body.split('/').collect();
        if channels.len() != 4 {
            return None;
        }
        [channel(channels[0])?, channel(channels[1])?, channel(channels[2])?]
    } else if let Some(body) = spec.strip_prefix("rgb:") {
        let channels: Vec<&str> = body.split('/').collect();
        if channels.len() != 3 {
            return None;
        }
        [channel(channels[0])?, channel(channels[1])?, channel(channels[2])?]
    } else {
        legacy_color(spec)?
    };
    Some((r << 16) | (g << 8) | b)
}

/// One hex channel of 1..=4 digits, rescaled to 8 bits.
fn channel(digits: &str) -> Option<u32> {
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some((value << 8) >> (4 * digits.len()))
}

/// `#RGB`, `#RRGGBB`, `#RRRGGGBBB` or `#RRRRGGGGBBBB`, optionally preceded by
/// an `[alpha]` percentage that is ignored.
fn legacy_color(spec: &str) -> Option<[u32; 3]> {
    let spec = match spec.strip_prefix('[') {
        Some(rest) => {
            let (percent, tail) = rest.split_once(']')?;
            percent.parse::<u32>().ok()?;
            tail
        }
        None => spec,
    };
    let hex = spec.strip_prefix('#')?;
    if hex.is_empty() || hex.len() % 3 != 0 || hex.len() > 12 {
        return None;
    }
    let n = hex.len() / 3;
    Some([
        channel(&hex[..n])?,
        channel(&hex[n..2 * n])?,
        channel(&hex[2 * n..])?,
    ])
}

fn percent_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%'
            && i + 2 < input.len()
            && let (Some(hi), Some(lo)) = (hex_value(input[i + 1]), hex_value(input[i + 2]))
        {
            out.push(hi << 4 | lo);
            i += 3;
            continue;
        }
        out.push(input[i]);
        i += 1;
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    char::from(b).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TermConfig;

    fn term() -> Terminal {
        Terminal::new(TermConfig::default().with_size(20, 5))
    }

    fn replies(t: &mut Terminal, input: &str) -> String {
        t.feed_str(input);
        String::from_utf8(t.take_replies()).unwrap()
    }

    // ── Color parsing ───────────────────────────────────────────────

    #[test]
    fn rgb_specs_scale_by_digit_count() {
        assert_eq!(parse_color(b"rgb:ff/80/00"), Some(0xff8000));
        assert_eq!(parse_color(b"rgb:f/8/0"), Some(0xf08000));
        assert_eq!(parse_color(b"rgb:ffff/8080/0000"), Some(0xff8000));
        assert_eq!(parse_color(b"rgb:fff/800/000"), Some(0xff8000));
        assert_eq!(parse_color(b"rgba:ff/80/00/ff"), Some(0xff8000));
    }

    #[test]
    fn legacy_specs() {
        assert_eq!(parse_color(b"#f80"), Some(0xf08000));
        assert_eq!(parse_color(b"#ff8000"), Some(0xff8000));
        assert_eq!(parse_color(b"[50]#ff8000"), Some(0xff8000));
        assert_eq!(parse_color(b"#ff80"), None);
    }

    #[test]
    fn malformed_specs() {
        for spec in [&b"rgb:ff/80"[..], b"rgb:/1/2", b"rgb:12345/0/0", b"red", b""] {
            assert_eq!(parse_color(spec), None, "{:?}", String::from_utf8_lossy(spec));
        }
    }

    // ── Titles ──────────────────────────────────────────────────────

    #[test]
    fn title_with_either_terminator() {
        let mut t = term();
        t.feed_str("\x1b]0;first\x07");
        assert_eq!(t.title(), "first");
        t.feed_str("\x1b]2;second\x1b\\");
        assert_eq!(t.title(), "second");
        t.feed_str("\x1b]1;icon\x07");
        assert_eq!(t.title(), "second");
        assert_eq!(
            t.take_events(),
            vec![
                TermEvent::TitleChanged("first".into()),
                TermEvent::TitleChanged("second".into())
            ]
        );
    }

    #[test]
    fn non_numeric_command_is_ignored() {
        let mut t = term();
        t.feed_str("\x1b]x;y\x07\x1b];title\x07");
        assert_eq!(t.title(), "");
    }

    // ── Colors ──────────────────────────────────────────────────────

    #[test]
    fn palette_set_and_query() {
        let mut t = term();
        t.feed_str("\x1b]4;1;rgb:12/34/56\x07");
        assert_eq!(t.colors().palette[1], 0x123456);
        assert_eq!(
            replies(&mut t, "\x1b]4;1;?\x1b\\"),
            "\x1b]4;1;rgb:1212/3434/5656\x1b\\"
        );
        assert_eq!(
            replies(&mut t, "\x1b]4;1;?;2;?\x07"),
            "\x1b]4;1;rgb:1212/3434/5656\x07\x1b]4;2;rgb:0000/cdcd/0000\x07"
        );
    }

    #[test]
    fn palette_index_out_of_range_stops() {
        let mut t = term();
        t.feed_str("\x1b]4;300;#fff;2;#fff\x07");
        assert_eq!(t.colors().palette[2], 0x00cd00);
    }

    #[test]
    fn palette_reset() {
        let mut t = term();
        t.feed_str("\x1b]4;1;#000;2;#000\x07\x1b]104;1\x07");
        assert_eq!(t.colors().palette[1], 0xcd0000);
        assert_eq!(t.colors().palette[2], 0);
        t.feed_str("\x1b]104\x07");
        assert_eq!(t.colors().palette[2], 0x00cd00);
    }

    #[test]
    fn default_colors_set_query_reset() {
        let mut t = term();
        t.feed_str("\x1b]10;#102030\x07\x1b]11;rgb:a/b/c\x07");
        assert_eq!(t.colors().fg, 0x102030);
        assert_eq!(t.colors().bg, 0xa0b0c0);
        assert_eq!(replies(&mut t, "\x1b]10;?\x07"), "\x1b]10;rgb:1010/2020/3030\x07");
        t.feed_str("\x1b]110\x07\x1b]111\x07");
        assert_eq!(t.colors().fg, 0xffffff);
        assert_eq!(t.colors().bg, 0x000000);
    }

    #[test]
    fn cursor_color() {
        let mut t = term();
        t.feed_str("\x1b]12;#ff0000\x07");
        assert_eq!(t.colors().cursor, Some(0xff0000));
        assert_eq!(replies(&mut t, "\x1b]12;?\x07"), "\x1b]12;rgb:ffff/0000/0000\x07");
        t.feed_str("\x1b]112\x07");
        assert_eq!(t.colors().cursor, None);
    }

    // ── Clipboard ───────────────────────────────────────────────────

    #[test]
    fn clipboard_write_and_query() {
        let mut t = term();
        t.feed_str("\x1b]52;c;aGVsbG8=\x07");
        assert_eq!(t.clipboard(), Some(&b"hello"[..]));
        assert_eq!(
            t.take_events(),
            vec![TermEvent::ClipboardSet {
                targets: "c".into(),
                data: b"hello".to_vec()
            }]
        );
        assert_eq!(replies(&mut t, "\x1b]52;c;?\x1b\\"), "\x1b]52;c;aGVsbG8=\x1b\\");
    }

    #[test]
    fn clipboard_defaults_and_bad_payload() {
        let mut t = term();
        t.feed_str("\x1b]52;;aGk=\x07");
        assert_eq!(
            t.take_events(),
            vec![TermEvent::ClipboardSet {
                targets: "c".into(),
                data: b"hi".to_vec()
            }]
        );
        t.feed_str("\x1b]52;c;!!!\x07");
        assert!(t.take_events().is_empty());
        assert_eq!(t.clipboard(), Some(&b"hi"[..]));
    }

    // ── Hyperlinks and shell integration ────────────────────────────

    #[test]
    fn hyperlink_marks_cells() {
        let mut t = term();
        t.feed_str("\x1b]8;;https://example.com\x1b\\ab\x1b]8;;\x1b\\c");
        let link = t.grid().cell(0, 0).unwrap().hyperlink;
        assert_ne!(link, 0);
        assert_eq!(t.hyperlinks().get(link), Some("https://example.com"));
        assert_eq!(t.grid().cell(0, 1).unwrap().hyperlink, link);
        assert_eq!(t.grid().cell(0, 2).unwrap().hyperlink, 0);
    }

    #[test]
    fn working_directory_from_file_uri() {
        let mut t = Terminal::new(TermConfig::default().with_hostname("box"));
        t.feed_str("\x1b]7;file://box/home/me/my%20dir\x07");
        assert_eq!(t.cwd(), Some("/home/me/my dir"));
        t.feed_str("\x1b]7;file://elsewhere/tmp\x07");
        assert_eq!(t.cwd(), Some("/home/me/my dir"));
        t.feed_str("\x1b]7;file:///tmp\x07");
        assert_eq!(t.cwd(), Some("/tmp"));
    }

    #[test]
    fn prompt_marker_on_current_row() {
        let mut t = term();
        t.feed_str("\r\n\x1b]133;A\x07$ ");
        assert!(t.grid().row(1).unwrap().prompt_marker);
        assert!(!t.grid().row(0).unwrap().prompt_marker);
    }

    #[test]
    fn notifications() {
        let mut t = term();
        t.feed_str("\x1b]777;notify;Build;done\x07\x1b]9;ping\x07\x1b]555\x07");
        assert_eq!(
            t.take_events(),
            vec![
                TermEvent::Notify {
                    title: "Build".into(),
                    body: "done".into()
                },
                TermEvent::Notify {
                    title: String::new(),
                    body: "ping".into()
                },
                TermEvent::Flash,
            ]
        );
    }

    #[test]
    fn chunked_kitty_notification() {
        let mut t = term();
        t.feed_str("\x1b]99;i=1:d=0;Hello\x1b\\\x1b]99;i=1:p=body;World\x1b\\");
        assert_eq!(
            t.take_events(),
            vec![TermEvent::Notify {
                title: "Hello".into(),
                body: "World".into()
            }]
        );
    }

    #[test]
    fn pointer_shape_is_stored() {
        let mut t = term();
        t.feed_str("\x1b]22;text\x07");
        assert_eq!(t.pointer_shape(), Some("text"));
    }
}
