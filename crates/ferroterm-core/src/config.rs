//! Terminal configuration.
//!
//! There is no configuration file parser here: a host builds a [`TermConfig`]
//! from its defaults, `with_*` builders, and `key=value` overrides.

use crate::grapheme::GraphemeWidthMethod;

/// Cursor shape as selected by DECSCUSR or configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Block,
    Underline,
    Beam,
}

impl CursorShape {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "block" => Some(Self::Block),
            "underline" => Some(Self::Underline),
            "beam" => Some(Self::Beam),
            _ => None,
        }
    }
}

/// The default xterm 256-color palette, packed as `0xRRGGBB`.
pub fn default_palette() -> [u32; 256] {
    const BASE16: [u32; 16] = [
        0x000000, 0xcd0000, 0x00cd00, 0xcdcd00, 0x0000ee, 0xcd00cd, 0x00cdcd, 0xe5e5e5,
        0x7f7f7f, 0xff0000, 0x00ff00, 0xffff00, 0x5c5cff, 0xff00ff, 0x00ffff, 0xffffff,
    ];
    const LEVELS: [u32; 6] = [0x00, 0x5f, 0x87, 0xaf, 0xd7, 0xff];

    let mut palette = [0u32; 256];
    palette[..16].copy_from_slice(&BASE16);
    for r in 0..6 {
        for g in 0..6 {
            for b in 0..6 {
                palette[16 + r * 36 + g * 6 + b] = (LEVELS[r] << 16) | (LEVELS[g] << 8) | LEVELS[b];
            }
        }
    }
    for i in 0..24u32 {
        let level = 8 + i * 10;
        palette[232 + i as usize] = (level << 16) | (level << 8) | level;
    }
    palette
}

/// How the frontend first shows the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMode {
    #[default]
    Windowed,
    Maximized,
    Fullscreen,
}

impl WindowMode {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "windowed" => Some(Self::Windowed),
            "maximized" => Some(Self::Maximized),
            "fullscreen" => Some(Self::Fullscreen),
            _ => None,
        }
    }
}

/// Per-terminal settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TermConfig {
    /// Value of `TERM` in the child, also the XTGETTCAP `TN` capability.
    pub term: String,
    /// Scrollback lines kept by the primary screen.
    pub scrollback_lines: usize,
    /// Quiet period after output before a frame is rendered.
    pub delayed_render_lower_ns: u64,
    /// Longest delay between the first dirty event and a frame.
    pub delayed_render_upper_ns: u64,
    /// Upper bound for an application-synchronized update window.
    pub app_sync_timeout_ns: u64,
    pub grapheme_shaping: bool,
    pub grapheme_width_method: GraphemeWidthMethod,
    pub sixel: bool,
    pub palette: [u32; 256],
    pub default_fg: u32,
    pub default_bg: u32,
    pub cursor_style: CursorShape,
    pub cursor_blink: bool,
    /// Reflow primary-screen text on resize.
    pub reflow: bool,
    /// Initial size as `(cols, rows)`.
    pub initial_size: (u16, u16),
    /// Cell size in pixels as `(width, height)`.
    pub cell_size_px: (u16, u16),
    /// Exported to the child as `TERMINFO` when set.
    pub terminfo_dir: Option<String>,
    /// Local host name. OSC 7 URIs naming another host are ignored.
    pub hostname: Option<String>,
    /// Title until the application sets one.
    pub title: Option<String>,
    /// Application id handed to the frontend.
    pub app_id: Option<String>,
    pub window_mode: WindowMode,
}

impl Default for TermConfig {
    fn default() -> Self {
        Self {
            term: "ferroterm".to_string(),
            scrollback_lines: 1000,
            delayed_render_lower_ns: 500_000,
            delayed_render_upper_ns: 16_666_666,
            app_sync_timeout_ns: 1_000_000_000,
            grapheme_shaping: true,
            grapheme_width_method: GraphemeWidthMethod::Double,
            sixel: true,
            palette: default_palette(),
            default_fg: 0xffffff,
            default_bg: 0x000000,
            cursor_style: CursorShape::Block,
            cursor_blink: false,
            reflow: true,
            initial_size: (80, 24),
            cell_size_px: (8, 16),
            terminfo_dir: None,
            hostname: None,
            title: None,
            app_id: None,
            window_mode: WindowMode::Windowed,
        }
    }
}

impl TermConfig {
    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.initial_size = (cols.max(1), rows.max(1));
        self
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    pub fn with_scrollback(mut self, lines: usize) -> Self {
        self.scrollback_lines = lines;
        self
    }

    pub fn with_grapheme_shaping(mut self, enabled: bool) -> Self {
        self.grapheme_shaping = enabled;
        self
    }

    pub fn with_grapheme_width_method(mut self, method: GraphemeWidthMethod) -> Self {
        self.grapheme_width_method = method;
        self
    }

    pub fn with_sixel(mut self, enabled: bool) -> Self {
        self.sixel = enabled;
        self
    }

    pub fn with_reflow(mut self, enabled: bool) -> Self {
        self.reflow = enabled;
        self
    }

    pub fn with_render_delays(mut self, lower_ns: u64, upper_ns: u64) -> Self {
        self.delayed_render_lower_ns = lower_ns;
        self.delayed_render_upper_ns = upper_ns;
        self
    }

    pub fn with_app_sync_timeout(mut self, timeout_ns: u64) -> Self {
        self.app_sync_timeout_ns = timeout_ns;
        self
    }

    pub fn with_terminfo_dir(mut self, dir: impl Into<String>) -> Self {
        self.terminfo_dir = Some(dir.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Apply one `key=value` override. Returns `false` for unknown keys and
    /// unparsable values, leaving the configuration untouched.
    pub fn apply_override(&mut self, key: &str, value: &str) -> bool {
        let applied = match key {
            "term" => {
                self.term = value.to_string();
                true
            }
            "scrollback.lines" => set_parsed(&mut self.scrollback_lines, value),
            "tweak.delayed-render-lower" => set_parsed(&mut self.delayed_render_lower_ns, value),
            "tweak.delayed-render-upper" => set_parsed(&mut self.delayed_render_upper_ns, value),
            "tweak.grapheme-shaping" => parse_bool(value)
                .map(|v| self.grapheme_shaping = v)
                .is_some(),
            "tweak.grapheme-width-method" => {
                let method = match value {
                    "max" => Some(GraphemeWidthMethod::Max),
                    "double-width" => Some(GraphemeWidthMethod::Double),
                    "wcswidth" => Some(GraphemeWidthMethod::Wcswidth),
                    _ => None,
                };
                method.map(|m| self.grapheme_width_method = m).is_some()
            }
            "tweak.sixel" => parse_bool(value).map(|v| self.sixel = v).is_some(),
            "cursor.style" => CursorShape::parse(value)
                .map(|s| self.cursor_style = s)
                .is_some(),
            "cursor.blink" => parse_bool(value).map(|v| self.cursor_blink = v).is_some(),
            "title" => {
                self.title = Some(value.to_string());
                true
            }
            "app-id" => {
                self.app_id = Some(value.to_string());
                true
            }
            "initial-window-size-chars" => parse_size(value)
                .map(|size| self.initial_size = size)
                .is_some(),
            "initial-window-size-pixels" => parse_size(value)
                .map(|(width, height)| {
                    let (cell_w, cell_h) = self.cell_size_px;
                    self.initial_size = (
                        (width / cell_w.max(1)).max(1),
                        (height / cell_h.max(1)).max(1),
                    );
                })
                .is_some(),
            "initial-window-mode" => WindowMode::parse(value)
                .map(|mode| self.window_mode = mode)
                .is_some(),
            _ => false,
        };
        if !applied {
            tracing::warn!(key, value, "ignoring configuration override");
        }
        applied
    }

    /// Apply a list of `key=value` strings.
    pub fn apply_overrides<'a>(&mut self, overrides: impl IntoIterator<Item = &'a str>) {
        for item in overrides {
            match item.split_once('=') {
                Some((key, value)) => {
                    self.apply_override(key.trim(), value.trim());
                }
                None => tracing::warn!(item, "override is not of the form key=value"),
            }
        }
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.parse() {
        Ok(v) => {
            *slot = v;
            true
        }
        Err(_) => false,
    }
}

/// `COLSxROWS`, both non-zero.
fn parse_size(value: &str) -> Option<(u16, u16)> {
    let (cols, rows) = value.split_once('x')?;
    let cols: u16 = cols.trim().parse().ok()?;
    let rows: u16 = rows.trim().parse().ok()?;
    (cols > 0 && rows > 0).then_some((cols, rows))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_matches_xterm_anchors() {
        let p = default_palette();
        assert_eq!(p[1], 0xcd0000);
        assert_eq!(p[16], 0x000000);
        assert_eq!(p[21], 0x0000ff);
        assert_eq!(p[196], 0xff0000);
        assert_eq!(p[231], 0xffffff);
        assert_eq!(p[232], 0x080808);
        assert_eq!(p[255], 0xeeeeee);
    }

    #[test]
    fn defaults() {
        let c = TermConfig::default();
        assert_eq!(c.term, "ferroterm");
        assert_eq!(c.delayed_render_lower_ns, 500_000);
        assert_eq!(c.delayed_render_upper_ns, 16_666_666);
        assert_eq!(c.initial_size, (80, 24));
        assert!(c.grapheme_shaping);
    }

    #[test]
    fn overrides_apply_known_keys() {
        let mut c = TermConfig::default();
        c.apply_overrides([
            "term=xterm-256color",
            "scrollback.lines=5000",
            "tweak.grapheme-shaping=no",
            "cursor.style=beam",
        ]);
        assert_eq!(c.term, "xterm-256color");
        assert_eq!(c.scrollback_lines, 5000);
        assert!(!c.grapheme_shaping);
        assert_eq!(c.cursor_style, CursorShape::Beam);
    }

    #[test]
    fn unknown_or_invalid_overrides_are_ignored() {
        let mut c = TermConfig::default();
        assert!(!c.apply_override("colors.alpha", "0.5"));
        assert!(!c.apply_override("scrollback.lines", "lots"));
        assert_eq!(c, TermConfig::default());
    }

    #[test]
    fn with_size_clamps_to_one() {
        let c = TermConfig::default().with_size(0, 0);
        assert_eq!(c.initial_size, (1, 1));
    }

    #[test]
    fn client_overrides_set_title_and_size() {
        let mut c = TermConfig::default();
        c.apply_overrides(["title=build", "app-id=ferroterm.dev", "initial-window-size-chars=132x43"]);
        assert_eq!(c.title.as_deref(), Some("build"));
        assert_eq!(c.app_id.as_deref(), Some("ferroterm.dev"));
        assert_eq!(c.initial_size, (132, 43));
        assert!(!c.apply_override("initial-window-size-chars", "0x10"));
    }

    #[test]
    fn pixel_size_converts_through_cell_size() {
        let mut c = TermConfig::default();
        assert!(c.apply_override("initial-window-size-pixels", "800x480"));
        assert_eq!(c.initial_size, (100, 30));
        assert!(c.apply_override("initial-window-size-pixels", "4x4"));
        assert_eq!(c.initial_size, (1, 1));
    }

    #[test]
    fn window_mode_override() {
        let mut c = TermConfig::default();
        assert!(c.apply_override("initial-window-mode", "fullscreen"));
        assert_eq!(c.window_mode, WindowMode::Fullscreen);
        assert!(!c.apply_override("initial-window-mode", "iconic"));
    }
}
