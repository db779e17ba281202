//! Terminal cell: the fundamental unit of the grid.
//!
//! A cell stores a 32-bit content key and its rendition. The key is either a
//! single Unicode scalar, `0` for the trailing half of a wide glyph, or an
//! interned grapheme-cluster id (see [`crate::grapheme`]).

use bitflags::bitflags;
use std::collections::HashMap;
use unicode_width::UnicodeWidthChar;

use crate::grapheme::CLUSTER_KEY_BASE;

bitflags! {
    /// SGR rendition bits.
    ///
    /// Underline is not a flag: it carries a style, see [`UnderlineStyle`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SgrFlags: u16 {
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const BLINK         = 1 << 3;
        const INVERSE       = 1 << 4;
        const HIDDEN        = 1 << 5;
        const STRIKETHROUGH = 1 << 6;
    }
}

bitflags! {
    /// Cell-level flags that are orthogonal to SGR attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        /// This cell is the leading (left) cell of a wide (2-column) glyph.
        const WIDE_CHAR = 1 << 0;
        /// This cell is the trailing (right) continuation of a wide glyph.
        /// Its key is always `0`.
        const WIDE_CONTINUATION = 1 << 1;
    }
}

/// Underline style, as selected by `SGR 4` and `SGR 4:N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnderlineStyle {
    #[default]
    None,
    Single,
    Double,
    Curly,
    Dotted,
    Dashed,
}

impl UnderlineStyle {
    /// Map the `N` of `SGR 4:N` to a style. Unknown values yield `None`
    /// so the caller can ignore them.
    pub fn from_sgr_sub(n: u16) -> Option<Self> {
        Some(match n {
            0 => Self::None,
            1 => Self::Single,
            2 => Self::Double,
            3 => Self::Curly,
            4 => Self::Dotted,
            5 => Self::Dashed,
            _ => return None,
        })
    }

    /// The `N` of `SGR 4:N` for this style.
    pub fn sgr_sub(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Single => 1,
            Self::Double => 2,
            Self::Curly => 3,
            Self::Dotted => 4,
            Self::Dashed => 5,
        }
    }
}

/// Color, tagged by source.
///
/// Supports the standard terminal color model hierarchy:
/// default → base-16 → base-256 → 24-bit RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default (SGR 39 / SGR 49 / SGR 59).
    #[default]
    Default,
    /// Base-16 index (0-15): standard 8 + bright 8.
    Named(u8),
    /// 256-color palette index (0-255).
    Indexed(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

impl Color {
    /// Pack an RGB color into `0xRRGGBB`.
    pub fn packed_rgb(r: u8, g: u8, b: u8) -> u32 {
        (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
    }

    /// Palette index for indexed sources, `None` for default and RGB.
    pub fn palette_index(self) -> Option<u8> {
        match self {
            Self::Named(i) | Self::Indexed(i) => Some(i),
            Self::Default | Self::Rgb(..) => None,
        }
    }
}

/// SGR attributes for a cell: flags, underline style and colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SgrAttrs {
    pub flags: SgrFlags,
    pub underline: UnderlineStyle,
    pub fg: Color,
    pub bg: Color,
    /// Underline color (SGR 58). `None` means use foreground.
    pub underline_color: Option<Color>,
}

impl SgrAttrs {
    /// Reset all attributes to default (SGR 0).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// OSC 8 link id stored in a cell; `0` is no link.
pub type HyperlinkId = u16;

/// Append-only store of OSC 8 URIs.
///
/// Ids are handed out in order and stay valid until [`clear`](Self::clear)
/// (RIS). Once all `u16` ids are taken, new URIs are not linked.
#[derive(Debug, Clone, Default)]
pub struct HyperlinkRegistry {
    uris: Vec<Box<str>>,
    ids: HashMap<Box<str>, HyperlinkId>,
}

impl HyperlinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The id for `uri`, allocating one on first use.
    pub fn intern(&mut self, uri: &str) -> HyperlinkId {
        if uri.is_empty() {
            return 0;
        }
        if let Some(&id) = self.ids.get(uri) {
            return id;
        }
        let Ok(id) = HyperlinkId::try_from(self.uris.len() + 1) else {
            tracing::warn!(uri, "hyperlink ids exhausted; link dropped");
            return 0;
        };
        self.uris.push(uri.into());
        self.ids.insert(uri.into(), id);
        id
    }

    #[must_use]
    pub fn get(&self, id: HyperlinkId) -> Option<&str> {
        let index = usize::from(id).checked_sub(1)?;
        self.uris.get(index).map(|uri| &**uri)
    }

    pub fn clear(&mut self) {
        self.uris.clear();
        self.ids.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.uris.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

/// A single cell in the terminal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Content key: a scalar value, `0` for a wide continuation, or a
    /// grapheme-cluster key at or above [`CLUSTER_KEY_BASE`].
    key: u32,
    /// Display width in columns: 1 or 2 for a leading cell, 0 for a continuation.
    width: u8,
    pub flags: CellFlags,
    pub attrs: SgrAttrs,
    /// Hyperlink ID (0 = no link).
    pub hyperlink: HyperlinkId,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            key: ' ' as u32,
            width: 1,
            flags: CellFlags::empty(),
            attrs: SgrAttrs::default(),
            hyperlink: 0,
        }
    }
}

impl Cell {
    /// Create a new cell with the given character and default attributes.
    pub fn new(ch: char) -> Self {
        Self {
            key: ch as u32,
            ..Self::default()
        }
    }

    /// Create a cell from a raw key, width and attributes.
    pub fn with_key(key: u32, width: u8, attrs: SgrAttrs) -> Self {
        Self {
            key,
            width,
            flags: if width == 2 {
                CellFlags::WIDE_CHAR
            } else {
                CellFlags::empty()
            },
            attrs,
            hyperlink: 0,
        }
    }

    /// The trailing half of a wide glyph.
    pub fn continuation(attrs: SgrAttrs) -> Self {
        Self {
            key: 0,
            width: 0,
            flags: CellFlags::WIDE_CONTINUATION,
            attrs,
            hyperlink: 0,
        }
    }

    /// Display width of a scalar, clamped to `0..=2`.
    ///
    /// Control characters report 0.
    pub fn display_width(ch: char) -> u8 {
        ch.width().unwrap_or(0).min(2) as u8
    }

    /// The raw content key.
    pub fn key(&self) -> u32 {
        self.key
    }

    /// The content as a single character, when it is one.
    ///
    /// Returns `None` for continuation cells and grapheme clusters.
    pub fn char(&self) -> Option<char> {
        if self.key == 0 || self.is_cluster() {
            return None;
        }
        char::from_u32(self.key)
    }

    /// Whether the key refers to an interned grapheme cluster.
    pub fn is_cluster(&self) -> bool {
        self.key >= CLUSTER_KEY_BASE
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn is_wide(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CHAR)
    }

    pub fn is_wide_continuation(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CONTINUATION)
    }

    /// Whether the cell shows nothing: a space with no visible rendition
    /// other than its background.
    pub fn is_blank(&self) -> bool {
        self.key == ' ' as u32
            && self.attrs.flags.is_empty()
            && self.attrs.underline == UnderlineStyle::None
            && self.hyperlink == 0
    }

    /// Replace the content key and width, keeping the rendition.
    pub fn set_key(&mut self, key: u32, width: u8) {
        self.key = key;
        self.width = width;
        self.flags
            .remove(CellFlags::WIDE_CHAR | CellFlags::WIDE_CONTINUATION);
        if width == 2 {
            self.flags.insert(CellFlags::WIDE_CHAR);
        }
    }

    /// Reset this cell to a blank space with the given background.
    ///
    /// Used by erase operations (ED, EL, ECH) which fill with the current
    /// background color but reset all other attributes.
    pub fn erase(&mut self, bg: Color) {
        self.key = ' ' as u32;
        self.width = 1;
        self.flags = CellFlags::empty();
        self.attrs = SgrAttrs {
            bg,
            ..SgrAttrs::default()
        };
        self.hyperlink = 0;
    }

    /// Reset this cell to a blank space with default attributes.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
