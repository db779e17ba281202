//! Grapheme-cluster interning.
//!
//! A cell's content key is a single scalar until a combining mark or other
//! cluster extender arrives for it. The base and every extender are then
//! interned here under a 32-bit key, and the cell stores
//! `CLUSTER_KEY_BASE + key` instead.
//!
//! Entries are immutable once inserted and live as long as the table. Keys are
//! derived by chaining a multiplicative hash over the code points; collisions
//! are resolved by linear probing on the key.

use std::collections::BTreeMap;

use unicode_segmentation::UnicodeSegmentation;

use crate::cell::Cell;

/// First cell key used for interned clusters. Everything below is a scalar.
pub const CLUSTER_KEY_BASE: u32 = 0x4000_0000;

/// Keys are masked to this span, so the table holds at most this many entries.
pub const CLUSTER_KEY_SPAN: u32 = 0x000F_FFFF;

/// Longest cluster kept. Further extenders are dropped.
const MAX_CLUSTER_LEN: usize = 255;

/// Slots scanned before an insert gives up.
const MAX_COLLISIONS: u32 = 128;

/// How the width of a cluster is derived from its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphemeWidthMethod {
    /// Widest code point wins.
    Max,
    /// Sum of widths, capped at 2. VS16 (U+FE0F) forces emoji presentation.
    #[default]
    Double,
    /// Plain sum of widths, capped at the cell limit of 2.
    Wcswidth,
}

/// One interned cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphemeEntry {
    key: u32,
    chars: Vec<char>,
    width: u8,
}

impl GraphemeEntry {
    /// Intern key (without [`CLUSTER_KEY_BASE`]).
    pub fn key(&self) -> u32 {
        self.key
    }

    /// The cell key that refers to this entry.
    pub fn cell_key(&self) -> u32 {
        CLUSTER_KEY_BASE + self.key
    }

    /// Base code point followed by the extenders, in arrival order.
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// The cluster as a string.
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }
}

/// Intern table, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct GraphemeTable {
    entries: BTreeMap<u32, GraphemeEntry>,
    warned_full: bool,
    warned_collisions: bool,
}

impl GraphemeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by intern key.
    pub fn get(&self, key: u32) -> Option<&GraphemeEntry> {
        self.entries.get(&key)
    }

    /// Look up the entry a cell key refers to, if it is a cluster key.
    pub fn resolve(&self, cell_key: u32) -> Option<&GraphemeEntry> {
        cell_key
            .checked_sub(CLUSTER_KEY_BASE)
            .and_then(|key| self.entries.get(&key))
    }

    /// Append `text` for `cell_key` to `out`: the scalar, the cluster, or
    /// nothing for a wide continuation.
    pub fn push_text(&self, cell_key: u32, out: &mut String) {
        if cell_key == 0 {
            return;
        }
        if let Some(entry) = self.resolve(cell_key) {
            out.extend(entry.chars.iter());
        } else if let Some(ch) = char::from_u32(cell_key) {
            out.push(ch);
        }
    }

    /// Whether `next` continues the cluster currently held by `cell_key`
    /// rather than starting a new one.
    pub fn extends(&self, cell_key: u32, next: char) -> bool {
        let mut text = String::new();
        self.push_text(cell_key, &mut text);
        if text.is_empty() {
            return false;
        }
        text.push(next);
        text.graphemes(true).nth(1).is_none()
    }

    /// Extend the content held by `cell_key` with `wc`.
    ///
    /// Returns the new cell key and its width, or `None` when the table is
    /// full or the scan budget is exhausted (the caller drops `wc`).
    pub fn append(
        &mut self,
        cell_key: u32,
        wc: char,
        method: GraphemeWidthMethod,
    ) -> Option<(u32, u8)> {
        let existing = self.resolve(cell_key).cloned();

        let (mut chars, base_width, mut key) = match &existing {
            Some(entry) => (
                entry.chars.clone(),
                entry.width,
                chain_key(entry.key, wc as u32),
            ),
            None => {
                let base = char::from_u32(cell_key)?;
                (vec![base], Cell::display_width(base), chain_key(cell_key, wc as u32))
            }
        };

        if chars.len() >= MAX_CLUSTER_LEN {
            tracing::debug!(len = chars.len(), "cluster too long, dropping extender");
            return existing.map(|e| (e.cell_key(), e.width));
        }
        chars.push(wc);

        let mut collisions = 0;
        loop {
            match self.entries.get(&key) {
                None => break,
                Some(entry) if entry.chars == chars => {
                    return Some((entry.cell_key(), entry.width));
                }
                Some(_) => {
                    key = (key + 1) & CLUSTER_KEY_SPAN;
                    collisions += 1;
                    if collisions > MAX_COLLISIONS {
                        if !self.warned_collisions {
                            self.warned_collisions = true;
                            tracing::warn!("ignoring composed character: too many collisions");
                        }
                        return None;
                    }
                }
            }
        }

        if self.entries.len() >= CLUSTER_KEY_SPAN as usize {
            if !self.warned_full {
                self.warned_full = true;
                tracing::warn!("maximum number of composed characters reached");
            }
            return None;
        }

        let wc_width = Cell::display_width(wc);
        let width = match method {
            GraphemeWidthMethod::Max => base_width.max(wc_width),
            GraphemeWidthMethod::Double => {
                let wc_width = if wc == '\u{FE0F}' { 2 } else { wc_width };
                (base_width + wc_width).min(2)
            }
            GraphemeWidthMethod::Wcswidth => (base_width + wc_width).min(2),
        }
        .max(1);

        let entry = GraphemeEntry { key, chars, width };
        let cell_key = entry.cell_key();
        self.entries.insert(key, entry);
        Some((cell_key, width))
    }

    /// Drop every entry (RIS).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Chain a new code point onto a key: rotate, mix, multiply, mask.
fn chain_key(old_key: u32, wc: u32) -> u32 {
    let bits = 32 - CLUSTER_KEY_SPAN.leading_zeros();
    let rotated = (old_key << 8) | (old_key >> (bits - 8));
    (rotated ^ wc).wrapping_mul(2_654_435_761) & CLUSTER_KEY_SPAN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combining_acute_interns_cluster() {
        let mut table = GraphemeTable::new();
        let (key, width) = table
            .append('A' as u32, '\u{301}', GraphemeWidthMethod::Double)
            .unwrap();
        assert!(key >= CLUSTER_KEY_BASE);
        assert_eq!(width, 1);
        let entry = table.resolve(key).unwrap();
        assert_eq!(entry.chars(), &['A', '\u{301}']);
        assert_eq!(entry.text(), "A\u{301}");
    }

    #[test]
    fn same_sequence_returns_same_key() {
        let mut table = GraphemeTable::new();
        let a = table.append('e' as u32, '\u{301}', GraphemeWidthMethod::Double);
        let b = table.append('e' as u32, '\u{301}', GraphemeWidthMethod::Double);
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn chained_append_extends_cluster() {
        let mut table = GraphemeTable::new();
        let (k1, _) = table
            .append('a' as u32, '\u{301}', GraphemeWidthMethod::Double)
            .unwrap();
        let (k2, _) = table
            .append(k1, '\u{323}', GraphemeWidthMethod::Double)
            .unwrap();
        assert_ne!(k1, k2);
        assert_eq!(table.resolve(k2).unwrap().chars(), &['a', '\u{301}', '\u{323}']);
        // The first entry stays intact.
        assert_eq!(table.resolve(k1).unwrap().chars(), &['a', '\u{301}']);
    }

    #[test]
    fn vs16_widens_under_double_method() {
        let mut table = GraphemeTable::new();
        let (_, w) = table
            .append('\u{2764}' as u32, '\u{FE0F}', GraphemeWidthMethod::Double)
            .unwrap();
        assert_eq!(w, 2);

        let mut table = GraphemeTable::new();
        let (_, w) = table
            .append('\u{2764}' as u32, '\u{FE0F}', GraphemeWidthMethod::Max)
            .unwrap();
        assert_eq!(w, 1);
    }

    #[test]
    fn extends_detects_combining_and_zwj() {
        let table = GraphemeTable::new();
        assert!(table.extends('A' as u32, '\u{301}'));
        assert!(table.extends('\u{1F468}' as u32, '\u{200D}'));
        assert!(!table.extends('A' as u32, 'B'));
        assert!(!table.extends(0, '\u{301}'));
    }

    #[test]
    fn push_text_expands_clusters() {
        let mut table = GraphemeTable::new();
        let (key, _) = table
            .append('o' as u32, '\u{308}', GraphemeWidthMethod::Double)
            .unwrap();
        let mut out = String::new();
        table.push_text('x' as u32, &mut out);
        table.push_text(0, &mut out);
        table.push_text(key, &mut out);
        assert_eq!(out, "xo\u{308}");
    }

    #[test]
    fn chain_key_stays_in_span() {
        for seed in [0u32, 1, 0x41, 0xFFFF, CLUSTER_KEY_SPAN] {
            assert!(chain_key(seed, 0x301) <= CLUSTER_KEY_SPAN);
        }
    }

    #[test]
    fn colliding_keys_take_next_slot() {
        let mut table = GraphemeTable::new();
        let key = chain_key('a' as u32, 0x301);
        // Occupy the natural slot with a different cluster.
        table.entries.insert(
            key,
            GraphemeEntry {
                key,
                chars: vec!['z', '\u{300}'],
                width: 1,
            },
        );
        let (cell_key, _) = table
            .append('a' as u32, '\u{301}', GraphemeWidthMethod::Double)
            .unwrap();
        assert_eq!(cell_key, CLUSTER_KEY_BASE + ((key + 1) & CLUSTER_KEY_SPAN));
    }
}
