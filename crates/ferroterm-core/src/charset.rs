//! G0..G3 character set designation and DEC special graphics translation.

/// A designatable character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Ascii,
    /// DEC special graphics (line drawing), designated with final `0`.
    DecGraphics,
}

/// The four graphic sets plus the invocation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Charsets {
    pub sets: [Charset; 4],
    /// Set invoked into GL (0..=3).
    pub selected: u8,
    /// Single-shift target for the next printed character (SS2/SS3).
    pub single_shift: Option<u8>,
}

impl Charsets {
    /// Designate `slot` (0..=3) from an SCS final byte. Unknown finals fall
    /// back to ASCII.
    pub fn designate(&mut self, slot: u8, final_byte: u8) {
        let Some(set) = self.sets.get_mut(slot as usize) else {
            return;
        };
        *set = match final_byte {
            b'0' => Charset::DecGraphics,
            _ => Charset::Ascii,
        };
    }

    /// Invoke `slot` into GL (SI, SO, LS2, LS3).
    pub fn select(&mut self, slot: u8) {
        if slot < 4 {
            self.selected = slot;
        }
    }

    pub fn single_shift(&mut self, slot: u8) {
        if slot < 4 {
            self.single_shift = Some(slot);
        }
    }

    /// Map a printed character through the active set, consuming any
    /// pending single shift.
    pub fn translate(&mut self, ch: char) -> char {
        let slot = self.single_shift.take().unwrap_or(self.selected);
        match self.sets[slot as usize & 3] {
            Charset::Ascii => ch,
            Charset::DecGraphics => dec_special_graphics(ch),
        }
    }
}

/// DEC special graphics: `0x5f..=0x7e` map to line-drawing and symbols.
pub fn dec_special_graphics(ch: char) -> char {
    match ch {
        '_' => ' ',
        '`' => '◆',
        'a' => '▒',
        'b' => '␉',
        'c' => '␌',
        'd' => '␍',
        'e' => '␊',
        'f' => '°',
        'g' => '±',
        'h' => '␤',
        'i' => '␋',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        _ => ch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut cs = Charsets::default();
        assert_eq!(cs.translate('q'), 'q');
    }

    #[test]
    fn dec_graphics_in_g0() {
        let mut cs = Charsets::default();
        cs.designate(0, b'0');
        assert_eq!(cs.translate('q'), '─');
        assert_eq!(cs.translate('x'), '│');
        assert_eq!(cs.translate('A'), 'A');
        cs.designate(0, b'B');
        assert_eq!(cs.translate('q'), 'q');
    }

    #[test]
    fn shift_out_selects_g1() {
        let mut cs = Charsets::default();
        cs.designate(1, b'0');
        assert_eq!(cs.translate('l'), 'l');
        cs.select(1);
        assert_eq!(cs.translate('l'), '┌');
        cs.select(0);
        assert_eq!(cs.translate('l'), 'l');
    }

    #[test]
    fn single_shift_applies_once() {
        let mut cs = Charsets::default();
        cs.designate(2, b'0');
        cs.single_shift(2);
        assert_eq!(cs.translate('j'), '┘');
        assert_eq!(cs.translate('j'), 'j');
    }
}
