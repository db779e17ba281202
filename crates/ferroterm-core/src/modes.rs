//! DEC private and ANSI mode state.
//!
//! Plain on/off modes live in bitflags. Mouse tracking and mouse encoding are
//! mutually exclusive choices and are modeled as enums. Modes that act on the
//! terminal (alternate screen, synchronized updates, cursor save) are handled
//! by the terminal itself; this module only stores flags.

use bitflags::bitflags;

bitflags! {
    /// DEC private modes (`CSI ? Pm h` / `CSI ? Pm l`) that are simple flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DecModes: u32 {
        /// DECCKM (1)
        const APP_CURSOR_KEYS  = 1 << 0;
        /// DECSCNM (5)
        const REVERSE_VIDEO    = 1 << 1;
        /// DECOM (6)
        const ORIGIN           = 1 << 2;
        /// DECAWM (7)
        const AUTOWRAP         = 1 << 3;
        /// 12
        const CURSOR_BLINK     = 1 << 4;
        /// DECTCEM (25)
        const CURSOR_VISIBLE   = 1 << 5;
        /// 45
        const REVERSE_WRAP     = 1 << 6;
        /// DECNKM (66)
        const APP_KEYPAD       = 1 << 7;
        /// 1004
        const FOCUS_EVENTS     = 1 << 8;
        /// 1007
        const ALT_SCROLL       = 1 << 9;
        /// 1034
        const META_EIGHT_BIT   = 1 << 10;
        /// 1035
        const NUM_LOCK         = 1 << 11;
        /// 1036
        const META_ESC         = 1 << 12;
        /// 1042
        const BELL_URGENT      = 1 << 13;
        /// 2004
        const BRACKETED_PASTE  = 1 << 14;
        /// 2027
        const GRAPHEME_SHAPING = 1 << 15;
    }
}

impl Default for DecModes {
    fn default() -> Self {
        Self::AUTOWRAP | Self::CURSOR_VISIBLE | Self::ALT_SCROLL | Self::META_ESC
    }
}

bitflags! {
    /// ANSI modes (`CSI Pm h` / `CSI Pm l`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AnsiModes: u8 {
        /// IRM (4)
        const INSERT  = 1 << 0;
        /// LNM (20)
        const NEWLINE = 1 << 1;
    }
}

impl DecModes {
    /// The flag for a DEC private mode number.
    #[must_use]
    pub fn from_mode(mode: u16) -> Option<Self> {
        Some(match mode {
            1 => Self::APP_CURSOR_KEYS,
            5 => Self::REVERSE_VIDEO,
            6 => Self::ORIGIN,
            7 => Self::AUTOWRAP,
            12 => Self::CURSOR_BLINK,
            25 => Self::CURSOR_VISIBLE,
            45 => Self::REVERSE_WRAP,
            66 => Self::APP_KEYPAD,
            1004 => Self::FOCUS_EVENTS,
            1007 => Self::ALT_SCROLL,
            1034 => Self::META_EIGHT_BIT,
            1035 => Self::NUM_LOCK,
            1036 => Self::META_ESC,
            1042 => Self::BELL_URGENT,
            2004 => Self::BRACKETED_PASTE,
            2027 => Self::GRAPHEME_SHAPING,
            _ => return None,
        })
    }
}

impl AnsiModes {
    #[must_use]
    pub fn from_mode(mode: u16) -> Option<Self> {
        match mode {
            4 => Some(Self::INSERT),
            20 => Some(Self::NEWLINE),
            _ => None,
        }
    }
}

/// Which mouse events are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseTracking {
    #[default]
    None,
    /// 1000
    Click,
    /// 1002
    Drag,
    /// 1003
    Motion,
}

/// How mouse reports are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseEncoding {
    #[default]
    Normal,
    /// 1006
    Sgr,
    /// 1015
    Urxvt,
    /// 1016
    SgrPixels,
}

/// Status values of a DECRPM reply (`CSI ? Ps ; Pm $ y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStatus {
    NotRecognized = 0,
    Set = 1,
    Reset = 2,
    PermanentlySet = 3,
    PermanentlyReset = 4,
}

impl ModeStatus {
    #[must_use]
    pub fn from_bool(enabled: bool) -> Self {
        if enabled { Self::Set } else { Self::Reset }
    }
}

/// Every mode flag a terminal tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modes {
    pub dec: DecModes,
    pub ansi: AnsiModes,
    pub mouse_tracking: MouseTracking,
    pub mouse_encoding: MouseEncoding,
}

impl Modes {
    /// Set or reset a flag-like DEC private mode. Returns `false` when the
    /// mode is not stored here.
    pub fn set_dec(&mut self, mode: u16, enable: bool) -> bool {
        if let Some(flag) = DecModes::from_mode(mode) {
            self.dec.set(flag, enable);
            return true;
        }

        let tracking = match mode {
            1000 => Some(MouseTracking::Click),
            1002 => Some(MouseTracking::Drag),
            1003 => Some(MouseTracking::Motion),
            _ => None,
        };
        if let Some(tracking) = tracking {
            if enable {
                self.mouse_tracking = tracking;
            } else if self.mouse_tracking == tracking {
                self.mouse_tracking = MouseTracking::None;
            }
            return true;
        }

        let encoding = match mode {
            1006 => Some(MouseEncoding::Sgr),
            1015 => Some(MouseEncoding::Urxvt),
            1016 => Some(MouseEncoding::SgrPixels),
            _ => None,
        };
        if let Some(encoding) = encoding {
            if enable {
                self.mouse_encoding = encoding;
            } else if self.mouse_encoding == encoding {
                self.mouse_encoding = MouseEncoding::Normal;
            }
            return true;
        }
        false
    }

    /// DECRQM status of a mode stored here.
    #[must_use]
    pub fn dec_status(&self, mode: u16) -> ModeStatus {
        if let Some(flag) = DecModes::from_mode(mode) {
            return ModeStatus::from_bool(self.dec.contains(flag));
        }
        match mode {
            // X10 mouse, highlight tracking and UTF-8 mouse encoding.
            9 | 1001 | 1005 => ModeStatus::PermanentlyReset,
            1000 => ModeStatus::from_bool(self.mouse_tracking == MouseTracking::Click),
            1002 => ModeStatus::from_bool(self.mouse_tracking == MouseTracking::Drag),
            1003 => ModeStatus::from_bool(self.mouse_tracking == MouseTracking::Motion),
            1006 => ModeStatus::from_bool(self.mouse_encoding == MouseEncoding::Sgr),
            1015 => ModeStatus::from_bool(self.mouse_encoding == MouseEncoding::Urxvt),
            1016 => ModeStatus::from_bool(self.mouse_encoding == MouseEncoding::SgrPixels),
            _ => ModeStatus::NotRecognized,
        }
    }

    pub fn set_ansi(&mut self, mode: u16, enable: bool) -> bool {
        match AnsiModes::from_mode(mode) {
            Some(flag) => {
                self.ansi.set(flag, enable);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn ansi_status(&self, mode: u16) -> ModeStatus {
        match AnsiModes::from_mode(mode) {
            Some(flag) => ModeStatus::from_bool(self.ansi.contains(flag)),
            None => ModeStatus::NotRecognized,
        }
    }
}
