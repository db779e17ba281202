//! VT500-series parser.
//!
//! A deterministic state machine that classifies every output byte and
//! converts the stream into [`Action`]s for the terminal engine:
//!
//! - printable characters (ASCII + UTF-8) -> `Action::Print`
//! - C0 controls -> `Action::Execute`
//! - ESC, CSI and OSC sequences -> dispatch actions carrying their parameters
//! - DCS strings -> handled by the handler bound at hook time; buffered
//!   requests surface as `Action::Dcs` on unhook, Sixel data streams through
//!
//! Malformed input never produces an error: the parser drops into an ignore
//! state and resynchronizes on the next final byte.

/// Most parameters kept per sequence. Further parameters are dropped.
pub const MAX_PARAMS: usize = 16;
/// Most sub-parameters kept per parameter (`38:2::R:G:B` needs five).
pub const MAX_SUBPARAMS: usize = 8;
/// Most intermediate bytes; one more sends the sequence to the ignore state.
pub const MAX_INTERMEDIATES: usize = 2;

const OSC_INITIAL_CAPACITY: usize = 4096;
const OSC_MAX_LEN: usize = 1024 * 1024;
const DCS_INITIAL_CAPACITY: usize = 128;
const XTGETTCAP_MAX_LEN: usize = 4096;
/// DECRQSS requests are at most two bytes; a third marks the request invalid.
const DECRQSS_MAX_LEN: usize = 3;

/// Parser states, as in the published VT500 state diagram plus UTF-8 collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsPassthrough,
    DcsIgnore,
    OscString,
    SosPmApcString,
    Utf8Collect,
}

/// One numeric parameter with its colon-separated sub-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Param {
    value: u16,
    is_default: bool,
    subs: [u16; MAX_SUBPARAMS],
    sub_len: u8,
}

impl Param {
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Whether the parameter was omitted.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Sub-parameters following the value, `0` for empty ones.
    pub fn subs(&self) -> &[u16] {
        &self.subs[..self.sub_len as usize]
    }
}

/// Parameter list of a CSI or DCS sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Params {
    items: [Param; MAX_PARAMS],
    len: u8,
    overflow: bool,
}

impl Params {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.items[..self.len as usize].iter()
    }

    pub fn param(&self, idx: usize) -> Option<&Param> {
        self.items[..self.len as usize].get(idx)
    }

    /// Value of parameter `idx`, or `default` when it is missing or zero.
    pub fn get(&self, idx: usize, default: u16) -> u16 {
        match self.param(idx) {
            Some(p) if p.value != 0 => p.value,
            _ => default,
        }
    }

    /// Raw value of parameter `idx` (0 when missing).
    pub fn raw(&self, idx: usize) -> u16 {
        self.param(idx).map_or(0, |p| p.value)
    }

    /// A parameter exceeded 65535. The enclosing command must be ignored.
    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    /// Build a parameter list from plain values (for tests and replays).
    pub fn from_values(values: &[u16]) -> Self {
        let mut params = Self::default();
        for &v in values.iter().take(MAX_PARAMS) {
            params.items[params.len as usize] = Param {
                value: v,
                ..Param::default()
            };
            params.len += 1;
        }
        params
    }
}

/// Collected intermediate bytes (`0x20..=0x2f`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Intermediates {
    bytes: [u8; MAX_INTERMEDIATES],
    len: u8,
}

impl Intermediates {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn first(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    fn push(&mut self, b: u8) -> bool {
        if (self.len as usize) < MAX_INTERMEDIATES {
            self.bytes[self.len as usize] = b;
            self.len += 1;
            true
        } else {
            false
        }
    }
}

/// A dispatched ESC sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscSequence {
    pub intermediates: Intermediates,
    pub final_byte: u8,
}

/// A dispatched CSI sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsiSequence {
    pub params: Params,
    pub intermediates: Intermediates,
    /// Private marker (`<`, `=`, `>` or `?`) directly after `CSI`.
    pub private: Option<u8>,
    pub final_byte: u8,
}

/// A complete DCS request, produced on unhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DcsRequest {
    /// `DCS $ q <setting> ST`: the raw request bytes.
    Decrqss(Vec<u8>),
    /// `DCS + q <hex>;<hex>... ST`: the raw payload.
    Xtgettcap(Vec<u8>),
    /// `DCS = 1 s ST`
    SyncBegin,
    /// `DCS = 2 s ST`
    SyncEnd,
}

/// Parser output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A printable character (ASCII or UTF-8).
    Print(char),
    /// A C0 control.
    Execute(u8),
    Esc(EscSequence),
    Csi(CsiSequence),
    /// OSC payload without terminator. `bel` is set when it ended with BEL.
    Osc { data: Vec<u8>, bel: bool },
    /// `DCS P1 ; P2 ; P3 q`: start of Sixel data.
    SixelStart { p1: u16, p2: u16, p3: u16 },
    SixelData(u8),
    SixelEnd,
    Dcs(DcsRequest),
}

/// Handler bound when a DCS sequence is hooked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DcsHandler {
    None,
    Decrqss,
    Xtgettcap,
    SyncBegin,
    SyncEnd,
    Sixel,
}

#[derive(Debug, Clone, Copy, Default)]
struct Warned {
    params: bool,
    subparams: bool,
    intermediates: bool,
    dcs_buffer: bool,
    osc_buffer: bool,
}

/// VT parser state.
#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    params: Params,
    acc: u32,
    acc_digits: bool,
    in_sub: bool,
    drop_param: bool,
    drop_sub: bool,
    intermediates: Intermediates,
    private: Option<u8>,
    intermediates_overflow: bool,
    osc: Vec<u8>,
    osc_overflow: bool,
    dcs: Vec<u8>,
    dcs_handler: DcsHandler,
    dcs_overflow: bool,
    utf8_buf: [u8; 4],
    utf8_len: u8,
    utf8_need: u8,
    sixel: bool,
    /// The ESC that entered the escape state ended a string, so a following
    /// `\` completes ST rather than dispatching.
    string_end: bool,
    warned: Warned,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a new parser in ground state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: Params::default(),
            acc: 0,
            acc_digits: false,
            in_sub: false,
            drop_param: false,
            drop_sub: false,
            intermediates: Intermediates::default(),
            private: None,
            intermediates_overflow: false,
            osc: Vec::with_capacity(OSC_INITIAL_CAPACITY),
            osc_overflow: false,
            dcs: Vec::new(),
            dcs_handler: DcsHandler::None,
            dcs_overflow: false,
            utf8_buf: [0; 4],
            utf8_len: 0,
            utf8_need: 0,
            sixel: true,
            string_end: false,
            warned: Warned::default(),
        }
    }

    /// Enable or disable the Sixel DCS handler.
    pub fn set_sixel(&mut self, enabled: bool) {
        self.sixel = enabled;
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Bytes currently held by the DCS buffer.
    #[must_use]
    pub fn dcs_buffer_len(&self) -> usize {
        self.dcs.len()
    }

    /// Return to ground and drop every buffer.
    pub fn reset(&mut self) {
        let sixel = self.sixel;
        *self = Self::new();
        self.sixel = sixel;
    }

    /// Feed a chunk of bytes and return parsed actions.
    #[must_use]
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Action> {
        let mut out = Vec::new();
        self.feed_into(bytes, &mut out);
        out
    }

    /// Feed a chunk of bytes, appending actions to `out`.
    pub fn feed_into(&mut self, bytes: &[u8], out: &mut Vec<Action>) {
        for &b in bytes {
            self.advance(b, out);
        }
    }

    /// Advance the parser by one byte.
    pub fn advance(&mut self, b: u8, out: &mut Vec<Action>) {
        match self.state {
            State::Ground => self.ground(b, out),
            State::Utf8Collect => self.utf8(b, out),
            State::OscString => self.osc_string(b, out),
            State::SosPmApcString => self.sos_pm_apc(b, out),
            State::DcsPassthrough => self.dcs_passthrough(b, out),
            _ => {
                if !self.anywhere(b, out) {
                    self.escape_states(b, out);
                }
            }
        }
    }

    /// Transitions shared by the ESC, CSI and DCS header states.
    fn anywhere(&mut self, b: u8, out: &mut Vec<Action>) -> bool {
        match b {
            0x18 | 0x1a => {
                out.push(Action::Execute(b));
                self.state = State::Ground;
            }
            0x1b => {
                let string_end = matches!(
                    self.state,
                    State::DcsEntry | State::DcsParam | State::DcsIntermediate | State::DcsIgnore
                );
                self.enter_escape(string_end);
            }
            0x80..=0x9f => self.state = State::Ground,
            _ => return false,
        }
        true
    }

    fn escape_states(&mut self, b: u8, out: &mut Vec<Action>) {
        match self.state {
            State::Escape => self.escape(b, out),
            State::EscapeIntermediate => self.escape_intermediate(b, out),
            State::CsiEntry => self.csi_entry(b, out),
            State::CsiParam => self.csi_param(b, out),
            State::CsiIntermediate => self.csi_intermediate(b, out),
            State::CsiIgnore => self.csi_ignore(b, out),
            State::DcsEntry => self.dcs_entry(b, out),
            State::DcsParam => self.dcs_param(b, out),
            State::DcsIntermediate => self.dcs_intermediate(b, out),
            State::DcsIgnore => {}
            _ => {}
        }
    }

    fn clear(&mut self) {
        self.params = Params::default();
        self.acc = 0;
        self.acc_digits = false;
        self.in_sub = false;
        self.drop_param = false;
        self.drop_sub = false;
        self.intermediates = Intermediates::default();
        self.private = None;
        self.intermediates_overflow = false;
    }

    fn enter_escape(&mut self, string_end: bool) {
        self.clear();
        self.string_end = string_end;
        self.state = State::Escape;
    }

    // ── Ground / UTF-8 ──────────────────────────────────────────────

    fn ground(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x00..=0x1a | 0x1c..=0x1f => out.push(Action::Execute(b)),
            0x1b => self.enter_escape(false),
            0x20..=0x7e => out.push(Action::Print(b as char)),
            0xc2..=0xdf => self.utf8_start(b, 1),
            0xe0..=0xef => self.utf8_start(b, 2),
            0xf0..=0xf4 => self.utf8_start(b, 3),
            // DEL, stray continuation bytes, C0/C1 overlong and >U+10FFFF leads.
            _ => {}
        }
    }

    fn utf8_start(&mut self, b: u8, need: u8) {
        self.utf8_buf[0] = b;
        self.utf8_len = 1;
        self.utf8_need = need;
        self.state = State::Utf8Collect;
    }

    fn utf8(&mut self, b: u8, out: &mut Vec<Action>) {
        if !(0x80..=0xbf).contains(&b) {
            // Invalid continuation: drop the partial sequence and reprocess.
            self.utf8_len = 0;
            self.state = State::Ground;
            self.ground(b, out);
            return;
        }
        self.utf8_buf[self.utf8_len as usize] = b;
        self.utf8_len += 1;
        self.utf8_need -= 1;
        if self.utf8_need > 0 {
            return;
        }
        self.state = State::Ground;
        let len = self.utf8_len as usize;
        self.utf8_len = 0;
        // Overlong forms and surrogates fail to decode and are dropped.
        if let Some(ch) = std::str::from_utf8(&self.utf8_buf[..len])
            .ok()
            .and_then(|s| s.chars().next())
        {
            out.push(Action::Print(ch));
        }
    }

    // ── Parameters and intermediates ────────────────────────────────

    fn param_byte(&mut self, b: u8) {
        if self.params.len == 0 {
            self.params.len = 1;
        }
        match b {
            b'0'..=b'9' => {
                self.acc = (self.acc * 10 + u32::from(b - b'0')).min(u32::from(u16::MAX) + 1);
                self.acc_digits = true;
            }
            b';' => {
                self.commit_param();
                self.in_sub = false;
                self.drop_sub = false;
                if self.drop_param || self.params.len as usize == MAX_PARAMS {
                    if !self.drop_param && !self.warned.params {
                        self.warned.params = true;
                        tracing::warn!("too many parameters, ignoring the excess");
                    }
                    self.drop_param = true;
                } else {
                    self.params.len += 1;
                }
            }
            b':' => {
                self.commit_param();
                self.in_sub = true;
                if self.drop_param {
                    return;
                }
                let idx = self.params.len as usize - 1;
                let slot = &mut self.params.items[idx];
                if slot.sub_len as usize == MAX_SUBPARAMS {
                    if !self.warned.subparams {
                        self.warned.subparams = true;
                        tracing::warn!("too many sub-parameters, ignoring the excess");
                    }
                    self.drop_sub = true;
                } else {
                    slot.sub_len += 1;
                }
            }
            _ => {}
        }
    }

    fn commit_param(&mut self) {
        let value = if self.acc > u32::from(u16::MAX) {
            self.params.overflow = true;
            u16::MAX
        } else {
            self.acc as u16
        };
        let is_default = !self.acc_digits;
        self.acc = 0;
        self.acc_digits = false;

        if self.drop_param || self.params.len == 0 {
            return;
        }
        let slot = &mut self.params.items[self.params.len as usize - 1];
        if self.in_sub {
            if !self.drop_sub && slot.sub_len > 0 {
                slot.subs[slot.sub_len as usize - 1] = value;
            }
        } else {
            slot.value = value;
            slot.is_default = is_default;
        }
    }

    fn finish_params(&mut self) {
        if self.params.len > 0 {
            self.commit_param();
        }
    }

    fn collect(&mut self, b: u8) -> bool {
        if self.intermediates.push(b) {
            return true;
        }
        if !self.warned.intermediates {
            self.warned.intermediates = true;
            tracing::warn!("too many intermediates, ignoring sequence");
        }
        self.intermediates_overflow = true;
        false
    }

    // ── ESC ─────────────────────────────────────────────────────────

    fn escape(&mut self, b: u8, out: &mut Vec<Action>) {
        if std::mem::take(&mut self.string_end) && b == b'\\' {
            self.state = State::Ground;
            return;
        }
        match b {
            0x00..=0x17 | 0x19 | 0x1c..=0x1f => out.push(Action::Execute(b)),
            0x20..=0x2f => {
                self.collect(b);
                self.state = State::EscapeIntermediate;
            }
            b'P' => {
                self.clear();
                self.state = State::DcsEntry;
            }
            b'X' | b'^' | b'_' => self.state = State::SosPmApcString,
            b'[' => {
                self.clear();
                self.state = State::CsiEntry;
            }
            b']' => {
                self.osc.clear();
                self.osc_overflow = false;
                self.state = State::OscString;
            }
            0x30..=0x7e => self.esc_dispatch(b, out),
            _ => {}
        }
    }

    fn escape_intermediate(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x00..=0x17 | 0x19 | 0x1c..=0x1f => out.push(Action::Execute(b)),
            0x20..=0x2f => {
                self.collect(b);
            }
            0x30..=0x7e => self.esc_dispatch(b, out),
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, b: u8, out: &mut Vec<Action>) {
        self.state = State::Ground;
        if self.intermediates_overflow {
            return;
        }
        out.push(Action::Esc(EscSequence {
            intermediates: self.intermediates,
            final_byte: b,
        }));
    }

    // ── CSI ─────────────────────────────────────────────────────────

    fn csi_entry(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x00..=0x17 | 0x19 | 0x1c..=0x1f => out.push(Action::Execute(b)),
            0x20..=0x2f => {
                self.state = if self.collect(b) {
                    State::CsiIntermediate
                } else {
                    State::CsiIgnore
                };
            }
            0x30..=0x3b => {
                self.param_byte(b);
                self.state = State::CsiParam;
            }
            0x3c..=0x3f => {
                self.private = Some(b);
                self.state = State::CsiParam;
            }
            0x40..=0x7e => self.csi_dispatch(b, out),
            _ => {}
        }
    }

    fn csi_param(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x00..=0x17 | 0x19 | 0x1c..=0x1f => out.push(Action::Execute(b)),
            0x30..=0x3b => self.param_byte(b),
            0x3c..=0x3f => self.state = State::CsiIgnore,
            0x20..=0x2f => {
                self.state = if self.collect(b) {
                    State::CsiIntermediate
                } else {
                    State::CsiIgnore
                };
            }
            0x40..=0x7e => self.csi_dispatch(b, out),
            _ => {}
        }
    }

    fn csi_intermediate(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x00..=0x17 | 0x19 | 0x1c..=0x1f => out.push(Action::Execute(b)),
            0x20..=0x2f => {
                if !self.collect(b) {
                    self.state = State::CsiIgnore;
                }
            }
            0x30..=0x3f => self.state = State::CsiIgnore,
            0x40..=0x7e => self.csi_dispatch(b, out),
            _ => {}
        }
    }

    fn csi_ignore(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x00..=0x17 | 0x19 | 0x1c..=0x1f => out.push(Action::Execute(b)),
            0x40..=0x7e => self.state = State::Ground,
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, b: u8, out: &mut Vec<Action>) {
        self.finish_params();
        self.state = State::Ground;
        out.push(Action::Csi(CsiSequence {
            params: self.params,
            intermediates: self.intermediates,
            private: self.private,
            final_byte: b,
        }));
    }

    // ── OSC / SOS / PM / APC ────────────────────────────────────────

    fn osc_string(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x07 => {
                self.osc_end(true, out);
                self.state = State::Ground;
            }
            0x18 | 0x1a => {
                self.osc_end(false, out);
                out.push(Action::Execute(b));
                self.state = State::Ground;
            }
            0x1b => {
                self.osc_end(false, out);
                self.enter_escape(true);
            }
            0x00..=0x1f => {}
            _ => {
                if self.osc.len() >= OSC_MAX_LEN {
                    if !self.warned.osc_buffer {
                        self.warned.osc_buffer = true;
                        tracing::warn!(limit = OSC_MAX_LEN, "OSC too long, ignoring");
                    }
                    self.osc_overflow = true;
                } else {
                    self.osc.push(b);
                }
            }
        }
    }

    fn osc_end(&mut self, bel: bool, out: &mut Vec<Action>) {
        if !self.osc_overflow {
            out.push(Action::Osc {
                data: self.osc.clone(),
                bel,
            });
        }
        self.osc.clear();
        self.osc_overflow = false;
        if self.osc.capacity() > OSC_INITIAL_CAPACITY {
            self.osc = Vec::with_capacity(OSC_INITIAL_CAPACITY);
        }
    }

    fn sos_pm_apc(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x18 | 0x1a => {
                out.push(Action::Execute(b));
                self.state = State::Ground;
            }
            0x1b => self.enter_escape(true),
            _ => {}
        }
    }

    // ── DCS ─────────────────────────────────────────────────────────

    fn dcs_entry(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x20..=0x2f => {
                self.state = if self.collect(b) {
                    State::DcsIntermediate
                } else {
                    State::DcsIgnore
                };
            }
            b':' => self.state = State::DcsIgnore,
            0x30..=0x39 | b';' => {
                self.param_byte(b);
                self.state = State::DcsParam;
            }
            0x3c..=0x3f => {
                self.private = Some(b);
                self.state = State::DcsParam;
            }
            0x40..=0x7e => self.dcs_hook(b, out),
            _ => {}
        }
    }

    fn dcs_param(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x30..=0x39 | b';' => self.param_byte(b),
            b':' | 0x3c..=0x3f => self.state = State::DcsIgnore,
            0x20..=0x2f => {
                self.state = if self.collect(b) {
                    State::DcsIntermediate
                } else {
                    State::DcsIgnore
                };
            }
            0x40..=0x7e => self.dcs_hook(b, out),
            _ => {}
        }
    }

    fn dcs_intermediate(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x20..=0x2f => {
                if !self.collect(b) {
                    self.state = State::DcsIgnore;
                }
            }
            0x30..=0x3f => self.state = State::DcsIgnore,
            0x40..=0x7e => self.dcs_hook(b, out),
            _ => {}
        }
    }

    fn dcs_hook(&mut self, b: u8, out: &mut Vec<Action>) {
        self.finish_params();
        self.state = State::DcsPassthrough;
        self.dcs = Vec::new();
        self.dcs_overflow = false;

        let marker = self.private.or(self.intermediates.first());
        self.dcs_handler = match (marker, b) {
            (None, b'q') if self.sixel => {
                out.push(Action::SixelStart {
                    p1: self.params.raw(0),
                    p2: self.params.raw(1),
                    p3: self.params.raw(2),
                });
                DcsHandler::Sixel
            }
            (Some(b'$'), b'q') => DcsHandler::Decrqss,
            (Some(b'+'), b'q') => DcsHandler::Xtgettcap,
            (Some(b'='), b's') => match self.params.raw(0) {
                1 => DcsHandler::SyncBegin,
                2 => DcsHandler::SyncEnd,
                _ => DcsHandler::None,
            },
            _ => {
                tracing::debug!(
                    marker = ?marker.map(char::from),
                    final_byte = %char::from(b),
                    "unhandled DCS"
                );
                DcsHandler::None
            }
        };
    }

    fn dcs_passthrough(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x18 | 0x1a => {
                self.dcs_unhook(out);
                out.push(Action::Execute(b));
                self.state = State::Ground;
            }
            0x1b => {
                self.dcs_unhook(out);
                self.enter_escape(true);
            }
            0x00..=0x7e => self.dcs_put(b, out),
            0x80..=0x9f => {
                self.dcs_unhook(out);
                self.state = State::Ground;
            }
            _ => {}
        }
    }

    fn dcs_put(&mut self, b: u8, out: &mut Vec<Action>) {
        match self.dcs_handler {
            DcsHandler::None | DcsHandler::SyncBegin | DcsHandler::SyncEnd => {}
            DcsHandler::Sixel => out.push(Action::SixelData(b)),
            DcsHandler::Decrqss => {
                if self.dcs.len() < DECRQSS_MAX_LEN {
                    self.dcs_buffer_push(b, DECRQSS_MAX_LEN);
                }
            }
            DcsHandler::Xtgettcap => self.dcs_buffer_push(b, XTGETTCAP_MAX_LEN),
        }
    }

    /// Append to the DCS buffer, doubling its capacity from 128 bytes up to
    /// `limit`. A refused byte turns the sequence into a no-op.
    fn dcs_buffer_push(&mut self, b: u8, limit: usize) {
        if self.dcs_overflow {
            return;
        }
        if self.dcs.len() >= limit {
            if !self.warned.dcs_buffer {
                self.warned.dcs_buffer = true;
                tracing::warn!(limit, "DCS buffer full, ignoring request");
            }
            self.dcs_overflow = true;
            return;
        }
        if self.dcs.len() == self.dcs.capacity() {
            let grown = (self.dcs.capacity() * 2)
                .max(DCS_INITIAL_CAPACITY)
                .min(limit);
            self.dcs.reserve_exact(grown - self.dcs.len());
        }
        self.dcs.push(b);
    }

    fn dcs_unhook(&mut self, out: &mut Vec<Action>) {
        let data = std::mem::take(&mut self.dcs);
        let handler = std::mem::replace(&mut self.dcs_handler, DcsHandler::None);
        let overflow = std::mem::replace(&mut self.dcs_overflow, false);
        match handler {
            DcsHandler::None => {}
            DcsHandler::Sixel => out.push(Action::SixelEnd),
            DcsHandler::SyncBegin => out.push(Action::Dcs(DcsRequest::SyncBegin)),
            DcsHandler::SyncEnd => out.push(Action::Dcs(DcsRequest::SyncEnd)),
            DcsHandler::Decrqss => out.push(Action::Dcs(DcsRequest::Decrqss(data))),
            DcsHandler::Xtgettcap if !overflow => {
                out.push(Action::Dcs(DcsRequest::Xtgettcap(data)));
            }
            DcsHandler::Xtgettcap => {}
        }
    }
}
