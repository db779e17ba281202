#![forbid(unsafe_code)]

//! Host-agnostic VT500 terminal core.
//!
//! `ferroterm-core` is the platform-independent half of ferroterm. It turns the
//! byte stream a client program writes to its PTY into grid state, replies
//! queued for the PTY, and events for the embedding frontend. Nothing here
//! touches a file descriptor; the server crate supplies bytes and drains
//! replies.
//!
//! # Primary responsibilities
//!
//! - **Parser**: the DEC VT500 state machine with UTF-8 decoding, emitting
//!   [`Action`]s. Raw 8-bit C1 bytes cancel a sequence and are otherwise
//!   dropped; the 7-bit ESC forms carry those controls.
//! - **Grid**: a ring of rows holding the screen plus scrollback, with scroll
//!   regions that never copy cell storage.
//! - **Cell**: 32-bit content key plus SGR rendition; clusters interned in a
//!   [`GraphemeTable`].
//! - **Terminal**: CSI/ESC/OSC/DCS dispatch against two screens (primary and
//!   alternate), with DECRQSS, XTGETTCAP and application-synchronized updates.
//! - **Render timing**: [`RenderScheduler`] coalesces output bursts into
//!   frames using the lower/upper delayed-render deadlines.
//!
//! # Design principles
//!
//! - **No I/O**: replies are queued in a [`ReplyQueue`]; the host drains them.
//! - **Deterministic**: identical byte sequences (and feed instants) always
//!   produce identical state.
//! - **`#![forbid(unsafe_code)]`**: safety enforced at compile time.

pub mod captable;
pub mod cell;
pub mod charset;
pub mod config;
mod csi;
pub mod dcs;
pub mod grapheme;
pub mod grid;
pub mod modes;
pub mod osc;
pub mod parser;
pub mod render;
pub mod reply;
pub mod scrollback;
pub mod selection;
pub mod terminal;

pub use cell::{Cell, Color, HyperlinkId, HyperlinkRegistry, SgrAttrs, SgrFlags, UnderlineStyle};
pub use charset::{Charset, Charsets};
pub use config::{CursorShape, TermConfig, WindowMode, default_palette};
pub use grapheme::{GraphemeTable, GraphemeWidthMethod};
pub use grid::{Cursor, Grid, Row, SavedCursor, ScreenKind, ScrollRegion};
pub use modes::{AnsiModes, DecModes, ModeStatus, Modes, MouseEncoding, MouseTracking};
pub use osc::parse_color;
pub use parser::{Action, CsiSequence, DcsRequest, EscSequence, Params, Parser};
pub use render::RenderScheduler;
pub use reply::{Drain, ReplyQueue};
pub use selection::{BufferPos, Selection};
pub use terminal::{Colors, SixelDecoder, TermEvent, Terminal};
