#![forbid(unsafe_code)]

//! Terminal server: a local socket that spawns one terminal per request.
//!
//! # Role in ferroterm
//! `ferroterm-core` interprets bytes; this crate gives those terminals a
//! child process, a PTY, render timers and a way for other processes to ask
//! for new ones.
//!
//! # Modules
//!
//! - [`wire`] - Request framing and the exit-code reply.
//! - [`socket`] - Socket path resolution, stale socket handling.
//! - [`spawn`] - Child environment and PTY spawning.
//! - [`event_loop`] - The single thread that owns every terminal.
//! - [`server`] - Request dispatch and terminal lifecycle.
//! - [`client`] - The client CLI.
//! - [`logging`] - Subscriber setup for both binaries.
//!
//! # Threads
//!
//! ```text
//! acceptor ──┐
//! pty reader ├──▶ mpsc ──▶ event loop (terminals, timers, replies)
//! hangup     │
//! signals  ──┘
//! ```
//!
//! Replies travel the other way through one bounded writer thread per PTY,
//! so a child that stops reading never blocks the loop.

pub mod client;
pub mod error;
pub mod event_loop;
pub mod logging;
pub mod server;
pub mod socket;
pub mod spawn;
pub mod wire;

pub use error::{FramingError, ServerError};
pub use event_loop::{EventLoop, FrameSnapshot, LogRenderer, LoopEvent, Renderer, Session};
pub use server::{Server, ServerConfig};
pub use wire::Request;
