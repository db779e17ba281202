//! The event loop: one thread owns every terminal.
//!
//! Blocking handles (the listening socket, each PTY reader, each client
//! connection) are pumped by small reader threads that forward
//! [`LoopEvent`]s into one channel. The loop thread waits on that channel
//! with a timeout equal to the earliest render deadline, so its only
//! suspension point is `recv_timeout`.
//!
//! # Invariants
//!
//! | Invariant | Enforcement |
//! |---|---|
//! | No grid is touched off the loop thread | reader threads only send bytes |
//! | Replies reach the child in generation order | one FIFO per terminal, drained after each batch |
//! | A short write is retried | write-armed sessions cap the wait at [`ARMED_RETRY`] |
//! | A child that stops reading never stalls the loop | replies pass through a bounded [`ChildWriter`] |
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---|---|---|
//! | Malformed request | bad framing | connection closed without a reply |
//! | PTY write error | child gone | writer thread ends; queue dropped, logged at `warn` |
//! | Reader thread send fails | loop exited | thread ends |

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ferroterm_core::grid::{Cursor, Row};
use ferroterm_core::modes::DecModes;
use ferroterm_core::reply::Drain;
use ferroterm_core::{TermEvent, Terminal};
use portable_pty::{Child, ChildKiller, MasterPty, PtySize};

use crate::error::portable_pty_error;
use crate::spawn::{PtyChild, exit_code};
use crate::wire::{self, Request};

/// Staging buffer size for one PTY read.
pub const READ_CHUNK: usize = 64 * 1024;
/// Largest piece handed to a writer thread at once.
pub const WRITE_CHUNK: usize = 4096;
/// Chunks a writer thread may hold before the session arms.
pub const WRITE_QUEUE_DEPTH: usize = 16;
/// Longest wait while a session has unwritten replies.
pub const ARMED_RETRY: Duration = Duration::from_millis(10);
/// Wait when nothing is scheduled.
const IDLE_WAIT: Duration = Duration::from_secs(1);
/// A client must finish sending its request within this time.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub type TermId = u64;
pub type ConnId = u64;

#[derive(Debug)]
pub enum LoopEvent {
    /// A client sent a well-formed request.
    Accepted {
        conn: ConnId,
        request: Request,
        stream: UnixStream,
    },
    PtyOutput {
        id: TermId,
        bytes: Vec<u8>,
    },
    /// The PTY reached EOF and the child was reaped.
    PtyClosed {
        id: TermId,
        exit_code: i32,
    },
    ClientHangup {
        conn: ConnId,
    },
    Shutdown,
}

// ── Rendering ───────────────────────────────────────────────────────────

/// Immutable copy of what a frame shows.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub id: TermId,
    pub cols: u16,
    pub rows: u16,
    pub lines: Vec<Row>,
    pub cursor: Cursor,
    pub cursor_visible: bool,
    pub title: String,
    pub alternate: bool,
}

impl FrameSnapshot {
    #[must_use]
    pub fn capture(id: TermId, term: &Terminal) -> Self {
        let grid = term.grid();
        Self {
            id,
            cols: grid.cols(),
            rows: grid.rows(),
            lines: grid.visible_rows().cloned().collect(),
            cursor: grid.cursor,
            cursor_visible: term.modes().dec.contains(DecModes::CURSOR_VISIBLE),
            title: term.title().to_owned(),
            alternate: term.is_alternate_screen(),
        }
    }

    /// Rows changed since the previous frame.
    #[must_use]
    pub fn dirty_rows(&self) -> usize {
        self.lines.iter().filter(|row| row.dirty).count()
    }
}

/// Draws frames. Implementations never mutate terminal state.
pub trait Renderer {
    fn render(&mut self, frame: &FrameSnapshot);

    /// Host notifications (bell, title, clipboard writes).
    fn notify(&mut self, id: TermId, event: &TermEvent) {
        let _ = (id, event);
    }
}

/// Renderer that only logs frame statistics.
#[derive(Debug, Default)]
pub struct LogRenderer {
    frames: u64,
}

impl LogRenderer {
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, frame: &FrameSnapshot) {
        self.frames += 1;
        tracing::debug!(
            id = frame.id,
            frame = self.frames,
            size = %format_args!("{}x{}", frame.cols, frame.rows),
            dirty = frame.dirty_rows(),
            cursor = %format_args!("{},{}", frame.cursor.row, frame.cursor.col),
            alternate = frame.alternate,
            "frame"
        );
    }

    fn notify(&mut self, id: TermId, event: &TermEvent) {
        tracing::debug!(id, ?event, "terminal event");
    }
}

// ── Sessions ────────────────────────────────────────────────────────────

/// PTY handles the loop keeps after the reader thread took the child.
struct PtyControl {
    master: Box<dyn MasterPty + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

/// One terminal and the PTY it is attached to.
pub struct Session {
    pub term: Terminal,
    writer: Box<dyn Write + Send>,
    control: Option<PtyControl>,
    /// Client waiting for the exit code.
    pub client: Option<(ConnId, UnixStream)>,
    /// Keep the terminal after the child exits.
    pub hold: bool,
    pub exit_code: Option<i32>,
    write_armed: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client", &self.client.as_ref().map(|(conn, _)| conn))
            .field("hold", &self.hold)
            .field("exit_code", &self.exit_code)
            .field("write_armed", &self.write_armed)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Attach `term` to a spawned child; the child's output flows to `tx`.
    pub fn spawn(id: TermId, term: Terminal, pty: PtyChild, tx: Sender<LoopEvent>) -> Self {
        let PtyChild {
            master,
            child,
            reader,
            writer,
        } = pty;
        let killer = child.clone_killer();
        spawn_pty_reader(id, reader, child, tx);
        let writer = spawn_pty_writer(id, writer);
        Self {
            control: Some(PtyControl { master, killer }),
            ..Self::with_writer(term, Box::new(writer))
        }
    }

    /// A session without a child; replies go to `writer`.
    pub fn with_writer(term: Terminal, writer: Box<dyn Write + Send>) -> Self {
        Self {
            term,
            writer,
            control: None,
            client: None,
            hold: false,
            exit_code: None,
            write_armed: false,
        }
    }

    #[must_use]
    pub fn is_write_armed(&self) -> bool {
        self.write_armed
    }

    /// Parse one batch of child output, then drain the replies it produced.
    pub fn process_output(&mut self, bytes: &[u8], now: Instant) {
        self.term.feed_at(bytes, now);
        self.flush_replies();
    }

    /// Write queued replies. A partial write arms the session for a retry.
    pub fn flush_replies(&mut self) {
        if self.term.replies().is_empty() {
            self.write_armed = false;
            return;
        }
        match self.term.replies_mut().write_to(&mut self.writer) {
            Ok(Drain::Done) => self.write_armed = false,
            Ok(Drain::Pending) => {
                if !self.write_armed {
                    tracing::debug!(queued = self.term.replies().len(), "short write to child");
                }
                self.write_armed = true;
            }
            Err(err) => {
                tracing::warn!(%err, "failed to write to child; dropping queued replies");
                self.term.replies_mut().clear();
                self.write_armed = false;
            }
        }
    }

    /// Resize the terminal and the PTY.
    pub fn resize(&mut self, cols: u16, rows: u16) -> io::Result<()> {
        self.term.resize(cols, rows);
        if let Some(control) = &self.control {
            control
                .master
                .resize(PtySize {
                    rows: self.term.rows(),
                    cols: self.term.cols(),
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .map_err(portable_pty_error)?;
        }
        Ok(())
    }

    /// Kill the child. The reader thread reaps it.
    pub fn kill(&mut self) {
        if self.exit_code.is_some() {
            return;
        }
        if let Some(control) = &mut self.control
            && let Err(err) = control.killer.kill()
        {
            tracing::debug!(%err, "kill failed; child already gone");
        }
    }
}

// ── Loop ────────────────────────────────────────────────────────────────

/// Owns the sessions and multiplexes every event source.
pub struct EventLoop<R: Renderer> {
    tx: Sender<LoopEvent>,
    rx: Receiver<LoopEvent>,
    sessions: BTreeMap<TermId, Session>,
    next_id: TermId,
    renderer: R,
}

impl<R: Renderer> fmt::Debug for EventLoop<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("sessions", &self.sessions.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl<R: Renderer> EventLoop<R> {
    pub fn new(renderer: R) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            sessions: BTreeMap::new(),
            next_id: 1,
            renderer,
        }
    }

    /// A sender for reader threads.
    #[must_use]
    pub fn sender(&self) -> Sender<LoopEvent> {
        self.tx.clone()
    }

    pub fn next_term_id(&mut self) -> TermId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, id: TermId, session: Session) {
        self.sessions.insert(id, session);
    }

    pub fn remove(&mut self, id: TermId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    #[must_use]
    pub fn session(&self, id: TermId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn session_mut(&mut self, id: TermId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (TermId, Session)> + '_ {
        std::mem::take(&mut self.sessions).into_iter()
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Feed PTY output to session `id` and forward its events.
    ///
    /// Output for a session that is gone is dropped.
    pub fn feed(&mut self, id: TermId, bytes: &[u8], now: Instant) -> bool {
        let Some(session) = self.sessions.get_mut(&id) else {
            tracing::debug!(id, len = bytes.len(), "output for unknown terminal");
            return false;
        };
        session.process_output(bytes, now);
        for event in session.term.take_events() {
            self.renderer.notify(id, &event);
        }
        true
    }

    /// Wait for the next event, servicing timers and armed writes meanwhile.
    ///
    /// Returns `None` only when every sender is gone.
    pub fn next_event(&mut self) -> Option<LoopEvent> {
        loop {
            let now = Instant::now();
            self.service(now);
            match self.rx.recv_timeout(self.wait_timeout(now)) {
                Ok(event) => return Some(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Retry armed writes and render every terminal whose frame is due.
    pub fn service(&mut self, now: Instant) {
        for (&id, session) in &mut self.sessions {
            if session.write_armed {
                session.flush_replies();
            }
            if session.term.render_mut().poll(now) {
                let frame = FrameSnapshot::capture(id, &session.term);
                self.renderer.render(&frame);
                session.term.grid_mut().clear_dirty();
            }
        }
    }

    /// Time until the earliest deadline.
    #[must_use]
    pub fn wait_timeout(&self, now: Instant) -> Duration {
        let mut wait = IDLE_WAIT;
        for session in self.sessions.values() {
            if let Some(deadline) = session.term.render().next_deadline() {
                wait = wait.min(deadline.saturating_duration_since(now));
            }
            if session.write_armed {
                wait = wait.min(ARMED_RETRY);
            }
        }
        wait
    }
}

// ── PTY threads ─────────────────────────────────────────────────────────

/// The loop's end of a writer thread.
///
/// A full queue reports `WouldBlock`, so a child that stops reading arms
/// its session instead of blocking the loop.
#[derive(Debug)]
pub struct ChildWriter {
    tx: SyncSender<Vec<u8>>,
}

impl Write for ChildWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(WRITE_CHUNK);
        match self.tx.try_send(buf[..n].to_vec()) {
            Ok(()) => Ok(n),
            Err(TrySendError::Full(_)) => Err(io::ErrorKind::WouldBlock.into()),
            Err(TrySendError::Disconnected(_)) => Err(io::ErrorKind::BrokenPipe.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Move `writer` onto its own thread; it may block on the child freely.
pub fn spawn_pty_writer(id: TermId, mut writer: Box<dyn Write + Send>) -> ChildWriter {
    let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(WRITE_QUEUE_DEPTH);
    thread::spawn(move || {
        while let Ok(chunk) = rx.recv() {
            if let Err(err) = writer.write_all(&chunk).and_then(|()| writer.flush()) {
                tracing::debug!(id, %err, "PTY write ended");
                break;
            }
        }
    });
    ChildWriter { tx }
}

/// Read PTY output in [`READ_CHUNK`] pieces until EOF, then reap the child.
pub fn spawn_pty_reader(
    id: TermId,
    mut reader: Box<dyn Read + Send>,
    mut child: Box<dyn Child + Send + Sync>,
    tx: Sender<LoopEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let bytes = buf[..n].to_vec();
                    if tx.send(LoopEvent::PtyOutput { id, bytes }).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                // Linux reports EIO once the slave side is closed.
                Err(err) => {
                    tracing::debug!(id, %err, "PTY read ended");
                    break;
                }
            }
        }
        let code = match child.wait() {
            Ok(status) => exit_code(&status),
            Err(err) => {
                tracing::warn!(id, %err, "failed to reap child");
                -1
            }
        };
        tracing::info!(id, code, "child exited");
        let _ = tx.send(LoopEvent::PtyClosed {
            id,
            exit_code: code,
        });
    })
}

/// Report when the client closes its end of the connection.
pub fn spawn_hangup_watch(conn: ConnId, mut stream: UnixStream, tx: Sender<LoopEvent>) {
    thread::spawn(move || {
        let mut buf = [0u8; 64];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        let _ = tx.send(LoopEvent::ClientHangup { conn });
    });
}

/// Accept connections and forward each well-formed request.
pub fn spawn_acceptor(listener: UnixListener, tx: Sender<LoopEvent>) -> JoinHandle<()> {
    static NEXT_CONN: AtomicU64 = AtomicU64::new(1);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(%err, "accept failed");
                    continue;
                }
            };
            let conn = NEXT_CONN.fetch_add(1, Ordering::Relaxed);
            let tx = tx.clone();
            thread::spawn(move || receive_request(conn, stream, &tx));
        }
    })
}

fn receive_request(conn: ConnId, mut stream: UnixStream, tx: &Sender<LoopEvent>) {
    if let Err(err) = stream.set_read_timeout(Some(REQUEST_TIMEOUT)) {
        tracing::warn!(conn, %err, "failed to set request timeout");
    }
    let request = match wire::read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(conn, %err, "dropping client");
            return;
        }
    };
    if let Err(err) = stream.set_read_timeout(None) {
        tracing::warn!(conn, %err, "failed to clear request timeout");
    }
    tracing::debug!(conn, argv = ?request.argv, cwd = %request.cwd, "client request");
    let _ = tx.send(LoopEvent::Accepted {
        conn,
        request,
        stream,
    });
}
