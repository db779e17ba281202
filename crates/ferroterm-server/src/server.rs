//! Request dispatch: one terminal per accepted client.
//!
//! # Lifecycle
//!
//! ```text
//! Accepted ──spawn ok──▶ running ──PtyClosed──▶ exit code sent ──▶ removed
//!    │                      │                        └─ hold ──▶ kept until closed
//!    │                      └──ClientHangup──▶ child killed, terminal removed
//!    └──spawn failed──▶ -27 sent, connection closed
//! ```
//!
//! With `no_wait` the client gets `0` right after the spawn and the
//! terminal no longer has anyone to report to.

use std::collections::BTreeMap;
use std::io;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Instant;

use ferroterm_core::{TermConfig, Terminal};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::error::ServerError;
use crate::event_loop::{
    ConnId, EventLoop, LoopEvent, Renderer, Session, TermId, spawn_acceptor, spawn_hangup_watch,
};
use crate::socket::{SocketGuard, bind_listener};
use crate::spawn::{ChildSpec, SPAWN_FAILED_EXIT_CODE, spawn_child};
use crate::wire::{Request, write_exit_code};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Template every terminal starts from before request overrides.
    pub term_config: TermConfig,
    /// Hold every terminal, regardless of the request flag.
    pub hold: bool,
}

impl ServerConfig {
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            term_config: TermConfig::default(),
            hold: false,
        }
    }

    #[must_use]
    pub fn with_term_config(mut self, term_config: TermConfig) -> Self {
        self.term_config = term_config;
        self
    }

    #[must_use]
    pub fn with_hold(mut self, hold: bool) -> Self {
        self.hold = hold;
        self
    }
}

pub struct Server<R: Renderer> {
    config: ServerConfig,
    evloop: EventLoop<R>,
    /// Connections waiting for an exit code.
    clients: BTreeMap<ConnId, TermId>,
    base_env: Vec<(String, String)>,
}

impl<R: Renderer> std::fmt::Debug for Server<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("evloop", &self.evloop)
            .field("clients", &self.clients)
            .finish_non_exhaustive()
    }
}

impl<R: Renderer> Server<R> {
    /// A server whose children inherit this process's environment.
    pub fn new(config: ServerConfig, renderer: R) -> Self {
        Self {
            config,
            evloop: EventLoop::new(renderer),
            clients: BTreeMap::new(),
            base_env: std::env::vars().collect(),
        }
    }

    #[must_use]
    pub fn with_base_env(mut self, env: Vec<(String, String)>) -> Self {
        self.base_env = env;
        self
    }

    #[must_use]
    pub fn event_loop(&self) -> &EventLoop<R> {
        &self.evloop
    }

    #[must_use]
    pub fn sender(&self) -> Sender<LoopEvent> {
        self.evloop.sender()
    }

    /// Bind the socket and serve until a termination signal arrives.
    ///
    /// The socket file is removed on return.
    pub fn run(&mut self) -> Result<(), ServerError> {
        let listener = bind_listener(&self.config.socket_path)?;
        let _guard = SocketGuard::new(self.config.socket_path.clone());
        tracing::info!(path = %self.config.socket_path.display(), "listening");

        spawn_acceptor(listener, self.evloop.sender());
        spawn_signal_watch(self.evloop.sender())?;

        while let Some(event) = self.evloop.next_event() {
            if !self.handle(event, Instant::now()) {
                break;
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Apply one event. Returns `false` once the server should stop.
    pub fn handle(&mut self, event: LoopEvent, now: Instant) -> bool {
        match event {
            LoopEvent::Accepted {
                conn,
                request,
                stream,
            } => self.accept(conn, request, stream),
            LoopEvent::PtyOutput { id, bytes } => {
                self.evloop.feed(id, &bytes, now);
            }
            LoopEvent::PtyClosed { id, exit_code } => self.child_exited(id, exit_code),
            LoopEvent::ClientHangup { conn } => self.client_hangup(conn),
            LoopEvent::Shutdown => return false,
        }
        true
    }

    fn accept(&mut self, conn: ConnId, request: Request, mut stream: UnixStream) {
        let mut term_config = self.config.term_config.clone();
        term_config.apply_overrides(request.overrides.iter().map(String::as_str));

        let (cols, rows) = term_config.initial_size;
        let mut spec = ChildSpec::new(request.argv.clone(), term_config.term.clone())
            .with_terminfo_dir(term_config.terminfo_dir.clone())
            .with_size(cols, rows);
        if !request.cwd.is_empty() {
            spec = spec.with_cwd(&request.cwd);
        }

        let pty = match spawn_child(&spec, self.base_env.iter().cloned()) {
            Ok(pty) => pty,
            Err(err) => {
                tracing::warn!(conn, %err, "spawn failed");
                if let Err(err) = write_exit_code(&mut stream, SPAWN_FAILED_EXIT_CODE) {
                    tracing::debug!(conn, %err, "client gone before spawn failure was reported");
                }
                return;
            }
        };

        let id = self.evloop.next_term_id();
        let mut session = Session::spawn(id, Terminal::new(term_config), pty, self.evloop.sender());
        session.hold = request.hold || self.config.hold;

        if request.no_wait {
            if let Err(err) = write_exit_code(&mut stream, 0) {
                tracing::debug!(conn, %err, "no-wait client gone before reply");
            }
        } else {
            match stream.try_clone() {
                Ok(watch) => {
                    spawn_hangup_watch(conn, watch, self.evloop.sender());
                    session.client = Some((conn, stream));
                    self.clients.insert(conn, id);
                }
                Err(err) => {
                    tracing::warn!(conn, %err, "cannot watch client; treating as no-wait");
                }
            }
        }

        tracing::info!(id, conn, hold = session.hold, "terminal created");
        self.evloop.insert(id, session);
    }

    fn child_exited(&mut self, id: TermId, code: i32) {
        let Some(session) = self.evloop.session_mut(id) else {
            return;
        };
        session.exit_code = Some(code);
        if let Some((conn, stream)) = session.client.take() {
            self.clients.remove(&conn);
            report_exit(conn, stream, code);
        }
        if session.hold {
            tracing::info!(id, code, "child exited; holding terminal");
        } else {
            self.evloop.remove(id);
        }
    }

    fn client_hangup(&mut self, conn: ConnId) {
        let Some(id) = self.clients.remove(&conn) else {
            return;
        };
        tracing::info!(id, conn, "client hung up; closing terminal");
        self.close(id);
    }

    /// Tear down terminal `id`. A running child is killed and reaped by its
    /// reader thread.
    pub fn close(&mut self, id: TermId) -> bool {
        let Some(mut session) = self.evloop.remove(id) else {
            return false;
        };
        if let Some((conn, stream)) = session.client.take() {
            self.clients.remove(&conn);
            let _ = stream.shutdown(Shutdown::Both);
        }
        session.kill();
        true
    }

    /// Kill every child and drop every terminal.
    pub fn shutdown(&mut self) {
        let count = self.evloop.len();
        for (_, mut session) in self.evloop.drain() {
            if let Some((_, stream)) = session.client.take() {
                let _ = stream.shutdown(Shutdown::Both);
            }
            session.kill();
        }
        self.clients.clear();
        tracing::info!(terminals = count, "server shut down");
    }
}

fn report_exit(conn: ConnId, mut stream: UnixStream, code: i32) {
    if let Err(err) = write_exit_code(&mut stream, code) {
        tracing::debug!(conn, %err, "client gone before exit code was sent");
    }
    // Wakes the hangup watcher, whose event is then ignored.
    let _ = stream.shutdown(Shutdown::Both);
}

/// Forward SIGINT/SIGTERM to the loop as [`LoopEvent::Shutdown`].
fn spawn_signal_watch(tx: Sender<LoopEvent>) -> io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(io::Error::other)?;
    thread::spawn(move || {
        for signal in signals.forever() {
            tracing::warn!(signal, "termination signal received");
            if tx.send(LoopEvent::Shutdown).is_err() {
                break;
            }
        }
    });
    Ok(())
}
