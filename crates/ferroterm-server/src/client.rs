//! The client side: ask a running server for a new terminal and wait for the
//! child's exit code.

use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use clap::Parser;

use crate::error::ServerError;
use crate::logging::{LogColorize, LogLevel};
use crate::socket;
use crate::wire::{self, Request};

/// Exit code when the server cannot be reached or the connection fails.
pub const SOCKET_ERROR_EXIT_CODE: i32 = -36;

#[derive(Debug, Clone, Parser)]
#[command(name = "ferroterm-client")]
#[command(about = "Open a new terminal in a running ferroterm server")]
#[command(version)]
pub struct Cli {
    /// Value of TERM in the child
    #[arg(short, long)]
    pub term: Option<String>,

    /// Initial window title
    #[arg(short = 'T', long)]
    pub title: Option<String>,

    /// Application id
    #[arg(short, long)]
    pub app_id: Option<String>,

    /// Initial window size in pixels (WIDTHxHEIGHT)
    #[arg(short, long, value_name = "WIDTHxHEIGHT", conflicts_with = "window_size_chars")]
    pub window_size_pixels: Option<String>,

    /// Initial window size in cells (COLSxROWS)
    #[arg(short = 'W', long, value_name = "COLSxROWS")]
    pub window_size_chars: Option<String>,

    #[arg(short, long, conflicts_with = "fullscreen")]
    pub maximized: bool,

    #[arg(short = 'F', long)]
    pub fullscreen: bool,

    /// Start the shell as a login shell
    #[arg(short = 'L', long)]
    pub login_shell: bool,

    /// Working directory of the child (default: the current directory)
    #[arg(short = 'D', long, value_name = "DIR")]
    pub working_directory: Option<PathBuf>,

    /// Server socket path
    #[arg(short, long, value_name = "PATH")]
    pub server_socket: Option<PathBuf>,

    /// Keep the terminal open after the child exits
    #[arg(short = 'H', long)]
    pub hold: bool,

    /// Return immediately instead of waiting for the child
    #[arg(short = 'N', long)]
    pub no_wait: bool,

    /// Configuration override (key=value), repeatable
    #[arg(short = 'o', long = "override", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    #[arg(short = 'd', long, value_enum)]
    pub log_level: Option<LogLevel>,

    #[arg(short = 'l', long, value_enum, default_value_t = LogColorize::Auto)]
    pub log_colorize: LogColorize,

    /// Command to run instead of the shell
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// The request sent to the server. `cwd` is used when no working
    /// directory was given.
    #[must_use]
    pub fn to_request(&self, cwd: PathBuf) -> Request {
        let mut overrides = Vec::new();
        if let Some(term) = &self.term {
            overrides.push(format!("term={term}"));
        }
        if let Some(title) = &self.title {
            overrides.push(format!("title={title}"));
        }
        if let Some(app_id) = &self.app_id {
            overrides.push(format!("app-id={app_id}"));
        }
        if let Some(size) = &self.window_size_pixels {
            overrides.push(format!("initial-window-size-pixels={size}"));
        }
        if let Some(size) = &self.window_size_chars {
            overrides.push(format!("initial-window-size-chars={size}"));
        }
        if self.maximized {
            overrides.push("initial-window-mode=maximized".into());
        } else if self.fullscreen {
            overrides.push("initial-window-mode=fullscreen".into());
        }
        if self.login_shell {
            tracing::warn!("--login-shell is not supported by the server; ignoring");
        }
        overrides.extend(self.overrides.iter().cloned());

        let cwd = self.working_directory.clone().unwrap_or(cwd);
        Request {
            hold: self.hold,
            no_wait: self.no_wait,
            cwd: cwd.to_string_lossy().into_owned(),
            overrides,
            argv: self.command.clone(),
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        self.server_socket.clone().unwrap_or_else(socket::socket_path)
    }
}

/// Send `request` to the server at `path` and wait for the exit code.
pub fn request_terminal(path: &std::path::Path, request: &Request) -> Result<i32, ServerError> {
    let mut stream = UnixStream::connect(path)?;
    wire::write_request(&mut stream, request)?;
    Ok(wire::read_exit_code(&mut stream)?)
}

/// Run the client; the return value is the process exit code.
pub fn run(cli: &Cli) -> i32 {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            tracing::error!(%err, "failed to get current working directory");
            return SOCKET_ERROR_EXIT_CODE;
        }
    };
    let path = cli.socket_path();
    let request = cli.to_request(cwd);
    match request_terminal(&path, &request) {
        Ok(code) => {
            tracing::debug!(code, "child exited");
            code
        }
        Err(err) => {
            tracing::error!(path = %path.display(), %err, "server request failed");
            SOCKET_ERROR_EXIT_CODE
        }
    }
}
