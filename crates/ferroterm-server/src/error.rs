//! Server error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Which check rejected a client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Fewer bytes than the fixed header.
    TooShort,
    /// The strings the header announces do not add up to the body length.
    LengthMismatch { declared: usize, actual: usize },
    /// A string is empty or lacks its trailing NUL.
    MissingNul,
    /// A string is not UTF-8.
    InvalidUtf8,
    /// The announced total length exceeds the request limit, or a string is
    /// too long for its 16-bit length field.
    TooLarge,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "request shorter than its header"),
            Self::LengthMismatch { declared, actual } => {
                write!(f, "request declares {declared} bytes but carries {actual}")
            }
            Self::MissingNul => write!(f, "request string is not NUL-terminated"),
            Self::InvalidUtf8 => write!(f, "request string is not valid UTF-8"),
            Self::TooLarge => write!(f, "request too large"),
        }
    }
}

impl std::error::Error for FramingError {}

#[derive(Debug)]
pub enum ServerError {
    Io(io::Error),
    Framing(FramingError),
    Spawn(String),
    /// Another server answers on this socket path.
    SocketInUse(PathBuf),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Framing(err) => write!(f, "invalid client request: {err}"),
            Self::Spawn(msg) => write!(f, "failed to spawn child: {msg}"),
            Self::SocketInUse(path) => {
                write!(f, "{}: socket already in use by a running server", path.display())
            }
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Framing(err) => Some(err),
            Self::Spawn(_) | Self::SocketInUse(_) => None,
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<FramingError> for ServerError {
    fn from(err: FramingError) -> Self {
        Self::Framing(err)
    }
}

/// Map a `portable_pty` (anyhow-based) error into `io::Error`.
pub(crate) fn portable_pty_error<E: fmt::Display>(err: E) -> io::Error {
    io::Error::other(err.to_string())
}
