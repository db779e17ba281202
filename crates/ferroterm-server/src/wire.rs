//! Client/server wire format.
//!
//! A request is a little-endian `u32` length followed by that many bytes:
//!
//! ```text
//! u8    flags            bit0 = hold, bit1 = no_wait
//! u16   cwd_len          includes the trailing NUL
//! u16   override_count
//! u16   argc
//! bytes cwd[cwd_len]
//! override_count x { u16 len; bytes s[len] }   (len includes NUL)
//! argc           x { u16 len; bytes s[len] }
//! ```
//!
//! The reply is the child's exit code as a native-endian `i32`.
//!
//! # Invariants
//!
//! | Invariant | Enforcement |
//! |---|---|
//! | The header plus every announced string exactly fills the body | [`decode_request`] returns `LengthMismatch` otherwise |
//! | Every string is non-empty and ends in NUL | `MissingNul` |
//! | No body larger than [`MAX_REQUEST_LEN`] is buffered | checked before allocation |

use std::io::{self, Read, Write};

use crate::error::{FramingError, ServerError};

/// Size of the fixed part of the body.
pub const HEADER_LEN: usize = 7;
/// Largest body a server accepts.
pub const MAX_REQUEST_LEN: usize = 1 << 20;

const FLAG_HOLD: u8 = 1 << 0;
const FLAG_NO_WAIT: u8 = 1 << 1;

/// A decoded client request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub hold: bool,
    pub no_wait: bool,
    pub cwd: String,
    /// `key=value` configuration overrides.
    pub overrides: Vec<String>,
    pub argv: Vec<String>,
}

/// Encode `request`, including the leading `u32` length.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, FramingError> {
    let count = |n: usize| u16::try_from(n).map_err(|_| FramingError::TooLarge);

    let mut body = Vec::with_capacity(64);
    let mut flags = 0u8;
    if request.hold {
        flags |= FLAG_HOLD;
    }
    if request.no_wait {
        flags |= FLAG_NO_WAIT;
    }
    body.push(flags);
    body.extend_from_slice(&count(request.cwd.len() + 1)?.to_le_bytes());
    body.extend_from_slice(&count(request.overrides.len())?.to_le_bytes());
    body.extend_from_slice(&count(request.argv.len())?.to_le_bytes());

    body.extend_from_slice(request.cwd.as_bytes());
    body.push(0);
    for s in request.overrides.iter().chain(&request.argv) {
        body.extend_from_slice(&count(s.len() + 1)?.to_le_bytes());
        body.extend_from_slice(s.as_bytes());
        body.push(0);
    }

    if body.len() > MAX_REQUEST_LEN {
        return Err(FramingError::TooLarge);
    }
    let total = u32::try_from(body.len()).map_err(|_| FramingError::TooLarge)?;
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a request body (everything after the `u32` length).
pub fn decode_request(body: &[u8]) -> Result<Request, FramingError> {
    if body.len() < HEADER_LEN {
        return Err(FramingError::TooShort);
    }
    let flags = body[0];
    let cwd_len = usize::from(read_u16(body, 1));
    let override_count = read_u16(body, 3);
    let argc = read_u16(body, 5);

    let mut cursor = Cursor {
        body,
        pos: HEADER_LEN,
    };
    let cwd = cursor.string(cwd_len)?;
    let overrides = (0..override_count)
        .map(|_| cursor.prefixed_string())
        .collect::<Result<Vec<_>, _>>()?;
    let argv = (0..argc)
        .map(|_| cursor.prefixed_string())
        .collect::<Result<Vec<_>, _>>()?;

    if cursor.pos != body.len() {
        return Err(FramingError::LengthMismatch {
            declared: cursor.pos,
            actual: body.len(),
        });
    }

    Ok(Request {
        hold: flags & FLAG_HOLD != 0,
        no_wait: flags & FLAG_NO_WAIT != 0,
        cwd,
        overrides,
        argv,
    })
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

struct Cursor<'a> {
    body: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take(&mut self, len: usize) -> Result<&[u8], FramingError> {
        let end = self.pos + len;
        if end > self.body.len() {
            return Err(FramingError::LengthMismatch {
                declared: end,
                actual: self.body.len(),
            });
        }
        let bytes = &self.body[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn string(&mut self, len: usize) -> Result<String, FramingError> {
        let bytes = self.take(len)?;
        let Some((&0, text)) = bytes.split_last() else {
            return Err(FramingError::MissingNul);
        };
        String::from_utf8(text.to_vec()).map_err(|_| FramingError::InvalidUtf8)
    }

    fn prefixed_string(&mut self) -> Result<String, FramingError> {
        let len = self.take(2)?;
        let len = usize::from(u16::from_le_bytes([len[0], len[1]]));
        self.string(len)
    }
}

/// Read one request from `r`.
///
/// An oversized length is rejected before the body is read.
pub fn read_request<R: Read + ?Sized>(r: &mut R) -> Result<Request, ServerError> {
    let mut len = [0u8; 4];
    r.read_exact(&mut len)?;
    let total = u32::from_le_bytes(len) as usize;
    if total > MAX_REQUEST_LEN {
        return Err(FramingError::TooLarge.into());
    }
    let mut body = vec![0u8; total];
    r.read_exact(&mut body)?;
    Ok(decode_request(&body)?)
}

pub fn write_request<W: Write + ?Sized>(w: &mut W, request: &Request) -> Result<(), ServerError> {
    let bytes = encode_request(request)?;
    w.write_all(&bytes)?;
    w.flush()?;
    Ok(())
}

pub fn write_exit_code<W: Write + ?Sized>(w: &mut W, code: i32) -> io::Result<()> {
    w.write_all(&code.to_ne_bytes())?;
    w.flush()
}

pub fn read_exit_code<R: Read + ?Sized>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_ne_bytes(buf))
}
