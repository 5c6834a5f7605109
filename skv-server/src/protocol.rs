//! # Line Protocol
//!
//! One request per newline-terminated line, whitespace-separated tokens,
//! case-insensitive command token. Replies are the framed forms listed on
//! [`Reply`].
//!
//! ## Design Principles
//!
//! 1. **Typed Surface**: Requests parse into [`Command`] before any
//!    engine call; replies are framed from [`Reply`] in one place.
//! 2. **Byte Tokens**: Keys and values stay raw bytes; only the command
//!    token is interpreted, as case-insensitive ASCII.
//! 3. **Lenient TTL**: An unparsable or out-of-range TTL token degrades
//!    to "no expiry" instead of failing the request.
//! 4. **Exact Framing**: Error texts and reply forms are wire contract,
//!    tested byte for byte.

use std::borrow::Cow;
use std::sync::Arc;

use thiserror::Error;

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
        /// Zero means no expiry.
        ttl_seconds: u64,
    },
    Get {
        key: Vec<u8>,
    },
    Del {
        key: Vec<u8>,
    },
    Size,
    Quit,
}

/// Parse failures reported to the client as `-ERR` replies.
///
/// The `Display` text of each variant is exactly the wire message after
/// `-ERR `.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("wrong number of arguments for SET")]
    SetArity,
    #[error("wrong number of arguments for GET")]
    GetArity,
    #[error("wrong number of arguments for DEL")]
    DelArity,
    #[error("unknown command")]
    UnknownCommand,
}

/// Parses one trimmed, non-empty request line.
///
/// `SET` accepts an optional fourth TTL token and ignores anything after
/// it; `PING`, `SIZE`, and `QUIT` ignore trailing tokens entirely. `GET`
/// and `DEL` take exactly one argument.
pub fn parse_command(line: &[u8]) -> Result<Command, ParseError> {
    let tokens: Vec<&[u8]> = line
        .split(|byte| byte.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
        .collect();

    let Some(&command) = tokens.first() else {
        return Err(ParseError::UnknownCommand);
    };

    if command.eq_ignore_ascii_case(b"PING") {
        return Ok(Command::Ping);
    }
    if command.eq_ignore_ascii_case(b"SET") {
        if tokens.len() < 3 {
            return Err(ParseError::SetArity);
        }
        let ttl_seconds = tokens.get(3).map_or(0, |token| parse_ttl(token));
        return Ok(Command::Set {
            key: tokens[1].to_vec(),
            value: tokens[2].to_vec(),
            ttl_seconds,
        });
    }
    if command.eq_ignore_ascii_case(b"GET") {
        if tokens.len() != 2 {
            return Err(ParseError::GetArity);
        }
        return Ok(Command::Get {
            key: tokens[1].to_vec(),
        });
    }
    if command.eq_ignore_ascii_case(b"DEL") {
        if tokens.len() != 2 {
            return Err(ParseError::DelArity);
        }
        return Ok(Command::Del {
            key: tokens[1].to_vec(),
        });
    }
    if command.eq_ignore_ascii_case(b"SIZE") {
        return Ok(Command::Size);
    }
    if command.eq_ignore_ascii_case(b"QUIT") {
        return Ok(Command::Quit);
    }

    Err(ParseError::UnknownCommand)
}

/// TTL tokens that are not a plain decimal `u64` degrade to zero.
fn parse_ttl(token: &[u8]) -> u64 {
    let mut value: u64 = 0;
    for &byte in token {
        if !byte.is_ascii_digit() {
            return 0;
        }
        value = match value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
        {
            Some(next) => next,
            None => return 0,
        };
    }
    value
}

/// A framed server reply. Every segment ends with a bare `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`: successful SET or DEL.
    Ok,
    /// `+PONG`: PING reply.
    Pong,
    /// `-ERR <message>`: protocol error or DEL miss.
    Error(Cow<'static, str>),
    /// `$-1`: GET miss.
    NullBulk,
    /// `$<len>` followed by the raw value: GET hit.
    Bulk(Arc<[u8]>),
    /// `:<n>`: SIZE reply.
    Integer(u64),
}

impl Reply {
    pub fn error(message: impl Into<Cow<'static, str>>) -> Self {
        Reply::Error(message.into())
    }

    /// True for `-ERR` replies; feeds the server's error counter.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Appends the wire encoding to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Ok => out.extend_from_slice(b"+OK\n"),
            Reply::Pong => out.extend_from_slice(b"+PONG\n"),
            Reply::Error(message) => {
                out.extend_from_slice(b"-ERR ");
                out.extend_from_slice(message.as_bytes());
                out.push(b'\n');
            }
            Reply::NullBulk => out.extend_from_slice(b"$-1\n"),
            Reply::Bulk(value) => {
                out.push(b'$');
                out.extend_from_slice(value.len().to_string().as_bytes());
                out.push(b'\n');
                out.extend_from_slice(value);
                out.push(b'\n');
            }
            Reply::Integer(value) => {
                out.push(b':');
                out.extend_from_slice(value.to_string().as_bytes());
                out.push(b'\n');
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}
