//! # Wire Encoding
//!
//! Encode request lines and decode the server's framed replies. Requests
//! are space-joined tokens ending in `\n`; replies are `+`, `-`, `:`, or
//! `$` framed segments, each terminated by `\n`.

use std::io::BufRead;

use crate::client::{ClientError, ClientResult};

/// One decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReplyValue {
    /// `+OK` / `+PONG` status line, without the `+`.
    Status(Vec<u8>),
    /// `-ERR …` line, without the leading `-`.
    Error(Vec<u8>),
    /// `:<n>` integer line.
    Integer(i64),
    /// `$<len>` bulk value; `None` for the `$-1` miss form.
    Bulk(Option<Vec<u8>>),
}

/// Encodes a request as space-joined tokens terminated by `\n`.
pub(crate) fn encode_line(tokens: &[&[u8]], out: &mut Vec<u8>) {
    for (index, token) in tokens.iter().enumerate() {
        if index > 0 {
            out.push(b' ');
        }
        out.extend_from_slice(token);
    }
    out.push(b'\n');
}

/// Reads one reply from the stream.
pub(crate) fn read_reply<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
) -> ClientResult<ReplyValue> {
    read_line(reader, line_buf)?;
    let Some((&prefix, rest)) = line_buf.split_first() else {
        return Err(ClientError::Protocol);
    };

    match prefix {
        b'+' => Ok(ReplyValue::Status(rest.to_vec())),
        b'-' => Ok(ReplyValue::Error(rest.to_vec())),
        b':' => Ok(ReplyValue::Integer(parse_i64(rest)?)),
        b'$' => read_bulk(reader, parse_i64(rest)?),
        _ => Err(ClientError::Protocol),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<ReplyValue> {
    if len < 0 {
        return Ok(ReplyValue::Bulk(None));
    }

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;
    let mut newline = [0u8; 1];
    reader.read_exact(&mut newline)?;
    if newline != [b'\n'] {
        return Err(ClientError::Protocol);
    }
    Ok(ReplyValue::Bulk(Some(data)))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 || buf.last() != Some(&b'\n') {
        return Err(ClientError::Protocol);
    }
    buf.pop();
    Ok(())
}

fn parse_i64(data: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(ClientError::Protocol)
}
