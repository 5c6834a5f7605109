//! # Connection Handling
//!
//! Per-connection read loop and command dispatch against the shared
//! engine. Requests on one connection are processed and answered
//! strictly in arrival order.

use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use skv_engine::KvEngine;

use crate::metrics::Metrics;
use crate::protocol::{Command, Reply, parse_command};

/// Initial capacity of the per-connection read buffer.
const READ_BUFFER_SIZE: usize = 4096;

/// Handles a single client connection until QUIT, EOF, or an IO error.
///
/// Bytes accumulate in a private buffer; each complete line is trimmed,
/// empty lines are skipped, and the reply is written before the next
/// line is examined. Write failures tear the connection down without
/// retrying.
pub async fn handle_connection(
    stream: TcpStream,
    engine: Arc<KvEngine>,
    metrics: Arc<Metrics>,
) -> std::io::Result<()> {
    let mut stream = stream;
    let mut partial = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut reply_buf = Vec::with_capacity(256);

    loop {
        let bytes = stream.read_buf(&mut partial).await?;
        if bytes == 0 {
            return Ok(());
        }

        while let Some(pos) = partial.iter().position(|&byte| byte == b'\n') {
            let raw = partial.split_to(pos + 1);
            let line = raw[..pos].trim_ascii();
            if line.is_empty() {
                continue;
            }

            metrics.record_request_start();
            let started = Instant::now();
            let reply = dispatch(line, &engine);
            if reply.as_ref().is_some_and(Reply::is_error) {
                metrics.record_error();
            }
            metrics.record_request_end(started.elapsed());

            match reply {
                Some(reply) => {
                    reply_buf.clear();
                    reply.write_to(&mut reply_buf);
                    stream.write_all(&reply_buf).await?;
                }
                // QUIT closes the connection without a reply.
                None => return Ok(()),
            }
        }
    }
}

/// Parses and executes one request line.
///
/// Returns `None` for QUIT; every other outcome, including parse
/// failures, maps to a reply.
pub fn dispatch(line: &[u8], engine: &KvEngine) -> Option<Reply> {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(err) => return Some(Reply::error(err.to_string())),
    };

    match command {
        Command::Ping => Some(Reply::Pong),
        Command::Set {
            key,
            value,
            ttl_seconds,
        } => {
            engine.set(key, value, ttl_seconds);
            Some(Reply::Ok)
        }
        Command::Get { key } => Some(match engine.get(&key) {
            Some(value) => Reply::Bulk(value),
            None => Reply::NullBulk,
        }),
        Command::Del { key } => Some(if engine.delete(&key) {
            Reply::Ok
        } else {
            Reply::error("key not found")
        }),
        Command::Size => Some(Reply::Integer(engine.len() as u64)),
        Command::Quit => None,
    }
}
