//! # Connection Pool
//!
//! Bounded reuse of blocking TCP connections.
//!
//! ## Design Principles
//!
//! 1. **Object Pool**: A capped set of reusable connections; exceeding
//!    the cap fails fast instead of queueing.
//! 2. **Short Critical Sections**: The pool mutex is held only to move
//!    idle connections in and out.
//! 3. **Discard on Failure**: A connection that saw an IO or protocol
//!    error is dropped rather than returned to the pool.
//! 4. **Per-Connection Buffers**: Each connection keeps its own line and
//!    write buffers so requests do not allocate.

use std::collections::VecDeque;
use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};

use crate::client::{ClientConfig, ClientError, ClientResult};
use crate::wire::{ReplyValue, encode_line, read_reply};

/// Bounded pool of connections to one server address.
pub(crate) struct Pool {
    shared: Arc<PoolShared>,
}

struct PoolShared {
    config: ClientConfig,
    state: Mutex<PoolState>,
}

struct PoolState {
    idle: VecDeque<Conn>,
    /// Connections alive in total, idle or leased.
    total: usize,
}

impl Pool {
    pub(crate) fn new(config: ClientConfig) -> Self {
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            total: 0,
        };
        Pool {
            shared: Arc::new(PoolShared {
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// Takes an idle connection or opens a new one within the cap.
    pub(crate) fn lease(&self) -> ClientResult<Lease> {
        if let Some(conn) = self.take_idle() {
            return Ok(Lease::new(Arc::clone(&self.shared), conn));
        }

        if !self.reserve_slot() {
            return Err(ClientError::PoolExhausted);
        }
        match Conn::open(&self.shared.config) {
            Ok(conn) => Ok(Lease::new(Arc::clone(&self.shared), conn)),
            Err(err) => {
                self.forfeit_slot();
                Err(err)
            }
        }
    }

    fn take_idle(&self) -> Option<Conn> {
        let mut state = self.shared.state.lock().expect("pool lock poisoned");
        state.idle.pop_front()
    }

    fn reserve_slot(&self) -> bool {
        let mut state = self.shared.state.lock().expect("pool lock poisoned");
        if state.total >= self.shared.config.max_total {
            return false;
        }
        state.total += 1;
        true
    }

    fn forfeit_slot(&self) {
        let mut state = self.shared.state.lock().expect("pool lock poisoned");
        state.total = state.total.saturating_sub(1);
    }
}

/// A leased connection; returned to the pool on drop while healthy.
pub(crate) struct Lease {
    shared: Arc<PoolShared>,
    conn: Option<Conn>,
    healthy: bool,
}

impl Lease {
    fn new(shared: Arc<PoolShared>, conn: Conn) -> Self {
        Lease {
            shared,
            conn: Some(conn),
            healthy: true,
        }
    }

    /// Sends one request line and reads one reply.
    pub(crate) fn exec(&mut self, tokens: &[&[u8]]) -> ClientResult<ReplyValue> {
        let conn = self.conn.as_mut().expect("leased connection present");
        let result = conn.exec(tokens);
        if result.is_err() {
            self.healthy = false;
        }
        result
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else { return };
        let mut state = self.shared.state.lock().expect("pool lock poisoned");
        if self.healthy && state.idle.len() < self.shared.config.max_idle {
            state.idle.push_back(conn);
        } else {
            state.total = state.total.saturating_sub(1);
        }
    }
}

/// Single blocking connection with reusable buffers.
struct Conn {
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Conn {
    fn open(config: &ClientConfig) -> ClientResult<Self> {
        let addr: SocketAddr = config
            .addr
            .parse()
            .map_err(|_| ClientError::InvalidAddress)?;
        let stream = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        // Request/reply pairs are tiny; Nagle only adds latency.
        stream.set_nodelay(true)?;

        Ok(Conn {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        })
    }

    fn exec(&mut self, tokens: &[&[u8]]) -> ClientResult<ReplyValue> {
        self.write_buf.clear();
        encode_line(tokens, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_reply(&mut self.reader, &mut self.line_buf)
    }
}
