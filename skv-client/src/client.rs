//! # Client Facade
//!
//! `KvClient` hides pooling and wire details behind a compact blocking
//! API. Each call leases a connection, runs one command, and returns the
//! connection to the pool.

use std::time::Duration;

use thiserror::Error;

use crate::pool::Pool;
use crate::wire::ReplyValue;

/// Result type for the sync client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the sync client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Reply framing did not match the protocol.
    #[error("protocol error")]
    Protocol,
    /// The server answered with an `-ERR` reply.
    #[error("server error: {}", String::from_utf8_lossy(.message))]
    Server { message: Vec<u8> },
    /// The reply type did not match the command.
    #[error("unexpected reply type")]
    UnexpectedReply,
    #[error("connection pool exhausted")]
    PoolExhausted,
    #[error("invalid server address")]
    InvalidAddress,
    /// The wire protocol cannot carry empty tokens or whitespace inside
    /// keys and values.
    #[error("key or value is empty or contains whitespace")]
    InvalidToken,
}

/// Configuration for the client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + leased).
    pub max_total: usize,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:6379".to_string(),
            max_idle: 8,
            max_total: 16,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

/// Blocking client with connection pooling.
pub struct KvClient {
    pool: Pool,
}

impl KvClient {
    /// Creates a client for `addr` with default pool settings.
    ///
    /// Connections are opened lazily on first use.
    pub fn connect(addr: impl Into<String>) -> ClientResult<Self> {
        let config = ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        Ok(KvClient {
            pool: Pool::new(config),
        })
    }

    /// Round-trip health check.
    pub fn ping(&self) -> ClientResult<()> {
        match self.exec(&[b"PING"])? {
            ReplyValue::Status(_) => Ok(()),
            ReplyValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Stores `key` without expiration.
    pub fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        check_token(key)?;
        check_token(value)?;
        match self.exec(&[b"SET", key, value])? {
            ReplyValue::Status(_) => Ok(()),
            ReplyValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Stores `key` with a whole-second time-to-live.
    pub fn set_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> ClientResult<()> {
        check_token(key)?;
        check_token(value)?;
        let seconds = ttl.as_secs().to_string();
        match self.exec(&[b"SET", key, value, seconds.as_bytes()])? {
            ReplyValue::Status(_) => Ok(()),
            ReplyValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Fetches a value. `Ok(None)` means missing or expired.
    pub fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        check_token(key)?;
        match self.exec(&[b"GET", key])? {
            ReplyValue::Bulk(data) => Ok(data),
            ReplyValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Deletes a key. Returns whether the server removed one; the
    /// server's `-ERR key not found` miss reply maps to `Ok(false)`.
    pub fn delete(&self, key: &[u8]) -> ClientResult<bool> {
        check_token(key)?;
        match self.exec(&[b"DEL", key])? {
            ReplyValue::Status(_) => Ok(true),
            ReplyValue::Error(message) if message == b"ERR key not found" => Ok(false),
            ReplyValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Number of keys on the server; approximate while writers are
    /// active.
    pub fn size(&self) -> ClientResult<u64> {
        match self.exec(&[b"SIZE"])? {
            ReplyValue::Integer(value) if value >= 0 => Ok(value as u64),
            ReplyValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    fn exec(&self, tokens: &[&[u8]]) -> ClientResult<ReplyValue> {
        let mut lease = self.pool.lease()?;
        lease.exec(tokens)
    }
}

/// Keys and values travel as whitespace-delimited tokens; anything else
/// would corrupt the stream, so it is rejected before the wire.
fn check_token(token: &[u8]) -> ClientResult<()> {
    if token.is_empty() || token.iter().any(|byte| byte.is_ascii_whitespace()) {
        return Err(ClientError::InvalidToken);
    }
    Ok(())
}
