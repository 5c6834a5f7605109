//! # StripeKV Sync Client
//!
//! Blocking client for the line protocol with pooled TCP connections to
//! keep handshake overhead off the request path.

mod client;
mod pool;
mod wire;

pub use client::{ClientConfig, ClientError, ClientResult, KvClient};
