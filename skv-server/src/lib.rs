//! # StripeKV Server
//!
//! TCP server exposing the striped cache over a line-oriented text
//! protocol: one newline-terminated request per line, framed replies.

pub mod metrics;
pub mod protocol;
pub mod server;
