//! # StripeKV Engine
//!
//! In-memory key-value store with striped locking and second-granularity
//! TTL expiry. The engine is synchronous and runtime-free so it can be
//! embedded directly or fronted by a network server.

pub mod engine;
mod expiry;
mod store;

pub use engine::{DEFAULT_STRIPES, KvEngine};
