//! # StripeKV Server Binary
//!
//! Bind the listening socket, accept connections, and hand each one to
//! an independent task sharing a single engine.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpSocket;
use tracing::{debug, info, warn};

use skv_engine::KvEngine;
use skv_server::metrics::Metrics;
use skv_server::server;

/// Default listening port.
const DEFAULT_PORT: u16 = 6379;
/// Accept queue depth.
const BACKLOG: u32 = 128;
/// Stripe count for server deployments, sized so hundreds of concurrent
/// connections rarely share a stripe.
const SERVER_STRIPES: usize = 128;
/// How often the metrics snapshot is logged.
const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u16>()
            .with_context(|| format!("invalid port argument {arg:?}"))?,
        None => DEFAULT_PORT,
    };

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    let socket = TcpSocket::new_v4().context("create listening socket")?;
    socket.set_reuseaddr(true).context("set SO_REUSEADDR")?;
    socket.bind(addr).with_context(|| format!("bind {addr}"))?;
    let listener = socket.listen(BACKLOG).context("listen")?;

    let engine = Arc::new(KvEngine::with_stripes(SERVER_STRIPES));
    let metrics = Arc::new(Metrics::new());
    info!(%addr, stripes = SERVER_STRIPES, "listening");

    let stats = Arc::clone(&metrics);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_LOG_INTERVAL);
        // The first tick completes immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = stats.snapshot();
            debug!(
                requests = snapshot.requests_total,
                errors = snapshot.errors_total,
                inflight = snapshot.inflight,
                "metrics"
            );
        }
    });

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };

        let engine = Arc::clone(&engine);
        let metrics = Arc::clone(&metrics);
        tokio::spawn(async move {
            debug!(%peer, "client connected");
            if let Err(err) = server::handle_connection(stream, engine, metrics).await {
                debug!(%peer, %err, "connection error");
            }
            debug!(%peer, "client disconnected");
        });
    }
}
