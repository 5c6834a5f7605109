//! End-to-end tests against a real TCP server on an ephemeral port:
//! byte-exact wire checks over a raw socket, plus client-library checks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use skv_client::{ClientConfig, KvClient};
use skv_engine::KvEngine;
use skv_server::metrics::Metrics;
use skv_server::server;

async fn spawn_test_server() -> std::io::Result<(SocketAddr, oneshot::Sender<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let engine = Arc::new(KvEngine::with_stripes(8));
    let metrics = Arc::new(Metrics::new());
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                accepted = listener.accept() => {
                    let (stream, _) = match accepted {
                        Ok(value) => value,
                        Err(_) => break,
                    };
                    let engine = Arc::clone(&engine);
                    let metrics = Arc::clone(&metrics);
                    tokio::spawn(async move {
                        let _ = server::handle_connection(stream, engine, metrics).await;
                    });
                }
            }
        }
    });

    Ok((addr, shutdown_tx))
}

async fn exchange(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
    stream.write_all(request).await.expect("write request");
    let mut buf = vec![0u8; expected.len()];
    stream.read_exact(&mut buf).await.expect("read reply");
    assert_eq!(buf, expected, "reply for {:?}", String::from_utf8_lossy(request));
}

#[tokio::test]
async fn wire_framing_is_exact() {
    let (addr, shutdown) = spawn_test_server().await.unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(&mut stream, b"PING\n", b"+PONG\n").await;
    exchange(&mut stream, b"SET foo bar\n", b"+OK\n").await;
    exchange(&mut stream, b"GET foo\n", b"$3\nbar\n").await;
    exchange(&mut stream, b"GET missing\n", b"$-1\n").await;
    exchange(&mut stream, b"GETx\n", b"-ERR unknown command\n").await;
    exchange(&mut stream, b"DEL nope\n", b"-ERR key not found\n").await;
    exchange(&mut stream, b"DEL foo\n", b"+OK\n").await;
    exchange(&mut stream, b"SET a 1\nSET b 2\nSIZE\n", b"+OK\n+OK\n:2\n").await;

    let _ = shutdown.send(());
}

#[tokio::test]
async fn arity_errors_keep_the_connection_open() {
    let (addr, shutdown) = spawn_test_server().await.unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(
        &mut stream,
        b"SET onlykey\n",
        b"-ERR wrong number of arguments for SET\n",
    )
    .await;
    exchange(
        &mut stream,
        b"GET a b\n",
        b"-ERR wrong number of arguments for GET\n",
    )
    .await;
    // Still serving after the errors.
    exchange(&mut stream, b"PING\n", b"+PONG\n").await;

    let _ = shutdown.send(());
}

#[tokio::test]
async fn blank_lines_are_skipped() {
    let (addr, shutdown) = spawn_test_server().await.unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(&mut stream, b"\n  \n\nPING\n", b"+PONG\n").await;

    let _ = shutdown.send(());
}

#[tokio::test]
async fn partial_lines_are_buffered_until_complete() {
    let (addr, shutdown) = spawn_test_server().await.unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"SET par").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream.write_all(b"tial value\nGET partial\n").await.unwrap();

    let expected = b"+OK\n$5\nvalue\n";
    let mut buf = vec![0u8; expected.len()];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, expected);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unparsable_ttl_is_coerced_to_no_expiry() {
    let (addr, shutdown) = spawn_test_server().await.unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(&mut stream, b"SET a 1 notanumber\n", b"+OK\n").await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    exchange(&mut stream, b"GET a\n", b"$1\n1\n").await;

    let _ = shutdown.send(());
}

#[tokio::test]
async fn elapsed_ttl_expires_the_key() {
    let (addr, shutdown) = spawn_test_server().await.unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();

    exchange(&mut stream, b"SET k v 1\n", b"+OK\n").await;
    exchange(&mut stream, b"GET k\n", b"$1\nv\n").await;

    tokio::time::sleep(Duration::from_millis(1200)).await;
    exchange(&mut stream, b"GET k\n", b"$-1\n").await;

    let _ = shutdown.send(());
}

#[tokio::test]
async fn quit_closes_the_connection_without_a_reply() {
    let (addr, shutdown) = spawn_test_server().await.unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"QUIT\n").await.unwrap();
    let mut buf = [0u8; 16];
    let read = stream.read(&mut buf).await.unwrap();
    assert_eq!(read, 0, "expected EOF after QUIT");

    let _ = shutdown.send(());
}

#[test]
fn client_end_to_end() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let (addr, shutdown) = runtime.block_on(spawn_test_server()).expect("server");

    let client = KvClient::with_config(ClientConfig {
        addr: addr.to_string(),
        connect_timeout: Some(Duration::from_secs(1)),
        read_timeout: Some(Duration::from_secs(5)),
        write_timeout: Some(Duration::from_secs(5)),
        ..ClientConfig::default()
    })
    .expect("client");

    client.ping().expect("ping");
    client.set(b"foo", b"bar").expect("set");
    assert_eq!(client.get(b"foo").expect("get"), Some(b"bar".to_vec()));
    assert_eq!(client.get(b"missing").expect("get missing"), None);
    assert_eq!(client.size().expect("size"), 1);
    assert!(client.delete(b"foo").expect("delete"));
    assert!(!client.delete(b"foo").expect("delete again"));

    // Expiry visible through the client after the TTL elapses.
    client
        .set_with_ttl(b"ttl", b"v", Duration::from_secs(1))
        .expect("set with ttl");
    assert_eq!(client.get(b"ttl").expect("get before expiry"), Some(b"v".to_vec()));
    std::thread::sleep(Duration::from_millis(1300));
    assert_eq!(client.get(b"ttl").expect("get after expiry"), None);

    let _ = shutdown.send(());
}
