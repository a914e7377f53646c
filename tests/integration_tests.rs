//! Black-box tests driving a real `TcpStream` against a `litecached` server
//! bound to an ephemeral port, covering the wire-level scenarios in
//! `spec.md` §8.

use std::cell::RefCell;
use std::future::Future;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use litecached::cache::CacheFacade;
use litecached::net::connection;
use litecached::stats::Stats;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::LocalSet;
use tokio::time::timeout;

const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Spins up a server on `127.0.0.1:0` inside a `LocalSet` (the cache and
/// stats live behind `Rc<RefCell<...>>`, so the accept loop and every
/// connection task must run on the thread driving the `LocalSet`) and
/// hands the bound address to `test`.
async fn with_server<F, Fut>(max_items: usize, max_bytes: usize, test: F)
where
    F: FnOnce(SocketAddr) -> Fut,
    Fut: Future<Output = ()>,
{
    let local = LocalSet::new();
    local
        .run_until(async move {
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind test listener");
            let addr = listener.local_addr().expect("listener has no local addr");

            let cache = Rc::new(RefCell::new(CacheFacade::new(max_items, max_bytes)));
            let stats = Rc::new(RefCell::new(Stats::new(max_items, max_bytes)));

            tokio::task::spawn_local(async move {
                loop {
                    let (stream, peer) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let cache = Rc::clone(&cache);
                    let stats = Rc::clone(&stats);
                    tokio::task::spawn_local(async move {
                        connection::handle(stream, peer, cache, stats).await;
                    });
                }
            });

            test(addr).await;
        })
        .await;
}

async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr)
        .await
        .expect("failed to connect to test server")
}

async fn send(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).await.expect("write failed");
}

/// Reads whatever the server has sent back so far, waiting briefly for the
/// first byte to arrive. Every reply used in these tests fits comfortably
/// within one read on loopback.
async fn recv(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = vec![0u8; 8192];
    let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("timed out waiting for a reply")
        .expect("read failed");
    buf.truncate(n);
    buf
}

fn assert_reply(actual: &[u8], expected: &[u8]) {
    assert_eq!(
        String::from_utf8_lossy(actual),
        String::from_utf8_lossy(expected)
    );
}

#[tokio::test]
async fn set_then_get_round_trip() {
    with_server(usize::MAX, DEFAULT_MAX_BYTES, |addr| async move {
        let mut stream = connect(addr).await;

        send(&mut stream, b"set test_key 0 0 5\r\n12345\r\n").await;
        assert_reply(&recv(&mut stream).await, b"STORED\r\n");

        send(&mut stream, b"get test_key\r\n").await;
        assert_reply(
            &recv(&mut stream).await,
            b"VALUE test_key 0 5\r\n12345\r\nEND\r\n",
        );
    })
    .await;
}

#[tokio::test]
async fn chunked_delivery_across_arbitrary_boundaries() {
    // The request line and body arrive as three separate writes, split at
    // points with no relation to the command grammar. The server must
    // still assemble them into a single `set` before replying.
    with_server(usize::MAX, DEFAULT_MAX_BYTES, |addr| async move {
        let mut stream = connect(addr).await;

        send(&mut stream, b"set test_got_input 0 0 ").await;
        send(&mut stream, b"9\r\nchunk-da").await;
        send(&mut stream, b"ta\r\n").await;
        assert_reply(&recv(&mut stream).await, b"STORED\r\n");

        send(&mut stream, b"get test_got_input\r\n").await;
        assert_reply(
            &recv(&mut stream).await,
            b"VALUE test_got_input 0 9\r\nchunk-data\r\nEND\r\n",
        );
    })
    .await;
}

#[tokio::test]
async fn cas_flow_via_gets_then_cas() {
    with_server(usize::MAX, DEFAULT_MAX_BYTES, |addr| async move {
        let mut stream = connect(addr).await;

        send(&mut stream, b"set cas_key 0 0 3\r\nold\r\n").await;
        assert_reply(&recv(&mut stream).await, b"STORED\r\n");

        send(&mut stream, b"gets cas_key\r\n").await;
        let reply = recv(&mut stream).await;
        let text = String::from_utf8_lossy(&reply).into_owned();
        let cas_token: u64 = text
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().last())
            .expect("gets reply missing cas token")
            .parse()
            .expect("cas token was not a number");

        let cas_cmd = format!("cas cas_key 0 0 3 {cas_token}\r\nnew\r\n");
        send(&mut stream, cas_cmd.as_bytes()).await;
        assert_reply(&recv(&mut stream).await, b"STORED\r\n");

        // Replaying the same (now stale) cas token must fail with EXISTS.
        send(&mut stream, cas_cmd.as_bytes()).await;
        assert_reply(&recv(&mut stream).await, b"EXISTS\r\n");

        send(&mut stream, b"get cas_key\r\n").await;
        assert_reply(
            &recv(&mut stream).await,
            b"VALUE cas_key 0 3\r\nnew\r\nEND\r\n",
        );
    })
    .await;
}

#[tokio::test]
async fn eviction_under_a_tight_item_limit() {
    with_server(2, DEFAULT_MAX_BYTES, |addr| async move {
        let mut stream = connect(addr).await;

        for i in 0..5 {
            let cmd = format!("set key{i} 0 0 1\r\nx\r\n");
            send(&mut stream, cmd.as_bytes()).await;
            assert_reply(&recv(&mut stream).await, b"STORED\r\n");
        }

        // key0 should have been evicted long before key4 was stored.
        send(&mut stream, b"get key0\r\n").await;
        assert_reply(&recv(&mut stream).await, b"END\r\n");

        send(&mut stream, b"get key4\r\n").await;
        assert_reply(&recv(&mut stream).await, b"VALUE key4 0 1\r\nx\r\nEND\r\n");

        send(&mut stream, b"stats\r\n").await;
        let reply = recv(&mut stream).await;
        let text = String::from_utf8_lossy(&reply);
        let evictions: u64 = text
            .lines()
            .find_map(|line| line.strip_prefix("STAT evictions "))
            .expect("stats reply missing evictions")
            .trim()
            .parse()
            .expect("evictions was not a number");
        assert_eq!(evictions, 3);
    })
    .await;
}

#[tokio::test]
async fn incr_on_non_numeric_value_is_a_client_error() {
    with_server(usize::MAX, DEFAULT_MAX_BYTES, |addr| async move {
        let mut stream = connect(addr).await;

        send(&mut stream, b"set counter 0 0 3\r\nabc\r\n").await;
        assert_reply(&recv(&mut stream).await, b"STORED\r\n");

        send(&mut stream, b"incr counter 1\r\n").await;
        assert_reply(
            &recv(&mut stream).await,
            b"CLIENT_ERROR cannot increment or decrement non-numeric value\r\n",
        );
    })
    .await;
}

#[tokio::test]
async fn unknown_command_keeps_the_connection_open() {
    with_server(usize::MAX, DEFAULT_MAX_BYTES, |addr| async move {
        let mut stream = connect(addr).await;

        send(&mut stream, b"flub\r\n").await;
        assert_reply(&recv(&mut stream).await, b"ERROR\r\n");

        send(&mut stream, b"version\r\n").await;
        let reply = recv(&mut stream).await;
        assert!(String::from_utf8_lossy(&reply).starts_with("VERSION "));
    })
    .await;
}

#[tokio::test]
async fn noreply_suppresses_the_reply_but_not_the_effect() {
    with_server(usize::MAX, DEFAULT_MAX_BYTES, |addr| async move {
        let mut stream = connect(addr).await;

        send(&mut stream, b"set quiet_key 0 0 3 noreply\r\nfoo\r\n").await;
        send(&mut stream, b"get quiet_key\r\n").await;

        // Only the `get` produces a reply; the `set` was silent.
        assert_reply(
            &recv(&mut stream).await,
            b"VALUE quiet_key 0 3\r\nfoo\r\nEND\r\n",
        );
    })
    .await;
}

#[tokio::test]
async fn flush_all_with_no_delay_evicts_everything_immediately() {
    with_server(usize::MAX, DEFAULT_MAX_BYTES, |addr| async move {
        let mut stream = connect(addr).await;

        send(&mut stream, b"set flush_key 0 0 1\r\nx\r\n").await;
        assert_reply(&recv(&mut stream).await, b"STORED\r\n");

        send(&mut stream, b"flush_all\r\n").await;
        assert_reply(&recv(&mut stream).await, b"OK\r\n");

        send(&mut stream, b"get flush_key\r\n").await;
        assert_reply(&recv(&mut stream).await, b"END\r\n");
    })
    .await;
}

#[tokio::test]
async fn a_body_not_terminated_by_crlf_closes_the_connection_after_replying() {
    // The declared byte count lands the reader on bytes that aren't the
    // required `\r\n` terminator; the byte stream is desynchronized from
    // the command boundary, so the server replies once and closes rather
    // than trying to resume.
    with_server(usize::MAX, DEFAULT_MAX_BYTES, |addr| async move {
        let mut stream = connect(addr).await;

        send(&mut stream, b"set bad_chunk 0 0 5\r\n1234567").await;
        assert_reply(
            &recv(&mut stream).await,
            b"CLIENT_ERROR bad data chunk\r\n",
        );

        // The peer should observe EOF rather than the connection staying
        // open for further commands.
        let mut buf = [0u8; 16];
        let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("timed out waiting for EOF")
            .expect("read failed");
        assert_eq!(n, 0, "expected connection to be closed");
    })
    .await;
}
