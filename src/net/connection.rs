//! The per-connection read, process, write loop, expressed as a
//! `tokio::task::spawn_local` task: one task per connection, reading
//! chunks off the socket and feeding them to the protocol state machine.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::cache::CacheFacade;
use crate::protocol::{Outcome, Protocol};
use crate::stats::Stats;

/// Fixed read chunk size per recv call.
const READ_CHUNK: usize = 4096;

pub async fn handle(
    mut stream: TcpStream,
    addr: SocketAddr,
    cache: Rc<RefCell<CacheFacade>>,
    stats: Rc<RefCell<Stats>>,
) {
    stats.borrow_mut().on_connect();
    debug!(%addr, "connection accepted");

    let mut protocol = Protocol::new();
    let mut read_buf = [0u8; READ_CHUNK];

    'connection: loop {
        let read = stream.read(&mut read_buf).await;
        let n = match read {
            Ok(0) => {
                debug!(%addr, "connection closed by peer");
                break;
            }
            Ok(n) => n,
            Err(err) => {
                warn!(%addr, error = %err, "error reading from socket");
                break;
            }
        };
        stats.borrow_mut().protocol.bytes_read += n as u64;
        trace!(%addr, chunk = %escape(&read_buf[..n]), "received");

        let outcomes = {
            let mut cache = cache.borrow_mut();
            let mut stats = stats.borrow_mut();
            protocol.poll(&read_buf[..n], &mut cache, &mut stats)
        };

        for outcome in outcomes {
            match outcome {
                Outcome::Reply(reply) => {
                    if !reply.is_empty() {
                        trace!(%addr, reply = %escape(&reply), "sending");
                        if write_reply(&mut stream, &reply, &stats).await.is_err() {
                            break 'connection;
                        }
                    }
                }
                Outcome::ReplyThenClose(reply) => {
                    trace!(%addr, reply = %escape(&reply), "sending then closing");
                    let _ = write_reply(&mut stream, &reply, &stats).await;
                    break 'connection;
                }
                Outcome::Quit => {
                    debug!(%addr, "client issued quit");
                    break 'connection;
                }
            }
        }
    }

    stats.borrow_mut().on_disconnect();
    trace!(%addr, "connection task finished");
}

async fn write_reply(
    stream: &mut TcpStream,
    bytes: &[u8],
    stats: &Rc<RefCell<Stats>>,
) -> std::io::Result<()> {
    stream.write_all(bytes).await?;
    stats.borrow_mut().protocol.bytes_written += bytes.len() as u64;
    Ok(())
}

/// Render bytes for logging with `\r`/`\n` escaped so trace lines stay on
/// one line.
fn escape(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .replace('\r', "\\r")
        .replace('\n', "\\n")
}
