//! The accept loop and shutdown signal handling: a listening socket with
//! `SO_REUSEADDR` and a system-maximum backlog.
//!
//! Runs on a `tokio` current-thread runtime inside a `LocalSet`: every
//! accepted connection is `spawn_local`'d onto the same OS thread as the
//! cache and statistics, which live behind `Rc<RefCell<...>>` rather than
//! `Arc<Mutex<...>>`, keeping the whole server single-threaded and
//! lock-free.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use tokio::net::{TcpSocket, TcpListener};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task;
use tracing::{info, warn};

use crate::cache::CacheFacade;
use crate::config::Config;
use crate::error::ConnectionError;
use crate::stats::Stats;

use super::connection;

pub async fn run(
    config: &Config,
    cache: Rc<RefCell<CacheFacade>>,
    stats: Rc<RefCell<Stats>>,
) -> Result<(), ConnectionError> {
    let listener = bind(config)?;
    info!(addr = %listener.local_addr()?, "litecached listening");

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => spawn_connection(stream, addr, &cache, &stats),
                    Err(err) => warn!(error = %err, "accept failed"),
                }
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn bind(config: &Config) -> Result<TcpListener, ConnectionError> {
    let host = if config.interface.is_empty() {
        "0.0.0.0"
    } else {
        &config.interface
    };
    let addr: SocketAddr = format!("{host}:{}", config.tcp_port)
        .parse()
        .map_err(|_| {
            ConnectionError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid interface address",
            ))
        })?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(libc::SOMAXCONN as u32)?)
}

fn spawn_connection(
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
    cache: &Rc<RefCell<CacheFacade>>,
    stats: &Rc<RefCell<Stats>>,
) {
    let cache = Rc::clone(cache);
    let stats = Rc::clone(stats);
    task::spawn_local(async move {
        connection::handle(stream, addr, cache, stats).await;
    });
}
