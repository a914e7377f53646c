//! CLI configuration, including the `--udp-port`/`--socket` flags kept for
//! command-line compatibility even though this server is TCP-only. Parsed
//! once at startup with `clap`'s derive API into a `Config` value that
//! every other module treats as read-only.

use clap::Parser;

/// Verbosity level, set once at startup and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// `-v`: errors and warnings only.
    Errors,
    /// `-w`: also logs every request/response.
    Requests,
    /// `-x`: also logs internal state transitions.
    Trace,
}

impl Verbosity {
    /// An `EnvFilter` directive string matching this level, for
    /// `tracing_subscriber`'s filter layer.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Verbosity::Errors => "warn",
            Verbosity::Requests => "litecached=info",
            Verbosity::Trace => "litecached=trace",
        }
    }
}

/// An in-memory cache server speaking the ASCII memcached protocol.
#[derive(Debug, Parser)]
#[command(name = "litecached", version, about)]
pub struct Cli {
    /// TCP port number to listen on.
    #[arg(short = 'p', long = "tcp-port", default_value_t = 11211, value_name = "PORT")]
    pub tcp_port: u16,

    /// Interface to listen on (default: all addresses).
    #[arg(short = 'I', long = "interface", default_value = "", value_name = "INTERFACE")]
    pub interface: String,

    /// Max memory to use for item storage, in megabytes.
    #[arg(short = 'm', long = "max-memory", default_value_t = 64, value_name = "MB")]
    pub max_memory: u64,

    /// UDP port to listen on. UDP is not implemented; must be left at 0 (off).
    #[arg(short = 'U', long = "udp-port", default_value_t = 0, value_name = "PORT")]
    pub udp_port: u16,

    /// UNIX domain socket path. UNIX sockets are not implemented; must be left unset.
    #[arg(short = 's', long = "socket", default_value = "", value_name = "FILE")]
    pub socket: String,

    /// Run as a daemon. Accepted for CLI compatibility; logged and ignored.
    #[arg(short = 'd', long = "daemonize")]
    pub daemonize: bool,

    /// Switch to this user after startup. Accepted for CLI compatibility; logged and ignored.
    #[arg(short = 'u', long = "username", value_name = "USERNAME")]
    pub username: Option<String>,

    /// Write the server's PID to this file. Accepted for CLI compatibility; logged and ignored.
    #[arg(short = 'P', long = "pidfile", value_name = "FILE")]
    pub pidfile: Option<String>,

    /// Log errors and warnings only.
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Also log every request and response.
    #[arg(short = 'w')]
    pub log_requests: bool,

    /// Also log internal protocol state transitions.
    #[arg(short = 'x')]
    pub trace: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("--udp-port is not supported (UDP transport is a non-goal); leave it at 0")]
    UdpPortUnsupported,
    #[error("--socket is not supported (UNIX socket transport is a non-goal); leave it unset")]
    SocketUnsupported,
}

/// Fully resolved server configuration, derived from [`Cli`] after
/// validating the transport-compatibility flags.
pub struct Config {
    pub tcp_port: u16,
    pub interface: String,
    pub max_bytes: usize,
    pub daemonize: bool,
    pub username: Option<String>,
    pub pidfile: Option<String>,
    pub verbosity: Verbosity,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.udp_port != 0 {
            return Err(ConfigError::UdpPortUnsupported);
        }
        if !cli.socket.is_empty() {
            return Err(ConfigError::SocketUnsupported);
        }

        let verbosity = if cli.trace {
            Verbosity::Trace
        } else if cli.log_requests {
            Verbosity::Requests
        } else {
            Verbosity::Errors
        };

        Ok(Config {
            tcp_port: cli.tcp_port,
            interface: cli.interface,
            max_bytes: (cli.max_memory as usize) * 1024 * 1024,
            daemonize: cli.daemonize,
            username: cli.username,
            pidfile: cli.pidfile,
            verbosity,
        })
    }
}
