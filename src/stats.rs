//! Layered statistics aggregate: cache-level counters, then protocol-level
//! counters, then connection-level counters. One `Stats` value is created
//! at server startup and shared (via `Rc<RefCell<...>>`, see `net::server`)
//! by every connection on the single-threaded reactor, so no atomics or
//! locks are needed.

pub const VERSION: &str = "0.1";

#[derive(Default, Debug, Clone)]
pub struct CacheStats {
    pub limit_maxbytes: u64,
    pub limit_maxitems: u64,
    pub curr_items: usize,
    pub total_items: u64,
    pub bytes: usize,
    pub evictions: u64,
    pub reclaimed: u64,
}

#[derive(Default, Debug, Clone)]
pub struct ProtocolStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub cmd_get: u64,
    pub cmd_set: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub delete_hits: u64,
    pub delete_misses: u64,
    pub incr_hits: u64,
    pub incr_misses: u64,
    pub decr_hits: u64,
    pub decr_misses: u64,
    pub cas_hits: u64,
    pub cas_misses: u64,
    pub cas_badvals: u64,
    pub auth_cmds: u64,
    pub auth_errors: u64,
}

#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub start_time: i64,
    pub curr_connections: u64,
    pub total_connections: u64,
    pub connection_structures: u64,
}

impl Default for ConnectionStats {
    fn default() -> Self {
        ConnectionStats {
            start_time: crate::cache::item::now(),
            curr_connections: 0,
            total_connections: 0,
            connection_structures: 0,
        }
    }
}

/// The full, additively-composed statistics aggregate returned by `stats`.
#[derive(Default, Debug, Clone)]
pub struct Stats {
    pub cache: CacheStats,
    pub protocol: ProtocolStats,
    pub connection: ConnectionStats,
}

impl Stats {
    pub fn new(max_items: usize, max_bytes: usize) -> Self {
        let mut stats = Stats::default();
        stats.cache.limit_maxitems = max_items as u64;
        stats.cache.limit_maxbytes = max_bytes as u64;
        stats
    }

    pub fn on_connect(&mut self) {
        self.connection.curr_connections += 1;
        self.connection.total_connections += 1;
        self.connection.connection_structures += 1;
    }

    pub fn on_disconnect(&mut self) {
        self.connection.curr_connections -= 1;
        self.connection.connection_structures -= 1;
    }

    /// Render every stat as a `(name, value)` pair: cache layer, then
    /// protocol layer, then connection layer. `sub` is accepted but does
    /// not change the output.
    pub fn dump(&self, _sub: Option<&str>) -> Vec<(&'static str, String)> {
        let now = crate::cache::item::now();
        let (user, system) = rusage_seconds();

        vec![
            ("limit_maxbytes", self.cache.limit_maxbytes.to_string()),
            ("limit_maxitems", self.cache.limit_maxitems.to_string()),
            ("curr_items", self.cache.curr_items.to_string()),
            ("total_items", self.cache.total_items.to_string()),
            ("bytes", self.cache.bytes.to_string()),
            ("evictions", self.cache.evictions.to_string()),
            ("reclaimed", self.cache.reclaimed.to_string()),
            ("bytes_read", self.protocol.bytes_read.to_string()),
            ("bytes_written", self.protocol.bytes_written.to_string()),
            ("version", VERSION.to_string()),
            ("cmd_get", self.protocol.cmd_get.to_string()),
            ("cmd_set", self.protocol.cmd_set.to_string()),
            ("get_hits", self.protocol.get_hits.to_string()),
            ("get_misses", self.protocol.get_misses.to_string()),
            ("delete_hits", self.protocol.delete_hits.to_string()),
            ("delete_misses", self.protocol.delete_misses.to_string()),
            ("incr_hits", self.protocol.incr_hits.to_string()),
            ("incr_misses", self.protocol.incr_misses.to_string()),
            ("decr_hits", self.protocol.decr_hits.to_string()),
            ("decr_misses", self.protocol.decr_misses.to_string()),
            ("cas_hits", self.protocol.cas_hits.to_string()),
            ("cas_misses", self.protocol.cas_misses.to_string()),
            ("cas_badvals", self.protocol.cas_badvals.to_string()),
            ("auth_cmds", self.protocol.auth_cmds.to_string()),
            ("auth_errors", self.protocol.auth_errors.to_string()),
            ("pid", std::process::id().to_string()),
            (
                "uptime",
                (now - self.connection.start_time).max(0).to_string(),
            ),
            ("time", now.to_string()),
            ("pointer_size", "64".to_string()),
            ("rusage_user", format!("{:.6}", user)),
            ("rusage_system", format!("{:.6}", system)),
            (
                "curr_connections",
                self.connection.curr_connections.to_string(),
            ),
            (
                "total_connections",
                self.connection.total_connections.to_string(),
            ),
            (
                "connection_structures",
                self.connection.connection_structures.to_string(),
            ),
            ("threads", "1".to_string()),
            ("conn_yields", "0".to_string()),
        ]
    }
}

/// User/system CPU seconds consumed by this process, best-effort. On unix
/// this calls `getrusage(RUSAGE_SELF)` via `libc`. On other platforms there
/// is no portable equivalent, so both fields report 0.
#[cfg(unix)]
fn rusage_seconds() -> (f64, f64) {
    // SAFETY: `usage` is zero-initialized and `getrusage` only writes to it.
    unsafe {
        let mut usage: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_SELF, &mut usage) == 0 {
            let user =
                usage.ru_utime.tv_sec as f64 + usage.ru_utime.tv_usec as f64 / 1_000_000.0;
            let system =
                usage.ru_stime.tv_sec as f64 + usage.ru_stime.tv_usec as f64 / 1_000_000.0;
            (user, system)
        } else {
            (0.0, 0.0)
        }
    }
}

#[cfg(not(unix))]
fn rusage_seconds() -> (f64, f64) {
    (0.0, 0.0)
}
