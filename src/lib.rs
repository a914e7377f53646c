//! An in-memory key/value cache server speaking the ASCII memcached
//! protocol over TCP. See the `cache`, `protocol`, and `net` modules for
//! the three core subsystems: storage engine, protocol engine, and
//! connection reactor respectively.

pub mod cache;
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod stats;

pub use cache::CacheFacade;
pub use config::{Cli, Config};
pub use stats::Stats;
