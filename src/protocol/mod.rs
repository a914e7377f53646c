//! The command model, parser, executor, and incremental framing state
//! machine: command model -> parser -> executor -> protocol state machine.

pub mod command;
pub mod executor;
pub mod framing;
pub mod parser;

pub use command::Command;
pub use framing::{Outcome, Protocol};
