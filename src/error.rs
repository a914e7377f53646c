//! Error taxonomy: protocol-level errors are reply lines that never abort
//! a connection; framing desync and I/O failures do.

use thiserror::Error;

/// A command-line grammar violation, or a framing desync in the `BODY`
/// state of the protocol state machine (`protocol::framing`).
///
/// Every variant carries its own verbatim wire reply via [`ProtocolError::reply_line`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Unknown command name.
    #[error("ERROR")]
    UnknownCommand,
    /// `flags` was not exactly one ASCII digit.
    #[error("CLIENT_ERROR bad flags")]
    BadFlags,
    /// A numeric argument was missing, non-numeric, or out of range.
    #[error("CLIENT_ERROR bad argument")]
    BadArgument,
    /// Fewer tokens than the command's grammar requires.
    #[error("CLIENT_ERROR not enough arguments")]
    NotEnoughArguments,
    /// A `stats` sub-command outside `{settings, items, sizes, slabs}`.
    #[error("CLIENT_ERROR invalid statistic requested")]
    InvalidStatistic,
    /// A command body did not end with `\r\n` at its declared length.
    #[error("CLIENT_ERROR bad data chunk")]
    BadDataChunk,
}

impl ProtocolError {
    /// Whether this error corresponds to a framing desync (as opposed to a
    /// plain grammar rejection). The connection cannot safely resume after
    /// one of these, since byte alignment with command boundaries is lost.
    pub fn is_framing_desync(&self) -> bool {
        matches!(self, ProtocolError::BadDataChunk)
    }

    pub fn reply_line(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
