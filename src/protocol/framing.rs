//! The incremental protocol state machine: consumes arbitrary byte chunks
//! and yields replies for whichever commands have become complete so far,
//! suspending cleanly at any buffer boundary.
//!
//! Line search and body extraction are expressed with `nom::streaming`
//! combinators over a `bytes::BytesMut` carry buffer. `nom::Err::Incomplete`
//! means not enough bytes are buffered yet to find the next line or body
//! terminator, so the caller should wait for more input.

use bytes::{Buf, BytesMut};
use nom::bytes::streaming::{tag, take, take_until};
use nom::error::Error as NomError;
use nom::sequence::terminated;
use nom::Err as NomErr;
use nom::IResult;

use crate::cache::CacheFacade;
use crate::error::ProtocolError;
use crate::stats::Stats;

use super::command::Command;
use super::executor;
use super::parser;

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A command completed and produced a (possibly empty, if `noreply`)
    /// reply; the connection stays open.
    Reply(Vec<u8>),
    /// A framing desync was detected: the reply must be flushed, then the
    /// connection closed, since byte alignment with command boundaries is
    /// lost.
    ReplyThenClose(Vec<u8>),
    /// The client issued `quit`; close the connection, no reply.
    Quit,
}

type NomResult<'a, O> = IResult<&'a [u8], O, NomError<&'a [u8]>>;

fn take_line(buf: &[u8]) -> NomResult<'_, &[u8]> {
    terminated(take_until("\r\n"), tag("\r\n"))(buf)
}

fn take_body(buf: &[u8], len: usize) -> NomResult<'_, &[u8]> {
    terminated(take(len), tag("\r\n"))(buf)
}

/// Per-connection protocol state: the unconsumed byte carry buffer plus,
/// once a command line with a declared body has been parsed, the pending
/// command awaiting its body.
pub struct Protocol {
    buf: BytesMut,
    pending: Option<Command>,
}

impl Protocol {
    pub fn new() -> Self {
        Protocol {
            buf: BytesMut::new(),
            pending: None,
        }
    }

    /// Append inbound bytes and drain as many complete commands as the
    /// buffer now contains, running each against `cache`/`stats`. Stops
    /// early on `Quit` or `ReplyThenClose`, since no further processing on
    /// this connection is meaningful afterwards.
    pub fn poll(&mut self, chunk: &[u8], cache: &mut CacheFacade, stats: &mut Stats) -> Vec<Outcome> {
        self.buf.extend_from_slice(chunk);

        let mut outcomes = Vec::new();
        while let Some(outcome) = self.step(cache, stats) {
            let stop = matches!(outcome, Outcome::Quit | Outcome::ReplyThenClose(_));
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
        outcomes
    }

    fn step(&mut self, cache: &mut CacheFacade, stats: &mut Stats) -> Option<Outcome> {
        if self.pending.is_none() {
            match take_line(&self.buf) {
                Ok((rest, line)) => {
                    let line = line.to_vec();
                    let consumed = self.buf.len() - rest.len();
                    self.buf.advance(consumed);

                    match parser::parse_line(&line) {
                        Ok(command) => {
                            if command.declared_bytes() == 0 {
                                return Some(run(command, Vec::new(), cache, stats));
                            }
                            self.pending = Some(command);
                        }
                        Err(err) if err.is_framing_desync() => {
                            return Some(Outcome::ReplyThenClose(err.reply_line()));
                        }
                        Err(err) => return Some(Outcome::Reply(err.reply_line())),
                    }
                }
                Err(NomErr::Incomplete(_)) => return None,
                Err(_) => unreachable!("take_until/tag(\"\\r\\n\") only ever report Incomplete"),
            }
        }

        let command = self.pending.as_ref().expect("checked above");
        let len = command.declared_bytes();
        match take_body(&self.buf, len) {
            Ok((rest, body)) => {
                let body = body.to_vec();
                let consumed = self.buf.len() - rest.len();
                self.buf.advance(consumed);
                let command = self.pending.take().expect("checked above");
                Some(run(command, body, cache, stats))
            }
            Err(NomErr::Incomplete(_)) => None,
            Err(_) => {
                self.pending = None;
                Some(Outcome::ReplyThenClose(
                    ProtocolError::BadDataChunk.reply_line(),
                ))
            }
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::new()
    }
}

fn run(command: Command, body: Vec<u8>, cache: &mut CacheFacade, stats: &mut Stats) -> Outcome {
    let executed = executor::execute(command, body, cache, stats);
    if executed.quit {
        Outcome::Quit
    } else {
        Outcome::Reply(executed.reply)
    }
}
