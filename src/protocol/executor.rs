//! Dispatches a parsed [`Command`] to the cache facade and renders the
//! wire reply. Reply bytes are built directly with `itoa`, writing
//! integers straight into a byte buffer instead of going through
//! `format!`.

use itoa::Buffer;

use crate::cache::{CacheFacade, CounterResult, DeleteResult, StoreResult};
use crate::stats::{Stats, VERSION};

use super::command::Command;

pub struct Executed {
    pub reply: Vec<u8>,
    pub quit: bool,
}

fn executed(reply: Vec<u8>) -> Executed {
    Executed { reply, quit: false }
}

/// Run `command` (with `body`, the bytes read for commands that declare
/// one) against `cache`, updating `stats` as a side effect, and return the
/// wire reply. If `noreply` was set on the command, the reply is empty but
/// the side effect still runs.
pub fn execute(command: Command, body: Vec<u8>, cache: &mut CacheFacade, stats: &mut Stats) -> Executed {
    let noreply = command.noreply();

    let reply = match command {
        Command::Set(args) => {
            cache.set(&args.key, args.flags, args.exptime, body, stats);
            b"STORED\r\n".to_vec()
        }
        Command::Add(args) => {
            let result = cache.add(&args.key, args.flags, args.exptime, body, stats);
            store_reply(result)
        }
        Command::Replace(args) => {
            let result = cache.replace(&args.key, args.flags, args.exptime, body, stats);
            store_reply(result)
        }
        Command::Append(args) => {
            let result = cache.append(&args.key, args.flags, args.exptime, body, stats);
            store_reply(result)
        }
        Command::Prepend(args) => {
            let result = cache.prepend(&args.key, args.flags, args.exptime, body, stats);
            store_reply(result)
        }
        Command::Cas { args, casunique } => {
            let result = cache.cas(&args.key, args.flags, args.exptime, casunique, body, stats);
            match result {
                StoreResult::Stored => b"STORED\r\n".to_vec(),
                StoreResult::NotFound => b"NOT_FOUND\r\n".to_vec(),
                StoreResult::Exists => b"EXISTS\r\n".to_vec(),
                StoreResult::NotStored => unreachable!("cas never returns NotStored"),
            }
        }
        Command::Get { keys } => get_reply(cache.get(&keys, stats), false),
        Command::Gets { keys } => get_reply(cache.gets(&keys, stats), true),
        Command::Delete { key, .. } => match cache.delete(&key, stats) {
            DeleteResult::Deleted => b"DELETED\r\n".to_vec(),
            DeleteResult::NotFound => b"NOT_FOUND\r\n".to_vec(),
        },
        Command::Incr { key, delta, .. } => counter_reply(cache.incr(&key, delta, stats)),
        Command::Decr { key, delta, .. } => counter_reply(cache.decr(&key, delta, stats)),
        Command::Stats { sub } => stats_reply(stats, sub),
        Command::FlushAll { delay, .. } => {
            cache.flush(delay);
            b"OK\r\n".to_vec()
        }
        Command::Version => {
            let mut reply = b"VERSION ".to_vec();
            reply.extend_from_slice(VERSION.as_bytes());
            reply.extend_from_slice(b"\r\n");
            reply
        }
        Command::Verbosity { .. } => b"OK\r\n".to_vec(),
        Command::Quit => return Executed { reply: Vec::new(), quit: true },
    };

    if noreply {
        executed(Vec::new())
    } else {
        executed(reply)
    }
}

fn store_reply(result: StoreResult) -> Vec<u8> {
    match result {
        StoreResult::Stored => b"STORED\r\n".to_vec(),
        StoreResult::NotStored => b"NOT_STORED\r\n".to_vec(),
        StoreResult::Exists | StoreResult::NotFound => {
            unreachable!("add/replace/append/prepend never return Exists/NotFound")
        }
    }
}

fn counter_reply(result: CounterResult) -> Vec<u8> {
    match result {
        CounterResult::Stored(value) => {
            let mut buf = Buffer::new();
            let mut reply = buf.format(value).as_bytes().to_vec();
            reply.extend_from_slice(b"\r\n");
            reply
        }
        CounterResult::NotFound => b"NOT_FOUND\r\n".to_vec(),
        CounterResult::NotNumeric => {
            b"CLIENT_ERROR cannot increment or decrement non-numeric value\r\n".to_vec()
        }
    }
}

fn get_reply(entries: Vec<crate::cache::GetEntry>, with_cas: bool) -> Vec<u8> {
    let mut reply = Vec::new();
    let mut int_buf = Buffer::new();

    for entry in entries {
        reply.extend_from_slice(b"VALUE ");
        reply.extend_from_slice(&entry.key);
        reply.push(b' ');
        reply.extend_from_slice(int_buf.format(entry.flags).as_bytes());
        reply.push(b' ');
        reply.extend_from_slice(int_buf.format(entry.value.len()).as_bytes());
        if with_cas {
            reply.push(b' ');
            reply.extend_from_slice(int_buf.format(entry.cas).as_bytes());
        }
        reply.extend_from_slice(b"\r\n");
        reply.extend_from_slice(&entry.value);
        reply.extend_from_slice(b"\r\n");
    }
    reply.extend_from_slice(b"END\r\n");
    reply
}

fn stats_reply(stats: &Stats, sub: Option<super::command::StatsSub>) -> Vec<u8> {
    let mut reply = Vec::new();
    for (name, value) in stats.dump(sub.as_ref().map(|s| s.as_str())) {
        reply.extend_from_slice(b"STAT ");
        reply.extend_from_slice(name.as_bytes());
        reply.push(b' ');
        reply.extend_from_slice(value.as_bytes());
        reply.extend_from_slice(b"\r\n");
    }
    reply.extend_from_slice(b"END\r\n");
    reply
}
