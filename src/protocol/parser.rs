//! Command-line grammar. Operates on a single already-delimited line (no
//! trailing CR/LF); the framing state machine in `protocol::framing` is
//! responsible for finding that line's boundaries within a streaming byte
//! source.
//!
//! Tokens are split on any run of spaces, with leading/trailing spaces
//! ignored.

use btoi::btou;

use crate::error::ProtocolError;

use super::command::{Command, StatsSub, StoreArgs};

const MAX_KEY_LEN: usize = 250;

pub fn parse_line(line: &[u8]) -> Result<Command, ProtocolError> {
    let tokens: Vec<&[u8]> = line.split(|&b| b == b' ').filter(|t| !t.is_empty()).collect();
    let name = *tokens.first().ok_or(ProtocolError::UnknownCommand)?;

    match name {
        b"set" => store(&tokens, Command::Set),
        b"add" => store(&tokens, Command::Add),
        b"replace" => store(&tokens, Command::Replace),
        b"append" => store(&tokens, Command::Append),
        b"prepend" => store(&tokens, Command::Prepend),
        b"cas" => cas(&tokens),
        b"get" => get(&tokens, false),
        b"gets" => get(&tokens, true),
        b"delete" => delete(&tokens),
        b"incr" => incr_decr(&tokens, true),
        b"decr" => incr_decr(&tokens, false),
        b"stats" => stats(&tokens),
        b"flush_all" => flush_all(&tokens),
        b"version" => Ok(Command::Version),
        b"verbosity" => Ok(Command::Verbosity { noreply: false }),
        b"quit" => Ok(Command::Quit),
        _ => Err(ProtocolError::UnknownCommand),
    }
}

fn validate_key(token: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if token.is_empty()
        || token.len() > MAX_KEY_LEN
        || token.iter().any(|&b| b <= 32 || b == 127)
    {
        return Err(ProtocolError::BadArgument);
    }
    Ok(token.to_vec())
}

fn parse_flags(token: &[u8]) -> Result<u8, ProtocolError> {
    if token.len() != 1 || !token[0].is_ascii_digit() {
        return Err(ProtocolError::BadFlags);
    }
    Ok(token[0] - b'0')
}

fn parse_u64(token: &[u8]) -> Result<u64, ProtocolError> {
    if token.is_empty() || !token.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::BadArgument);
    }
    btou(token).map_err(|_| ProtocolError::BadArgument)
}

fn trailing_noreply(tokens: &[&[u8]], len_with_noreply: usize) -> bool {
    tokens.len() == len_with_noreply && tokens[len_with_noreply - 1] == b"noreply"
}

fn store(tokens: &[&[u8]], variant: fn(StoreArgs) -> Command) -> Result<Command, ProtocolError> {
    if tokens.len() < 5 {
        return Err(ProtocolError::NotEnoughArguments);
    }
    let key = validate_key(tokens[1])?;
    let flags = parse_flags(tokens[2])?;
    let exptime = parse_u64(tokens[3])? as i64;
    let bytes = parse_u64(tokens[4])? as usize;
    let noreply = trailing_noreply(tokens, 6);
    Ok(variant(StoreArgs {
        key,
        flags,
        exptime,
        bytes,
        noreply,
    }))
}

fn cas(tokens: &[&[u8]]) -> Result<Command, ProtocolError> {
    if tokens.len() < 6 {
        return Err(ProtocolError::NotEnoughArguments);
    }
    let key = validate_key(tokens[1])?;
    let flags = parse_flags(tokens[2])?;
    let exptime = parse_u64(tokens[3])? as i64;
    let bytes = parse_u64(tokens[4])? as usize;
    let casunique = parse_u64(tokens[5])?;
    let noreply = trailing_noreply(tokens, 7);
    Ok(Command::Cas {
        args: StoreArgs {
            key,
            flags,
            exptime,
            bytes,
            noreply,
        },
        casunique,
    })
}

fn get(tokens: &[&[u8]], with_cas: bool) -> Result<Command, ProtocolError> {
    if tokens.len() < 2 {
        return Err(ProtocolError::NotEnoughArguments);
    }
    let keys = tokens[1..]
        .iter()
        .map(|t| validate_key(t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(if with_cas {
        Command::Gets { keys }
    } else {
        Command::Get { keys }
    })
}

fn delete(tokens: &[&[u8]]) -> Result<Command, ProtocolError> {
    if tokens.len() < 2 {
        return Err(ProtocolError::NotEnoughArguments);
    }
    let key = validate_key(tokens[1])?;
    let noreply = trailing_noreply(tokens, 3);
    Ok(Command::Delete { key, noreply })
}

fn incr_decr(tokens: &[&[u8]], increment: bool) -> Result<Command, ProtocolError> {
    if tokens.len() < 3 {
        return Err(ProtocolError::NotEnoughArguments);
    }
    let key = validate_key(tokens[1])?;
    let delta = parse_u64(tokens[2])?;
    let noreply = trailing_noreply(tokens, 4);
    Ok(if increment {
        Command::Incr { key, delta, noreply }
    } else {
        Command::Decr { key, delta, noreply }
    })
}

fn stats(tokens: &[&[u8]]) -> Result<Command, ProtocolError> {
    if tokens.len() > 1 {
        let sub = match tokens[1] {
            b"settings" => StatsSub::Settings,
            b"items" => StatsSub::Items,
            b"sizes" => StatsSub::Sizes,
            b"slabs" => StatsSub::Slabs,
            _ => return Err(ProtocolError::InvalidStatistic),
        };
        Ok(Command::Stats { sub: Some(sub) })
    } else {
        Ok(Command::Stats { sub: None })
    }
}

fn flush_all(tokens: &[&[u8]]) -> Result<Command, ProtocolError> {
    if tokens.len() <= 1 {
        return Ok(Command::FlushAll {
            delay: 0,
            noreply: false,
        });
    }
    if tokens[1] == b"noreply" {
        return Ok(Command::FlushAll {
            delay: 0,
            noreply: true,
        });
    }
    let delay = parse_u64(tokens[1])? as i64;
    let noreply = trailing_noreply(tokens, 3);
    Ok(Command::FlushAll { delay, noreply })
}
