//! The parsed-command value: a tagged variant carrying exactly the fields
//! each command needs, produced by `protocol::parser` and consumed by
//! `protocol::executor`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsSub {
    Settings,
    Items,
    Sizes,
    Slabs,
}

impl StatsSub {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsSub::Settings => "settings",
            StatsSub::Items => "items",
            StatsSub::Sizes => "sizes",
            StatsSub::Slabs => "slabs",
        }
    }
}

/// Fields shared by `set`/`add`/`replace`/`append`/`prepend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreArgs {
    pub key: Vec<u8>,
    pub flags: u8,
    pub exptime: i64,
    pub bytes: usize,
    pub noreply: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(StoreArgs),
    Add(StoreArgs),
    Replace(StoreArgs),
    Append(StoreArgs),
    Prepend(StoreArgs),
    Cas {
        args: StoreArgs,
        casunique: u64,
    },
    Get {
        keys: Vec<Vec<u8>>,
    },
    Gets {
        keys: Vec<Vec<u8>>,
    },
    Delete {
        key: Vec<u8>,
        noreply: bool,
    },
    Incr {
        key: Vec<u8>,
        delta: u64,
        noreply: bool,
    },
    Decr {
        key: Vec<u8>,
        delta: u64,
        noreply: bool,
    },
    Stats {
        sub: Option<StatsSub>,
    },
    FlushAll {
        delay: i64,
        noreply: bool,
    },
    Version,
    Verbosity {
        noreply: bool,
    },
    Quit,
}

impl Command {
    /// Declared body length, for the framing state machine's decision to
    /// wait for a body before executing. Zero means there is no body.
    pub fn declared_bytes(&self) -> usize {
        match self {
            Command::Set(args)
            | Command::Add(args)
            | Command::Replace(args)
            | Command::Append(args)
            | Command::Prepend(args) => args.bytes,
            Command::Cas { args, .. } => args.bytes,
            _ => 0,
        }
    }

    pub fn noreply(&self) -> bool {
        match self {
            Command::Set(args)
            | Command::Add(args)
            | Command::Replace(args)
            | Command::Append(args)
            | Command::Prepend(args) => args.noreply,
            Command::Cas { args, .. } => args.noreply,
            Command::Delete { noreply, .. }
            | Command::Incr { noreply, .. }
            | Command::Decr { noreply, .. }
            | Command::FlushAll { noreply, .. }
            | Command::Verbosity { noreply } => *noreply,
            Command::Get { .. }
            | Command::Gets { .. }
            | Command::Stats { .. }
            | Command::Version
            | Command::Quit => false,
        }
    }
}
