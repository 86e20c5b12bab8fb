//! Command execution against the store.
//!
//! Dispatch is table-driven: each command is a name, an arity (name
//! included), and a handler. Adding a command means adding a row to the
//! table; the framing codec and the connection state machine are untouched.

use crate::protocol::frame::Status;
use crate::storage::Store;

/// Outcome of executing one request: a status code and a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(body: Vec<u8>) -> Self {
        Reply {
            status: Status::Ok,
            body,
        }
    }

    fn error(reason: String) -> Self {
        Reply {
            status: Status::Error,
            body: reason.into_bytes(),
        }
    }

    fn not_found() -> Self {
        Reply {
            status: Status::NotFound,
            body: Vec::new(),
        }
    }
}

type CommandFn = fn(&mut Store, &[Vec<u8>]) -> Reply;

struct CommandSpec {
    name: &'static [u8],
    arity: usize,
    run: CommandFn,
}

/// Command table. Name matching is case-sensitive and exact.
const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: b"get",
        arity: 2,
        run: cmd_get,
    },
    CommandSpec {
        name: b"set",
        arity: 3,
        run: cmd_set,
    },
    CommandSpec {
        name: b"del",
        arity: 2,
        run: cmd_del,
    },
];

/// Execute one decoded request vector against the store.
pub fn execute(store: &mut Store, args: &[Vec<u8>]) -> Reply {
    let Some(name) = args.first() else {
        return Reply::error("empty command".to_string());
    };

    let Some(spec) = COMMANDS.iter().find(|c| c.name == name.as_slice()) else {
        return Reply::error(format!(
            "unknown command '{}'",
            String::from_utf8_lossy(name)
        ));
    };

    if args.len() != spec.arity {
        return Reply::error(format!(
            "wrong number of arguments for '{}'",
            String::from_utf8_lossy(name)
        ));
    }

    (spec.run)(store, args)
}

fn cmd_get(store: &mut Store, args: &[Vec<u8>]) -> Reply {
    match store.get(&args[1]) {
        Some(value) => Reply::ok(value.to_vec()),
        None => Reply::not_found(),
    }
}

fn cmd_set(store: &mut Store, args: &[Vec<u8>]) -> Reply {
    store.set(args[1].clone(), args[2].clone());
    Reply::ok(Vec::new())
}

fn cmd_del(store: &mut Store, args: &[Vec<u8>]) -> Reply {
    // Absence is not an error
    store.delete(&args[1]);
    Reply::ok(Vec::new())
}
