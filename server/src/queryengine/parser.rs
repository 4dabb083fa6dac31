/*
 * Created on Sat Sep 30 2023
 *
 * This file is a part of Vermilion
 * Vermilion is a free and open-source Redis-wire-compatible in-memory
 * key/value and stream store written by the Vermilion developers with the
 * vision to provide a small, predictable caching server that existing
 * Redis clients can talk to unmodified.
 *
 * Copyright (c) 2023, the Vermilion developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # The command parser
//!
//! Turns a `(name, args)` pair into a [`Command`], the closed set of
//! operations this server knows. All argument-shape checking happens here;
//! by the time an action runs, its arguments are typed and counted. A parse
//! failure is returned as the ready-to-send error frame

use crate::actions::streams as stream_ids;
use crate::corestore::stream::{EntrySpec, StreamId};
use crate::corestore::Data;
use crate::protocol::{responses, responses::groups, Element};

#[derive(Debug, PartialEq)]
/// The closed command set. One case per command keeps dispatch exhaustive:
/// adding a command without handling it everywhere is a compile error
pub enum Command {
    Ping(Option<Data>),
    Echo(Data),
    Set {
        key: Data,
        body: Data,
        ttl_ms: Option<u64>,
    },
    Get(Data),
    Del(Vec<Data>),
    Incr(Data),
    HSet {
        key: Data,
        fields: Vec<(Data, Data)>,
    },
    HGet {
        key: Data,
        field: Data,
    },
    HGetAll(Data),
    Type(Data),
    Keys(Data),
    ConfigGet(Data),
    XAdd {
        key: Data,
        spec: EntrySpec,
        fields: Vec<(Data, Data)>,
    },
    XRange {
        key: Data,
        start: StreamId,
        end: StreamId,
    },
    XRead {
        block: Option<u64>,
        requests: Vec<(Data, StreamId)>,
    },
    XDel {
        key: Data,
        ids: Vec<StreamId>,
    },
    ReplConf(Vec<Data>),
    PSync(Vec<Data>),
}

impl Command {
    /// Does this command mutate the keyspace? Mutations are what the
    /// replication layer fans out
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Set { .. }
                | Command::Del(_)
                | Command::Incr(_)
                | Command::HSet { .. }
                | Command::XAdd { .. }
                | Command::XDel { .. }
        )
    }
}

type ParsedCommand = Result<Command, Element>;

/// Parse one command. `name` must already be uppercased
pub fn parse_command(name: &str, args: Vec<Data>) -> ParsedCommand {
    match name {
        "PING" => parse_ping(args),
        "ECHO" => exactly(args, "echo").map(|[message]| Command::Echo(message)),
        "SET" => parse_set(args),
        "GET" => exactly(args, "get").map(|[key]| Command::Get(key)),
        "DEL" => {
            if args.is_empty() {
                Err(wrongargs("del"))
            } else {
                Ok(Command::Del(args))
            }
        }
        "INCR" => exactly(args, "incr").map(|[key]| Command::Incr(key)),
        "HSET" => parse_hset(args),
        "HGET" => exactly(args, "hget").map(|[key, field]| Command::HGet { key, field }),
        "HGETALL" => exactly(args, "hgetall").map(|[key]| Command::HGetAll(key)),
        "TYPE" => exactly(args, "type").map(|[key]| Command::Type(key)),
        "KEYS" => exactly(args, "keys").map(|[pattern]| Command::Keys(pattern)),
        "CONFIG" => parse_config(args),
        "XADD" => parse_xadd(args),
        "XRANGE" => parse_xrange(args),
        "XREAD" => parse_xread(args),
        "XDEL" => parse_xdel(args),
        "REPLCONF" => Ok(Command::ReplConf(args)),
        "PSYNC" => Ok(Command::PSync(args)),
        unknown => Err(Element::err(responses::unknown_command(unknown))),
    }
}

fn wrongargs(cmd: &str) -> Element {
    Element::err(responses::wrongargs(cmd))
}

/// Require exactly `N` arguments, handing them back as an array
fn exactly<const N: usize>(args: Vec<Data>, cmd: &str) -> Result<[Data; N], Element> {
    <[Data; N]>::try_from(args).map_err(|_| wrongargs(cmd))
}

fn parse_ping(mut args: Vec<Data>) -> ParsedCommand {
    match args.len() {
        0 => Ok(Command::Ping(None)),
        1 => Ok(Command::Ping(Some(args.remove(0)))),
        _ => Err(wrongargs("ping")),
    }
}

fn parse_set(mut args: Vec<Data>) -> ParsedCommand {
    match args.len() {
        0 | 1 => return Err(wrongargs("set")),
        2 | 4 => (),
        _ => return Err(Element::err(groups::SYNTAX_ERR)),
    }
    let key = args.remove(0);
    let body = args.remove(0);
    let ttl_ms = if args.is_empty() {
        None
    } else {
        let unit_ms = match args[0].to_ascii_uppercase().as_slice() {
            b"PX" => 1,
            b"EX" => 1000,
            _ => return Err(Element::err(groups::SYNTAX_ERR)),
        };
        let count: u64 = std::str::from_utf8(&args[1])
            .ok()
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| Element::err(groups::NOT_AN_INT))?;
        Some(count.saturating_mul(unit_ms))
    };
    Ok(Command::Set { key, body, ttl_ms })
}

fn parse_hset(mut args: Vec<Data>) -> ParsedCommand {
    // a key plus at least one field/value pair, pairs complete
    if args.len() < 3 || args.len() % 2 == 0 {
        return Err(wrongargs("hset"));
    }
    let key = args.remove(0);
    Ok(Command::HSet {
        key,
        fields: into_pairs(args),
    })
}

fn parse_config(args: Vec<Data>) -> ParsedCommand {
    let Some(sub) = args.first() else {
        return Err(wrongargs("config"));
    };
    if sub.to_ascii_uppercase() != b"GET" {
        return Err(Element::err(responses::unknown_subcommand(
            &String::from_utf8_lossy(sub),
        )));
    }
    let [_, param] = exactly(args, "config")?;
    Ok(Command::ConfigGet(param))
}

fn parse_xadd(mut args: Vec<Data>) -> ParsedCommand {
    // key, id and at least one complete field/value pair
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(wrongargs("xadd"));
    }
    let key = args.remove(0);
    let id = args.remove(0);
    let spec =
        stream_ids::parse_entry_spec(&id).ok_or_else(|| Element::err(groups::BAD_STREAM_ID))?;
    Ok(Command::XAdd {
        key,
        spec,
        fields: into_pairs(args),
    })
}

fn parse_xrange(args: Vec<Data>) -> ParsedCommand {
    let [key, start, end] = exactly(args, "xrange")?;
    let start =
        stream_ids::parse_range_start(&start).ok_or_else(|| Element::err(groups::BAD_STREAM_ID))?;
    let end =
        stream_ids::parse_range_end(&end).ok_or_else(|| Element::err(groups::BAD_STREAM_ID))?;
    Ok(Command::XRange { key, start, end })
}

fn parse_xread(args: Vec<Data>) -> ParsedCommand {
    let mut args = args.into_iter().peekable();
    let block = match args.peek() {
        Some(first) if first.eq_ignore_ascii_case(b"BLOCK") => {
            args.next();
            let raw = args.next().ok_or_else(|| wrongargs("xread"))?;
            let ms: u64 = std::str::from_utf8(&raw)
                .ok()
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(|| Element::err(groups::NOT_AN_INT))?;
            Some(ms)
        }
        _ => None,
    };
    match args.next() {
        Some(word) if word.eq_ignore_ascii_case(b"STREAMS") => (),
        _ => return Err(Element::err(groups::SYNTAX_ERR)),
    }
    let mut rest: Vec<Data> = args.collect();
    // one id per key, keys first
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(Element::err(groups::SYNTAX_ERR));
    }
    let half = rest.len() / 2;
    let ids = rest.split_off(half);
    let mut requests = Vec::with_capacity(half);
    for (key, raw) in rest.into_iter().zip(ids) {
        let from = stream_ids::parse_read_from(&raw)
            .ok_or_else(|| Element::err(groups::BAD_STREAM_ID))?;
        requests.push((key, from));
    }
    Ok(Command::XRead { block, requests })
}

fn parse_xdel(mut args: Vec<Data>) -> ParsedCommand {
    if args.len() < 2 {
        return Err(wrongargs("xdel"));
    }
    let key = args.remove(0);
    let mut ids = Vec::with_capacity(args.len());
    for raw in args {
        ids.push(
            stream_ids::parse_exact_id(&raw)
                .ok_or_else(|| Element::err(groups::BAD_STREAM_ID))?,
        );
    }
    Ok(Command::XDel { key, ids })
}

fn into_pairs(args: Vec<Data>) -> Vec<(Data, Data)> {
    debug_assert!(args.len() % 2 == 0);
    let mut pairs = Vec::with_capacity(args.len() / 2);
    let mut it = args.into_iter();
    while let (Some(field), Some(value)) = (it.next(), it.next()) {
        pairs.push((field, value));
    }
    pairs
}
