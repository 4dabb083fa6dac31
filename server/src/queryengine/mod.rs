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

//! # The Query Engine
//!
//! The dispatcher sits between the connection and the actions. It
//! deconstructs a request frame into `(name, args)`, runs the per-connection
//! transaction state machine (`MULTI`/`EXEC`/`DISCARD` are events of that
//! machine, not actions) and hands everything else to the parser and the
//! matching action.
//!
//! A queued command is stored as its raw `(name, args)` pair and validated
//! only when `EXEC` replays it; a malformed entry contributes its error frame
//! to the `EXEC` reply array without aborting the rest of the batch

pub mod parser;
#[cfg(test)]
mod tests;

use crate::actions;
use crate::config::ConfigurationSet;
use crate::corestore::{Corestore, Data};
use crate::protocol::{responses::groups, Element};
use crate::resp::encode_command_frame;
use parser::Command;

/// The request frame wasn't an array of bulk strings. This is a protocol
/// violation: the connection is closed, no reply frame is produced
#[derive(Debug, PartialEq)]
pub struct BadRequest;

#[derive(Debug, Default)]
/// Per-connection dispatcher state: nothing in NORMAL mode, the pending queue
/// in QUEUING mode. Dropped with the connection, which silently discards any
/// open transaction
pub struct ClientState {
    queuing: bool,
    queue: Vec<(Data, Vec<Data>)>,
}

impl ClientState {
    pub fn new() -> Self {
        ClientState::default()
    }
    #[cfg(test)]
    pub fn is_queuing(&self) -> bool {
        self.queuing
    }
}

#[derive(Debug, PartialEq)]
/// Everything the connection must do with one executed frame
pub struct ExecOutcome {
    /// The reply to send back
    pub reply: Element,
    /// Raw request frames to hand to the replication fan-out, in order
    pub propagate: Vec<Vec<u8>>,
    /// The connection issued `REPLCONF` and must register as a follower
    pub attach_replica: bool,
}

impl ExecOutcome {
    fn reply_only(reply: Element) -> Self {
        ExecOutcome {
            reply,
            propagate: Vec::new(),
            attach_replica: false,
        }
    }
}

/// Execute one request frame against the store, driving the transaction state
/// machine. `repl_id` is this node's replication id, surfaced by `PSYNC`
pub async fn execute_frame(
    db: &Corestore,
    cfg: &ConfigurationSet,
    repl_id: &str,
    cstate: &mut ClientState,
    frame: Element,
) -> Result<ExecOutcome, BadRequest> {
    let (name, args) = deconstruct(frame)?;
    let tag = String::from_utf8_lossy(&name).to_uppercase();
    match tag.as_str() {
        "MULTI" => {
            if !args.is_empty() {
                return Ok(ExecOutcome::reply_only(wrongargs("multi")));
            }
            if cstate.queuing {
                return Ok(ExecOutcome::reply_only(Element::err(groups::MULTI_NESTED)));
            }
            cstate.queuing = true;
            Ok(ExecOutcome::reply_only(Element::okay()))
        }
        "EXEC" => {
            if !args.is_empty() {
                return Ok(ExecOutcome::reply_only(wrongargs("exec")));
            }
            if !cstate.queuing {
                return Ok(ExecOutcome::reply_only(Element::err(
                    groups::EXEC_WITHOUT_MULTI,
                )));
            }
            cstate.queuing = false;
            let queue = std::mem::take(&mut cstate.queue);
            let mut replies = Vec::with_capacity(queue.len());
            let mut propagate = Vec::new();
            for (qname, qargs) in queue {
                let (reply, frame) = run_command(db, cfg, repl_id, qname, qargs, true).await;
                replies.push(reply);
                propagate.extend(frame);
            }
            Ok(ExecOutcome {
                reply: Element::Array(replies),
                propagate,
                attach_replica: false,
            })
        }
        "DISCARD" => {
            if !args.is_empty() {
                return Ok(ExecOutcome::reply_only(wrongargs("discard")));
            }
            if !cstate.queuing {
                return Ok(ExecOutcome::reply_only(Element::err(
                    groups::DISCARD_WITHOUT_MULTI,
                )));
            }
            cstate.queuing = false;
            cstate.queue.clear();
            Ok(ExecOutcome::reply_only(Element::okay()))
        }
        _ if cstate.queuing => {
            cstate.queue.push((name, args));
            Ok(ExecOutcome::reply_only(Element::Simple(
                "QUEUED".to_owned(),
            )))
        }
        _ => {
            let attach = tag == "REPLCONF";
            let (reply, frame) = run_command(db, cfg, repl_id, name, args, false).await;
            Ok(ExecOutcome {
                attach_replica: attach && !reply.is_err(),
                propagate: frame.into_iter().collect(),
                reply,
            })
        }
    }
}

/// Split an inbound `*N` array of `$` bulks into the command name and its
/// arguments. Anything else on the wire is a protocol violation
fn deconstruct(frame: Element) -> Result<(Data, Vec<Data>), BadRequest> {
    let Element::Array(items) = frame else {
        return Err(BadRequest);
    };
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Element::Bulk(body) => parts.push(Data::from_blob(body)),
            _ => return Err(BadRequest),
        }
    }
    if parts.is_empty() {
        return Err(BadRequest);
    }
    let name = parts.remove(0);
    Ok((name, parts))
}

fn wrongargs(cmd: &str) -> Element {
    Element::err(crate::protocol::responses::wrongargs(cmd))
}

/// Parse and run a single command, returning the reply and, for a mutation
/// that succeeded, the frame to fan out to followers. `in_txn` downgrades a
/// blocking `XREAD` to its non-blocking form so `EXEC` can never stall
async fn run_command(
    db: &Corestore,
    cfg: &ConfigurationSet,
    repl_id: &str,
    name: Data,
    args: Vec<Data>,
    in_txn: bool,
) -> (Element, Option<Vec<u8>>) {
    let tag = String::from_utf8_lossy(&name).to_uppercase();
    let cmd = match parser::parse_command(&tag, args.clone()) {
        Ok(cmd) => cmd,
        Err(error_reply) => return (error_reply, None),
    };
    let is_write = cmd.is_write();
    let reply = match cmd {
        Command::Ping(message) => actions::ping::ping(message),
        Command::Echo(message) => actions::echo::echo(message),
        Command::Set { key, body, ttl_ms } => actions::set::set(db, key, body, ttl_ms),
        Command::Get(key) => actions::get::get(db, key),
        Command::Del(keys) => actions::del::del(db, keys),
        Command::Incr(key) => actions::incr::incr(db, key),
        Command::HSet { key, fields } => actions::hashes::hset(db, key, fields),
        Command::HGet { key, field } => actions::hashes::hget(db, key, field),
        Command::HGetAll(key) => actions::hashes::hgetall(db, key),
        Command::Type(key) => actions::typecmd::typecmd(db, key),
        Command::Keys(pattern) => actions::keys::keys(db, pattern),
        Command::ConfigGet(param) => actions::cfgget::cfgget(cfg, param),
        Command::XAdd { key, spec, fields } => actions::streams::xadd::xadd(db, key, spec, fields),
        Command::XRange { key, start, end } => {
            actions::streams::xrange::xrange(db, key, start, end)
        }
        Command::XRead { block, requests } => {
            let block = if in_txn { None } else { block };
            actions::streams::xread::xread(db, block, requests).await
        }
        Command::XDel { key, ids } => actions::streams::xdel::xdel(db, key, ids),
        Command::ReplConf(_) => Element::okay(),
        Command::PSync(_) => Element::Simple(format!("FULLRESYNC {repl_id} 0")),
    };
    let frame = (is_write && !reply.is_err()).then(|| encode_command_frame(&name, &args));
    (reply, frame)
}
