/*
 * Created on Sun Oct 08 2023
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

use super::{execute_frame, BadRequest, ClientState, ExecOutcome};
use crate::config::ConfigurationSet;
use crate::corestore::Corestore;
use crate::protocol::{responses::groups, Element};
use bytes::Bytes;
use std::time::Duration;

const REPL_ID: &str = "0123456789abcdef0123456789abcdef";

/// A client session against its own store, for driving the dispatcher the
/// way a connection would
struct Session {
    db: Corestore,
    cfg: ConfigurationSet,
    cstate: ClientState,
}

impl Session {
    fn new() -> Self {
        Session {
            db: Corestore::new(),
            cfg: ConfigurationSet::default(),
            cstate: ClientState::new(),
        }
    }
    async fn run(&mut self, parts: &[&str]) -> ExecOutcome {
        self.try_run(parts).await.unwrap()
    }
    async fn try_run(&mut self, parts: &[&str]) -> Result<ExecOutcome, BadRequest> {
        execute_frame(
            &self.db,
            &self.cfg,
            REPL_ID,
            &mut self.cstate,
            frame(parts),
        )
        .await
    }
    /// Run and keep only the reply
    async fn reply(&mut self, parts: &[&str]) -> Element {
        self.run(parts).await.reply
    }
}

fn frame(parts: &[&str]) -> Element {
    Element::Array(
        parts
            .iter()
            .map(|part| Element::Bulk(Bytes::copy_from_slice(part.as_bytes())))
            .collect(),
    )
}

fn bulk(body: &str) -> Element {
    Element::Bulk(Bytes::copy_from_slice(body.as_bytes()))
}

#[tokio::test]
async fn test_ping_and_echo() {
    let mut session = Session::new();
    assert_eq!(
        session.reply(&["PING"]).await,
        Element::Simple("PONG".to_owned())
    );
    assert_eq!(
        session.reply(&["ping", "hello"]).await,
        Element::Simple("hello".to_owned())
    );
    assert_eq!(
        session.reply(&["ECHO", "hey"]).await,
        Element::Simple("hey".to_owned())
    );
}

#[tokio::test]
async fn test_set_get_del() {
    let mut session = Session::new();
    assert_eq!(session.reply(&["SET", "foo", "bar"]).await, Element::okay());
    assert_eq!(session.reply(&["GET", "foo"]).await, bulk("bar"));
    assert_eq!(session.reply(&["GET", "missing"]).await, Element::Null);
    assert_eq!(
        session.reply(&["DEL", "foo", "missing"]).await,
        Element::Integer(1)
    );
    assert_eq!(session.reply(&["GET", "foo"]).await, Element::Null);
}

#[tokio::test]
async fn test_set_with_ttl_expires() {
    let mut session = Session::new();
    assert_eq!(
        session.reply(&["SET", "foo", "bar", "PX", "30"]).await,
        Element::okay()
    );
    assert_eq!(session.reply(&["GET", "foo"]).await, bulk("bar"));
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(session.reply(&["GET", "foo"]).await, Element::Null);
    assert_eq!(session.reply(&["KEYS", "*"]).await, Element::Array(vec![]));
}

#[tokio::test]
async fn test_set_flag_validation() {
    let mut session = Session::new();
    assert_eq!(
        session.reply(&["SET", "k", "v", "XX"]).await,
        Element::err(groups::SYNTAX_ERR)
    );
    assert_eq!(
        session.reply(&["SET", "k", "v", "PX"]).await,
        Element::err(groups::SYNTAX_ERR)
    );
    assert_eq!(
        session.reply(&["SET", "k", "v", "PX", "soon"]).await,
        Element::err(groups::NOT_AN_INT)
    );
    assert_eq!(
        session.reply(&["SET"]).await,
        Element::err("ERR wrong number of arguments for 'set' command")
    );
}

#[tokio::test]
async fn test_incr_semantics() {
    let mut session = Session::new();
    session.reply(&["SET", "x", "10"]).await;
    assert_eq!(session.reply(&["INCR", "x"]).await, Element::Integer(11));
    assert_eq!(session.reply(&["INCR", "x"]).await, Element::Integer(12));
    assert_eq!(session.reply(&["INCR", "fresh"]).await, Element::Integer(1));
    session.reply(&["SET", "x", "abc"]).await;
    assert_eq!(
        session.reply(&["INCR", "x"]).await,
        Element::err(groups::NOT_AN_INT)
    );
}

#[tokio::test]
async fn test_hashes() {
    let mut session = Session::new();
    assert_eq!(
        session.reply(&["HSET", "h", "a", "1", "b", "2"]).await,
        Element::okay()
    );
    assert_eq!(session.reply(&["HGET", "h", "a"]).await, bulk("1"));
    assert_eq!(session.reply(&["HGET", "h", "zzz"]).await, Element::Null);
    let Element::Array(flat) = session.reply(&["HGETALL", "h"]).await else {
        panic!("expected a flat array");
    };
    assert_eq!(flat.len(), 4);
    assert_eq!(
        session.reply(&["HGETALL", "missing"]).await,
        Element::Array(vec![])
    );
    // incomplete pair
    assert_eq!(
        session.reply(&["HSET", "h", "a"]).await,
        Element::err("ERR wrong number of arguments for 'hset' command")
    );
}

#[tokio::test]
async fn test_type_mismatch_is_an_error() {
    let mut session = Session::new();
    session.reply(&["HSET", "h", "a", "1"]).await;
    assert_eq!(
        session.reply(&["GET", "h"]).await,
        Element::err(groups::WRONGTYPE_ERR)
    );
    assert_eq!(
        session.reply(&["INCR", "h"]).await,
        Element::err(groups::WRONGTYPE_ERR)
    );
    session.reply(&["SET", "s", "v"]).await;
    assert_eq!(
        session.reply(&["XADD", "s", "1-1", "f", "v"]).await,
        Element::err(groups::WRONGTYPE_ERR)
    );
}

#[tokio::test]
async fn test_type_and_keys() {
    let mut session = Session::new();
    session.reply(&["SET", "user:1", "a"]).await;
    session.reply(&["SET", "user:2", "b"]).await;
    session.reply(&["HSET", "cart:1", "f", "v"]).await;
    assert_eq!(
        session.reply(&["TYPE", "user:1"]).await,
        Element::Simple("string".to_owned())
    );
    assert_eq!(
        session.reply(&["TYPE", "cart:1"]).await,
        Element::Simple("hash".to_owned())
    );
    assert_eq!(
        session.reply(&["TYPE", "ghost"]).await,
        Element::Simple("none".to_owned())
    );
    let Element::Array(hits) = session.reply(&["KEYS", "user:*"]).await else {
        panic!("expected an array");
    };
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|hit| matches!(hit, Element::Bulk(b) if b.starts_with(b"user:"))));
}

#[tokio::test]
async fn test_config_get() {
    let mut session = Session::new();
    session.cfg.dir = Some("/var/lib/verm".to_owned());
    assert_eq!(
        session.reply(&["CONFIG", "GET", "dir"]).await,
        Element::Array(vec![bulk("dir"), bulk("/var/lib/verm")])
    );
    assert_eq!(
        session.reply(&["CONFIG", "GET", "dbfilename"]).await,
        Element::Array(vec![bulk("dbfilename"), Element::Null])
    );
    assert_eq!(
        session.reply(&["CONFIG", "SET", "dir", "/x"]).await,
        Element::err("ERR unknown subcommand 'SET'")
    );
    assert!(session
        .reply(&["CONFIG", "GET", "appendonly"])
        .await
        .is_err());
}

#[tokio::test]
async fn test_unknown_command() {
    let mut session = Session::new();
    assert_eq!(
        session.reply(&["FLY"]).await,
        Element::err("ERR unknown command 'FLY'")
    );
}

#[tokio::test]
async fn test_stream_scenario() {
    let mut session = Session::new();
    assert_eq!(
        session.reply(&["XADD", "s", "1-1", "a", "b"]).await,
        bulk("1-1")
    );
    assert_eq!(
        session.reply(&["XADD", "s", "1-1", "a", "c"]).await,
        Element::err(groups::XADD_ID_NOT_GREATER)
    );
    assert_eq!(
        session.reply(&["XADD", "s", "1-2", "a", "c"]).await,
        bulk("1-2")
    );
    assert_eq!(
        session.reply(&["XADD", "s", "0-0", "a", "c"]).await,
        Element::err(groups::XADD_ID_TOO_SMALL)
    );
    let Element::Array(entries) = session.reply(&["XRANGE", "s", "-", "+"]).await else {
        panic!("expected an array");
    };
    assert_eq!(
        entries,
        vec![
            Element::Array(vec![
                bulk("1-1"),
                Element::Array(vec![bulk("a"), bulk("b")]),
            ]),
            Element::Array(vec![
                bulk("1-2"),
                Element::Array(vec![bulk("a"), bulk("c")]),
            ]),
        ]
    );
}

#[tokio::test]
async fn test_xadd_autogen_ids() {
    let mut session = Session::new();
    let Element::Bulk(first) = session.reply(&["XADD", "s", "5-*", "a", "b"]).await else {
        panic!("expected a bulk id");
    };
    assert_eq!(first, Bytes::from_static(b"5-0"));
    let Element::Bulk(second) = session.reply(&["XADD", "s", "5-*", "a", "b"]).await else {
        panic!("expected a bulk id");
    };
    assert_eq!(second, Bytes::from_static(b"5-1"));
    // full auto-generation always advances
    let Element::Bulk(third) = session.reply(&["XADD", "s", "*", "a", "b"]).await else {
        panic!("expected a bulk id");
    };
    let newer = crate::actions::streams::parse_exact_id(&third).unwrap();
    let older = crate::actions::streams::parse_exact_id(&second).unwrap();
    assert!(newer > older);
}

#[tokio::test]
async fn test_xdel_counts_removed_entries() {
    let mut session = Session::new();
    session.reply(&["XADD", "s", "1-1", "a", "b"]).await;
    session.reply(&["XADD", "s", "1-2", "a", "b"]).await;
    assert_eq!(
        session.reply(&["XDEL", "s", "1-1", "9-9"]).await,
        Element::Integer(1)
    );
    let Element::Array(rest) = session.reply(&["XRANGE", "s", "-", "+"]).await else {
        panic!("expected an array");
    };
    assert_eq!(rest.len(), 1);
}

#[tokio::test]
async fn test_xread_returns_strictly_newer_entries() {
    let mut session = Session::new();
    session.reply(&["XADD", "s", "1-1", "a", "b"]).await;
    session.reply(&["XADD", "s", "1-2", "c", "d"]).await;
    let reply = session
        .reply(&["XREAD", "streams", "s", "1-1"])
        .await;
    assert_eq!(
        reply,
        Element::Array(vec![Element::Array(vec![
            bulk("s"),
            Element::Array(vec![Element::Array(vec![
                bulk("1-2"),
                Element::Array(vec![bulk("c"), bulk("d")]),
            ])]),
        ])])
    );
    // nothing newer: null reply
    assert_eq!(
        session.reply(&["XREAD", "streams", "s", "1-2"]).await,
        Element::Null
    );
}

#[tokio::test]
async fn test_xread_block_wakes_on_append() {
    let mut session = Session::new();
    session.reply(&["XADD", "s", "1-1", "a", "b"]).await;
    let db = session.db.clone();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        let cfg = ConfigurationSet::default();
        let mut cstate = ClientState::new();
        execute_frame(
            &db,
            &cfg,
            REPL_ID,
            &mut cstate,
            frame(&["XADD", "s", "2-1", "x", "y"]),
        )
        .await
        .unwrap();
    });
    let reply = session
        .reply(&["XREAD", "BLOCK", "0", "STREAMS", "s", "1-1"])
        .await;
    writer.await.unwrap();
    assert_eq!(
        reply,
        Element::Array(vec![Element::Array(vec![
            bulk("s"),
            Element::Array(vec![Element::Array(vec![
                bulk("2-1"),
                Element::Array(vec![bulk("x"), bulk("y")]),
            ])]),
        ])])
    );
}

#[tokio::test]
async fn test_xread_block_times_out_with_null() {
    let mut session = Session::new();
    session.reply(&["XADD", "s", "1-1", "a", "b"]).await;
    let reply = session
        .reply(&["XREAD", "BLOCK", "30", "STREAMS", "s", "1-1"])
        .await;
    assert_eq!(reply, Element::Null);
}

#[tokio::test]
async fn test_transaction_batching() {
    let mut session = Session::new();
    assert_eq!(session.reply(&["MULTI"]).await, Element::okay());
    assert!(session.cstate.is_queuing());
    assert_eq!(
        session.reply(&["SET", "a", "1"]).await,
        Element::Simple("QUEUED".to_owned())
    );
    assert_eq!(
        session.reply(&["INCR", "a"]).await,
        Element::Simple("QUEUED".to_owned())
    );
    // nothing ran yet
    assert_eq!(session.db.get(b"a").unwrap(), None);
    let outcome = session.run(&["EXEC"]).await;
    assert_eq!(
        outcome.reply,
        Element::Array(vec![Element::okay(), Element::Integer(2)])
    );
    assert_eq!(outcome.propagate.len(), 2);
    assert!(!session.cstate.is_queuing());
}

#[tokio::test]
async fn test_transaction_errors() {
    let mut session = Session::new();
    assert_eq!(
        session.reply(&["EXEC"]).await,
        Element::err(groups::EXEC_WITHOUT_MULTI)
    );
    assert_eq!(
        session.reply(&["DISCARD"]).await,
        Element::err(groups::DISCARD_WITHOUT_MULTI)
    );
    session.reply(&["MULTI"]).await;
    assert_eq!(
        session.reply(&["MULTI"]).await,
        Element::err(groups::MULTI_NESTED)
    );
    // still queuing after the nested error
    assert!(session.cstate.is_queuing());
}

#[tokio::test]
async fn test_discard_drops_the_queue() {
    let mut session = Session::new();
    session.reply(&["MULTI"]).await;
    session.reply(&["SET", "a", "1"]).await;
    assert_eq!(session.reply(&["DISCARD"]).await, Element::okay());
    assert_eq!(session.reply(&["GET", "a"]).await, Element::Null);
    assert_eq!(
        session.reply(&["EXEC"]).await,
        Element::err(groups::EXEC_WITHOUT_MULTI)
    );
}

#[tokio::test]
async fn test_queued_garbage_surfaces_in_exec_reply() {
    let mut session = Session::new();
    session.reply(&["MULTI"]).await;
    assert_eq!(
        session.reply(&["NONSENSE"]).await,
        Element::Simple("QUEUED".to_owned())
    );
    session.reply(&["SET", "a", "1"]).await;
    let Element::Array(replies) = session.reply(&["EXEC"]).await else {
        panic!("expected an array");
    };
    assert_eq!(replies.len(), 2);
    assert!(replies[0].is_err());
    assert_eq!(replies[1], Element::okay());
}

#[tokio::test]
async fn test_writes_propagate_as_raw_frames() {
    let mut session = Session::new();
    let outcome = session.run(&["SET", "k", "v"]).await;
    assert_eq!(
        outcome.propagate,
        vec![b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n".to_vec()]
    );
    // reads don't propagate
    assert!(session.run(&["GET", "k"]).await.propagate.is_empty());
    // failed writes don't propagate either
    session.reply(&["HSET", "h", "f", "v"]).await;
    assert!(session.run(&["INCR", "h"]).await.propagate.is_empty());
}

#[tokio::test]
async fn test_replconf_attaches_and_psync_syncs() {
    let mut session = Session::new();
    let outcome = session.run(&["REPLCONF", "listening-port", "6380"]).await;
    assert_eq!(outcome.reply, Element::okay());
    assert!(outcome.attach_replica);
    let reply = session.reply(&["PSYNC", "?", "-1"]).await;
    assert_eq!(
        reply,
        Element::Simple(format!("FULLRESYNC {REPL_ID} 0"))
    );
}

#[tokio::test]
async fn test_non_command_frames_are_protocol_violations() {
    let mut session = Session::new();
    assert_eq!(
        session.try_run(&[]).await.unwrap_err(),
        BadRequest
    );
    let violations = [
        Element::Integer(1),
        Element::Simple("PING".to_owned()),
        Element::Array(vec![Element::Integer(1)]),
    ];
    for bad in violations {
        let result = execute_frame(
            &session.db,
            &session.cfg,
            REPL_ID,
            &mut session.cstate,
            bad,
        )
        .await;
        assert_eq!(result.unwrap_err(), BadRequest);
    }
}
