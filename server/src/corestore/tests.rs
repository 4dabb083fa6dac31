/*
 * Created on Fri Sep 22 2023
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

use super::{Corestore, Data, KeyspaceError};
use crate::util;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

#[test]
fn test_set_get_roundtrip() {
    let db = Corestore::new();
    db.set(Data::from("foo"), Data::from("bar"), None);
    assert_eq!(db.get(b"foo").unwrap(), Some(Data::from("bar")));
    assert_eq!(db.get(b"missing").unwrap(), None);
}

#[test]
fn test_get_prunes_expired_entries() {
    let db = Corestore::new();
    // expired one millisecond ago
    db.set(
        Data::from("gone"),
        Data::from("x"),
        Some(util::now_ms() - 1),
    );
    assert_eq!(db.get(b"gone").unwrap(), None);
    assert_eq!(db.raw_len(), 0);
}

#[test]
fn test_get_honors_future_expiry() {
    let db = Corestore::new();
    db.set(
        Data::from("here"),
        Data::from("x"),
        Some(util::now_ms() + 60_000),
    );
    assert_eq!(db.get(b"here").unwrap(), Some(Data::from("x")));
}

#[test]
fn test_keys_prunes_expired_entries() {
    let db = Corestore::new();
    db.set(Data::from("live"), Data::from("x"), None);
    db.set(
        Data::from("dead"),
        Data::from("x"),
        Some(util::now_ms() - 1),
    );
    let keys = db.keys();
    assert_eq!(keys, vec![Data::from("live")]);
    assert_eq!(db.raw_len(), 1);
}

#[test]
fn test_del_counts_only_live_keys() {
    let db = Corestore::new();
    db.set(Data::from("a"), Data::from("1"), None);
    db.set(Data::from("b"), Data::from("1"), Some(util::now_ms() - 1));
    let removed = db.del(
        vec![Data::from("a"), Data::from("b"), Data::from("c")].into_iter(),
    );
    assert_eq!(removed, 1);
    assert_eq!(db.raw_len(), 0);
}

#[test]
fn test_incr_counts_up_from_absent() {
    let db = Corestore::new();
    assert_eq!(db.incr(b"n").unwrap(), 1);
    assert_eq!(db.incr(b"n").unwrap(), 2);
    assert_eq!(db.get(b"n").unwrap(), Some(Data::from("2")));
}

#[test]
fn test_incr_rejects_non_integers() {
    let db = Corestore::new();
    db.set(Data::from("s"), Data::from("abc"), None);
    assert_eq!(db.incr(b"s"), Err(KeyspaceError::NotAnInteger));
    db.set(Data::from("big"), Data::from(i64::MAX.to_string()), None);
    assert_eq!(db.incr(b"big"), Err(KeyspaceError::NotAnInteger));
}

#[test]
fn test_one_type_per_key() {
    let db = Corestore::new();
    db.hset(
        Data::from("h"),
        vec![(Data::from("f"), Data::from("v"))],
    )
    .unwrap();
    assert_eq!(db.get(b"h"), Err(KeyspaceError::WrongType));
    assert_eq!(db.incr(b"h"), Err(KeyspaceError::WrongType));
    db.set(Data::from("s"), Data::from("v"), None);
    assert_eq!(db.hget(b"s", b"f"), Err(KeyspaceError::WrongType));
    assert_eq!(
        db.get_or_create_stream(Data::from("s")).unwrap_err(),
        KeyspaceError::WrongType
    );
}

#[test]
fn test_hash_merge_and_read() {
    let db = Corestore::new();
    db.hset(
        Data::from("h"),
        vec![(Data::from("a"), Data::from("1"))],
    )
    .unwrap();
    db.hset(
        Data::from("h"),
        vec![
            (Data::from("a"), Data::from("2")),
            (Data::from("b"), Data::from("3")),
        ],
    )
    .unwrap();
    assert_eq!(db.hget(b"h", b"a").unwrap(), Some(Data::from("2")));
    assert_eq!(db.hget(b"h", b"missing").unwrap(), None);
    let mut all = db.hgetall(b"h").unwrap();
    all.sort();
    assert_eq!(
        all,
        vec![
            (Data::from("a"), Data::from("2")),
            (Data::from("b"), Data::from("3")),
        ]
    );
    assert!(db.hgetall(b"nope").unwrap().is_empty());
}

#[test]
fn test_type_reporting() {
    let db = Corestore::new();
    db.set(Data::from("s"), Data::from("v"), None);
    db.hset(Data::from("h"), vec![(Data::from("f"), Data::from("v"))])
        .unwrap();
    db.get_or_create_stream(Data::from("st")).unwrap();
    assert_eq!(db.type_of(b"s"), "string");
    assert_eq!(db.type_of(b"h"), "hash");
    assert_eq!(db.type_of(b"st"), "stream");
    assert_eq!(db.type_of(b"nope"), "none");
}

fn random_key(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[test]
fn test_randomized_keys_roundtrip() {
    let db = Corestore::new();
    let mut keys: Vec<String> = (0..64).map(|_| random_key(12)).collect();
    keys.sort();
    keys.dedup();
    for key in &keys {
        db.set(Data::from(key.as_str()), Data::from(key.as_str()), None);
    }
    for key in &keys {
        assert_eq!(
            db.get(key.as_bytes()).unwrap(),
            Some(Data::from(key.as_str()))
        );
    }
    assert_eq!(db.keys().len(), keys.len());
}

#[test]
fn test_randomized_hash_fields_roundtrip() {
    let db = Corestore::new();
    let mut fields: Vec<String> = (0..32).map(|_| random_key(8)).collect();
    fields.sort();
    fields.dedup();
    db.hset(
        Data::from("h"),
        fields
            .iter()
            .map(|f| (Data::from(f.as_str()), Data::from("v")))
            .collect(),
    )
    .unwrap();
    for field in &fields {
        assert_eq!(db.hget(b"h", field.as_bytes()).unwrap(), Some(Data::from("v")));
    }
    assert_eq!(db.hgetall(b"h").unwrap().len(), fields.len());
}

#[test]
fn test_seed_skips_stale_entries() {
    let db = Corestore::new();
    db.seed(Data::from("fresh"), Data::from("v"), 0);
    db.seed(
        Data::from("later"),
        Data::from("v"),
        util::now_ms() + 60_000,
    );
    db.seed(Data::from("stale"), Data::from("v"), 10);
    assert_eq!(db.raw_len(), 2);
    assert_eq!(db.get(b"fresh").unwrap(), Some(Data::from("v")));
    assert_eq!(db.get(b"later").unwrap(), Some(Data::from("v")));
    assert_eq!(db.get(b"stale").unwrap(), None);
}
