/*
 * Created on Tue Sep 19 2023
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

//! # The keyspace
//!
//! The [`Corestore`] is the process-wide mapping from keys to typed values.
//! Exclusion is coarse: one readers-writer lock guards the whole table and
//! every action holds it for the duration of its operation, which is fine
//! because operations are O(1) or bounded by their arguments.
//!
//! Expiration is lazy. Read paths that observe a string entry past its
//! `expires_at` remove it on the spot and report "not found"; there is no
//! background sweeper

use crate::util;
use bytes::Bytes;
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

pub mod stream;
#[cfg(test)]
mod tests;

use stream::Stream;

pub type KeyspaceResult<T> = Result<T, KeyspaceError>;

#[derive(Debug, PartialEq)]
/// Errors that the keyspace itself can produce (actions translate these into
/// response frames)
pub enum KeyspaceError {
    /// The entry under this key doesn't have the type the action expects
    WrongType,
    /// The entry should hold a decimal integer but doesn't
    NotAnInteger,
}

#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
/// A cheaply clonable byte string, used for keys, values, hash fields and
/// stream payloads alike
pub struct Data {
    blob: Bytes,
}

impl Data {
    pub fn from_blob(blob: Bytes) -> Self {
        Data { blob }
    }
    pub fn into_blob(self) -> Bytes {
        self.blob
    }
    /// Interpret the payload as UTF-8, replacing anything that isn't
    pub fn as_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.blob).to_string()
    }
}

impl Deref for Data {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.blob
    }
}

impl Borrow<[u8]> for Data {
    fn borrow(&self) -> &[u8] {
        &self.blob
    }
}

impl From<&str> for Data {
    fn from(string: &str) -> Self {
        Data {
            blob: Bytes::copy_from_slice(string.as_bytes()),
        }
    }
}

impl From<String> for Data {
    fn from(string: String) -> Self {
        Data {
            blob: Bytes::from(string.into_bytes()),
        }
    }
}

impl From<Vec<u8>> for Data {
    fn from(blob: Vec<u8>) -> Self {
        Data {
            blob: Bytes::from(blob),
        }
    }
}

impl From<Bytes> for Data {
    fn from(blob: Bytes) -> Self {
        Data { blob }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data({:?})", String::from_utf8_lossy(&self.blob))
    }
}

#[derive(Debug)]
/// A single keyspace slot. A key holds exactly one of these shapes; applying
/// a command of one family to a key of another family is a type error
pub enum Entry {
    /// A plain byte string with an optional absolute expiry (unix millis)
    Str {
        body: Data,
        expires_at: Option<u64>,
    },
    /// A field/value map
    Hash(HashMap<Data, Data>),
    /// An append-only log; shared so that blocked readers can hold on to it
    /// without pinning the table lock
    Stream(Arc<Stream>),
}

impl Entry {
    fn type_name(&self) -> &'static str {
        match self {
            Entry::Str { .. } => "string",
            Entry::Hash(_) => "hash",
            Entry::Stream(_) => "stream",
        }
    }
    /// Is this a string entry whose expiry has passed?
    fn has_expired(&self, now_ms: u64) -> bool {
        matches!(
            self,
            Entry::Str {
                expires_at: Some(at),
                ..
            } if now_ms > *at
        )
    }
}

#[derive(Clone)]
/// An atomic reference to the shared in-memory table. Cloning hands out
/// another handle to the same keyspace
pub struct Corestore {
    shared: Arc<RwLock<HashMap<Data, Entry>>>,
}

impl Default for Corestore {
    fn default() -> Self {
        Corestore::new()
    }
}

impl Corestore {
    pub fn new() -> Self {
        Corestore {
            shared: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Read a string value, pruning it first if its expiry has passed
    pub fn get(&self, key: &[u8]) -> KeyspaceResult<Option<Data>> {
        let mut table = self.shared.write();
        match table.get(key) {
            Some(entry) if entry.has_expired(util::now_ms()) => {
                table.remove(key);
                Ok(None)
            }
            Some(Entry::Str { body, .. }) => Ok(Some(body.clone())),
            Some(_) => Err(KeyspaceError::WrongType),
            None => Ok(None),
        }
    }

    /// Store a string value, replacing whatever lived under the key
    pub fn set(&self, key: Data, body: Data, expires_at: Option<u64>) {
        self.shared
            .write()
            .insert(key, Entry::Str { body, expires_at });
    }

    /// Remove keys, returning how many were actually removed. An entry whose
    /// expiry has already passed is pruned but not counted
    pub fn del(&self, keys: impl Iterator<Item = Data>) -> usize {
        let mut table = self.shared.write();
        let now = util::now_ms();
        let mut removed = 0;
        for key in keys {
            match table.remove(&*key) {
                Some(entry) if entry.has_expired(now) => {}
                Some(_) => removed += 1,
                None => {}
            }
        }
        removed
    }

    /// Parse the value under `key` as a decimal integer, add one and store it
    /// back. An absent (or expired) key counts up from zero
    pub fn incr(&self, key: &[u8]) -> KeyspaceResult<i64> {
        let mut table = self.shared.write();
        let now = util::now_ms();
        if let Some(entry) = table.get(key) {
            if entry.has_expired(now) {
                table.remove(key);
            }
        }
        match table.get_mut(key) {
            Some(Entry::Str { body, .. }) => {
                let current: i64 = std::str::from_utf8(body)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(KeyspaceError::NotAnInteger)?;
                let next = current.checked_add(1).ok_or(KeyspaceError::NotAnInteger)?;
                *body = Data::from(next.to_string());
                Ok(next)
            }
            Some(_) => Err(KeyspaceError::WrongType),
            None => {
                table.insert(
                    Data::from_blob(Bytes::copy_from_slice(key)),
                    Entry::Str {
                        body: Data::from("1"),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    /// Merge fields into the hash under `key`, creating it if needed
    pub fn hset(&self, key: Data, fields: Vec<(Data, Data)>) -> KeyspaceResult<()> {
        let mut table = self.shared.write();
        match table.entry(key) {
            MapEntry::Occupied(mut slot) => match slot.get_mut() {
                Entry::Hash(map) => {
                    map.extend(fields);
                    Ok(())
                }
                _ => Err(KeyspaceError::WrongType),
            },
            MapEntry::Vacant(slot) => {
                slot.insert(Entry::Hash(fields.into_iter().collect()));
                Ok(())
            }
        }
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> KeyspaceResult<Option<Data>> {
        match self.shared.read().get(key) {
            Some(Entry::Hash(map)) => Ok(map.get(field).cloned()),
            Some(_) => Err(KeyspaceError::WrongType),
            None => Ok(None),
        }
    }

    /// Every field/value pair under `key`. The order is whatever the map
    /// yields, but it is stable within this single reply
    pub fn hgetall(&self, key: &[u8]) -> KeyspaceResult<Vec<(Data, Data)>> {
        match self.shared.read().get(key) {
            Some(Entry::Hash(map)) => {
                Ok(map.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            }
            Some(_) => Err(KeyspaceError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    /// The type name of the entry under `key`: `string`, `hash`, `stream` or
    /// `none`
    pub fn type_of(&self, key: &[u8]) -> &'static str {
        let mut table = self.shared.write();
        match table.get(key) {
            Some(entry) if entry.has_expired(util::now_ms()) => {
                table.remove(key);
                "none"
            }
            Some(entry) => entry.type_name(),
            None => "none",
        }
    }

    /// All live keys. Expired entries encountered during the walk are pruned
    /// before the listing is returned
    pub fn keys(&self) -> Vec<Data> {
        let mut table = self.shared.write();
        let now = util::now_ms();
        table.retain(|_, entry| !entry.has_expired(now));
        table.keys().cloned().collect()
    }

    /// The stream under `key`, if the key holds one
    pub fn get_stream(&self, key: &[u8]) -> KeyspaceResult<Option<Arc<Stream>>> {
        match self.shared.read().get(key) {
            Some(Entry::Stream(stream)) => Ok(Some(stream.clone())),
            Some(_) => Err(KeyspaceError::WrongType),
            None => Ok(None),
        }
    }

    /// The stream under `key`, created empty if the key is absent
    pub fn get_or_create_stream(&self, key: Data) -> KeyspaceResult<Arc<Stream>> {
        let mut table = self.shared.write();
        match table.entry(key) {
            MapEntry::Occupied(slot) => match slot.get() {
                Entry::Stream(stream) => Ok(stream.clone()),
                _ => Err(KeyspaceError::WrongType),
            },
            MapEntry::Vacant(slot) => {
                let stream = Arc::new(Stream::new());
                slot.insert(Entry::Stream(stream.clone()));
                Ok(stream)
            }
        }
    }

    /// Seed one entry from the snapshot decoder. `expiry_ms == 0` means no
    /// expiration; an entry already past its expiry is skipped
    pub fn seed(&self, key: Data, body: Data, expiry_ms: u64) {
        let expires_at = match expiry_ms {
            0 => None,
            at if at <= util::now_ms() => return,
            at => Some(at),
        };
        self.shared
            .write()
            .insert(key, Entry::Str { body, expires_at });
    }

    /// The number of slots in the table (tests only; live code never needs it
    /// because `KEYS` prunes as it walks)
    #[cfg(test)]
    pub fn raw_len(&self) -> usize {
        self.shared.read().len()
    }
}
