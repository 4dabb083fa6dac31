/*
 * Created on Thu Sep 21 2023
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

//! # Streams
//!
//! A stream is an append-only log of `(id, fields)` entries ordered by a
//! composite `(ms, seq)` id. The log is kept in a `BTreeMap` keyed on the id,
//! which gives ordered iteration, O(log n) range scans and removals that
//! trivially preserve ordering.
//!
//! Appends signal a broadcast channel so that every blocked reader wakes and
//! re-scans from its requested id. Readers subscribe *before* scanning, so an
//! append can never slip between a scan and the wait that follows it. When
//! nobody is waiting the signal is dropped on the floor; appends never block

use super::Data;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::broadcast;

/// Capacity of the append-signal channel. Waiters re-scan on every wakeup,
/// so even a lagged receiver only means a spurious extra scan
const SIGNAL_CAP: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
/// A composite stream entry id, ordered lexicographically by `(ms, seq)` and
/// rendered as `ms-seq`
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    /// The smallest id. Never a legal entry id (`0-0` is reserved)
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    /// The largest possible id
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };
    pub const fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, PartialEq)]
/// The id forms `XADD` accepts
pub enum EntrySpec {
    /// `*`: generate both parts
    Auto,
    /// `<ms>-*`: generate the sequence part
    AutoSeq(u64),
    /// `<ms>-<seq>`
    Exact(StreamId),
}

#[derive(Debug, PartialEq)]
/// Why an append was refused
pub enum AddError {
    /// The reserved `0-0` id
    ReservedId,
    /// The id doesn't advance past the top item
    NotGreater,
}

/// One entry: its id and the flat list of field/value pairs in arrival order
pub type StreamEntry = (StreamId, Vec<(Data, Data)>);

#[derive(Debug)]
struct StreamInner {
    entries: BTreeMap<StreamId, Vec<(Data, Data)>>,
    /// Id of the most recently appended entry. Survives removals, so ids can
    /// never move backwards even after an `XDEL` of the top item
    last: StreamId,
}

#[derive(Debug)]
/// An append-only ordered log. Shared behind an `Arc` so blocked readers can
/// wait on it without holding the keyspace lock
pub struct Stream {
    inner: RwLock<StreamInner>,
    signal: broadcast::Sender<()>,
}

impl Default for Stream {
    fn default() -> Self {
        Stream::new()
    }
}

impl Stream {
    pub fn new() -> Self {
        let (signal, _) = broadcast::channel(SIGNAL_CAP);
        Stream {
            inner: RwLock::new(StreamInner {
                entries: BTreeMap::new(),
                last: StreamId::MIN,
            }),
            signal,
        }
    }

    /// Append an entry, resolving the id spec against the current top item.
    /// Returns the id actually assigned
    pub fn append(
        &self,
        spec: EntrySpec,
        fields: Vec<(Data, Data)>,
        now_ms: u64,
    ) -> Result<StreamId, AddError> {
        let mut inner = self.inner.write();
        let last = inner.last;
        // `last` survives removals, so "never appended" is `last == MIN`,
        // not "no entries left"
        let virgin = last == StreamId::MIN;
        let id = match spec {
            EntrySpec::Auto => {
                if virgin || now_ms > last.ms {
                    // seq 0, except that 0-0 is reserved
                    StreamId::new(now_ms, u64::from(now_ms == 0))
                } else {
                    // same millisecond, or the clock went backwards; either
                    // way the id must still advance
                    StreamId::new(last.ms, last.seq + 1)
                }
            }
            EntrySpec::AutoSeq(ms) => {
                if virgin || ms > last.ms {
                    // seq 0, except that 0-0 is reserved
                    StreamId::new(ms, u64::from(ms == 0))
                } else if ms == last.ms {
                    StreamId::new(ms, last.seq + 1)
                } else {
                    return Err(AddError::NotGreater);
                }
            }
            EntrySpec::Exact(id) if id == StreamId::MIN => return Err(AddError::ReservedId),
            EntrySpec::Exact(id) => {
                if id > last {
                    id
                } else {
                    return Err(AddError::NotGreater);
                }
            }
        };
        inner.entries.insert(id, fields);
        inner.last = id;
        drop(inner);
        // wake any parked readers; with nobody subscribed this simply errors
        // out and the signal is dropped
        let _ = self.signal.send(());
        Ok(id)
    }

    /// Forward scan of all entries with `start <= id <= end`
    pub fn range(&self, start: StreamId, end: StreamId) -> Vec<StreamEntry> {
        if start > end {
            return Vec::new();
        }
        self.inner
            .read()
            .entries
            .range(start..=end)
            .map(|(id, fields)| (*id, fields.clone()))
            .collect()
    }

    /// Forward scan of all entries with `id > after`
    pub fn read_after(&self, after: StreamId) -> Vec<StreamEntry> {
        use std::ops::Bound::{Excluded, Unbounded};
        self.inner
            .read()
            .entries
            .range((Excluded(after), Unbounded))
            .map(|(id, fields)| (*id, fields.clone()))
            .collect()
    }

    /// Remove the entry with exactly this id, if present
    pub fn remove(&self, id: StreamId) -> bool {
        self.inner.write().entries.remove(&id).is_some()
    }

    /// Subscribe to append signals. Do this *before* scanning to avoid the
    /// scan/park race
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.signal.subscribe()
    }

    pub fn last_id(&self) -> StreamId {
        self.inner.read().last
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<(Data, Data)> {
        vec![(Data::from("temp"), Data::from("23"))]
    }

    #[test]
    fn test_append_ids_strictly_increase() {
        let stream = Stream::new();
        let mut last = StreamId::MIN;
        for spec in [
            EntrySpec::Exact(StreamId::new(1, 1)),
            EntrySpec::AutoSeq(1),
            EntrySpec::Auto,
            EntrySpec::AutoSeq(u64::MAX),
        ] {
            let id = stream.append(spec, fields(), 0).unwrap();
            assert!(id > last);
            last = id;
        }
        assert_eq!(stream.last_id(), last);
    }

    #[test]
    fn test_append_rejects_reserved_id() {
        let stream = Stream::new();
        assert_eq!(
            stream.append(EntrySpec::Exact(StreamId::MIN), fields(), 0),
            Err(AddError::ReservedId)
        );
    }

    #[test]
    fn test_append_rejects_non_advancing_id() {
        let stream = Stream::new();
        stream
            .append(EntrySpec::Exact(StreamId::new(5, 5)), fields(), 0)
            .unwrap();
        assert_eq!(
            stream.append(EntrySpec::Exact(StreamId::new(5, 5)), fields(), 0),
            Err(AddError::NotGreater)
        );
        assert_eq!(
            stream.append(EntrySpec::AutoSeq(4), fields(), 0),
            Err(AddError::NotGreater)
        );
    }

    #[test]
    fn test_autoseq_reserves_the_zero_id() {
        let stream = Stream::new();
        let id = stream.append(EntrySpec::AutoSeq(0), fields(), 0).unwrap();
        assert_eq!(id, StreamId::new(0, 1));
    }

    #[test]
    fn test_auto_does_not_go_backwards() {
        let stream = Stream::new();
        stream
            .append(EntrySpec::Exact(StreamId::new(100, 0)), fields(), 0)
            .unwrap();
        // clock says 50, but the top item is at 100
        let id = stream.append(EntrySpec::Auto, fields(), 50).unwrap();
        assert_eq!(id, StreamId::new(100, 1));
    }

    #[test]
    fn test_range_is_inclusive_and_ordered() {
        let stream = Stream::new();
        for seq in 1..=5 {
            stream
                .append(EntrySpec::Exact(StreamId::new(1, seq)), fields(), 0)
                .unwrap();
        }
        let hits = stream.range(StreamId::new(1, 2), StreamId::new(1, 4));
        let ids: Vec<_> = hits.iter().map(|(id, _)| id.seq).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_read_after_is_exclusive() {
        let stream = Stream::new();
        for seq in 1..=3 {
            stream
                .append(EntrySpec::Exact(StreamId::new(1, seq)), fields(), 0)
                .unwrap();
        }
        let hits = stream.read_after(StreamId::new(1, 1));
        let ids: Vec<_> = hits.iter().map(|(id, _)| id.seq).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_remove_preserves_order_and_last_id() {
        let stream = Stream::new();
        for seq in 1..=3 {
            stream
                .append(EntrySpec::Exact(StreamId::new(1, seq)), fields(), 0)
                .unwrap();
        }
        assert!(stream.remove(StreamId::new(1, 2)));
        assert!(!stream.remove(StreamId::new(1, 2)));
        let ids: Vec<_> = stream
            .range(StreamId::MIN, StreamId::MAX)
            .iter()
            .map(|(id, _)| id.seq)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        // removing the top item must not allow ids to move backwards
        assert!(stream.remove(StreamId::new(1, 3)));
        assert_eq!(
            stream.append(EntrySpec::Exact(StreamId::new(1, 3)), fields(), 0),
            Err(AddError::NotGreater)
        );
    }

    #[tokio::test]
    async fn test_append_signals_subscribers() {
        let stream = Stream::new();
        let mut rx = stream.subscribe();
        stream
            .append(EntrySpec::Exact(StreamId::new(1, 1)), fields(), 0)
            .unwrap();
        rx.recv().await.unwrap();
    }

    #[test]
    fn test_append_without_subscribers_does_not_block() {
        let stream = Stream::new();
        assert!(stream.is_empty());
        for seq in 1..=64 {
            stream
                .append(EntrySpec::Exact(StreamId::new(1, seq)), fields(), 0)
                .unwrap();
        }
        assert_eq!(stream.len(), 64);
    }
}
