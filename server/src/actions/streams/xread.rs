/*
 * Created on Fri Sep 29 2023
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

//! # `XREAD` queries
//!
//! The non-blocking form scans each requested stream for entries strictly
//! after the requested id. The `BLOCK` form parks the task on the streams'
//! append signals until something shows up or the timeout elapses.
//!
//! Waiters subscribe to every stream *before* scanning and re-scan from the
//! requested id on every wakeup, so the entry that caused a signal is always
//! observed and concurrent appends can't be missed

use super::super::keyspace_error;
use super::entry_element;
use crate::corestore::stream::{Stream, StreamId};
use crate::corestore::{Corestore, Data};
use crate::protocol::Element;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

/// Run an `XREAD` query. `block` is `None` for the non-blocking form,
/// `Some(0)` for an unbounded wait and `Some(ms)` for a bounded one
pub async fn xread(
    handle: &Corestore,
    block: Option<u64>,
    requests: Vec<(Data, StreamId)>,
) -> Element {
    let deadline = match block {
        Some(ms) if ms > 0 => Some(Instant::now() + Duration::from_millis(ms)),
        _ => None,
    };
    loop {
        // resolve and subscribe before scanning: an append that lands after
        // the scan will still raise a signal we're already subscribed to
        let mut signals = Vec::new();
        let mut streams: Vec<(&Data, StreamId, Option<Arc<Stream>>)> =
            Vec::with_capacity(requests.len());
        for (key, after) in &requests {
            match handle.get_stream(key) {
                Ok(found) => {
                    if let Some(stream) = &found {
                        signals.push(stream.subscribe());
                    }
                    streams.push((key, *after, found));
                }
                Err(e) => return keyspace_error(e),
            }
        }
        let mut groups = Vec::new();
        for (key, after, stream) in streams {
            let entries = match stream {
                Some(stream) => stream.read_after(after),
                None => Vec::new(),
            };
            if !entries.is_empty() {
                groups.push(Element::Array(vec![
                    Element::Bulk(key.clone().into_blob()),
                    Element::Array(entries.into_iter().map(entry_element).collect()),
                ]));
            }
        }
        if !groups.is_empty() {
            return Element::Array(groups);
        }
        match block {
            None => return Element::Null,
            Some(_) => {
                if !wait_for_signal(signals, deadline).await {
                    return Element::Null;
                }
                // woken: loop around and re-scan everything
            }
        }
    }
}

/// Park until any of the subscribed streams signals an append or the deadline
/// passes. Returns false once waiting can't produce anything anymore
async fn wait_for_signal(
    signals: Vec<broadcast::Receiver<()>>,
    deadline: Option<Instant>,
) -> bool {
    if signals.is_empty() {
        // none of the requested keys holds a stream yet, so no append signal
        // can ever reach us
        return false;
    }
    let mut set = JoinSet::new();
    for mut rx in signals {
        // a lagged receiver has seen *more* appends, which is as good as a
        // signal; only a closed channel means the stream is gone
        set.spawn(async move { !matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)) });
    }
    loop {
        let joined = match deadline {
            Some(at) => match timeout_at(at, set.join_next()).await {
                Ok(joined) => joined,
                Err(_) => return false,
            },
            None => set.join_next().await,
        };
        match joined {
            Some(Ok(true)) => return true,
            // closed or cancelled: try the remaining waiters
            Some(_) => continue,
            None => return false,
        }
    }
    // remaining waiters are aborted when the set drops
}
