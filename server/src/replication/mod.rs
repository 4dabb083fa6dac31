/*
 * Created on Mon Oct 02 2023
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

//! # Replication fan-out
//!
//! Followers are connections that issued `REPLCONF`. One dedicated task owns
//! the follower set: writers hand it raw request frames over a queue and it
//! forwards each frame into every follower's own bounded queue. A follower
//! whose queue is full (or whose connection died) is dropped on the spot, so
//! a slow follower can never hold up the leader or its peers.
//!
//! Per-follower ordering matches the order in which the leader accepted the
//! writes; there is no acknowledgement protocol

pub mod handshake;

use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// How many frames may pile up for one follower before it is considered dead
const FOLLOWER_QUEUE_CAP: usize = 512;
/// How many frames may pile up for the fan-out task itself
const FANOUT_QUEUE_CAP: usize = 1024;

enum ReplEvent {
    /// A new follower and the queue its connection task drains
    Attach(mpsc::Sender<Vec<u8>>),
    /// A write frame to forward to every follower
    Propagate(Vec<u8>),
}

#[derive(Clone)]
/// A cheap handle to the replication engine, one per connection
pub struct ReplHandle {
    events: mpsc::Sender<ReplEvent>,
    id: Arc<String>,
}

impl ReplHandle {
    /// Spawn the fan-out task and return the first handle to it
    pub fn start() -> Self {
        let (events, queue) = mpsc::channel(FANOUT_QUEUE_CAP);
        tokio::spawn(fanout(queue));
        ReplHandle {
            events,
            id: Arc::new(Uuid::new_v4().simple().to_string()),
        }
    }
    /// This node's replication id (surfaced in the `PSYNC` reply)
    pub fn id(&self) -> &str {
        &self.id
    }
    /// Queue one write frame for broadcast to every follower
    pub async fn propagate(&self, frame: Vec<u8>) {
        if self.events.send(ReplEvent::Propagate(frame)).await.is_err() {
            log::error!("Replication fan-out task is gone; dropping write frame");
        }
    }
    /// Register the calling connection as a follower, returning the queue it
    /// must pump into its socket
    pub async fn attach(&self) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(FOLLOWER_QUEUE_CAP);
        if self.events.send(ReplEvent::Attach(tx)).await.is_err() {
            log::error!("Replication fan-out task is gone; follower will never receive writes");
        }
        rx
    }
}

/// The fan-out task: the only owner of the follower set
async fn fanout(mut queue: mpsc::Receiver<ReplEvent>) {
    let mut followers: Vec<mpsc::Sender<Vec<u8>>> = Vec::new();
    while let Some(event) = queue.recv().await {
        match event {
            ReplEvent::Attach(follower) => {
                log::info!("Attached a new follower (total: {})", followers.len() + 1);
                followers.push(follower);
            }
            ReplEvent::Propagate(frame) => {
                followers.retain(|follower| match follower.try_send(frame.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        log::warn!("Dropping follower that stopped draining its queue");
                        false
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corestore::Data;
    use crate::resp::encode_command_frame;

    #[tokio::test]
    async fn test_attached_follower_receives_writes_in_order() {
        let repl = ReplHandle::start();
        let mut follower = repl.attach().await;
        let one = encode_command_frame(&Data::from("SET"), &[Data::from("k"), Data::from("v")]);
        let two = encode_command_frame(&Data::from("DEL"), &[Data::from("k")]);
        repl.propagate(one.clone()).await;
        repl.propagate(two.clone()).await;
        assert_eq!(follower.recv().await.unwrap(), one);
        assert_eq!(follower.recv().await.unwrap(), two);
        // the frame is byte-identical to what a client would have sent
        assert_eq!(one, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }

    #[tokio::test]
    async fn test_late_follower_misses_earlier_writes() {
        let repl = ReplHandle::start();
        repl.propagate(b"*1\r\n$4\r\nPING\r\n".to_vec()).await;
        let mut follower = repl.attach().await;
        let frame = encode_command_frame(&Data::from("DEL"), &[Data::from("k")]);
        repl.propagate(frame.clone()).await;
        assert_eq!(follower.recv().await.unwrap(), frame);
    }
}
