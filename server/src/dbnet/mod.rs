/*
 * Created on Thu Oct 05 2023
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

//! # Database networking
//!
//! One task per accepted connection, a semaphore capping how many run at
//! once, and a broadcast channel that tells every task to wind down on
//! shutdown. The mpsc sender/receiver pair is the usual drain trick: every
//! connection task holds a clone of the sender and the listener waits for
//! the channel to report "no senders left" before declaring shutdown done

pub mod connection;
mod listener;

use crate::config::ConfigurationSet;
use crate::corestore::Corestore;
use crate::replication::ReplHandle;
use crate::util::error::{Error, VermResult};
use listener::Listener;
use std::cell::Cell;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

/// A backoff implementation that is meant to be used in connection loops
pub(self) struct NetBackoff {
    c: Cell<u8>,
}

impl NetBackoff {
    /// The maximum backoff duration
    const MAX_BACKOFF: u8 = 64;
    /// Create a new [`NetBackoff`] instance
    pub const fn new() -> Self {
        Self { c: Cell::new(1) }
    }
    /// Wait for the current backoff duration
    pub async fn spin(&self) {
        time::sleep(Duration::from_secs(self.c.get() as _)).await;
        self.c.set(self.c.get() << 1);
    }
    /// Should we give up on the socket?
    pub fn should_disconnect(&self) -> bool {
        self.c.get() > Self::MAX_BACKOFF
    }
}

/// Check for termination signals
pub struct Terminator {
    terminated: bool,
    signal: broadcast::Receiver<()>,
}

impl Terminator {
    pub fn new(signal: broadcast::Receiver<()>) -> Self {
        Terminator {
            terminated: false,
            signal,
        }
    }
    pub fn is_termination_signal(&self) -> bool {
        self.terminated
    }
    /// Wait for the shutdown broadcast. The senders being gone counts as a
    /// signal too
    pub async fn receive_signal(&mut self) {
        if self.terminated {
            return;
        }
        let _ = self.signal.recv().await;
        self.terminated = true;
    }
}

/// Bind the listener and serve until `sig` (usually ctrl-c) resolves, then
/// broadcast termination and wait for every connection task to drain
pub async fn run(
    db: Corestore,
    cfg: Arc<ConfigurationSet>,
    repl: ReplHandle,
    sig: impl Future,
) -> VermResult<()> {
    let (signal, _) = broadcast::channel(1);
    let mut server = Listener::init(&db, &cfg, &repl, signal.clone()).await?;
    log::info!("Server started on {}:{}", cfg.host, cfg.port);
    tokio::select! {
        ret = server.run() => {
            if let Err(e) = ret {
                return Err(Error::ioerror_extra(e, "accepting connections".to_owned()));
            }
        }
        _ = sig => {
            log::info!("Signalling all nodes to shut down");
        }
    }
    drop(signal);
    server.release_self().await;
    Ok(())
}
