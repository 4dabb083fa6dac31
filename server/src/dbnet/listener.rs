/*
 * Created on Fri Oct 06 2023
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

use super::{
    connection::{Connection, ConnectionHandler},
    NetBackoff, Terminator,
};
use crate::config::ConfigurationSet;
use crate::corestore::Corestore;
use crate::replication::ReplHandle;
use crate::util::error::{Error, VermResult};
use std::io::Result as IoResult;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};

/// The TCP listener: accepts connections (respecting the connection limit)
/// and spawns a handler task per client
pub struct Listener {
    /// An atomic reference to the coretable
    db: Corestore,
    /// The startup configuration
    cfg: Arc<ConfigurationSet>,
    /// A handle to the replication fan-out
    repl: ReplHandle,
    /// The incoming connection listener (binding)
    listener: TcpListener,
    /// The maximum number of connections
    climit: Arc<Semaphore>,
    /// The shutdown broadcaster
    signal: broadcast::Sender<()>,
    // When all `Sender`s are dropped - the `Receiver` gets a `None` value
    // We send a clone of `terminate_tx` to each handler
    terminate_tx: mpsc::Sender<()>,
    terminate_rx: mpsc::Receiver<()>,
}

impl Listener {
    pub async fn init(
        db: &Corestore,
        cfg: &Arc<ConfigurationSet>,
        repl: &ReplHandle,
        signal: broadcast::Sender<()>,
    ) -> VermResult<Self> {
        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        let listener = TcpListener::bind((cfg.host, cfg.port))
            .await
            .map_err(|e| Error::ioerror_extra(e, format!("binding to port {}", cfg.port)))?;
        Ok(Self {
            db: db.clone(),
            cfg: cfg.clone(),
            repl: repl.clone(),
            listener,
            climit: Arc::new(Semaphore::new(cfg.maxcon)),
            signal,
            terminate_tx,
            terminate_rx,
        })
    }
    /// Accept one connection, backing off on transient failures. Once the
    /// backoff is exhausted the error is handed up and takes the process down
    async fn accept(&mut self) -> IoResult<TcpStream> {
        let backoff = NetBackoff::new();
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    log::error!("Failed to accept a connection: {e}");
                    if backoff.should_disconnect() {
                        return Err(e);
                    }
                    backoff.spin().await;
                }
            }
        }
    }
    pub async fn run(&mut self) -> IoResult<()> {
        loop {
            if let Ok(permit) = self.climit.acquire().await {
                // a handler returns its permit through its `Drop`
                permit.forget();
            }
            let stream = self.accept().await?;
            let mut handler = ConnectionHandler::new(
                self.db.clone(),
                self.cfg.clone(),
                self.repl.clone(),
                Connection::new(stream),
                self.climit.clone(),
                Terminator::new(self.signal.subscribe()),
                self.terminate_tx.clone(),
            );
            tokio::spawn(async move {
                if let Err(e) = handler.run().await {
                    log::error!("Error: {e}");
                }
            });
        }
    }
    /// Wait for every connection task to wind down. Only called after the
    /// termination signal went out
    pub async fn release_self(self) {
        let Self {
            mut terminate_rx,
            terminate_tx,
            signal,
            ..
        } = self;
        drop(signal);
        drop(terminate_tx);
        let _ = terminate_rx.recv().await;
    }
}
