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

//! # Connection handling
//!
//! A [`Connection`] pairs a buffered socket with the incremental frame
//! parser: it keeps reading until the buffer holds one complete frame, hands
//! the frame up and advances past it. The [`ConnectionHandler`] owns the
//! per-connection state (transaction queue, replica registration) and runs
//! the read → execute → reply loop until disconnect or shutdown.
//!
//! A connection that issued `REPLCONF` additionally pumps the replication
//! queue: frames the fan-out task forwards for it are written out between
//! client requests

use super::Terminator;
use crate::config::ConfigurationSet;
use crate::corestore::Corestore;
use crate::protocol::{responses::full_responses, ParseError, Parser};
use crate::queryengine::{self, ClientState};
use crate::replication::ReplHandle;
use crate::resp::Writable;
use bytes::{Buf, BytesMut};
use libverm::BUF_CAP;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Semaphore};

/// This is a "marker trait" that ensures that no silly types are passed into
/// the [`Connection`] type
pub trait BufferedSocketStream: AsyncReadExt + AsyncWriteExt + Unpin + Send {}

impl BufferedSocketStream for TcpStream {}

/// Result of [`Connection::read_query`]
pub enum QueryResult {
    /// A complete frame, ready to execute
    Q(crate::protocol::Element),
    /// The client sent something the codec can't parse; the connection is
    /// beyond saving
    BadFrame,
    /// The client hung up cleanly
    Disconnected,
}

/// A buffered connection to a client
pub struct Connection<C> {
    stream: BufWriter<C>,
    buffer: BytesMut,
}

impl<C: BufferedSocketStream> Connection<C> {
    pub fn new(stream: C) -> Self {
        Connection {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(BUF_CAP),
        }
    }
    /// Read bytes until the buffer holds one complete frame
    pub async fn read_query(&mut self) -> IoResult<QueryResult> {
        loop {
            match Parser::new(&self.buffer).parse() {
                Ok((frame, forward_by)) => {
                    self.buffer.advance(forward_by);
                    return Ok(QueryResult::Q(frame));
                }
                Err(ParseError::Empty) | Err(ParseError::NotEnough) => {
                    if self.stream.read_buf(&mut self.buffer).await? == 0 {
                        return if self.buffer.is_empty() {
                            Ok(QueryResult::Disconnected)
                        } else {
                            // the peer vanished mid-frame
                            Err(IoError::from(ErrorKind::ConnectionReset))
                        };
                    }
                }
                Err(_) => return Ok(QueryResult::BadFrame),
            }
        }
    }
    pub async fn write_response(&mut self, payload: &[u8]) -> IoResult<()> {
        self.stream.write_all(payload).await
    }
    pub async fn flush_stream(&mut self) -> IoResult<()> {
        self.stream.flush().await
    }
}

/// A generic connection handler: one is spawned per accepted connection
pub struct ConnectionHandler<C> {
    /// an atomic reference to the shared in-memory engine
    db: Corestore,
    /// the startup configuration (`CONFIG GET` serves from this)
    cfg: Arc<ConfigurationSet>,
    /// a handle to the replication fan-out
    repl: ReplHandle,
    /// the connection
    con: Connection<C>,
    /// the transaction state machine for this client
    cstate: ClientState,
    /// the semaphore used to impose limits on number of connections
    climit: Arc<Semaphore>,
    /// check for termination signals
    terminator: Terminator,
    /// the sender we drop when we're done with handling a connection (used
    /// for graceful exit)
    _term_sig_tx: mpsc::Sender<()>,
}

impl<C: BufferedSocketStream> ConnectionHandler<C> {
    pub fn new(
        db: Corestore,
        cfg: Arc<ConfigurationSet>,
        repl: ReplHandle,
        con: Connection<C>,
        climit: Arc<Semaphore>,
        terminator: Terminator,
        _term_sig_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            db,
            cfg,
            repl,
            con,
            cstate: ClientState::new(),
            climit,
            terminator,
            _term_sig_tx,
        }
    }
    pub async fn run(&mut self) -> IoResult<()> {
        // present once this connection has registered as a follower
        let mut replica_rx: Option<mpsc::Receiver<Vec<u8>>> = None;
        while !self.terminator.is_termination_signal() {
            tokio::select! {
                query = self.con.read_query() => {
                    match query? {
                        QueryResult::Q(frame) => {
                            if !self.execute(frame, &mut replica_rx).await? {
                                return Ok(());
                            }
                        }
                        QueryResult::BadFrame => {
                            log::debug!("Closing connection that sent a corrupt frame");
                            self.con.write_response(full_responses::R_PROTOCOL_ERR).await?;
                            self.con.flush_stream().await?;
                            return Ok(());
                        }
                        QueryResult::Disconnected => return Ok(()),
                    }
                }
                forwarded = recv_forwarded(&mut replica_rx) => {
                    match forwarded {
                        Some(frame) => {
                            self.con.write_response(&frame).await?;
                            self.con.flush_stream().await?;
                        }
                        // the fan-out dropped us (we stopped draining fast
                        // enough); nothing sensible left to do
                        None => return Ok(()),
                    }
                }
                _ = self.terminator.receive_signal() => return Ok(()),
            }
        }
        Ok(())
    }
    /// Run one frame through the query engine and apply its outcome. Returns
    /// false if the connection must close
    async fn execute(
        &mut self,
        frame: crate::protocol::Element,
        replica_rx: &mut Option<mpsc::Receiver<Vec<u8>>>,
    ) -> IoResult<bool> {
        let outcome = match queryengine::execute_frame(
            &self.db,
            &self.cfg,
            self.repl.id(),
            &mut self.cstate,
            frame,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                log::debug!("Closing connection that sent a malformed request");
                self.con.write_response(full_responses::R_PROTOCOL_ERR).await?;
                self.con.flush_stream().await?;
                return Ok(false);
            }
        };
        self.con.write_response(&outcome.reply.encode()).await?;
        self.con.flush_stream().await?;
        for frame in outcome.propagate {
            self.repl.propagate(frame).await;
        }
        if outcome.attach_replica && replica_rx.is_none() {
            *replica_rx = Some(self.repl.attach().await);
        }
        Ok(true)
    }
}

/// Wait on the replica queue when there is one; otherwise stay pending so the
/// select never takes this branch
async fn recv_forwarded(rx: &mut Option<mpsc::Receiver<Vec<u8>>>) -> Option<Vec<u8>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl<C> Drop for ConnectionHandler<C> {
    fn drop(&mut self) {
        // Make sure that the permit is returned to the semaphore
        // in the case that there is a panic inside
        self.climit.add_permits(1);
    }
}
