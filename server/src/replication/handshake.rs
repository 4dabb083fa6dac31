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

//! # The follower handshake
//!
//! With `--replicaof` set, this node introduces itself to the upstream with
//! four frames, awaiting the upstream's reply to each before sending the
//! next:
//!
//! 1. `PING`
//! 2. `REPLCONF listening-port <port>`
//! 3. `REPLCONF capa psync2`
//! 4. `PSYNC ? -1`
//!
//! The replies themselves are only logged; once the handshake is through the
//! link stays open and whatever the upstream pushes is drained and discarded

use crate::config::UpstreamAddr;
use crate::corestore::Data;
use crate::protocol::{Element, ParseError, Parser};
use crate::resp::encode_command_frame;
use crate::util::error::{Error, VermResult};
use bytes::{Buf, BytesMut};
use libverm::BUF_CAP;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

/// Connect to the upstream and run the handshake, then keep draining the
/// link until the upstream hangs up
pub async fn run(upstream: UpstreamAddr, listening_port: u16) -> VermResult<()> {
    let stream = TcpStream::connect((upstream.host.as_str(), upstream.port))
        .await
        .map_err(|e| {
            Error::ioerror_extra(e, format!("connecting to upstream {}", upstream.host))
        })?;
    let mut link = UpstreamLink::new(stream);
    let steps: [(&str, Vec<Data>); 4] = [
        ("PING", vec![]),
        (
            "REPLCONF",
            vec![
                Data::from("listening-port"),
                Data::from(listening_port.to_string()),
            ],
        ),
        ("REPLCONF", vec![Data::from("capa"), Data::from("psync2")]),
        ("PSYNC", vec![Data::from("?"), Data::from("-1")]),
    ];
    for (name, args) in steps {
        let reply = link.roundtrip(name, &args).await?;
        log::debug!("Upstream replied to {name} with {reply:?}");
    }
    log::info!(
        "Completed the follower handshake with {}:{}",
        upstream.host,
        upstream.port
    );
    link.drain().await
}

/// A buffered connection to the upstream, just enough to send one frame and
/// read back one reply
struct UpstreamLink {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl UpstreamLink {
    fn new(stream: TcpStream) -> Self {
        UpstreamLink {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(BUF_CAP),
        }
    }
    /// Send one command frame and wait for the next complete reply frame
    async fn roundtrip(&mut self, name: &str, args: &[Data]) -> VermResult<Element> {
        let frame = encode_command_frame(&Data::from(name), args);
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        loop {
            match Parser::new(&self.buffer).parse() {
                Ok((reply, forward_by)) => {
                    self.buffer.advance(forward_by);
                    return Ok(reply);
                }
                Err(ParseError::Empty) | Err(ParseError::NotEnough) => {
                    if self.stream.read_buf(&mut self.buffer).await? == 0 {
                        return Err(Error::IoError(std::io::Error::from(
                            std::io::ErrorKind::ConnectionReset,
                        )));
                    }
                }
                Err(e) => {
                    return Err(Error::Replication(format!(
                        "upstream sent an unparseable reply: {e:?}"
                    )))
                }
            }
        }
    }
    /// Swallow whatever the upstream keeps sending (a full resync payload,
    /// propagated writes) until the link closes
    async fn drain(mut self) -> VermResult<()> {
        loop {
            self.buffer.clear();
            let read = self.stream.read_buf(&mut self.buffer).await?;
            if read == 0 {
                log::info!("Upstream closed the replication link");
                return Ok(());
            }
            log::debug!("Drained {read} bytes from the upstream");
        }
    }
}
