/*
 * Created on Mon Sep 18 2023
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

//! Utilities for generating responses, which are only used by the `server`
//!
//! Replies are first shaped as [`Element`] trees (so that `EXEC` can collect
//! them and replication can re-frame them) and serialized here in one shot
//! before being written to the socket

use crate::corestore::Data;
use crate::protocol::{
    Element, TSYMBOL_ARRAY, TSYMBOL_BULK, TSYMBOL_ERROR, TSYMBOL_INT, TSYMBOL_SIMPLE,
};

/// # The `Writable` trait
///
/// Implementors know how to serialize themselves into the wire format. The
/// serialization is total: any tree of supported elements produces a valid
/// frame, and a parse of that frame yields an equal tree
pub trait Writable {
    /// Append the wire form of `self` to `buf`
    fn encode_into(&self, buf: &mut Vec<u8>);
    /// Serialize into a fresh buffer
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }
}

impl Writable for Element {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Element::Simple(line) => {
                buf.push(TSYMBOL_SIMPLE);
                buf.extend_from_slice(line.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Element::Err(line) => {
                buf.push(TSYMBOL_ERROR);
                buf.extend_from_slice(line.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Element::Integer(int) => {
                buf.push(TSYMBOL_INT);
                buf.extend_from_slice(int.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Element::Bulk(body) => {
                buf.push(TSYMBOL_BULK);
                buf.extend_from_slice(body.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(body);
                buf.extend_from_slice(b"\r\n");
            }
            Element::Null => buf.extend_from_slice(b"$-1\r\n"),
            Element::Array(items) => {
                buf.push(TSYMBOL_ARRAY);
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    item.encode_into(buf);
                }
            }
            Element::NullArray => buf.extend_from_slice(b"*-1\r\n"),
        }
    }
}

/// Re-frame a `(name, args)` pair as the array-of-bulks request frame a client
/// would have sent. Used to hand write commands to the replication fan-out
pub fn encode_command_frame(name: &Data, args: &[Data]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(TSYMBOL_ARRAY);
    buf.extend_from_slice((args.len() + 1).to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    encode_bulk_body(name, &mut buf);
    for arg in args {
        encode_bulk_body(arg, &mut buf);
    }
    buf
}

fn encode_bulk_body(body: &Data, buf: &mut Vec<u8>) {
    buf.push(TSYMBOL_BULK);
    buf.extend_from_slice(body.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(body);
    buf.extend_from_slice(b"\r\n");
}
