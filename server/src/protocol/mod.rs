/*
 * Created on Sun Sep 17 2023
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

//! # The wire protocol
//!
//! This module implements the RESP framing that Vermilion speaks on the wire:
//! a prefix-typed, CRLF-terminated format where every frame begins with a tag
//! byte selecting its shape. The [`Element`] tree is the unit of both input
//! (a parsed request) and output (a reply); the [`Parser`] turns buffered
//! bytes into elements and the `resp` module turns elements back into bytes

use bytes::Bytes;

mod deserializer;
pub mod responses;

pub use deserializer::{ParseError, Parser};

/// The tag byte for simple strings (`+`)
pub const TSYMBOL_SIMPLE: u8 = b'+';
/// The tag byte for error strings (`-`)
pub const TSYMBOL_ERROR: u8 = b'-';
/// The tag byte for integers (`:`)
pub const TSYMBOL_INT: u8 = b':';
/// The tag byte for bulk strings (`$`)
pub const TSYMBOL_BULK: u8 = b'$';
/// The tag byte for arrays (`*`)
pub const TSYMBOL_ARRAY: u8 = b'*';

#[derive(Debug, Clone, PartialEq)]
/// A self-describing unit of the wire protocol. Arrays nest recursively, so a
/// single element is enough to describe a whole request or reply
pub enum Element {
    /// A short status line (`+OK\r\n`)
    Simple(String),
    /// An error status line (`-ERR ...\r\n`)
    Err(String),
    /// A signed 64-bit integer (`:42\r\n`)
    Integer(i64),
    /// A length-prefixed byte string (`$3\r\nfoo\r\n`)
    Bulk(Bytes),
    /// The null bulk string (`$-1\r\n`)
    Null,
    /// A counted sequence of nested elements (`*2\r\n...`)
    Array(Vec<Element>),
    /// The null array (`*-1\r\n`)
    NullArray,
}

impl Element {
    /// Returns the `+OK` status element
    pub fn okay() -> Self {
        Element::Simple("OK".to_owned())
    }
    /// Wrap an error message into an error element
    pub fn err(msg: impl Into<String>) -> Self {
        Element::Err(msg.into())
    }
    /// Wrap anything byte-like into a bulk element
    pub fn bulk(body: impl Into<Bytes>) -> Self {
        Element::Bulk(body.into())
    }
    /// Returns true if this element is an error status line
    pub fn is_err(&self) -> bool {
        matches!(self, Element::Err(_))
    }
}
