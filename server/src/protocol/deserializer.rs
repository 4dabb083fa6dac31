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

//! This module provides deserialization primitives for request frames
//!
//! The parser operates on whatever the connection has buffered so far. If the
//! buffer doesn't yet hold a complete frame, parsing stops with
//! [`ParseError::NotEnough`] and the caller reads more bytes; nothing is
//! consumed until a full frame is available

use super::Element;
use bytes::Bytes;

/// The maximum number of bytes a single bulk string may carry (512 MB, the
/// same ceiling the reference protocol imposes)
const MAX_BULK_SIZE: i64 = 512 * 1024 * 1024;

#[derive(Debug, PartialEq)]
/// Outcome categories for a failed parse attempt
pub enum ParseError {
    /// The buffer is empty
    Empty,
    /// The buffer holds an incomplete frame; read more bytes and retry
    NotEnough,
    /// The frame is corrupted: a bad length, a missing CRLF or a non-numeric
    /// header where a number was expected
    BadPacket,
    /// The tag byte doesn't name a known frame shape
    UnknownTag(u8),
}

/// A zero-copy-ish parser over a byte buffer. Create one per parse attempt;
/// on success it reports how many bytes the frame consumed so the connection
/// can advance its buffer
pub struct Parser<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> Parser<'a> {
    pub const fn new(buffer: &'a [u8]) -> Self {
        Parser { buffer, cursor: 0 }
    }
    /// Attempt to parse one complete frame, returning it along with the
    /// number of bytes to discard from the buffer
    pub fn parse(mut self) -> Result<(Element, usize), ParseError> {
        if self.buffer.is_empty() {
            return Err(ParseError::Empty);
        }
        let element = self.next_element()?;
        Ok((element, self.cursor))
    }
    /// Parse the next element at the cursor, consuming it
    fn next_element(&mut self) -> Result<Element, ParseError> {
        let tag = self.next_byte()?;
        match tag {
            super::TSYMBOL_SIMPLE => {
                let line = self.read_line()?;
                Ok(Element::Simple(utf8_line(line)?))
            }
            super::TSYMBOL_ERROR => {
                let line = self.read_line()?;
                Ok(Element::Err(utf8_line(line)?))
            }
            super::TSYMBOL_INT => {
                let line = self.read_line()?;
                Ok(Element::Integer(parse_decimal(line)?))
            }
            super::TSYMBOL_BULK => self.next_bulk(),
            super::TSYMBOL_ARRAY => self.next_array(),
            other => Err(ParseError::UnknownTag(other)),
        }
    }
    fn next_bulk(&mut self) -> Result<Element, ParseError> {
        let size = parse_decimal(self.read_line()?)?;
        if size == -1 {
            return Ok(Element::Null);
        }
        if size < 0 || size > MAX_BULK_SIZE {
            return Err(ParseError::BadPacket);
        }
        let size = size as usize;
        // the body is followed by its own CRLF
        if self.remaining() < size + 2 {
            return Err(ParseError::NotEnough);
        }
        let body = &self.buffer[self.cursor..self.cursor + size];
        if &self.buffer[self.cursor + size..self.cursor + size + 2] != b"\r\n" {
            return Err(ParseError::BadPacket);
        }
        self.cursor += size + 2;
        Ok(Element::Bulk(Bytes::copy_from_slice(body)))
    }
    fn next_array(&mut self) -> Result<Element, ParseError> {
        let count = parse_decimal(self.read_line()?)?;
        if count == -1 {
            return Ok(Element::NullArray);
        }
        if count < 0 || count > MAX_BULK_SIZE {
            return Err(ParseError::BadPacket);
        }
        // don't trust the header count for the pre-allocation
        let mut items = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            items.push(self.next_element()?);
        }
        Ok(Element::Array(items))
    }
    /// Read the tag byte at the cursor
    fn next_byte(&mut self) -> Result<u8, ParseError> {
        match self.buffer.get(self.cursor) {
            Some(byte) => {
                self.cursor += 1;
                Ok(*byte)
            }
            None => Err(ParseError::NotEnough),
        }
    }
    /// Read bytes up to (but not including) the next CRLF, consuming the CRLF
    fn read_line(&mut self) -> Result<&'a [u8], ParseError> {
        let haystack = &self.buffer[self.cursor..];
        match haystack.windows(2).position(|window| window == b"\r\n") {
            Some(at) => {
                let line = &haystack[..at];
                self.cursor += at + 2;
                Ok(line)
            }
            None => Err(ParseError::NotEnough),
        }
    }
    fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }
}

/// Parse an ASCII signed decimal header line
fn parse_decimal(line: &[u8]) -> Result<i64, ParseError> {
    if line.is_empty() {
        return Err(ParseError::BadPacket);
    }
    std::str::from_utf8(line)
        .map_err(|_| ParseError::BadPacket)?
        .parse()
        .map_err(|_| ParseError::BadPacket)
}

/// Status lines are required to be UTF-8; binary payloads belong in bulks
fn utf8_line(line: &[u8]) -> Result<String, ParseError> {
    String::from_utf8(line.to_vec()).map_err(|_| ParseError::BadPacket)
}
