/*
 * Created on Wed Oct 04 2023
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

//! # The snapshot decoder
//!
//! Decodes the subset of the RDB format that the keyspace can actually hold:
//! string entries, with or without an expiry. Aux fields, database selectors
//! and resize hints are skipped over; any richer value type aborts the load.
//! The decoder walks the payload once and invokes `set(key, value,
//! expiry_ms)` per entry, with `expiry_ms == 0` meaning "no expiration"
//! (an absolute unix-millisecond timestamp otherwise)

use crc::{Crc, CRC_64_REDIS};
use std::fmt;

const MAGIC: &[u8] = b"REDIS";

// opcodes
const OP_AUX: u8 = 0xFA;
const OP_RESIZEDB: u8 = 0xFB;
const OP_EXPIRETIME_MS: u8 = 0xFC;
const OP_EXPIRETIME_SEC: u8 = 0xFD;
const OP_SELECTDB: u8 = 0xFE;
const OP_EOF: u8 = 0xFF;
/// The only value type the keyspace can be seeded with
const TYPE_STRING: u8 = 0;

#[derive(Debug, PartialEq)]
pub enum RdbError {
    /// The payload ended before the structure did
    Truncated,
    /// The magic/version preamble is wrong
    BadHeader,
    /// The trailing CRC-64 doesn't match the payload
    BadChecksum,
    /// A structure this decoder doesn't support
    Unsupported(&'static str),
}

impl fmt::Display for RdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "unexpected end of snapshot"),
            Self::BadHeader => write!(f, "not a snapshot file (bad header)"),
            Self::BadChecksum => write!(f, "snapshot checksum mismatch"),
            Self::Unsupported(what) => write!(f, "unsupported snapshot structure: {what}"),
        }
    }
}

/// Decode `payload`, invoking `set` once per entry
pub fn decode<F>(payload: &[u8], mut set: F) -> Result<(), RdbError>
where
    F: FnMut(Vec<u8>, Vec<u8>, u64),
{
    let mut reader = Reader {
        payload,
        cursor: 0,
    };
    reader.header()?;
    let mut expiry_ms: u64 = 0;
    loop {
        match reader.u8()? {
            OP_EOF => {
                reader.checksum()?;
                return Ok(());
            }
            OP_SELECTDB => {
                let _db = reader.length()?;
            }
            OP_RESIZEDB => {
                let _table = reader.length()?;
                let _expires = reader.length()?;
            }
            OP_AUX => {
                let _field = reader.string()?;
                let _value = reader.string()?;
            }
            OP_EXPIRETIME_SEC => {
                expiry_ms = u64::from(reader.u32_le()?) * 1000;
            }
            OP_EXPIRETIME_MS => {
                expiry_ms = reader.u64_le()?;
            }
            TYPE_STRING => {
                let key = reader.string()?;
                let value = reader.string()?;
                set(key, value, expiry_ms);
                expiry_ms = 0;
            }
            _ => return Err(RdbError::Unsupported("non-string value type")),
        }
    }
}

struct Reader<'a> {
    payload: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn header(&mut self) -> Result<(), RdbError> {
        let magic = self.bytes(MAGIC.len()).map_err(|_| RdbError::BadHeader)?;
        if magic != MAGIC {
            return Err(RdbError::BadHeader);
        }
        let version = self.bytes(4).map_err(|_| RdbError::BadHeader)?;
        if !version.iter().all(u8::is_ascii_digit) {
            return Err(RdbError::BadHeader);
        }
        Ok(())
    }
    /// Verify the 8 trailing checksum bytes against everything before them
    /// (including the EOF opcode). An all-zero checksum means the writer had
    /// checksumming disabled
    fn checksum(&mut self) -> Result<(), RdbError> {
        let body_end = self.cursor;
        let stored = self.u64_le()?;
        if stored == 0 {
            return Ok(());
        }
        let crc = Crc::<u64>::new(&CRC_64_REDIS);
        if crc.checksum(&self.payload[..body_end]) != stored {
            return Err(RdbError::BadChecksum);
        }
        Ok(())
    }
    fn u8(&mut self) -> Result<u8, RdbError> {
        self.bytes(1).map(|raw| raw[0])
    }
    fn u32_le(&mut self) -> Result<u32, RdbError> {
        self.bytes(4)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
    fn u64_le(&mut self) -> Result<u64, RdbError> {
        let raw = self.bytes(8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(raw);
        Ok(u64::from_le_bytes(word))
    }
    fn bytes(&mut self, n: usize) -> Result<&'a [u8], RdbError> {
        let end = self.cursor.checked_add(n).ok_or(RdbError::Truncated)?;
        if end > self.payload.len() {
            return Err(RdbError::Truncated);
        }
        let raw = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(raw)
    }
    /// A length-encoded size or, for the `11` discriminator, an inline
    /// integer encoding
    fn length(&mut self) -> Result<Len, RdbError> {
        let lead = self.u8()?;
        match lead >> 6 {
            0b00 => Ok(Len::Plain(usize::from(lead & 0x3F))),
            0b01 => {
                let low = self.u8()?;
                Ok(Len::Plain(usize::from(lead & 0x3F) << 8 | usize::from(low)))
            }
            0b10 => {
                let raw = self.bytes(4)?;
                Ok(Len::Plain(
                    u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize,
                ))
            }
            _ => match lead & 0x3F {
                0 => Ok(Len::Int(i64::from(self.u8()? as i8))),
                1 => {
                    let raw = self.bytes(2)?;
                    Ok(Len::Int(i64::from(i16::from_le_bytes([raw[0], raw[1]]))))
                }
                2 => {
                    let raw = self.bytes(4)?;
                    Ok(Len::Int(i64::from(i32::from_le_bytes([
                        raw[0], raw[1], raw[2], raw[3],
                    ]))))
                }
                _ => Err(RdbError::Unsupported("compressed string")),
            },
        }
    }
    /// A string payload: either raw bytes or an integer rendered in decimal
    fn string(&mut self) -> Result<Vec<u8>, RdbError> {
        match self.length()? {
            Len::Plain(n) => self.bytes(n).map(<[u8]>::to_vec),
            Len::Int(int) => Ok(int.to_string().into_bytes()),
        }
    }
}

enum Len {
    Plain(usize),
    Int(i64),
}
