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

//! # Responses
//!
//! Error message texts and a handful of pre-encoded whole frames. Everything
//! a client can see on a failure path is collected here so that the exact
//! wording lives in one place

pub mod groups {
    //! Error message texts (the payload of `-...\r\n` frames)
    /// Returned when a value that should hold a decimal integer doesn't
    pub const NOT_AN_INT: &str = "ERR value is not an integer or out of range";
    /// Returned on any malformed option/flag combination
    pub const SYNTAX_ERR: &str = "ERR syntax error";
    /// Returned when a command is applied to a key of the wrong type
    pub const WRONGTYPE_ERR: &str =
        "WRONGTYPE Operation against a key holding the wrong kind of value";
    /// Returned for `XADD` with the reserved `0-0` id
    pub const XADD_ID_TOO_SMALL: &str =
        "ERR The ID specified in XADD must be greater than 0-0";
    /// Returned for an `XADD` id that doesn't advance the stream
    pub const XADD_ID_NOT_GREATER: &str =
        "ERR The ID specified in XADD is equal or smaller than the target stream top item";
    /// Returned for a `MULTI` inside an open transaction
    pub const MULTI_NESTED: &str = "ERR MULTI calls can not be nested";
    /// Returned for an `EXEC` with no open transaction
    pub const EXEC_WITHOUT_MULTI: &str = "ERR EXEC without MULTI";
    /// Returned for a `DISCARD` with no open transaction
    pub const DISCARD_WITHOUT_MULTI: &str = "ERR DISCARD without MULTI";
    /// Returned when a stream id fails to parse at all
    pub const BAD_STREAM_ID: &str =
        "ERR Invalid stream ID specified as stream command argument";
}

pub mod full_responses {
    #![allow(unused)]
    //! Pre-encoded **complete** frames that can be written to the stream
    //! as-is
    /// The `+OK\r\n` status frame
    pub const R_OKAY: &[u8] = b"+OK\r\n";
    /// The `+PONG\r\n` status frame
    pub const R_PONG: &[u8] = b"+PONG\r\n";
    /// The `+QUEUED\r\n` status frame
    pub const R_QUEUED: &[u8] = b"+QUEUED\r\n";
    /// The null bulk frame
    pub const R_NIL: &[u8] = b"$-1\r\n";
    /// Sent before closing a connection that produced a corrupt frame
    pub const R_PROTOCOL_ERR: &[u8] = b"-ERR Protocol error: invalid frame\r\n";
}

/// Render the arity error for the named command
pub fn wrongargs(cmd: &str) -> String {
    format!(
        "ERR wrong number of arguments for '{}' command",
        cmd.to_lowercase()
    )
}

/// Render the unknown-command error
pub fn unknown_command(cmd: &str) -> String {
    format!("ERR unknown command '{cmd}'")
}

/// Render the unknown-subcommand error
pub fn unknown_subcommand(sub: &str) -> String {
    format!("ERR unknown subcommand '{sub}'")
}
