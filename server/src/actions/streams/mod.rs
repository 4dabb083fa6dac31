/*
 * Created on Thu Sep 28 2023
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

//! # Actions for streams
//!
//! `XADD`, `XRANGE`, `XREAD` and `XDEL`, plus the id grammars they accept.
//! Ids are composite `(ms, seq)` pairs written `ms-seq`; the range sentinels
//! `-` and `+` stand for the smallest and largest possible ids

pub mod xadd;
pub mod xdel;
pub mod xrange;
pub mod xread;

use crate::corestore::stream::{EntrySpec, StreamEntry, StreamId};
use crate::protocol::Element;

/// Parse an `XADD` id: `*`, `<ms>-*` or `<ms>-<seq>`
pub fn parse_entry_spec(raw: &[u8]) -> Option<EntrySpec> {
    if raw == b"*" {
        return Some(EntrySpec::Auto);
    }
    let at = raw.iter().position(|b| *b == b'-')?;
    let ms = parse_u64(&raw[..at])?;
    match &raw[at + 1..] {
        b"*" => Some(EntrySpec::AutoSeq(ms)),
        seq => Some(EntrySpec::Exact(StreamId::new(ms, parse_u64(seq)?))),
    }
}

/// Parse an exact `<ms>-<seq>` id (`XDEL`)
pub fn parse_exact_id(raw: &[u8]) -> Option<StreamId> {
    let at = raw.iter().position(|b| *b == b'-')?;
    Some(StreamId::new(
        parse_u64(&raw[..at])?,
        parse_u64(&raw[at + 1..])?,
    ))
}

/// Parse an `XRANGE` start bound: `-`, `<ms>` (seq 0) or `<ms>-<seq>`
pub fn parse_range_start(raw: &[u8]) -> Option<StreamId> {
    if raw == b"-" {
        return Some(StreamId::MIN);
    }
    parse_bound(raw, 0)
}

/// Parse an `XRANGE` end bound: `+`, `<ms>` (seq max) or `<ms>-<seq>`
pub fn parse_range_end(raw: &[u8]) -> Option<StreamId> {
    if raw == b"+" {
        return Some(StreamId::MAX);
    }
    parse_bound(raw, u64::MAX)
}

/// Parse an `XREAD` position: `<ms>` (seq 0) or `<ms>-<seq>`; entries strictly
/// after this id are returned
pub fn parse_read_from(raw: &[u8]) -> Option<StreamId> {
    parse_bound(raw, 0)
}

fn parse_bound(raw: &[u8], default_seq: u64) -> Option<StreamId> {
    match raw.iter().position(|b| *b == b'-') {
        Some(at) => Some(StreamId::new(
            parse_u64(&raw[..at])?,
            parse_u64(&raw[at + 1..])?,
        )),
        None => Some(StreamId::new(parse_u64(raw)?, default_seq)),
    }
}

fn parse_u64(raw: &[u8]) -> Option<u64> {
    if raw.is_empty() {
        return None;
    }
    std::str::from_utf8(raw).ok()?.parse().ok()
}

/// Shape one entry as its `[id, [field, value, ...]]` reply form
pub fn entry_element((id, fields): StreamEntry) -> Element {
    let mut flat = Vec::with_capacity(fields.len() * 2);
    for (field, value) in fields {
        flat.push(Element::Bulk(field.into_blob()));
        flat.push(Element::Bulk(value.into_blob()));
    }
    Element::Array(vec![
        Element::bulk(id.to_string()),
        Element::Array(flat),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_spec_grammar() {
        assert_eq!(parse_entry_spec(b"*"), Some(EntrySpec::Auto));
        assert_eq!(parse_entry_spec(b"5-*"), Some(EntrySpec::AutoSeq(5)));
        assert_eq!(
            parse_entry_spec(b"5-12"),
            Some(EntrySpec::Exact(StreamId::new(5, 12)))
        );
        assert_eq!(parse_entry_spec(b"5"), None);
        assert_eq!(parse_entry_spec(b"5-"), None);
        assert_eq!(parse_entry_spec(b"a-1"), None);
    }

    #[test]
    fn test_range_bound_grammar() {
        assert_eq!(parse_range_start(b"-"), Some(StreamId::MIN));
        assert_eq!(parse_range_end(b"+"), Some(StreamId::MAX));
        assert_eq!(parse_range_start(b"7"), Some(StreamId::new(7, 0)));
        assert_eq!(parse_range_end(b"7"), Some(StreamId::new(7, u64::MAX)));
        assert_eq!(parse_range_end(b"7-3"), Some(StreamId::new(7, 3)));
        assert_eq!(parse_range_start(b"x"), None);
    }
}
