/*
 * Created on Wed Sep 27 2023
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

//! # Actions for hashes
//!
//! `HSET`, `HGET` and `HGETALL` over the field/value maps stored in the
//! keyspace. Field iteration order is whatever the map yields; it is stable
//! within a single reply and nothing more

use super::keyspace_error;
use crate::corestore::{Corestore, Data};
use crate::protocol::Element;

/// Run an `HSET` query, merging the given fields into the hash
pub fn hset(handle: &Corestore, key: Data, fields: Vec<(Data, Data)>) -> Element {
    match handle.hset(key, fields) {
        Ok(()) => Element::okay(),
        Err(e) => keyspace_error(e),
    }
}

/// Run an `HGET` query
pub fn hget(handle: &Corestore, key: Data, field: Data) -> Element {
    match handle.hget(&key, &field) {
        Ok(Some(value)) => Element::Bulk(value.into_blob()),
        Ok(None) => Element::Null,
        Err(e) => keyspace_error(e),
    }
}

/// Run an `HGETALL` query: a flat array of alternating field/value bulks,
/// empty for an absent key
pub fn hgetall(handle: &Corestore, key: Data) -> Element {
    match handle.hgetall(&key) {
        Ok(pairs) => {
            let mut flat = Vec::with_capacity(pairs.len() * 2);
            for (field, value) in pairs {
                flat.push(Element::Bulk(field.into_blob()));
                flat.push(Element::Bulk(value.into_blob()));
            }
            Element::Array(flat)
        }
        Err(e) => keyspace_error(e),
    }
}
