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

//! # `XRANGE` queries
//! This module provides functions to work with `XRANGE` queries

use super::super::keyspace_error;
use super::entry_element;
use crate::corestore::stream::StreamId;
use crate::corestore::{Corestore, Data};
use crate::protocol::Element;

/// Run an `XRANGE` query: every entry with `start <= id <= end`, in id order.
/// An absent key yields an empty array
pub fn xrange(handle: &Corestore, key: Data, start: StreamId, end: StreamId) -> Element {
    match handle.get_stream(&key) {
        Ok(Some(stream)) => Element::Array(
            stream
                .range(start, end)
                .into_iter()
                .map(entry_element)
                .collect(),
        ),
        Ok(None) => Element::Array(Vec::new()),
        Err(e) => keyspace_error(e),
    }
}
