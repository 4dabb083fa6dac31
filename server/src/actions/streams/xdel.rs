/*
 * Created on Fri Sep 29 2023
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

//! # `XDEL` queries
//! This module provides functions to work with `XDEL` queries

use super::super::keyspace_error;
use crate::corestore::stream::StreamId;
use crate::corestore::{Corestore, Data};
use crate::protocol::Element;

/// Run an `XDEL` query: remove entries by exact id, replying with how many
/// were actually removed. Remaining entries keep their order and the stream
/// keeps its top id, so removals never allow ids to move backwards
pub fn xdel(handle: &Corestore, key: Data, ids: Vec<StreamId>) -> Element {
    match handle.get_stream(&key) {
        Ok(Some(stream)) => {
            let removed = ids.into_iter().filter(|id| stream.remove(*id)).count();
            Element::Integer(removed as i64)
        }
        Ok(None) => Element::Integer(0),
        Err(e) => keyspace_error(e),
    }
}
