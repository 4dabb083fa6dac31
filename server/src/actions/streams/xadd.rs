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

//! # `XADD` queries
//! This module provides functions to work with `XADD` queries

use super::super::keyspace_error;
use crate::corestore::stream::{AddError, EntrySpec, StreamId};
use crate::corestore::{Corestore, Data};
use crate::protocol::{responses::groups, Element};
use crate::util;

/// Run an `XADD` query, creating the stream if the key is absent. Replies
/// with the id assigned to the new entry
pub fn xadd(handle: &Corestore, key: Data, spec: EntrySpec, fields: Vec<(Data, Data)>) -> Element {
    // refuse the reserved id before creating anything under the key
    if spec == EntrySpec::Exact(StreamId::MIN) {
        return Element::err(groups::XADD_ID_TOO_SMALL);
    }
    let stream = match handle.get_or_create_stream(key) {
        Ok(stream) => stream,
        Err(e) => return keyspace_error(e),
    };
    match stream.append(spec, fields, util::now_ms()) {
        Ok(id) => Element::bulk(id.to_string()),
        Err(AddError::ReservedId) => Element::err(groups::XADD_ID_TOO_SMALL),
        Err(AddError::NotGreater) => Element::err(groups::XADD_ID_NOT_GREATER),
    }
}
