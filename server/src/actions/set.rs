/*
 * Created on Sun Sep 24 2023
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

//! # `SET` queries
//! This module provides functions to work with `SET` queries

use crate::corestore::{Corestore, Data};
use crate::protocol::Element;
use crate::util;

/// Run a `SET` query. The time-to-live, if any, was already normalized to
/// milliseconds by the parser; it becomes an absolute wall-clock expiry here
pub fn set(handle: &Corestore, key: Data, body: Data, ttl_ms: Option<u64>) -> Element {
    let expires_at = ttl_ms.map(|ttl| util::now_ms().saturating_add(ttl));
    handle.set(key, body, expires_at);
    Element::okay()
}
