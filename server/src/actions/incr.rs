/*
 * Created on Mon Sep 25 2023
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

//! # `INCR` queries
//! This module provides functions to work with `INCR` queries

use super::keyspace_error;
use crate::corestore::{Corestore, Data};
use crate::protocol::Element;

/// Run an `INCR` query. An absent key is created as `1`
pub fn incr(handle: &Corestore, key: Data) -> Element {
    match handle.incr(&key) {
        Ok(next) => Element::Integer(next),
        Err(e) => keyspace_error(e),
    }
}
