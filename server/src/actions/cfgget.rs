/*
 * Created on Tue Sep 26 2023
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

//! # `CONFIG GET` queries
//!
//! Serves the handful of startup settings that snapshot tooling asks for.
//! The values come from the configuration record built at startup, never
//! from raw process arguments

use crate::config::ConfigurationSet;
use crate::corestore::Data;
use crate::protocol::Element;

/// Run a `CONFIG GET` query: replies `[param, value]`, with a null bulk for
/// a parameter that was never configured
pub fn cfgget(cfg: &ConfigurationSet, param: Data) -> Element {
    let value = match &*param {
        b"dir" => cfg.dir.clone(),
        b"dbfilename" => cfg.dbfilename.clone(),
        other => {
            return Element::err(format!(
                "ERR unknown CONFIG parameter '{}'",
                String::from_utf8_lossy(other)
            ))
        }
    };
    Element::Array(vec![
        Element::Bulk(param.into_blob()),
        match value {
            Some(value) => Element::bulk(value.into_bytes()),
            None => Element::Null,
        },
    ])
}
