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

//! # `KEYS` queries
//! This module provides functions to work with `KEYS` queries. The pattern
//! argument uses glob semantics (`*`, `?`, `[...]`), matched here by
//! translating the glob into an anchored regular expression over the key's
//! lossy-UTF-8 rendering

use crate::corestore::{Corestore, Data};
use crate::protocol::Element;
use regex::Regex;

/// Run a `KEYS` query. Expired entries the walk encounters are pruned and
/// never listed
pub fn keys(handle: &Corestore, pattern: Data) -> Element {
    let matcher = glob_to_regex(&pattern.as_string_lossy());
    let listing = handle
        .keys()
        .into_iter()
        .filter(|key| match &matcher {
            Some(re) => re.is_match(&key.as_string_lossy()),
            // an unparseable pattern matches nothing
            None => false,
        })
        .map(|key| Element::Bulk(key.into_blob()))
        .collect();
    Element::Array(listing)
}

/// Translate a glob pattern into an anchored regex. `*` matches any run of
/// characters, `?` matches one, `[...]` passes through as a character class
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut in_class = false;
    for ch in pattern.chars() {
        match ch {
            '*' if !in_class => expr.push_str(".*"),
            '?' if !in_class => expr.push('.'),
            '[' => {
                in_class = true;
                expr.push('[');
            }
            ']' => {
                in_class = false;
                expr.push(']');
            }
            // regex metacharacters that globs treat literally
            '.' | '+' | '(' | ')' | '{' | '}' | '^' | '$' | '|' | '\\' if !in_class => {
                expr.push('\\');
                expr.push(ch);
            }
            ch => expr.push(ch),
        }
    }
    expr.push('$');
    Regex::new(&expr).ok()
}
