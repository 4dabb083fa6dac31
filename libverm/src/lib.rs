/*
 * Created on Sat Sep 16 2023
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

//! The shared library for Vermilion
//!
//! This contains the few items that are shared between the `server` binary and
//! any future tooling (shell, benchmarks): version metadata, the generic result
//! alias and terminal utilities

pub mod util;

use std::error::Error;

/// A generic result
pub type TResult<T> = Result<T, Box<dyn Error>>;

/// The version of this build
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// The project homepage
pub const URL: &str = "https://github.com/vermilion-db/vermilion";
/// The size of the per-connection read buffer in bytes
pub const BUF_CAP: usize = 8 * 1024; // 8 KB per-connection
