/*
 * Created on Wed Oct 04 2023
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

//! # Disk storage
//!
//! Vermilion's only disk interaction is reading a snapshot at startup: when
//! both `--dir` and `--dbfilename` are configured, the file is decoded once
//! and every entry is seeded into the keyspace through
//! [`Corestore::seed`](crate::corestore::Corestore::seed). There is no
//! background persistence

pub mod rdb;

use crate::config::ConfigurationSet;
use crate::corestore::Corestore;
use crate::util::error::{Error, VermResult};
use std::fs;
use std::io::ErrorKind;

/// Load the configured snapshot into the keyspace, returning the number of
/// entries seeded. A missing file is a fresh start, not an error
pub fn load_snapshot(cfg: &ConfigurationSet, db: &Corestore) -> VermResult<usize> {
    let Some(path) = cfg.snapshot_path() else {
        return Ok(0);
    };
    let payload = match fs::read(&path) {
        Ok(payload) => payload,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("No snapshot at {}; starting empty", path.display());
            return Ok(0);
        }
        Err(e) => {
            return Err(Error::ioerror_extra(
                e,
                format!("reading snapshot {}", path.display()),
            ))
        }
    };
    let mut seeded = 0;
    rdb::decode(&payload, |key, value, expiry_ms| {
        db.seed(key.into(), value.into(), expiry_ms);
        seeded += 1;
    })
    .map_err(|e| Error::Snapshot(e.to_string()))?;
    log::info!("Seeded {seeded} entries from {}", path.display());
    Ok(seeded)
}
