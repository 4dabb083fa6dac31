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

//! # Actions
//!
//! Actions are the command implementations: each takes the typed arguments
//! that the query engine's parser produced and returns the reply [`Element`].
//! Actions may mutate the keyspace; they never touch the connection, which is
//! what lets `EXEC` collect their replies into one array

pub mod cfgget;
pub mod del;
pub mod get;
pub mod hashes;
pub mod incr;
pub mod keys;
pub mod set;
pub mod streams;
pub mod typecmd;

use crate::corestore::KeyspaceError;
use crate::protocol::{responses::groups, Element};

/// Translate a keyspace error into its reply frame
pub fn keyspace_error(e: KeyspaceError) -> Element {
    match e {
        KeyspaceError::WrongType => Element::err(groups::WRONGTYPE_ERR),
        KeyspaceError::NotAnInteger => Element::err(groups::NOT_AN_INT),
    }
}

pub mod ping {
    //! Respond to `PING` queries
    use crate::corestore::Data;
    use crate::protocol::Element;
    pub fn ping(message: Option<Data>) -> Element {
        match message {
            Some(message) => Element::Simple(message.as_string_lossy()),
            None => Element::Simple("PONG".to_owned()),
        }
    }
}

pub mod echo {
    //! Respond to `ECHO` queries
    use crate::corestore::Data;
    use crate::protocol::Element;
    pub fn echo(message: Data) -> Element {
        Element::Simple(message.as_string_lossy())
    }
}
