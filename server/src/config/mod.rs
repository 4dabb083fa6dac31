/*
 * Created on Sun Oct 01 2023
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

//! # Configuration
//!
//! Command-line flags are the only configuration source. They are parsed once
//! at startup into a [`ConfigurationSet`], and everything downstream
//! (including `CONFIG GET`) reads from that record rather than from raw
//! process arguments

// external imports
use clap::{load_yaml, App};
// std imports
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
// internal imports
use crate::util::error::{Error, VermResult};

// server defaults
const DEFAULT_IPV4: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const DEFAULT_PORT: u16 = 6379;
const DEFAULT_MAXCON: usize = 50000;

#[derive(Debug, Clone, PartialEq)]
/// The address of the upstream this node follows
pub struct UpstreamAddr {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
/// The complete startup configuration
pub struct ConfigurationSet {
    /// the IP to bind to
    pub host: IpAddr,
    /// the port to bind to
    pub port: u16,
    /// the maximum number of simultaneous client connections
    pub maxcon: usize,
    /// when set, run as a follower of this upstream
    pub replicaof: Option<UpstreamAddr>,
    /// the directory holding the snapshot file
    pub dir: Option<String>,
    /// the snapshot file name
    pub dbfilename: Option<String>,
}

impl Default for ConfigurationSet {
    fn default() -> Self {
        ConfigurationSet {
            host: DEFAULT_IPV4,
            port: DEFAULT_PORT,
            maxcon: DEFAULT_MAXCON,
            replicaof: None,
            dir: None,
            dbfilename: None,
        }
    }
}

impl ConfigurationSet {
    /// The snapshot file to load at startup, present only when both `--dir`
    /// and `--dbfilename` were given
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        match (&self.dir, &self.dbfilename) {
            (Some(dir), Some(file)) => Some(PathBuf::from(dir).join(file)),
            _ => None,
        }
    }
}

/// Parse the process arguments into a [`ConfigurationSet`], or explain why
/// they don't make sense
pub fn get_config() -> VermResult<ConfigurationSet> {
    let cfg_layout = load_yaml!("../cli.yml");
    let matches = App::from_yaml(cfg_layout).get_matches();
    let mut cfg = ConfigurationSet::default();
    if let Some(host) = matches.value_of("host") {
        cfg.host = host
            .parse()
            .map_err(|_| Error::Config(format!("invalid bind address '{host}'")))?;
    }
    if let Some(port) = matches.value_of("port") {
        cfg.port = port
            .parse()
            .map_err(|_| Error::Config(format!("invalid port '{port}'")))?;
    }
    if let Some(maxcon) = matches.value_of("maxcon") {
        cfg.maxcon = maxcon
            .parse()
            .map_err(|_| Error::Config(format!("invalid connection limit '{maxcon}'")))?;
    }
    if let Some(upstream) = matches.value_of("replicaof") {
        cfg.replicaof = Some(parse_replicaof(upstream)?);
    }
    cfg.dir = matches.value_of("dir").map(ToOwned::to_owned);
    cfg.dbfilename = matches.value_of("dbfilename").map(ToOwned::to_owned);
    Ok(cfg)
}

/// `--replicaof` takes a single `"<host> <port>"` argument
fn parse_replicaof(raw: &str) -> VermResult<UpstreamAddr> {
    let mut words = raw.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(host), Some(port), None) => Ok(UpstreamAddr {
            host: host.to_owned(),
            port: port.parse().map_err(|_| {
                Error::Config(format!("invalid upstream port '{port}'"))
            })?,
        }),
        _ => Err(Error::Config(
            "--replicaof expects \"<host> <port>\"".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicaof_grammar() {
        let upstream = parse_replicaof("localhost 6380").unwrap();
        assert_eq!(upstream.host, "localhost");
        assert_eq!(upstream.port, 6380);
        assert!(parse_replicaof("localhost").is_err());
        assert!(parse_replicaof("localhost 6380 extra").is_err());
        assert!(parse_replicaof("localhost sixty").is_err());
    }

    #[test]
    fn test_snapshot_path_needs_both_settings() {
        let mut cfg = ConfigurationSet::default();
        assert_eq!(cfg.snapshot_path(), None);
        cfg.dir = Some("/tmp/verm".to_owned());
        assert_eq!(cfg.snapshot_path(), None);
        cfg.dbfilename = Some("dump.rdb".to_owned());
        assert_eq!(
            cfg.snapshot_path(),
            Some(PathBuf::from("/tmp/verm/dump.rdb"))
        );
    }
}
