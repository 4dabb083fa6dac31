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

//! # Vermilion
//!
//! The `vermd` crate (or the `server` folder) is Vermilion's database server:
//! a single-node, in-memory key/value and stream store that speaks the Redis
//! wire protocol over TCP. There are several modules within this crate; see
//! the modules for their respective documentation.

mod actions;
mod config;
mod corestore;
mod dbnet;
mod diskstore;
mod protocol;
mod queryengine;
mod replication;
mod resp;
mod util;

use crate::corestore::Corestore;
use crate::replication::ReplHandle;
use env_logger::*;
use libverm::util::terminal;
use libverm::{URL, VERSION};
use std::env;
use std::process;
use std::sync::Arc;
use tokio::signal;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// Jemallocator - this is the default memory allocator for platforms other
/// than msvc
static GLOBAL: Jemalloc = Jemalloc;

fn main() {
    Builder::new()
        .parse_filters(&env::var("VERM_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();
    // Start the server which asynchronously waits for a CTRL+C signal
    // which will safely shut down the server
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("server")
        .enable_all()
        .build()
        .unwrap();
    let exit_code = runtime.block_on(boot());
    // Make sure all background workers terminate
    drop(runtime);
    if exit_code != 0 {
        process::exit(exit_code);
    }
    terminal::write_goodbye().unwrap();
}

/// Bring the whole node up: configuration, snapshot, replication, listener.
/// Returns the process exit code
async fn boot() -> i32 {
    let cfg = match config::get_config() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            log::error!("{e}");
            return 0x01;
        }
    };
    terminal::write_banner(VERSION, URL).unwrap();
    let db = Corestore::new();
    if let Err(e) = diskstore::load_snapshot(&cfg, &db) {
        log::error!("Startup failure: {e}");
        return 0x01;
    }
    let repl = ReplHandle::start();
    if let Some(upstream) = cfg.replicaof.clone() {
        // introduce ourselves to the upstream while the listener comes up
        let listening_port = cfg.port;
        tokio::spawn(async move {
            if let Err(e) = replication::handshake::run(upstream, listening_port).await {
                log::error!("{e}");
            }
        });
    }
    match dbnet::run(db, cfg, repl, signal::ctrl_c()).await {
        Ok(()) => {
            log::info!("Stopped accepting incoming connections");
            0
        }
        Err(e) => {
            log::error!("{e}");
            0x01
        }
    }
}
