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

pub mod terminal {
    //! Utilities for Terminal I/O
    //!
    //! The server writes exactly two colored lines in its lifetime: the
    //! banner when it comes up and the goodbye when it winds down. Everything
    //! in between goes through the logger
    use std::fmt;
    use std::io::Write;
    use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

    /// Vermilion is a shade of red
    const BANNER_COL: Color = Color::Red;

    fn write_with_col<T: fmt::Display>(item: T, color: Option<Color>) -> fmt::Result {
        let mut stdout = StandardStream::stdout(ColorChoice::Always);
        if stdout.set_color(ColorSpec::new().set_fg(color)).is_err() {
            return Err(fmt::Error);
        }
        if write!(&mut stdout, "{}", item).is_err() {
            return Err(fmt::Error);
        }
        if stdout.reset().is_err() {
            return Err(fmt::Error);
        }
        Ok(())
    }
    /// Write the startup banner: product name, build version and project URL
    pub fn write_banner(version: &str, url: &str) -> fmt::Result {
        write_with_col(
            format!("Vermilion v{version} | {url}\n"),
            Some(BANNER_COL),
        )
    }
    /// Write the shutdown notice printed after a clean exit
    pub fn write_goodbye() -> fmt::Result {
        write_with_col("Goodbye :)\n", Some(Color::Cyan))
    }
}
