// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Built-in demo casts, embedded at compile time

use anyhow::{Context, Result};

use crate::parser;
use crate::types::Script;

const FILE_PROCESSING: &str = include_str!("../demos/file-processing.cast");
const API_DEBUGGING: &str = include_str!("../demos/api-debugging.cast");

pub fn builtin() -> Result<Vec<Script>> {
    let mut scripts = Vec::new();
    for (name, source) in [
        ("file-processing", FILE_PROCESSING),
        ("api-debugging", API_DEBUGGING),
    ] {
        let parsed = parser::parse_playlist(source)
            .with_context(|| format!("built-in cast '{}'", name))?;
        scripts.extend(parsed);
    }
    Ok(scripts)
}
