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

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "chatcast",
    version,
    about = "Replay scripted chat conversations in the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play cast files, or the built-in demos when none are given
    Play {
        files: Vec<PathBuf>,
        /// Multiplier applied to authored step delays (default 0.2)
        #[arg(long)]
        speed: Option<f64>,
        /// Jitter as a fraction (0.0 to 1.0) of the effective delay
        #[arg(long)]
        jitter: Option<f64>,
        /// Script index to start from
        #[arg(long)]
        start_at: Option<usize>,
    },
    /// List available casts
    List {
        files: Vec<PathBuf>,
        /// Keep casts whose text fields contain this substring
        #[arg(long)]
        search: Option<String>,
        /// Keep casts carrying every given tag (repeatable)
        #[arg(long)]
        tag: Vec<String>,
    },
    /// Parse and lint cast files without playing them
    Check { files: Vec<PathBuf> },
}
