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

mod catalog;
mod cli;
mod demos;
mod parser;
mod player;
mod render;
mod state;
mod types;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::player::Player;
use crate::types::{PlaybackConfig, Playlist, Script};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        None => play(Vec::new(), None, None, None).await,
        Some(Command::Play {
            files,
            speed,
            jitter,
            start_at,
        }) => play(files, speed, jitter, start_at).await,
        Some(Command::List { files, search, tag }) => list(files, search, tag),
        Some(Command::Check { files }) => check(files),
    }
}

fn load_scripts(files: &[PathBuf]) -> Result<Vec<Script>> {
    if files.is_empty() {
        return demos::builtin();
    }

    let mut scripts = Vec::new();
    for path in files {
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let parsed = parser::parse_playlist(&source)
            .with_context(|| format!("parsing {}", path.display()))?;
        scripts.extend(parsed);
    }
    Ok(scripts)
}

async fn play(
    files: Vec<PathBuf>,
    speed: Option<f64>,
    jitter: Option<f64>,
    start_at: Option<usize>,
) -> Result<()> {
    let scripts = load_scripts(&files)?;

    let mut config = PlaybackConfig::default();
    if let Some(speed) = speed {
        config.speed = speed.max(0.0);
    }
    if let Some(jitter) = jitter {
        config.jitter = jitter.clamp(0.0, 1.0);
    }

    let player = Player::start(Playlist::new(scripts), config).context("starting playback")?;
    if let Some(index) = start_at {
        player.jump_to(index);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    render::run(player, running).await
}

fn list(files: Vec<PathBuf>, search: Option<String>, tags: Vec<String>) -> Result<()> {
    let scripts = load_scripts(&files)?;
    let mut records = catalog::records(&scripts);
    records.sort_by(|a, b| a.title.cmp(&b.title));

    let query = search.unwrap_or_default();
    let matches = catalog::search(&records, &query, &tags);
    if matches.is_empty() {
        println!("no casts match");
        return Ok(());
    }

    for record in matches {
        println!(
            "{:<18} {:<28} {:<14} {}",
            record.id,
            record.title,
            record.channel.as_deref().unwrap_or("-"),
            record.tags.join(", ")
        );
    }
    Ok(())
}

fn check(files: Vec<PathBuf>) -> Result<()> {
    if files.is_empty() {
        bail!("no files to check");
    }

    let mut findings = 0usize;
    for path in &files {
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        match parser::parse_playlist(&source) {
            Ok(scripts) => {
                if scripts.is_empty() {
                    println!("{}: contains no scripts", path.display());
                    findings += 1;
                }
                for script in &scripts {
                    for lint in script.lint() {
                        println!("{}: {}", path.display(), lint);
                        findings += 1;
                    }
                }
            }
            Err(e) => {
                println!("{}: {}", path.display(), e);
                findings += 1;
            }
        }
    }

    if findings > 0 {
        bail!("{} problem(s) found", findings);
    }
    println!("all casts ok");
    Ok(())
}
