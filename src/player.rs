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

//! Playback engine for chatcast scripts
//!
//! Replays the active script one timed step at a time, cycling through the
//! playlist, and publishes a transcript snapshot after every observable
//! change. A single task owns all player state; exactly one step (or the
//! inter-script gap) is pending at any moment, represented by one deadline.
//! External control arrives over a channel and is handled in the same loop,
//! so a skip or stop can never race a stale timer.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::state::Transcript;
use crate::types::{Action, PlaybackConfig, Playlist, Step};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("playlist contains no scripts")]
    EmptyPlaylist,
}

/// Read-only view of player state, published over a watch channel.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub transcript: Transcript,
    pub script_index: usize,
    pub script_count: usize,
    pub script_title: String,
    pub channel: Option<String>,
    pub paused: bool,
}

#[derive(Debug)]
enum Control {
    Pause,
    Resume,
    SkipNext,
    SkipPrevious,
    JumpTo(usize),
    Stop,
}

/// Handle to a running playback task. Dropping it tears the task down.
pub struct Player {
    commands: mpsc::UnboundedSender<Control>,
    snapshots: watch::Receiver<Snapshot>,
    task: Option<JoinHandle<()>>,
}

impl Player {
    /// Begin playback at script 0, step 0. Fails fast on an empty playlist.
    pub fn start(playlist: Playlist, config: PlaybackConfig) -> Result<Self, PlaybackError> {
        if playlist.is_empty() {
            return Err(PlaybackError::EmptyPlaylist);
        }

        let engine = Engine {
            playlist,
            config,
            script: 0,
            cursor: 0,
            transcript: Transcript::default(),
            paused: false,
        };

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(engine.snapshot());
        let task = tokio::spawn(engine.run(command_rx, snapshot_tx));

        Ok(Self {
            commands,
            snapshots,
            task: Some(task),
        })
    }

    pub fn snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn pause(&self) {
        let _ = self.commands.send(Control::Pause);
    }

    pub fn resume(&self) {
        let _ = self.commands.send(Control::Resume);
    }

    pub fn skip_to_next(&self) {
        let _ = self.commands.send(Control::SkipNext);
    }

    pub fn skip_to_previous(&self) {
        let _ = self.commands.send(Control::SkipPrevious);
    }

    pub fn jump_to(&self, index: usize) {
        let _ = self.commands.send(Control::JumpTo(index));
    }

    /// End playback, leaving the last-applied state in place.
    pub async fn stop(mut self) {
        let _ = self.commands.send(Control::Stop);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        // A pending timer must never fire into a torn-down player.
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// What the single armed deadline stands for.
enum Pending {
    /// `steps[cursor]` of the active script fires at the deadline.
    Step,
    /// The script is exhausted; the deadline ends the inter-script gap.
    Intermission,
}

struct Engine {
    playlist: Playlist,
    config: PlaybackConfig,
    script: usize,
    cursor: usize,
    transcript: Transcript,
    paused: bool,
}

impl Engine {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Control>,
        snapshots: watch::Sender<Snapshot>,
    ) {
        let (mut pending, mut deadline) = self.arm();

        loop {
            tokio::select! {
                biased;

                cmd = commands.recv() => {
                    match cmd {
                        None | Some(Control::Stop) => break,
                        Some(Control::Pause) => {
                            if !self.paused {
                                self.paused = true;
                                self.publish(&snapshots);
                            }
                        }
                        Some(Control::Resume) => {
                            if self.paused {
                                self.paused = false;
                                self.publish(&snapshots);
                            }
                        }
                        Some(Control::SkipNext) => {
                            self.script = (self.script + 1) % self.playlist.len();
                            (pending, deadline) = self.restart();
                            self.publish(&snapshots);
                        }
                        Some(Control::SkipPrevious) => {
                            let len = self.playlist.len();
                            self.script = (self.script + len - 1) % len;
                            (pending, deadline) = self.restart();
                            self.publish(&snapshots);
                        }
                        Some(Control::JumpTo(index)) => {
                            if index < self.playlist.len() {
                                self.script = index;
                                (pending, deadline) = self.restart();
                                self.publish(&snapshots);
                            } else {
                                warn!(index, "jump target out of range, ignoring");
                            }
                        }
                    }
                }

                _ = time::sleep_until(deadline) => {
                    if self.paused {
                        // Poll-based pause: retain the due step, retry later.
                        deadline = Instant::now() + self.config.pause_poll;
                        continue;
                    }

                    match pending {
                        Pending::Intermission => {
                            self.script = (self.script + 1) % self.playlist.len();
                            self.cursor = 0;
                            debug!(script = self.script, "advancing to next script");
                            (pending, deadline) = self.arm();
                            self.publish(&snapshots);
                        }
                        Pending::Step => {
                            let changed = match self.playlist.scripts[self.script]
                                .steps
                                .get(self.cursor)
                            {
                                Some(step) => self.transcript.apply(&step.action),
                                None => false,
                            };
                            self.cursor += 1;
                            (pending, deadline) = self.arm();
                            if changed {
                                self.publish(&snapshots);
                            }
                        }
                    }
                }
            }
        }

        debug!("playback stopped");
    }

    /// Arm the deadline for the step at the cursor, or for the
    /// inter-script gap when the script is exhausted.
    fn arm(&self) -> (Pending, Instant) {
        match self.playlist.scripts[self.script].steps.get(self.cursor) {
            Some(step) => (Pending::Step, Instant::now() + self.effective_delay(step)),
            None => (
                Pending::Intermission,
                Instant::now() + self.config.intermission,
            ),
        }
    }

    /// Reset-on-skip: clear the transcript immediately and re-arm from the
    /// new script's first step. Pausedness is left as-is.
    fn restart(&mut self) -> (Pending, Instant) {
        self.cursor = 0;
        self.transcript.clear();
        self.arm()
    }

    fn effective_delay(&self, step: &Step) -> Duration {
        // Unknown steps are zero-effect, zero-delay.
        if let Action::Unknown(_) = step.action {
            return Duration::ZERO;
        }

        let scaled = Duration::from_secs_f64(step.delay.as_secs_f64() * self.config.speed.max(0.0));
        let base = scaled.max(self.config.floor);

        let base_ms = base.as_millis() as u64;
        let jitter_ms = (base_ms as f64 * self.config.jitter) as u64;
        if jitter_ms > 0 {
            let mut rng = rand::rng();
            let variation = rng.random_range(0..=jitter_ms * 2);
            Duration::from_millis(base_ms.saturating_add(variation).saturating_sub(jitter_ms))
        } else {
            base
        }
    }

    fn snapshot(&self) -> Snapshot {
        let meta = &self.playlist.scripts[self.script].meta;
        Snapshot {
            transcript: self.transcript.clone(),
            script_index: self.script,
            script_count: self.playlist.len(),
            script_title: meta.title.clone(),
            channel: meta.channel.clone(),
            paused: self.paused,
        }
    }

    fn publish(&self, snapshots: &watch::Sender<Snapshot>) {
        snapshots.send_replace(self.snapshot());
    }
}
