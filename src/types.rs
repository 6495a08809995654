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

//! Core types for chatcast script playback

use std::time::Duration;

/// One rendered block inside a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Paragraph(String),
    FileAttachment { name: String, size: String },
    CodeBlock(String),
    Actions(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub author: String,
    pub bot: bool,
    pub text: Option<String>,
    pub components: Vec<Component>,
    pub reaction: Option<String>,
    // Placeholder state: rendered as a typing indicator until an edit lands
    pub composing: bool,
}

/// Partial update merged into an existing message; absent fields keep
/// their current value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessagePatch {
    pub text: Option<String>,
    pub composing: Option<bool>,
    pub reaction: Option<String>,
    pub components: Option<Vec<Component>>,
}

impl Message {
    pub fn apply_patch(&mut self, patch: &MessagePatch) {
        if let Some(text) = &patch.text {
            self.text = Some(text.clone());
        }
        if let Some(composing) = patch.composing {
            self.composing = composing;
        }
        if let Some(reaction) = &patch.reaction {
            self.reaction = Some(reaction.clone());
        }
        if let Some(components) = &patch.components {
            self.components = components.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Clear the transcript and all flags.
    Reset,
    Append(Message),
    Mutate { index: usize, patch: MessagePatch },
    SetFlag { name: String, value: bool },
    /// Occupies a scheduling slot; no state change.
    Wait,
    /// Unrecognized step keyword, kept so playback can log and skip it.
    Unknown(String),
}

/// One timed step: wait `delay` after the previous step, then apply `action`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub delay: Duration,
    pub action: Action,
}

impl Step {
    pub fn new(delay_ms: u64, action: Action) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptMeta {
    pub id: String,
    pub title: String,
    pub channel: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub meta: ScriptMeta,
    pub steps: Vec<Step>,
}

/// Ordered, cyclic collection of scripts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Playlist {
    pub scripts: Vec<Script>,
}

impl Playlist {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self { scripts }
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    // Multiplier applied to each step's nominal delay
    pub speed: f64,
    // Lower bound on the effective delay
    pub floor: Duration,
    // Jitter as a fraction (0.0 to 1.0) of the effective delay
    pub jitter: f64,
    // Retry interval while paused
    pub pause_poll: Duration,
    // Gap between the end of one script and the start of the next
    pub intermission: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 0.2, // 5x faster than authored timing
            floor: Duration::from_millis(20),
            jitter: 0.0,
            pause_poll: Duration::from_millis(100),
            intermission: Duration::from_millis(500),
        }
    }
}

/// A problem found by static script validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lint {
    pub script_id: String,
    pub step: usize,
    pub message: String,
}

impl std::fmt::Display for Lint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: step {}: {}",
            self.script_id,
            self.step + 1,
            self.message
        )
    }
}

impl Script {
    /// Check that every mutate step targets a message appended earlier in
    /// the same run, and surface step keywords playback would skip.
    pub fn lint(&self) -> Vec<Lint> {
        let mut lints = Vec::new();
        let mut appended = 0usize;

        for (i, step) in self.steps.iter().enumerate() {
            match &step.action {
                Action::Reset => appended = 0,
                Action::Append(_) => appended += 1,
                Action::Mutate { index, .. } => {
                    if *index >= appended {
                        lints.push(Lint {
                            script_id: self.meta.id.clone(),
                            step: i,
                            message: format!(
                                "mutate targets message {} but only {} appended since last reset",
                                index, appended
                            ),
                        });
                    }
                }
                Action::Unknown(keyword) => {
                    lints.push(Lint {
                        script_id: self.meta.id.clone(),
                        step: i,
                        message: format!("unknown step keyword '{}' will be skipped", keyword),
                    });
                }
                Action::SetFlag { .. } | Action::Wait => {}
            }
        }

        lints
    }
}
