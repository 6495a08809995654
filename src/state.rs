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

//! Player-owned transcript state
//!
//! The transcript is the only externally observable output of playback:
//! an ordered message list plus a set of named boolean flags. Steps are
//! applied here one at a time by the scheduler; readers only ever see
//! cloned snapshots.

use std::collections::BTreeMap;

use tracing::warn;

use crate::types::{Action, Message};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transcript {
    pub messages: Vec<Message>,
    pub flags: BTreeMap<String, bool>,
}

impl Transcript {
    pub fn clear(&mut self) {
        self.messages.clear();
        self.flags.clear();
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Apply one action. Returns whether observable state changed, so the
    /// scheduler knows when to publish a new snapshot.
    pub fn apply(&mut self, action: &Action) -> bool {
        match action {
            Action::Reset => {
                self.clear();
                true
            }
            Action::Append(message) => {
                self.messages.push(message.clone());
                true
            }
            Action::Mutate { index, patch } => match self.messages.get_mut(*index) {
                Some(message) => {
                    message.apply_patch(patch);
                    true
                }
                None => {
                    // Authoring bug; `chatcast check` reports these. At
                    // play time a bad index must never take the demo down.
                    warn!(
                        index,
                        len = self.messages.len(),
                        "mutate target out of range, ignoring"
                    );
                    false
                }
            },
            Action::SetFlag { name, value } => {
                self.flags.insert(name.clone(), *value);
                true
            }
            Action::Wait => false,
            Action::Unknown(keyword) => {
                warn!(keyword = %keyword, "skipping unknown step");
                false
            }
        }
    }
}
