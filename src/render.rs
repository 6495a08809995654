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

//! Terminal rendering for chatcast playback
//!
//! Redraws the transcript whenever the player publishes a snapshot and
//! maps keystrokes onto the player's control surface.

use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{
        Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
        enable_raw_mode,
    },
};
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::player::{Player, Snapshot};
use crate::types::{Component, Message};

// RAII guard for the terminal - raw mode and the alternate screen are
// only touched if stdout is a TTY
struct TerminalGuard {
    enabled: bool,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        let enabled = if std::io::stdout().is_terminal() {
            enable_raw_mode().context("Failed to enable raw mode")?;
            execute!(std::io::stdout(), EnterAlternateScreen, cursor::Hide)
                .context("Failed to enter alternate screen")?;
            true
        } else {
            false
        };
        Ok(TerminalGuard { enabled })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.enabled {
            let _ = execute!(std::io::stdout(), cursor::Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}

#[derive(Debug)]
enum UiEvent {
    TogglePause,
    Next,
    Previous,
    Jump(usize),
    Quit,
}

// Keys are read on a dedicated thread; poll with a timeout so the thread
// notices shutdown instead of blocking in read() forever.
fn spawn_key_reader(
    events: mpsc::UnboundedSender<UiEvent>,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let ui_event = match key.code {
                KeyCode::Char(' ') => Some(UiEvent::TogglePause),
                KeyCode::Char('n') | KeyCode::Right => Some(UiEvent::Next),
                KeyCode::Char('p') | KeyCode::Left => Some(UiEvent::Previous),
                KeyCode::Char('q') | KeyCode::Esc => Some(UiEvent::Quit),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(UiEvent::Quit)
                }
                KeyCode::Char(c @ '1'..='9') => Some(UiEvent::Jump((c as u8 - b'1') as usize)),
                _ => None,
            };
            if let Some(ui_event) = ui_event {
                if events.send(ui_event).is_err() {
                    break;
                }
            }
        }
    })
}

/// Drive the player until the user quits or Ctrl-C flips `running`.
pub async fn run(player: Player, running: Arc<AtomicBool>) -> Result<()> {
    let _guard = TerminalGuard::new()?;

    let mut snapshots = player.snapshots();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let reader = spawn_key_reader(event_tx, running.clone());

    draw(&snapshots.borrow_and_update())?;

    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                draw(&snapshots.borrow_and_update())?;
            }
            ui_event = events.recv() => {
                match ui_event {
                    None | Some(UiEvent::Quit) => break,
                    Some(UiEvent::TogglePause) => {
                        if snapshots.borrow().paused {
                            player.resume();
                        } else {
                            player.pause();
                        }
                    }
                    Some(UiEvent::Next) => player.skip_to_next(),
                    Some(UiEvent::Previous) => player.skip_to_previous(),
                    Some(UiEvent::Jump(index)) => player.jump_to(index),
                }
            }
            // Re-check the running flag so Ctrl-C is picked up promptly.
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }
    }

    running.store(false, Ordering::SeqCst);
    player.stop().await;
    let _ = reader.join();
    Ok(())
}

fn author_color(author: &str, bot: bool) -> Color {
    if bot {
        return Color::Magenta;
    }
    const PALETTE: [Color; 4] = [Color::Blue, Color::Green, Color::Cyan, Color::Yellow];
    let sum: usize = author.bytes().map(|b| b as usize).sum();
    PALETTE[sum % PALETTE.len()]
}

fn draw(snapshot: &Snapshot) -> Result<()> {
    let mut out = std::io::stdout();
    queue!(out, cursor::MoveTo(0, 0), Clear(ClearType::All))?;

    let channel = snapshot.channel.as_deref().unwrap_or("#demo");
    queue!(
        out,
        SetAttribute(Attribute::Bold),
        Print(channel),
        SetAttribute(Attribute::Reset),
        Print("  "),
        SetForegroundColor(Color::DarkGrey),
        Print(&snapshot.script_title),
        ResetColor,
        Print("\r\n\r\n")
    )?;

    for message in &snapshot.transcript.messages {
        draw_message(&mut out, message)?;
    }

    if snapshot.transcript.flag("thinking") {
        let bot_name = snapshot
            .transcript
            .messages
            .iter()
            .rev()
            .find(|m| m.bot)
            .map(|m| m.author.as_str())
            .unwrap_or("agent");
        queue!(
            out,
            SetForegroundColor(Color::DarkGrey),
            SetAttribute(Attribute::Italic),
            Print(format!("{} is thinking ...", bot_name)),
            SetAttribute(Attribute::Reset),
            ResetColor,
            Print("\r\n")
        )?;
    }

    queue!(out, Print("\r\n"))?;
    draw_footer(&mut out, snapshot)?;
    out.flush()?;
    Ok(())
}

fn draw_message(out: &mut impl Write, message: &Message) -> Result<()> {
    queue!(
        out,
        SetForegroundColor(author_color(&message.author, message.bot)),
        SetAttribute(Attribute::Bold),
        Print(&message.author),
        SetAttribute(Attribute::Reset),
        ResetColor,
        Print("\r\n")
    )?;

    if message.composing {
        queue!(
            out,
            SetForegroundColor(Color::DarkGrey),
            Print("  . . ."),
            ResetColor,
            Print("\r\n\r\n")
        )?;
        return Ok(());
    }

    if let Some(text) = &message.text {
        queue!(out, Print(format!("  {}", text)), Print("\r\n"))?;
    }

    for component in &message.components {
        match component {
            Component::Paragraph(content) => {
                queue!(out, Print(format!("  {}", content)), Print("\r\n"))?;
            }
            Component::FileAttachment { name, size } => {
                let label = if size.is_empty() {
                    format!("  [file] {}", name)
                } else {
                    format!("  [file] {} ({})", name, size)
                };
                queue!(
                    out,
                    SetForegroundColor(Color::Green),
                    Print(label),
                    ResetColor,
                    Print("\r\n")
                )?;
            }
            Component::CodeBlock(content) => {
                for line in content.lines() {
                    queue!(
                        out,
                        SetForegroundColor(Color::DarkGrey),
                        Print(format!("  | {}", line)),
                        ResetColor,
                        Print("\r\n")
                    )?;
                }
            }
            Component::Actions(buttons) => {
                let row = buttons
                    .iter()
                    .map(|label| format!("[ {} ]", label))
                    .collect::<Vec<_>>()
                    .join(" ");
                queue!(
                    out,
                    SetForegroundColor(Color::Cyan),
                    Print(format!("  {}", row)),
                    ResetColor,
                    Print("\r\n")
                )?;
            }
        }
    }

    if let Some(reaction) = &message.reaction {
        queue!(out, Print(format!("  ( {} )", reaction)), Print("\r\n"))?;
    }

    queue!(out, Print("\r\n"))?;
    Ok(())
}

fn draw_footer(out: &mut impl Write, snapshot: &Snapshot) -> Result<()> {
    let dots = (0..snapshot.script_count)
        .map(|i| if i == snapshot.script_index { "●" } else { "○" })
        .collect::<Vec<_>>()
        .join(" ");
    let paused = if snapshot.paused { "  [paused]" } else { "" };
    queue!(
        out,
        SetForegroundColor(Color::DarkGrey),
        Print(format!(
            "{}{}   space pause - n/p switch - 1-9 jump - q quit",
            dots, paused
        )),
        ResetColor,
        Print("\r\n")
    )?;
    Ok(())
}
