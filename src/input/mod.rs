// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Keyboard command input.
//!
//! Commands arrive one per line on standard input. A dedicated thread blocks
//! on each read and applies the command to the session directly; only quit,
//! and stop in single mode, go through the event channel to the coordinator.

use std::{
    io::{self, BufRead},
    sync::{Arc, mpsc::Sender},
    thread,
};

use anyhow::{Context, Result};
use tracing::{debug, error, warn};

use crate::{
    error::PlayerError,
    events::PlayerEvent,
    player::{Advance, AudioSink, PlaybackMode, PlayerSession},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    TogglePause,
    Stop,
    Next,
    Previous,
    Resume,
    Quit,
    Unknown(String),
}

impl Command {
    /// Maps a token to a command. Track navigation only exists in playlist
    /// mode and `r` only in single mode.
    pub(crate) fn parse(token: &str, mode: PlaybackMode) -> Self {
        match (token, mode) {
            ("p", _) => Command::TogglePause,
            ("s", _) => Command::Stop,
            ("q", _) => Command::Quit,
            ("n", PlaybackMode::Playlist) => Command::Next,
            ("b", PlaybackMode::Playlist) => Command::Previous,
            ("r", PlaybackMode::Single) => Command::Resume,
            (other, _) => Command::Unknown(other.to_string()),
        }
    }
}

/// The controls banner shown once playback has started.
pub(crate) fn controls(mode: PlaybackMode) -> &'static str {
    match mode {
        PlaybackMode::Playlist => "Controls: p - pause/resume, s - stop, n - next, b - previous, q - quit",
        PlaybackMode::Single => "Controls: p - pause/resume, s - stop, r - resume, q - quit",
    }
}

/// Spawns the input thread over standard input.
///
/// The thread is never joined; it ends on quit, on end of input, or with the
/// process.
pub(crate) fn spawn_input_listener<S>(
    session: Arc<PlayerSession<S>>,
    event_tx: Sender<PlayerEvent>,
) -> Result<()>
where
    S: AudioSink + 'static,
{
    thread::Builder::new()
        .name("input".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            if let Err(e) = listen(stdin.lock(), &session, &event_tx) {
                warn!("Input listener stopped: {e:#}");
                let _ = event_tx.send(PlayerEvent::Quit);
            }
        })
        .context("Failed to spawn input listener")?;

    Ok(())
}

/// Reads commands from `reader` until quit or end of input.
///
/// Only the first whitespace-delimited token of each line counts; blank lines
/// are skipped. End of input is treated as quit.
///
/// # Errors
///
/// Returns an error if reading fails or the coordinator has gone away.
pub(crate) fn listen<R, S>(
    reader: R,
    session: &PlayerSession<S>,
    event_tx: &Sender<PlayerEvent>,
) -> Result<()>
where
    R: BufRead,
    S: AudioSink,
{
    for line in reader.lines() {
        let line = line.context("Failed to read command")?;
        let Some(token) = line.split_whitespace().next() else {
            continue;
        };

        let command = Command::parse(token, session.mode());
        debug!(?command, "Received command");

        if let Some(event) = dispatch(session, command) {
            event_tx.send(event).context("Failed to send event")?;
            return Ok(());
        }

        debug!(state = ?session.state(), index = session.current_index(), "Applied command");
    }

    event_tx.send(PlayerEvent::Quit).context("Failed to send quit event")?;

    Ok(())
}

/// Applies one command, returning an event if the session is now over.
fn dispatch<S: AudioSink>(session: &PlayerSession<S>, command: Command) -> Option<PlayerEvent> {
    match command {
        Command::TogglePause => match session.toggle_pause() {
            Ok(true) => println!("Paused"),
            Ok(false) => println!("Resuming..."),
            Err(e) => error!("Error toggling pause: {e}"),
        },

        Command::Stop => {
            match session.stop() {
                Ok(()) => println!("Stopped"),
                Err(e) => error!("Error stopping playback: {e}"),
            }
            if session.mode() == PlaybackMode::Single {
                return Some(PlayerEvent::Completed);
            }
        }

        Command::Next => report_advance("next", session.advance_next()),
        Command::Previous => report_advance("previous", session.advance_previous()),

        Command::Resume => match session.resume() {
            Ok(()) => println!("Resuming..."),
            Err(e) => error!("Error resuming playback: {e}"),
        },

        Command::Quit => return Some(PlayerEvent::Quit),

        Command::Unknown(_) => println!("Unknown command"),
    }

    None
}

fn report_advance(direction: &str, result: Result<Advance, PlayerError>) {
    if let Err(e) = result {
        error!("Error loading {direction} track: {e}");
    }
}
