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

//! Error taxonomy for the player.
//!
//! Startup code treats every variant except [`PlayerError::EmptyPlaylist`] as
//! fatal. Once a session is running the same errors are logged and playback
//! simply stalls on the track that failed.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum PlayerError {
    /// The filesystem walk could not read part of the tree.
    #[error("Failed to scan {path:?}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The walk succeeded but found nothing playable.
    #[error("No MP3 files found in {0:?}")]
    EmptyPlaylist(PathBuf),

    /// The file is unreadable or is not a valid MP3 stream.
    #[error("Failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to initialise audio output: {0}")]
    DeviceInit(String),

    /// The audio worker is gone or rejected a command.
    #[error("Audio output error: {0}")]
    Sink(String),
}
