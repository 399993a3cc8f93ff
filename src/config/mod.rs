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

//! Application configuration.
//!
//! The command line is the only source of configuration. [`Args`] is what
//! `clap` parses; [`PlayerConfig`] is the validated result the rest of the
//! player works from.

use std::path::PathBuf;

use clap::Parser;

use crate::player::PlaybackMode;

pub(crate) const USAGE: &str = "Please specify a folder with --folder or a file with --file";

#[derive(Parser, Debug)]
#[command(name = "mp3cli", version, about = "Play MP3 files from the terminal")]
pub(crate) struct Args {
    /// Folder to scan recursively for MP3 files
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "", conflicts_with = "file")]
    folder: Option<String>,

    /// Single audio file to play on a loop
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    file: Option<String>,

    /// Position in the playlist to start from, counting from 1
    #[arg(long, value_name = "N", default_value_t = 1)]
    start: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub(crate) log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlayerConfig {
    pub(crate) mode: PlaybackMode,
    pub(crate) root: PathBuf,
    pub(crate) start_index: usize,
}

impl Args {
    /// Resolves the arguments into a player configuration, or `None` when no
    /// usable path was given.
    pub(crate) fn resolve(&self) -> Option<PlayerConfig> {
        let (mode, root) = match (&self.folder, &self.file) {
            (Some(folder), _) => (PlaybackMode::Playlist, folder),
            (None, Some(file)) => (PlaybackMode::Single, file),
            (None, None) => return None,
        };

        if root.is_empty() {
            return None;
        }

        Some(PlayerConfig {
            mode,
            root: PathBuf::from(root),
            start_index: self.start.saturating_sub(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(args: &[&str]) -> Option<PlayerConfig> {
        let args = std::iter::once("mp3cli").chain(args.iter().copied());
        Args::try_parse_from(args).unwrap().resolve()
    }

    #[test]
    fn folder_selects_playlist_mode() {
        let config = resolve(&["--folder", "music", "--start", "3"]).unwrap();

        assert_eq!(
            config,
            PlayerConfig {
                mode: PlaybackMode::Playlist,
                root: PathBuf::from("music"),
                start_index: 2,
            }
        );
    }

    #[test]
    fn file_selects_single_mode() {
        let config = resolve(&["--file", "song.mp3"]).unwrap();

        assert_eq!(config.mode, PlaybackMode::Single);
        assert_eq!(config.start_index, 0);
    }

    #[test]
    fn missing_or_empty_path_is_not_an_error() {
        assert_eq!(resolve(&[]), None);
        assert_eq!(resolve(&["--folder"]), None);
        assert_eq!(resolve(&["--folder", ""]), None);
        assert_eq!(resolve(&["--file="]), None);
    }

    #[test]
    fn start_zero_means_the_first_track() {
        assert_eq!(resolve(&["--folder", "music", "--start", "0"]).unwrap().start_index, 0);
    }

    #[test]
    fn folder_and_file_conflict() {
        let result = Args::try_parse_from(["mp3cli", "--folder", "music", "--file", "song.mp3"]);

        assert!(result.is_err());
    }
}
