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

//! Track list discovery.
//!
//! Builds the ordered list of files a session plays. A single file becomes a
//! one-entry list; a directory is walked recursively with `WalkDir`, keeping
//! every regular file with an `mp3` extension in file-name order.

use std::{
    fs,
    ops::Index,
    path::{Path, PathBuf},
};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::PlayerError;

const AUDIO_EXTENSION: &str = "mp3";

/// An ordered, non-empty list of playable files.
///
/// The list is fixed once built, so any index handed out by [`next_index`] or
/// [`previous_index`] stays valid for the lifetime of the session.
///
/// [`next_index`]: TrackList::next_index
/// [`previous_index`]: TrackList::previous_index
#[derive(Debug, Clone)]
pub(crate) struct TrackList {
    paths: Vec<PathBuf>,
}

impl TrackList {
    /// Wraps `paths`, reporting an empty list as [`PlayerError::EmptyPlaylist`]
    /// against `root`.
    pub(crate) fn from_paths(root: &Path, paths: Vec<PathBuf>) -> Result<Self, PlayerError> {
        if paths.is_empty() {
            return Err(PlayerError::EmptyPlaylist(root.to_path_buf()));
        }

        Ok(Self { paths })
    }

    pub(crate) fn len(&self) -> usize {
        self.paths.len()
    }

    /// The index after `index`, wrapping to the first track.
    pub(crate) fn next_index(&self, index: usize) -> usize {
        if index + 1 < self.paths.len() { index + 1 } else { 0 }
    }

    /// The index before `index`, wrapping to the last track.
    pub(crate) fn previous_index(&self, index: usize) -> usize {
        if index > 0 { index - 1 } else { self.paths.len() - 1 }
    }

    /// Clamps a requested index into range.
    pub(crate) fn clamp_index(&self, index: usize) -> usize {
        index.min(self.paths.len() - 1)
    }
}

impl Index<usize> for TrackList {
    type Output = Path;

    fn index(&self, index: usize) -> &Path {
        &self.paths[index]
    }
}

/// Builds the track list for `root`.
///
/// # Errors
///
/// Returns [`PlayerError::Discovery`] if any part of the walk fails, including
/// a missing root, and [`PlayerError::EmptyPlaylist`] if nothing matched.
pub(crate) fn discover(root: &Path) -> Result<TrackList, PlayerError> {
    if fs::metadata(root).is_ok_and(|meta| meta.is_file()) {
        return TrackList::from_paths(root, vec![root.to_path_buf()]);
    }

    let mut paths = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| {
            let path = source.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
            PlayerError::Discovery { path, source }
        })?;

        if entry.file_type().is_file() && has_audio_extension(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    debug!(root = %root.display(), count = paths.len(), "Scanned folder");

    TrackList::from_paths(root, paths)
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == AUDIO_EXTENSION)
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};

    use tempfile::tempdir;

    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap();
    }

    fn list(paths: &[&str]) -> TrackList {
        let paths = paths.iter().map(PathBuf::from).collect();
        TrackList::from_paths(Path::new("."), paths).unwrap()
    }

    #[test]
    fn nested_mp3_files_are_found_and_other_extensions_skipped() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("albums/a.mp3"));
        touch(&dir.path().join("c.txt"));
        touch(&dir.path().join("b.mp3.part"));

        let expected = dir.path().join("albums/a.mp3");

        let tracks = discover(dir.path()).unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(&tracks[0], expected.as_path());
    }

    #[test]
    fn folder_walk_is_in_file_name_order() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("b.mp3"));
        touch(&dir.path().join("a/z.mp3"));
        touch(&dir.path().join("c.mp3"));

        let tracks = discover(dir.path()).unwrap();

        let names: Vec<PathBuf> = (0..tracks.len())
            .map(|i| tracks[i].strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("a/z.mp3"), PathBuf::from("b.mp3"), PathBuf::from("c.mp3")]
        );
    }

    #[test]
    fn empty_folder_is_an_empty_playlist() {
        let dir = tempdir().unwrap();

        let err = discover(dir.path()).unwrap_err();

        assert!(matches!(err, PlayerError::EmptyPlaylist(_)));
    }

    #[test]
    fn single_file_is_used_as_is() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("song.ogg");
        touch(&file);

        let tracks = discover(&file).unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(&tracks[0], file.as_path());
    }

    #[test]
    fn missing_root_is_a_discovery_error() {
        let dir = tempdir().unwrap();

        let err = discover(&dir.path().join("missing")).unwrap_err();

        assert!(matches!(err, PlayerError::Discovery { .. }));
    }

    #[test]
    fn next_wraps_around_after_len_steps() {
        let tracks = list(&["a.mp3", "b.mp3", "c.mp3"]);

        let mut index = 1;
        for _ in 0..tracks.len() {
            index = tracks.next_index(index);
        }

        assert_eq!(index, 1);
        assert_eq!(tracks.next_index(2), 0);
    }

    #[test]
    fn previous_is_the_inverse_of_next() {
        let tracks = list(&["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);

        for index in 0..tracks.len() {
            assert_eq!(tracks.previous_index(tracks.next_index(index)), index);
            assert_eq!(tracks.next_index(tracks.previous_index(index)), index);
        }
        assert_eq!(tracks.previous_index(0), 3);
    }

    #[test]
    fn single_entry_list_wraps_onto_itself() {
        let tracks = list(&["only.mp3"]);

        assert_eq!(tracks.next_index(0), 0);
        assert_eq!(tracks.previous_index(0), 0);
        assert_eq!(tracks.clamp_index(7), 0);
    }
}
