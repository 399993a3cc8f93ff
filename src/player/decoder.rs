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

//! MP3 header decoding.
//!
//! A track is "decoded" once its MPEG stream header has been parsed; the
//! sample-level decode is left to the audio sink.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use lofty::{file::FileType, prelude::*, probe::Probe};

use crate::error::PlayerError;

/// A file whose header parsed as a playable MPEG audio stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DecodedTrack {
    pub(crate) path: PathBuf,
    pub(crate) duration: Duration,
    pub(crate) sample_rate: Option<u32>,
    pub(crate) channels: Option<u8>,
    pub(crate) bitrate: Option<u32>,
}

/// Opens `path` and parses it as MPEG audio, whatever its extension says.
///
/// # Errors
///
/// Returns [`PlayerError::Decode`] if the file cannot be read or carries no
/// valid MPEG frame.
pub(crate) fn decode(path: &Path) -> Result<DecodedTrack, PlayerError> {
    let decode_error = |reason: String| PlayerError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let tagged_file = Probe::open(path)
        .map_err(|e| decode_error(e.to_string()))?
        .set_file_type(FileType::Mpeg)
        .read()
        .map_err(|e| decode_error(e.to_string()))?;

    let properties = tagged_file.properties();

    if properties.sample_rate().is_none() {
        return Err(decode_error("no MPEG audio frames found".to_string()));
    }

    Ok(DecodedTrack {
        path: path.to_path_buf(),
        duration: properties.duration(),
        sample_rate: properties.sample_rate(),
        channels: properties.channels(),
        bitrate: properties.audio_bitrate(),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    // MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, stereo, no CRC or padding.
    const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];
    const FRAME_LEN: usize = 417;

    /// Writes a silent, header-valid MP3 stream of `frames` frames.
    fn write_silent_mp3(path: &Path, frames: usize) {
        let mut bytes = Vec::with_capacity(FRAME_LEN * frames);
        for _ in 0..frames {
            bytes.extend_from_slice(&FRAME_HEADER);
            bytes.resize(bytes.len() + FRAME_LEN - FRAME_HEADER.len(), 0);
        }
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn valid_stream_header_is_decoded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("silence.mp3");
        write_silent_mp3(&path, 40);

        let track = decode(&path).unwrap();

        assert_eq!(track.path, path);
        assert_eq!(track.sample_rate, Some(44100));
        assert_eq!(track.channels, Some(2));
    }

    #[test]
    fn text_file_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.mp3");
        fs::write(&path, "these are not the frames you are looking for").unwrap();

        let err = decode(&path).unwrap_err();

        assert!(matches!(err, PlayerError::Decode { .. }));
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let dir = tempdir().unwrap();

        let err = decode(&dir.path().join("gone.mp3")).unwrap_err();

        assert!(matches!(err, PlayerError::Decode { .. }));
    }
}
