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

//! Playback control and state management.
//!
//! [`PlayerSession`] is the one place that owns playback state: the current
//! track index, the pause flag and the decoded track loaded into the sink.
//! The input listener, the event coordinator and (through completion events)
//! the sink worker all act on a shared `Arc<PlayerSession>`.
//!
//! # Locking
//!
//! Every read-modify-write of [`PlaybackState`] happens under the session's
//! state lock. Anything that touches the sink's playback graph is bracketed
//! additionally by [`AudioSink::lock`]. The state lock is always taken first.

pub(crate) mod decoder;
pub(crate) mod mpv_sink;

use std::{
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, info};

use crate::{
    error::PlayerError,
    library::TrackList,
    player::decoder::DecodedTrack,
    util::format::format_time,
};

/// The sink's internal mixing lock.
pub(crate) type SinkLock<'a> = MutexGuard<'a, ()>;

/// Turns a path into a playable track.
pub(crate) type DecodeFn = fn(&Path) -> Result<DecodedTrack, PlayerError>;

/// The audio output the session drives.
///
/// Implementations render on their own thread and report the start, natural
/// end and failure of a stream as [`PlayerEvent`]s carrying the generation
/// passed to [`play`](AudioSink::play).
///
/// [`PlayerEvent`]: crate::events::PlayerEvent
pub(crate) trait AudioSink: Send + Sync {
    /// Replaces the playback graph with `track`, from its start.
    fn play(&self, track: &DecodedTrack, generation: u64) -> Result<(), PlayerError>;

    /// Drops whatever is currently playing.
    fn clear(&self) -> Result<(), PlayerError>;

    fn set_paused(&self, paused: bool) -> Result<(), PlayerError>;

    /// Holds off the sink's mixing tick until the guard is dropped. Commands
    /// issued while the guard is held take effect together.
    fn lock(&self) -> SinkLock<'_>;

    /// Releases the output device. Safe to call more than once.
    fn close(&self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlaybackMode {
    /// Every track in the list, wrapping at both ends.
    Playlist,
    /// One track on a loop; there is no next or previous.
    Single,
}

/// Represents the current playback status of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlayerState {
    Playing,
    Paused,
    Stopped,
}

/// Why the sink gave up on a submitted track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SinkFailure {
    /// The output device could not be opened.
    Device(String),
    /// The stream itself could not be played.
    Stream(String),
}

/// Outcome of moving to a neighbouring track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Advance {
    /// The track at this index is now playing.
    Loaded(usize),
    /// There is nowhere to go; the session is complete.
    Finished,
}

#[derive(Debug, Default)]
struct PlaybackState {
    current_index: usize,
    paused: bool,
    active: Option<DecodedTrack>,
    /// Whether `active` is currently submitted to the sink.
    in_sink: bool,
    /// Bumped on every submit so stale completions can be told apart.
    generation: u64,
}

impl PlaybackState {
    fn player_state(&self) -> PlayerState {
        if self.paused {
            PlayerState::Paused
        } else if self.in_sink {
            PlayerState::Playing
        } else {
            PlayerState::Stopped
        }
    }
}

pub(crate) struct PlayerSession<S> {
    tracks: TrackList,
    mode: PlaybackMode,
    sink: S,
    decode: DecodeFn,
    state: Mutex<PlaybackState>,
}

impl<S: AudioSink> PlayerSession<S> {
    pub(crate) fn new(tracks: TrackList, mode: PlaybackMode, sink: S) -> Self {
        Self::with_decoder(tracks, mode, sink, decoder::decode)
    }

    pub(crate) fn with_decoder(
        tracks: TrackList,
        mode: PlaybackMode,
        sink: S,
        decode: DecodeFn,
    ) -> Self {
        Self {
            tracks,
            mode,
            sink,
            decode,
            state: Mutex::new(PlaybackState::default()),
        }
    }

    pub(crate) fn mode(&self) -> PlaybackMode {
        self.mode
    }

    #[cfg(test)]
    pub(crate) fn sink(&self) -> &S {
        &self.sink
    }

    pub(crate) fn state(&self) -> PlayerState {
        self.lock_state().player_state()
    }

    pub(crate) fn current_index(&self) -> usize {
        self.lock_state().current_index
    }

    /// Loads the first track. A failure here is fatal to the caller.
    pub(crate) fn start(&self, index: usize) -> Result<(), PlayerError> {
        self.load_and_play(self.tracks.clamp_index(index))
    }

    /// Releases the loaded track, then decodes and submits the track at
    /// `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Decode`] if the new track cannot be decoded. The
    /// sink is left cleared and the index stays on the failed track.
    pub(crate) fn load_and_play(&self, index: usize) -> Result<(), PlayerError> {
        let mut state = self.lock_state();
        state.current_index = index;
        self.load_current(&mut state)
    }

    /// Moves to the next track, wrapping to the first. In single mode there is
    /// no next track and the session reports [`Advance::Finished`].
    pub(crate) fn advance_next(&self) -> Result<Advance, PlayerError> {
        let mut state = self.lock_state();
        self.advance(&mut state, TrackList::next_index)
    }

    /// Moves to the previous track, wrapping to the last.
    pub(crate) fn advance_previous(&self) -> Result<Advance, PlayerError> {
        let mut state = self.lock_state();
        self.advance(&mut state, TrackList::previous_index)
    }

    /// Handles natural end-of-stream reported by the sink.
    ///
    /// Returns `Ok(None)` when the completion belongs to a track that has
    /// since been replaced or stopped.
    pub(crate) fn on_track_finished(&self, generation: u64) -> Result<Option<Advance>, PlayerError> {
        let mut state = self.lock_state();

        if !state.in_sink || state.generation != generation {
            debug!(generation, current = state.generation, "Ignoring stale completion");
            return Ok(None);
        }

        if self.mode == PlaybackMode::Single {
            state.in_sink = false;
        }

        self.advance(&mut state, TrackList::next_index).map(Some)
    }

    /// Whether a start reported by the sink belongs to the loaded track.
    pub(crate) fn on_track_started(&self, generation: u64) -> bool {
        let state = self.lock_state();
        state.in_sink && state.generation == generation
    }

    /// Handles a track the sink could not play.
    ///
    /// The session is left stopped on that track. Returns the error to report,
    /// or `None` when the failure belongs to a track already replaced.
    pub(crate) fn on_track_failed(
        &self,
        generation: u64,
        failure: SinkFailure,
    ) -> Option<PlayerError> {
        let mut state = self.lock_state();

        if !state.in_sink || state.generation != generation {
            debug!(generation, current = state.generation, "Ignoring stale failure");
            return None;
        }

        state.in_sink = false;
        state.paused = false;

        Some(match failure {
            SinkFailure::Device(reason) => PlayerError::DeviceInit(reason),
            SinkFailure::Stream(reason) => PlayerError::Decode {
                path: self.tracks[state.current_index].to_path_buf(),
                reason,
            },
        })
    }

    /// Flips the pause flag and returns its new value.
    ///
    /// The sink lock is held only around the flip itself. Unpausing a session
    /// that was stopped submits the loaded track again from the start.
    pub(crate) fn toggle_pause(&self) -> Result<bool, PlayerError> {
        let mut state = self.lock_state();
        let paused = !state.paused;

        {
            let _sink = self.sink.lock();
            state.paused = paused;
            if state.in_sink {
                self.sink.set_paused(paused)?;
            }
        }

        if !paused && !state.in_sink {
            self.resubmit(&mut state)?;
        }

        Ok(paused)
    }

    /// Clears the pause flag, restarting a stopped track.
    pub(crate) fn resume(&self) -> Result<(), PlayerError> {
        let mut state = self.lock_state();

        if state.in_sink {
            let _sink = self.sink.lock();
            state.paused = false;
            self.sink.set_paused(false)
        } else {
            state.paused = false;
            self.resubmit(&mut state)
        }
    }

    /// Clears the sink and rewinds the loaded track without moving the index.
    pub(crate) fn stop(&self) -> Result<(), PlayerError> {
        let mut state = self.lock_state();
        let _sink = self.sink.lock();

        self.sink.clear()?;
        state.in_sink = false;
        state.paused = false;

        Ok(())
    }

    /// Drops the loaded track and releases the output device.
    pub(crate) fn shutdown(&self) {
        let mut state = self.lock_state();

        if let Some(track) = state.active.take() {
            debug!(path = %track.path.display(), "Released track");
        }
        state.in_sink = false;

        self.sink.close();
    }

    fn advance(
        &self,
        state: &mut PlaybackState,
        step: fn(&TrackList, usize) -> usize,
    ) -> Result<Advance, PlayerError> {
        match self.mode {
            PlaybackMode::Single => Ok(Advance::Finished),
            PlaybackMode::Playlist => {
                state.current_index = step(&self.tracks, state.current_index);
                self.load_current(state)?;
                Ok(Advance::Loaded(state.current_index))
            }
        }
    }

    fn load_current(&self, state: &mut PlaybackState) -> Result<(), PlayerError> {
        if let Some(previous) = state.active.take() {
            debug!(path = %previous.path.display(), "Released track");
        }

        {
            let _sink = self.sink.lock();
            self.sink.clear()?;
            state.in_sink = false;
            state.paused = false;
        }

        let path = &self.tracks[state.current_index];
        println!("Loading track: {}", path.display());

        let track = (self.decode)(path)?;
        debug!(
            sample_rate = ?track.sample_rate,
            channels = ?track.channels,
            bitrate = ?track.bitrate,
            "Decoded track header"
        );
        self.submit(state, &track)?;
        state.active = Some(track);
        println!("Starting playback...");

        println!(
            "Now playing {}/{}: {}{}",
            state.current_index + 1,
            self.tracks.len(),
            path.display(),
            duration_suffix(state.active.as_ref()),
        );

        Ok(())
    }

    /// Puts the loaded track back into a cleared sink.
    fn resubmit(&self, state: &mut PlaybackState) -> Result<(), PlayerError> {
        let Some(track) = state.active.take() else {
            return Ok(());
        };

        let result = self.submit(state, &track);
        state.active = Some(track);

        if result.is_ok() {
            info!(index = state.current_index, "Restarted track");
        }
        result
    }

    fn submit(&self, state: &mut PlaybackState, track: &DecodedTrack) -> Result<(), PlayerError> {
        state.generation += 1;

        let _sink = self.sink.lock();
        self.sink.set_paused(state.paused)?;
        self.sink.play(track, state.generation)?;
        state.in_sink = true;

        Ok(())
    }

    // The state stays consistent after every assignment, so a poisoned lock
    // is still usable.
    fn lock_state(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn duration_suffix(track: Option<&DecodedTrack>) -> String {
    match track {
        Some(track) if !track.duration.is_zero() => {
            format!(" [{}]", format_time(track.duration.as_secs()))
        }
        _ => String::new(),
    }
}
