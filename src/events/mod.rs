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

//! Application event distribution and orchestration.
//!
//! The main thread is the coordinator: it blocks on the [`PlayerEvent`]
//! channel and applies whatever arrives to the session. Three producers feed
//! the channel:
//!
//! 1. The sink worker, reporting the start, end or failure of a track.
//! 2. The input listener, on quit (and on stop in single mode).
//! 3. The signal listener, on SIGINT or SIGTERM.

mod signals;

pub(crate) use signals::spawn_signal_listener;

use std::{
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info};

use crate::{
    error::PlayerError,
    player::{Advance, AudioSink, PlayerSession, SinkFailure},
};

/// How long startup waits for the first track to be audible.
pub(crate) const START_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, PartialEq)]
pub(crate) enum PlayerEvent {
    /// The sink started playing the stream submitted with this generation.
    TrackStarted(u64),

    /// The sink reached the end of the stream submitted with this generation.
    TrackFinished(u64),

    /// The sink could not play the stream submitted with this generation.
    TrackFailed(u64, SinkFailure),

    /// The user asked to quit.
    Quit,

    /// Single-track playback is over.
    Completed,

    /// SIGINT or SIGTERM was received.
    Interrupted,

    FatalError(String),
}

/// Why the coordinator stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExitReason {
    Quit,
    Completed,
    Interrupted,
}

/// Blocks until the sink confirms the first track is playing.
///
/// Only the sink can report events at this point, so anything else is
/// ignored.
///
/// # Errors
///
/// Returns [`PlayerError::DeviceInit`] or [`PlayerError::Decode`] if the
/// sink cannot play the track, and [`PlayerError::DeviceInit`] if it says
/// nothing within `timeout`.
pub(crate) fn await_first_track<S: AudioSink>(
    session: &PlayerSession<S>,
    event_rx: &Receiver<PlayerEvent>,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());

        match event_rx.recv_timeout(remaining) {
            Ok(PlayerEvent::TrackStarted(generation)) if session.on_track_started(generation) =>
            {
                info!(generation, "Playback started");
                return Ok(());
            }
            Ok(PlayerEvent::TrackFailed(generation, failure)) => {
                if let Some(e) = session.on_track_failed(generation, failure) {
                    return Err(e).context("Failed to play first track");
                }
            }
            Ok(PlayerEvent::FatalError(reason)) => bail!(reason),
            Ok(event) => debug!(?event, "Ignoring event before playback started"),
            Err(RecvTimeoutError::Timeout) => {
                return Err(PlayerError::DeviceInit(
                    "timed out waiting for playback to start".to_string(),
                ))
                .context("Failed to play first track");
            }
            Err(RecvTimeoutError::Disconnected) => {
                bail!("Audio worker stopped before playback started")
            }
        }
    }
}

/// Runs the coordinator loop until the session ends.
///
/// Completions are applied to the session here rather than on the sink
/// thread, so the sink never calls back into the session.
///
/// # Errors
///
/// Returns an error when a worker reports a [`PlayerEvent::FatalError`].
pub(crate) fn process_events<S: AudioSink>(
    session: &PlayerSession<S>,
    event_rx: &Receiver<PlayerEvent>,
) -> Result<ExitReason> {
    while let Ok(event) = event_rx.recv() {
        debug!(?event, "Processing event");

        match event {
            PlayerEvent::TrackFinished(generation) => match session.on_track_finished(generation) {
                Ok(Some(Advance::Finished)) => return Ok(ExitReason::Completed),
                Ok(_) => {}
                Err(e) => error!("Error loading next track: {e}"),
            },
            PlayerEvent::TrackStarted(_) => {}
            PlayerEvent::TrackFailed(generation, failure) => {
                if let Some(e) = session.on_track_failed(generation, failure) {
                    error!("Error playing track: {e}");
                }
            }
            PlayerEvent::Quit => return Ok(ExitReason::Quit),
            PlayerEvent::Completed => return Ok(ExitReason::Completed),
            PlayerEvent::Interrupted => return Ok(ExitReason::Interrupted),
            PlayerEvent::FatalError(reason) => bail!(reason),
        }
    }

    // Every producer hung up, nothing can wake the session again.
    Ok(ExitReason::Quit)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::player::{
        PlaybackMode, PlayerState,
        tests::{SinkCall, started},
    };

    #[test]
    fn completion_advances_and_quit_ends_the_loop() {
        let session = started(PlaybackMode::Playlist, &["a.mp3", "b.mp3"]);
        let (event_tx, event_rx) = mpsc::channel();
        event_tx.send(PlayerEvent::TrackFinished(1)).unwrap();
        event_tx.send(PlayerEvent::Quit).unwrap();

        let reason = process_events(&session, &event_rx).unwrap();

        assert_eq!(reason, ExitReason::Quit);
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn stale_completion_does_not_advance() {
        let session = started(PlaybackMode::Playlist, &["a.mp3", "b.mp3", "c.mp3"]);
        session.advance_next().unwrap();
        let (event_tx, event_rx) = mpsc::channel();
        event_tx.send(PlayerEvent::TrackFinished(1)).unwrap();
        event_tx.send(PlayerEvent::Interrupted).unwrap();

        let reason = process_events(&session, &event_rx).unwrap();

        assert_eq!(reason, ExitReason::Interrupted);
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn broken_next_track_is_logged_and_the_loop_continues() {
        let session = started(PlaybackMode::Playlist, &["a.mp3", "broken.mp3"]);
        let (event_tx, event_rx) = mpsc::channel();
        event_tx.send(PlayerEvent::TrackFinished(1)).unwrap();
        event_tx.send(PlayerEvent::Quit).unwrap();

        let reason = process_events(&session, &event_rx).unwrap();

        assert_eq!(reason, ExitReason::Quit);
        assert_eq!(session.state(), PlayerState::Stopped);
        assert_eq!(session.sink().calls().last(), Some(&SinkCall::Clear));
    }

    #[test]
    fn end_of_a_single_track_completes_the_session() {
        let session = started(PlaybackMode::Single, &["loop.mp3"]);
        let (event_tx, event_rx) = mpsc::channel();
        event_tx.send(PlayerEvent::TrackFinished(1)).unwrap();

        let reason = process_events(&session, &event_rx).unwrap();

        assert_eq!(reason, ExitReason::Completed);
    }

    #[test]
    fn fatal_error_is_returned() {
        let session = started(PlaybackMode::Playlist, &["a.mp3"]);
        let (event_tx, event_rx) = mpsc::channel();
        event_tx
            .send(PlayerEvent::FatalError("MPV worker failure".to_string()))
            .unwrap();

        let err = process_events(&session, &event_rx).unwrap_err();

        assert_eq!(err.to_string(), "MPV worker failure");
    }

    #[test]
    fn failed_track_mid_session_stops_and_the_loop_continues() {
        let session = started(PlaybackMode::Playlist, &["a.mp3", "b.mp3"]);
        let (event_tx, event_rx) = mpsc::channel();
        let failure = SinkFailure::Stream("MPV_ERROR_UNKNOWN_FORMAT".to_string());
        event_tx.send(PlayerEvent::TrackFailed(1, failure)).unwrap();
        event_tx.send(PlayerEvent::Quit).unwrap();

        let reason = process_events(&session, &event_rx).unwrap();

        assert_eq!(reason, ExitReason::Quit);
        assert_eq!(session.state(), PlayerState::Stopped);
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn first_track_is_confirmed_by_its_start() {
        let session = started(PlaybackMode::Playlist, &["a.mp3"]);
        let (event_tx, event_rx) = mpsc::channel();
        event_tx.send(PlayerEvent::TrackStarted(1)).unwrap();

        await_first_track(&session, &event_rx, START_TIMEOUT).unwrap();

        assert_eq!(session.state(), PlayerState::Playing);
    }

    #[test]
    fn output_failure_on_the_first_track_is_fatal() {
        let session = started(PlaybackMode::Playlist, &["a.mp3"]);
        let (event_tx, event_rx) = mpsc::channel();
        let failure = SinkFailure::Device("MPV_ERROR_AO_INIT_FAILED".to_string());
        event_tx.send(PlayerEvent::TrackFailed(1, failure)).unwrap();

        let err = await_first_track(&session, &event_rx, START_TIMEOUT).unwrap_err();

        assert!(matches!(err.downcast_ref::<PlayerError>(), Some(PlayerError::DeviceInit(_))));
        assert_eq!(session.state(), PlayerState::Stopped);
    }

    #[test]
    fn unplayable_first_track_is_a_decode_error() {
        let session = started(PlaybackMode::Single, &["loop.mp3"]);
        let (event_tx, event_rx) = mpsc::channel();
        let failure = SinkFailure::Stream("MPV_ERROR_UNKNOWN_FORMAT".to_string());
        event_tx.send(PlayerEvent::TrackFailed(1, failure)).unwrap();

        let err = await_first_track(&session, &event_rx, START_TIMEOUT).unwrap_err();

        assert!(matches!(err.downcast_ref::<PlayerError>(), Some(PlayerError::Decode { .. })));
    }

    #[test]
    fn silent_sink_times_out_as_a_device_error() {
        let session = started(PlaybackMode::Playlist, &["a.mp3"]);
        let (_event_tx, event_rx) = mpsc::channel();

        let err = await_first_track(&session, &event_rx, Duration::from_millis(20)).unwrap_err();

        assert!(matches!(err.downcast_ref::<PlayerError>(), Some(PlayerError::DeviceInit(_))));
    }

    #[test]
    fn closed_channel_is_treated_as_quit() {
        let session = started(PlaybackMode::Playlist, &["a.mp3"]);
        let (event_tx, event_rx) = mpsc::channel::<PlayerEvent>();
        drop(event_tx);

        assert_eq!(process_events(&session, &event_rx).unwrap(), ExitReason::Quit);
    }
}
