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

//! MPV-backed audio sink.
//!
//! The mpv handle lives on a dedicated worker thread, the "sink thread". The
//! session talks to it through a command channel and the worker reports the
//! start, natural end and failure of each submitted track back on the
//! application event channel.
//!
//! # Architecture
//!
//! Each turn of the worker loop waits briefly for an mpv event, then takes
//! the tick lock and, while holding it, handles that event and drains every
//! queued command. A caller holding [`AudioSink::lock`] therefore keeps the
//! worker from observing half of a command group.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        mpsc::{self, Receiver, Sender, TryRecvError},
    },
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{
    error::PlayerError,
    events::PlayerEvent,
    player::{AudioSink, SinkFailure, SinkLock, decoder::DecodedTrack},
};

/// How long one turn of the worker waits for an mpv event, in seconds.
const EVENT_TIMEOUT: f64 = 0.05;

#[derive(Debug)]
enum SinkCommand {
    Play { filename: String, generation: u64 },
    Clear,
    SetPaused(bool),
    Close,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SinkOptions {
    /// Repeat the loaded file forever instead of reporting its end.
    pub(crate) loop_track: bool,
}

/// A handle to the mpv worker thread.
pub(crate) struct MpvSink {
    command_tx: Sender<SinkCommand>,
    tick: Arc<Mutex<()>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MpvSink {
    /// Spawns the worker and waits until mpv has initialised.
    ///
    /// # Arguments
    ///
    /// * `options` - Output behaviour fixed for the lifetime of the sink.
    /// * `event_tx` - Where completions and worker failures are reported.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::DeviceInit`] if mpv cannot be created.
    pub(crate) fn new(options: SinkOptions, event_tx: Sender<PlayerEvent>) -> Result<Self, PlayerError> {
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let tick = Arc::new(Mutex::new(()));
        let worker_tick = Arc::clone(&tick);

        let worker = thread::Builder::new()
            .name("mpv-sink".to_string())
            .spawn(move || {
                let handler = match build_handler(options) {
                    Ok(handler) => {
                        let _ = ready_tx.send(Ok(()));
                        handler
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("{e:#}")));
                        return;
                    }
                };

                if let Err(e) = sink_worker(handler, &command_rx, &worker_tick, &event_tx) {
                    let _ = event_tx.send(PlayerEvent::FatalError(format!("MPV worker failure: {e:?}")));
                }
            })
            .map_err(|e| PlayerError::DeviceInit(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(PlayerError::DeviceInit(reason)),
            Err(_) => {
                return Err(PlayerError::DeviceInit(
                    "audio worker exited during startup".to_string(),
                ));
            }
        }

        info!(loop_track = options.loop_track, "Audio output ready");

        Ok(Self {
            command_tx,
            tick,
            worker: Mutex::new(Some(worker)),
        })
    }

    fn send(&self, command: SinkCommand) -> Result<(), PlayerError> {
        self.command_tx
            .send(command)
            .map_err(|_| PlayerError::Sink("audio worker has stopped".to_string()))
    }
}

impl AudioSink for MpvSink {
    fn play(&self, track: &DecodedTrack, generation: u64) -> Result<(), PlayerError> {
        let filename = track
            .path
            .to_str()
            .ok_or_else(|| PlayerError::Sink(format!("Path contains invalid UTF-8: {:?}", track.path)))?
            .to_string();

        self.send(SinkCommand::Play { filename, generation })
    }

    fn clear(&self) -> Result<(), PlayerError> {
        self.send(SinkCommand::Clear)
    }

    fn set_paused(&self, paused: bool) -> Result<(), PlayerError> {
        self.send(SinkCommand::SetPaused(paused))
    }

    fn lock(&self) -> SinkLock<'_> {
        self.tick.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = worker {
            let _ = self.command_tx.send(SinkCommand::Close);
            if worker.join().is_err() {
                warn!("Audio worker panicked during shutdown");
            }
            info!("Audio output closed");
        }
    }
}

impl Drop for MpvSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_handler(options: SinkOptions) -> Result<mpv::MpvHandler> {
    let mut builder = mpv::MpvHandlerBuilder::new().context("Failed to create MPV builder")?;
    builder
        .set_option("vo", "null")
        .context("Failed to set no video output")?;
    if options.loop_track {
        builder
            .set_option("loop-file", "inf")
            .context("Failed to enable looping")?;
    }
    builder.build().context("Failed to build MPV handler")
}

/// What the worker cares about in mpv's event stream.
#[derive(Debug, Clone, PartialEq)]
enum MpvSignal {
    StartFile,
    PlaybackRestart,
    EndOfStream,
    Failed(String),
}

impl MpvSignal {
    fn from_event(event: mpv::Event) -> Option<Self> {
        match event {
            mpv::Event::StartFile => Some(MpvSignal::StartFile),
            mpv::Event::PlaybackRestart => Some(MpvSignal::PlaybackRestart),
            mpv::Event::EndFile(Ok(mpv::EndFileReason::MPV_END_FILE_REASON_EOF)) => {
                Some(MpvSignal::EndOfStream)
            }
            mpv::Event::EndFile(Err(e)) => Some(MpvSignal::Failed(format!("{e:?}"))),
            _ => None,
        }
    }
}

/// Maps mpv's file lifecycle onto session generations.
///
/// A generation only becomes current once mpv announces the start of the file
/// it was loaded with. Every `loadfile` produces exactly one start, so end and
/// failure events seen while loads are still in flight belong to a file the
/// session has already replaced.
#[derive(Debug, Default)]
struct GenerationTracker {
    loads_in_flight: u32,
    requested: Option<u64>,
    current: Option<u64>,
    announced: bool,
}

impl GenerationTracker {
    fn on_load(&mut self, generation: u64) {
        self.loads_in_flight += 1;
        self.requested = Some(generation);
        self.current = None;
    }

    fn on_clear(&mut self) {
        *self = Self::default();
    }

    /// Returns the event to report to the coordinator, if any.
    fn on_signal(&mut self, signal: MpvSignal) -> Option<PlayerEvent> {
        match signal {
            MpvSignal::StartFile => {
                if self.loads_in_flight > 0 {
                    self.loads_in_flight -= 1;
                    if self.loads_in_flight == 0 {
                        self.current = self.requested.take();
                        self.announced = false;
                    }
                }
                None
            }
            MpvSignal::PlaybackRestart => match self.current {
                Some(generation) if !self.announced => {
                    self.announced = true;
                    Some(PlayerEvent::TrackStarted(generation))
                }
                _ => None,
            },
            MpvSignal::EndOfStream => self.current.take().map(PlayerEvent::TrackFinished),
            MpvSignal::Failed(reason) => {
                let failure = classify_failure(reason);
                self.current
                    .take()
                    .map(|generation| PlayerEvent::TrackFailed(generation, failure))
            }
        }
    }
}

/// Tells an output failure apart from a stream mpv could not play.
fn classify_failure(reason: String) -> SinkFailure {
    let lowered = reason.to_ascii_lowercase();
    let device = ["ao_init", "audio output", "audio device"]
        .iter()
        .any(|needle| lowered.contains(needle));
    if device {
        SinkFailure::Device(reason)
    } else {
        SinkFailure::Stream(reason)
    }
}

/// The worker loop. Returns once [`SinkCommand::Close`] arrives or every
/// sender is gone.
fn sink_worker(
    mut handler: mpv::MpvHandler,
    command_rx: &Receiver<SinkCommand>,
    tick: &Mutex<()>,
    event_tx: &Sender<PlayerEvent>,
) -> Result<()> {
    let mut tracker = GenerationTracker::default();

    loop {
        let signal = handler.wait_event(EVENT_TIMEOUT).and_then(MpvSignal::from_event);

        let _tick = tick.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(signal) = signal {
            if let MpvSignal::Failed(reason) = &signal {
                warn!("Playback failed: {reason}");
            }
            if let Some(event) = tracker.on_signal(signal) {
                debug!(?event, "Reporting sink event");
                event_tx.send(event).context("Failed to send sink event")?;
            }
        }

        if !process_commands(&mut handler, command_rx, &mut tracker)? {
            return Ok(());
        }
    }
}

/// Drains and executes all pending commands. Returns `false` once the sink
/// should shut down.
fn process_commands(
    handler: &mut mpv::MpvHandler,
    command_rx: &Receiver<SinkCommand>,
    tracker: &mut GenerationTracker,
) -> Result<bool> {
    loop {
        let command = match command_rx.try_recv() {
            Ok(command) => command,
            Err(TryRecvError::Empty) => return Ok(true),
            Err(TryRecvError::Disconnected) => return Ok(false),
        };

        match command {
            SinkCommand::Play { filename, generation } => {
                handler
                    .command(&["loadfile", &filename, "replace"])
                    .context(format!("Failed to load file: {}", &filename))?;
                tracker.on_load(generation);
            }
            SinkCommand::Clear => {
                handler.command(&["stop"]).context("Failed to clear playback")?;
                tracker.on_clear();
            }
            SinkCommand::SetPaused(paused) => {
                handler
                    .set_property("pause", paused)
                    .context("Failed to set pause")?;
            }
            SinkCommand::Close => return Ok(false),
        }
    }
}
