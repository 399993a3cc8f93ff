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

//! # MP3 Player CLI.
//!
//! Plays every MP3 file in a folder, or a single file on a loop, and takes
//! one-letter commands from standard input.
//!
//! ## Architecture
//!
//! * The **Main Thread** builds the track list, starts playback and then
//!   coordinates events until the session ends.
//! * The **Input Thread** blocks on standard input and drives the session.
//! * The **Sink Thread** owns the mpv handle and reports the end of each
//!   track.
//! * The **Signal Thread** waits for SIGINT or SIGTERM.
//!
//! Communication back to the main thread is handled via `std::sync::mpsc`
//! channels. Whatever ends the session, the loaded track and the audio
//! device are released before the process exits.

mod config;
mod error;
mod events;
mod input;
mod library;
mod player;
mod util;

use std::sync::{Arc, mpsc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::{Args, PlayerConfig, USAGE},
    error::PlayerError,
    events::{ExitReason, PlayerEvent, START_TIMEOUT, await_first_track, process_events},
    player::{
        PlaybackMode, PlayerSession,
        mpv_sink::{MpvSink, SinkOptions},
    },
};

/// The entry point of the application.
///
/// Exits with status 0 for a usage message, an empty folder and any normal
/// end of playback. Startup failures are returned as errors.
fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level);

    let Some(config) = args.resolve() else {
        println!("{USAGE}");
        return Ok(());
    };

    run(config)
}

/// Sends diagnostics to stderr so stdout only carries player status.
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mp3cli={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Builds the session, hands control to the coordinator and tears everything
/// down afterwards.
fn run(config: PlayerConfig) -> Result<()> {
    info!(root = %config.root.display(), mode = ?config.mode, "Starting player");

    let tracks = match library::discover(&config.root) {
        Ok(tracks) => tracks,
        Err(PlayerError::EmptyPlaylist(_)) => {
            println!("No MP3 files found in the specified folder");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to build track list"),
    };

    let (event_tx, event_rx) = mpsc::channel::<PlayerEvent>();

    let options = SinkOptions {
        loop_track: config.mode == PlaybackMode::Single,
    };
    let sink = MpvSink::new(options, event_tx.clone()).context("Failed to initialise audio output")?;

    let session = Arc::new(PlayerSession::new(tracks, config.mode, sink));

    let result = (|| {
        session
            .start(config.start_index)
            .context("Failed to load first track")?;
        await_first_track(&session, &event_rx, START_TIMEOUT)?;

        events::spawn_signal_listener(event_tx.clone())?;

        println!("{}", input::controls(config.mode));

        input::spawn_input_listener(Arc::clone(&session), event_tx)?;

        process_events(&session, &event_rx)
    })();

    match result {
        Ok(ExitReason::Interrupted) => println!("\nInterrupted"),
        Ok(ExitReason::Quit | ExitReason::Completed) => println!("\nExiting..."),
        Err(_) => {}
    }

    session.shutdown();

    result.map(|_| ())
}
