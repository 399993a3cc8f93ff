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

//! Process signal handling.
//!
//! Signals are awaited on a small current-thread Tokio runtime running on its
//! own thread; the rest of the player stays synchronous.

use std::{sync::mpsc::Sender, thread};

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use crate::events::PlayerEvent;

/// Spawns a thread that sends [`PlayerEvent::Interrupted`] on the first
/// SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the runtime or the thread cannot be created.
pub(crate) fn spawn_signal_listener(event_tx: Sender<PlayerEvent>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            match runtime.block_on(shutdown_signal()) {
                Ok(()) => {
                    let _ = event_tx.send(PlayerEvent::Interrupted);
                }
                Err(e) => {
                    let _ = event_tx.send(PlayerEvent::FatalError(format!(
                        "Failed to install signal handler: {e}"
                    )));
                }
            }
        })
        .context("Failed to spawn signal listener")?;

    Ok(())
}

/// Resolves on Ctrl+C, or on SIGTERM where the platform has it.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            },
            _ = terminate.recv() => {
                info!("Received terminate signal, shutting down");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}
