//! # Display Screen Example
//!
//! Runs a shared-room display against a live Picture This server:
//!
//! 1. Subscribe to the game over WebSocket, polling over HTTP when push is down
//! 2. Log every view, connection change and cue
//! 3. Pretend voice cues take a few seconds and report them finished
//! 4. Shut down gracefully on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! PICTURE_THIS_URL=http://localhost:8080 PICTURE_THIS_GAME=g1 \
//!     cargo run --example display_screen
//!
//! # Watch the home roster instead:
//! PICTURE_THIS_URL=http://localhost:8080 PICTURE_THIS_ROLE=lobby \
//!     cargo run --example display_screen
//! ```

use std::sync::Arc;
use std::time::Duration;

use picture_this_client::{
    AudioSink, ClientConfig, ClientError, ClientUpdate, CueKey, HttpFetcher, RoleClientHandle,
    WebSocketConnector,
};
use tokio::sync::mpsc;

/// How long a pretend voice cue "plays".
const VOICE_LENGTH: Duration = Duration::from_secs(3);

/// Speakers that only log, reporting voice starts back to the event loop.
struct LoggedSpeakers {
    voice_started: mpsc::UnboundedSender<CueKey>,
}

impl AudioSink for LoggedSpeakers {
    fn start_ambient(&mut self, key: &CueKey, asset: &str) -> Result<(), ClientError> {
        tracing::info!("♪ ambient {key} ({asset})");
        Ok(())
    }

    fn pause_ambient(&mut self) {
        tracing::info!("♪ ambient paused");
    }

    fn resume_ambient(&mut self) -> Result<(), ClientError> {
        tracing::info!("♪ ambient resumed");
        Ok(())
    }

    fn stop_ambient(&mut self) {
        tracing::info!("♪ ambient stopped");
    }

    fn start_voice(&mut self, key: &CueKey, asset: &str) -> Result<(), ClientError> {
        tracing::info!("🗣 voice {key} ({asset})");
        self.voice_started
            .send(key.clone())
            .map_err(|_| ClientError::PlaybackRejected {
                key: key.to_string(),
                reason: "event loop gone".into(),
            })
    }

    fn play_sting(&mut self, key: &CueKey, asset: &str) -> Result<(), ClientError> {
        tracing::info!("✦ sting {key} ({asset})");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=picture_this_client=debug` for connection details.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let config = ClientConfig::from_env()?;
    tracing::info!(
        "Watching game {:?} as {} on {}",
        config.game_id,
        config.role,
        config.base_url
    );

    // ── Connect ─────────────────────────────────────────────────────
    let (voice_tx, mut voice_rx) = mpsc::unbounded_channel();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let speakers = LoggedSpeakers {
        voice_started: voice_tx,
    };
    let fetcher = HttpFetcher::new(config.connection.fetch_timeout)?;
    let (mut client, mut updates) = RoleClientHandle::start(
        config,
        Box::new(speakers),
        Arc::new(WebSocketConnector::new()),
        Some(Arc::new(fetcher)),
        None,
    )?;

    // A display has nobody to click; treat startup as the interaction.
    client.interaction()?;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else {
                    tracing::info!("Update channel closed, exiting");
                    break;
                };

                match update {
                    ClientUpdate::View(view) => {
                        tracing::info!(
                            "[{}] {} | {} | {}",
                            view.round_label,
                            view.timer,
                            view.stage.title,
                            view.stage.status
                        );
                        if let Some(board) = &view.scoreboard {
                            for line in &board.entries {
                                tracing::info!("    {line}");
                            }
                        }
                    }
                    ClientUpdate::Home(cards) => {
                        tracing::info!("{} open game(s)", cards.len());
                        for card in cards {
                            tracing::info!(
                                "    {} {} ({} players){}",
                                card.join_code,
                                card.phase,
                                card.players,
                                if card.joinable { "" } else { " full" }
                            );
                        }
                    }
                    ClientUpdate::Connection(state) => {
                        tracing::info!("Connection → {state:?}");
                    }
                    ClientUpdate::Cues(cues) => {
                        tracing::debug!("Cues: {cues:?}");
                    }
                    ClientUpdate::Notice { message, .. } => {
                        tracing::warn!("{message}");
                    }
                }
            }

            Some(key) = voice_rx.recv() => {
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(VOICE_LENGTH).await;
                    let _ = done_tx.send(key);
                });
            }

            Some(key) = done_rx.recv() => {
                client.playback_finished(key)?;
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Clean shutdown ──────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Goodbye!");
    Ok(())
}
