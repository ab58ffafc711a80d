//! # Scripted Session Example
//!
//! Drives a [`RoleClient`] through a whole round without any network, the
//! way the dispatch loop would: snapshots arrive as raw frames, voice cues
//! are reported finished right away, and every update is printed.
//!
//! Useful for seeing which cues fire on which transition and what each
//! role's view looks like.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example scripted_session
//!
//! # See it from the display's point of view instead:
//! SCRIPTED_ROLE=display cargo run --example scripted_session
//! ```

use std::sync::mpsc;

use picture_this_client::projector::RolePanel;
use picture_this_client::{
    ActionOutcome, AudioSink, ClientConfig, ClientError, ClientEvent, ClientUpdate, ConnectionState,
    CueKey, InMemoryIdentityStore, Role, RoleClient, TransportEvent, ViewerCredential,
};
use serde_json::{json, Value};

/// Prints playback and hands voice starts back to the script.
struct PrintedSpeakers {
    voices: mpsc::Sender<CueKey>,
}

impl AudioSink for PrintedSpeakers {
    fn start_ambient(&mut self, key: &CueKey, _asset: &str) -> Result<(), ClientError> {
        println!("    ♪ ambient {key}");
        Ok(())
    }

    fn pause_ambient(&mut self) {
        println!("    ♪ (paused)");
    }

    fn resume_ambient(&mut self) -> Result<(), ClientError> {
        println!("    ♪ (resumed)");
        Ok(())
    }

    fn stop_ambient(&mut self) {
        println!("    ♪ (stopped)");
    }

    fn start_voice(&mut self, key: &CueKey, _asset: &str) -> Result<(), ClientError> {
        println!("    🗣 {key}");
        let _ = self.voices.send(key.clone());
        Ok(())
    }

    fn play_sting(&mut self, key: &CueKey, _asset: &str) -> Result<(), ClientError> {
        println!("    ✦ {key}");
        Ok(())
    }
}

fn base() -> Value {
    json!({
        "game_id": "demo",
        "join_code": "DEMO",
        "phase": "lobby",
        "players": ["Ann", "Bo"],
        "player_ids": [1, 2],
        "host_id": 1,
        "max_players": 8,
        "total_rounds": 1,
        "current_round": 0,
    })
}

fn with(mut value: Value, patch: Value) -> Value {
    if let (Some(target), Value::Object(fields)) = (value.as_object_mut(), patch) {
        target.extend(fields);
    }
    value
}

fn script() -> Vec<(&'static str, Value)> {
    let three = with(
        base(),
        json!({"players": ["Ann", "Bo", "Cy"], "player_ids": [1, 2, 3]}),
    );
    let round = with(three.clone(), json!({"current_round": 1}));
    vec![
        ("Lobby opens", base()),
        ("Cy joins", three),
        ("Drawing starts", with(round.clone(), json!({"phase": "drawings"}))),
        (
            "Two drawings in",
            with(round.clone(), json!({"phase": "drawings", "counts": {"drawings": 2}})),
        ),
        (
            "Bo guesses on Ann's drawing",
            with(
                round.clone(),
                json!({"phase": "guesses", "guess_required_count": 2,
                       "guess_focus": {"drawing_index": 0, "drawing_owner": 1,
                                       "drawing_image": "/drawings/0.png",
                                       "pending_player_ids": [2, 3]}}),
            ),
        ),
        (
            "Voting on Bo's own drawing",
            with(
                round.clone(),
                json!({"phase": "guesses-votes", "vote_required_count": 2,
                       "vote_focus": {"drawing_index": 1, "drawing_owner": 2,
                                      "drawing_image": "/drawings/1.png",
                                      "pending_player_ids": [1, 3],
                                      "options": ["a cat", "a hat"]}}),
            ),
        ),
        (
            "Reveal: guesses",
            with(
                round.clone(),
                json!({"phase": "results",
                       "reveal": {"stage": "guesses", "drawing_index": 0, "prompt": "a cat",
                                  "guesses": [{"player_name": "Bo", "text": "a hat"}]}}),
            ),
        ),
        (
            "Reveal: joke",
            with(
                round.clone(),
                json!({"phase": "results",
                       "reveal": {"stage": "joke", "drawing_index": 0, "prompt": "a cat",
                                  "joke": "Purrfect.", "joke_audio": "/audio/joke-0.mp3"}}),
            ),
        ),
        (
            "Game over",
            with(
                round,
                json!({"phase": "complete",
                       "scores": [{"player_id": 2, "player_name": "Bo", "score": 1500},
                                  {"player_id": 1, "player_name": "Ann", "score": 500}]}),
            ),
        ),
    ]
}

fn print_updates(updates: Vec<ClientUpdate>) {
    for update in updates {
        match update {
            ClientUpdate::View(view) => {
                println!(
                    "  {} | {} | {}",
                    view.round_label, view.stage.title, view.stage.status
                );
                let players: Vec<String> = view.players.iter().map(|p| p.label()).collect();
                println!("  players: {}", players.join(", "));
                if let RolePanel::Player(panel) = &view.panel {
                    match &panel.action {
                        Some(form) => println!(
                            "  form: {:?} on drawing {} ({})",
                            form.kind,
                            form.drawing_index,
                            if form.enabled { "enabled" } else { "disabled" }
                        ),
                        None => println!("  status: {}", panel.status),
                    }
                }
                if let Some(scores) = &view.final_scores {
                    for line in scores {
                        println!("    {line}");
                    }
                }
            }
            ClientUpdate::Cues(cues) => {
                let keys: Vec<String> = cues.iter().map(|c| c.key.to_string()).collect();
                println!("  cues: {}", keys.join(", "));
            }
            ClientUpdate::Notice { message, .. } => println!("  notice: {message}"),
            other => println!("  {other:?}"),
        }
    }
}

/// Finish every voice cue as soon as it starts.
fn drain_voices(client: &mut RoleClient, voices: &mpsc::Receiver<CueKey>) {
    while let Ok(key) = voices.try_recv() {
        print_updates(client.handle(ClientEvent::PlaybackFinished(key)));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let role = std::env::var("SCRIPTED_ROLE")
        .ok()
        .and_then(|name| Role::parse(&name))
        .unwrap_or(Role::Player);

    let (voice_tx, voice_rx) = mpsc::channel();
    let config = ClientConfig::new("http://localhost:8080", "demo", role);
    let mut client = RoleClient::new(
        &config,
        Box::new(PrintedSpeakers { voices: voice_tx }),
        Some(Box::new(InMemoryIdentityStore::new())),
    );

    if role.is_participant() {
        print_updates(client.handle(ClientEvent::Credential(ViewerCredential {
            viewer_id: 2,
            token: "demo-token".into(),
            name: "Bo".into(),
        })));
    }
    println!("Screen: {role}, viewer {:?}", client.viewer_id());

    print_updates(client.handle(TransportEvent::StateChanged(ConnectionState::LivePush).into()));
    client.handle(ClientEvent::Interaction);

    for (title, snapshot) in script() {
        println!("\n== {title}");
        let frame = serde_json::to_string(&snapshot)?;
        print_updates(client.handle(TransportEvent::Message(frame).into()));
        drain_voices(&mut client, &voice_rx);

        if title.starts_with("Bo guesses") && role.is_participant() {
            println!("  (Bo submits a guess)");
            print_updates(client.handle(
                ActionOutcome::Submitted {
                    round: 1,
                    drawing_index: 0,
                }
                .into(),
            ));
        }
    }

    client.leave();
    println!("\nLeft the game; audio silenced.");
    Ok(())
}
