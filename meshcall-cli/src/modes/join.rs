/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

use std::sync::Arc;

use async_broadcast::RecvError;
use meshcall_cli::cli_args::Join;
use meshcall_cli::keys::{KeyCommand, HELP};
use meshcall_client::webrtc_backend::{SampleTrackDevices, WebRtcPeerFactory};
use meshcall_client::{
    api_client, CoordinatorDeps, CoordinatorError, IceServerProvider, MediaDevices,
    MeetingEvent, MeshCoordinator, NoMediaDevices, StaticIceServers, TileContent,
    WebSocketConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

pub async fn join(opt: Join) -> anyhow::Result<()> {
    let config = opt.meeting_config()?;

    let media_devices: Arc<dyn MediaDevices> = if opt.view_only {
        Arc::new(NoMediaDevices)
    } else {
        Arc::new(SampleTrackDevices {
            audio: true,
            video: true,
        })
    };
    let ice_servers: Arc<dyn IceServerProvider> = if opt.no_api {
        Arc::new(StaticIceServers(config.fallback_ice_servers.clone()))
    } else {
        Arc::new(api_client(&config))
    };
    let deps = CoordinatorDeps {
        media_devices,
        peer_factory: Arc::new(WebRtcPeerFactory::new()?),
        connector: Arc::new(WebSocketConnector),
        ice_servers,
    };

    println!(
        "Joining room '{}' as {} via {}",
        config.room, config.display_name, config.signaling_url
    );
    let mut coordinator = MeshCoordinator::new(config, deps);
    let mut events = coordinator.subscribe();
    coordinator.start().await?;
    println!("{HELP}");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Overflowed(n)) => warn!("Missed {n} meeting events"),
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line? {
                Some(line) => {
                    let Some(command) = KeyCommand::parse(&line) else {
                        continue;
                    };
                    if command == KeyCommand::Leave {
                        break;
                    }
                    if let Err(e) = run_command(&coordinator, command).await {
                        warn!("{e}");
                    }
                }
                None => {
                    debug!("stdin closed, controls disabled");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => {
                info!("Interrupted, leaving");
                break;
            }
        }
    }

    match coordinator.stop().await {
        Ok(()) | Err(CoordinatorError::NotRunning) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn run_command(
    coordinator: &MeshCoordinator,
    command: KeyCommand,
) -> Result<(), CoordinatorError> {
    match command {
        KeyCommand::ToggleAudio => {
            let on = coordinator.toggle_audio().await?;
            println!("Microphone {}", if on { "on" } else { "muted" });
        }
        KeyCommand::ToggleVideo => {
            let on = coordinator.toggle_video().await?;
            println!("Camera {}", if on { "on" } else { "off" });
        }
        KeyCommand::ToggleScreenShare => {
            let sharing = coordinator.toggle_screen_share().await?;
            println!("Screen share {}", if sharing { "started" } else { "stopped" });
        }
        KeyCommand::Status => {
            let snapshot = coordinator.snapshot().await?;
            println!(
                "{:?} as {} | signaling {} | {} links",
                snapshot.state,
                snapshot.participant_id.as_deref().unwrap_or("-"),
                snapshot.signaling,
                snapshot.links.len()
            );
            for link in &snapshot.links {
                println!(
                    "  {} link {} {:?} {}",
                    link.peer_id, link.link_id, link.negotiation, link.connection_state
                );
            }
        }
        KeyCommand::Help => println!("{HELP}"),
        KeyCommand::Leave => {}
    }
    Ok(())
}

fn print_event(event: &MeetingEvent) {
    match event {
        MeetingEvent::SignalingStateChanged(state) => println!("Signaling {state}"),
        MeetingEvent::Joined {
            participant_id,
            participants,
        } => {
            println!("Joined as {participant_id}, {} already here", participants.len());
        }
        MeetingEvent::ServerError { code, message } => println!("Server error {code}: {message}"),
        MeetingEvent::IceServersFallback { reason } => {
            println!("{reason}; using public STUN only, relay unavailable")
        }
        MeetingEvent::ParticipantJoined(p) => println!("{} joined", p.display_name()),
        MeetingEvent::ParticipantLeft(id) => println!("{id} left"),
        MeetingEvent::PeerConnectionStateChanged { peer_id, state } => {
            println!("{peer_id}: {state}")
        }
        MeetingEvent::PeerDropped { peer_id, reason } => println!("Lost {peer_id}: {reason}"),
        MeetingEvent::TilesChanged(tiles) => {
            let grid: Vec<String> = tiles
                .iter()
                .map(|t| match &t.content {
                    TileContent::Video { .. } => format!("[{}]", t.name),
                    TileContent::Placeholder { initials } => format!("({initials})"),
                })
                .collect();
            println!("Tiles: {}", grid.join(" "));
        }
        MeetingEvent::MeetingEnded(error) => println!("Meeting ended: {error}"),
        MeetingEvent::Left => println!("Left the meeting"),
        other => debug!("{other:?}"),
    }
}
