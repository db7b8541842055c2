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

//! Lifecycle owner for one meeting.
//!
//! [`MeshCoordinator::start`] acquires local media, fetches ICE servers,
//! opens the signaling socket and spawns a single task that owns the
//! [`MeshSession`]. Signaling frames, peer callbacks, user commands and
//! the screen-share ended signal are all consumed by that task with
//! `tokio::select!`, one at a time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use meshcall_client::{
//!     CoordinatorDeps, MeetingConfig, MeetingEvent, MeshCoordinator, NoMediaDevices,
//!     StaticIceServers, WebSocketConnector,
//! };
//! # use meshcall_client::PeerConnectionFactory;
//!
//! # async fn example(factory: Arc<dyn PeerConnectionFactory>) -> anyhow::Result<()> {
//! let config = MeetingConfig::from_env_or_default()?;
//! let mut coordinator = MeshCoordinator::new(
//!     config,
//!     CoordinatorDeps {
//!         media_devices: Arc::new(NoMediaDevices),
//!         peer_factory: factory,
//!         connector: Arc::new(WebSocketConnector),
//!         ice_servers: Arc::new(StaticIceServers::default()),
//!     },
//! );
//! let mut events = coordinator.subscribe();
//! coordinator.start().await?;
//! while let Ok(event) = events.recv().await {
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! coordinator.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_broadcast::Receiver;
use log::{debug, error, info, warn};
use meshcall_types::IceServer;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::MeetingConfig;
use crate::constants::COMMAND_CHANNEL_CAPACITY;
use crate::error::{CoordinatorError, MediaError, MeetingError};
use crate::event_bus::EventBus;
use crate::events::MeetingEvent;
use crate::ice::IceServerProvider;
use crate::media::{LocalMedia, MediaDevices};
use crate::peer::{PeerConnectionFactory, PeerEvent};
use crate::session::{MeetingSnapshot, MeshSession};
use crate::signaling::{CloseInfo, SignalingConnector, SignalingState, SocketEvent};

/// The platform pieces a coordinator runs on.
#[derive(Clone)]
pub struct CoordinatorDeps {
    pub media_devices: Arc<dyn MediaDevices>,
    pub peer_factory: Arc<dyn PeerConnectionFactory>,
    pub connector: Arc<dyn SignalingConnector>,
    pub ice_servers: Arc<dyn IceServerProvider>,
}

enum Command {
    ToggleAudio(oneshot::Sender<bool>),
    ToggleVideo(oneshot::Sender<bool>),
    ToggleScreenShare(oneshot::Sender<Result<bool, MediaError>>),
    Snapshot(oneshot::Sender<MeetingSnapshot>),
    Leave(oneshot::Sender<()>),
}

struct Running {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

pub struct MeshCoordinator {
    config: MeetingConfig,
    deps: CoordinatorDeps,
    events: EventBus,
    running: Option<Running>,
}

impl MeshCoordinator {
    pub fn new(config: MeetingConfig, deps: CoordinatorDeps) -> Self {
        Self {
            config,
            deps,
            events: EventBus::new(),
            running: None,
        }
    }

    pub fn config(&self) -> &MeetingConfig {
        &self.config
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> Receiver<MeetingEvent> {
        self.events.subscribe()
    }

    /// Whether the meeting task is still alive.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Join the meeting.
    ///
    /// Media failures degrade to view-only and an unreachable ICE endpoint
    /// falls back to the configured STUN list; only a signaling connect
    /// failure is returned as an error.
    pub async fn start(&mut self) -> Result<(), CoordinatorError> {
        if self.running.is_some() {
            return Err(CoordinatorError::AlreadyStarted);
        }
        let url = self
            .config
            .room_url()
            .map_err(|e| CoordinatorError::Config(e.to_string()))?;

        let mut local = LocalMedia::acquire(self.deps.media_devices.clone()).await;
        self.events
            .emit(MeetingEvent::LocalMediaChanged(local.state()));

        let ice_servers = self.fetch_ice_servers().await;

        self.events
            .emit(MeetingEvent::SignalingStateChanged(SignalingState::Connecting));
        let (socket, inbound) = match self.deps.connector.connect(url.as_str()).await {
            Ok(connected) => connected,
            Err(e) => {
                error!("Failed to open signaling socket: {e}");
                local.stop_all();
                self.events
                    .emit(MeetingEvent::SignalingStateChanged(SignalingState::Closed));
                self.events
                    .emit(MeetingEvent::MeetingEnded(MeetingError::Signaling(e.to_string())));
                return Err(e.into());
            }
        };

        let (mut session, peer_events) = MeshSession::new(
            self.config.display_name.clone(),
            local,
            socket,
            self.deps.peer_factory.clone(),
            ice_servers,
            self.events.clone(),
        );
        session.on_socket_open();

        let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task = tokio::spawn(run(session, inbound, peer_events, command_rx));
        info!("Meeting task started for room {}", self.config.room);
        self.running = Some(Running { commands, task });
        Ok(())
    }

    /// Leave the meeting and wait for the meeting task to finish. Safe to
    /// call after the meeting already ended on its own.
    pub async fn stop(&mut self) -> Result<(), CoordinatorError> {
        let Some(running) = self.running.take() else {
            return Err(CoordinatorError::NotRunning);
        };
        let (ack, ack_rx) = oneshot::channel();
        if running.commands.send(Command::Leave(ack)).await.is_ok() {
            let _ = ack_rx.await;
        }
        if let Err(e) = running.task.await {
            warn!("Meeting task ended abnormally: {e}");
        }
        Ok(())
    }

    pub async fn toggle_audio(&self) -> Result<bool, CoordinatorError> {
        self.request(Command::ToggleAudio).await
    }

    pub async fn toggle_video(&self) -> Result<bool, CoordinatorError> {
        self.request(Command::ToggleVideo).await
    }

    /// Returns whether sharing is active afterwards.
    pub async fn toggle_screen_share(&self) -> Result<bool, CoordinatorError> {
        Ok(self.request(Command::ToggleScreenShare).await??)
    }

    pub async fn snapshot(&self) -> Result<MeetingSnapshot, CoordinatorError> {
        self.request(Command::Snapshot).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let running = self.running.as_ref().ok_or(CoordinatorError::NotRunning)?;
        let (tx, rx) = oneshot::channel();
        running
            .commands
            .send(make(tx))
            .await
            .map_err(|_| CoordinatorError::NotRunning)?;
        rx.await.map_err(|_| CoordinatorError::NotRunning)
    }

    async fn fetch_ice_servers(&self) -> Vec<IceServer> {
        let reason = match self.deps.ice_servers.ice_servers().await {
            Ok(servers) if !servers.is_empty() => {
                debug!("Using {} ICE servers", servers.len());
                return servers;
            }
            Ok(_) => "ICE server list was empty".to_string(),
            Err(e) => format!("ICE server fetch failed: {e}"),
        };
        warn!("{reason}; falling back to public STUN, relay is unavailable");
        self.events
            .emit(MeetingEvent::IceServersFallback { reason });
        self.config.fallback_ice_servers.clone()
    }
}

impl Drop for MeshCoordinator {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

async fn run(
    mut session: MeshSession,
    mut inbound: mpsc::Receiver<SocketEvent>,
    mut peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    mut commands: mpsc::Receiver<Command>,
) {
    loop {
        let mut screen_ended = session.screen_ended_signal();
        tokio::select! {
            event = inbound.recv() => match event {
                Some(SocketEvent::Text(text)) => session.handle_text(&text).await,
                Some(SocketEvent::Closed(info)) => session.handle_socket_closed(info).await,
                None => {
                    session
                        .handle_socket_closed(CloseInfo::new(None, "socket reader ended"))
                        .await
                }
            },
            Some(event) = peer_events.recv() => session.handle_peer_event(event).await,
            command = commands.recv() => match command {
                Some(Command::ToggleAudio(reply)) => {
                    let _ = reply.send(session.toggle_audio());
                }
                Some(Command::ToggleVideo(reply)) => {
                    let _ = reply.send(session.toggle_video());
                }
                Some(Command::ToggleScreenShare(reply)) => {
                    let _ = reply.send(session.toggle_screen_share().await);
                }
                Some(Command::Snapshot(reply)) => {
                    let _ = reply.send(session.snapshot());
                }
                Some(Command::Leave(ack)) => {
                    session.leave().await;
                    let _ = ack.send(());
                }
                None => session.leave().await,
            },
            _ = wait_ended(screen_ended.as_mut()) => session.handle_screen_share_ended().await,
        }
        if session.is_ended() {
            break;
        }
    }
    debug!("Meeting task finished: {:?}", session.state());
}

async fn wait_ended(signal: Option<&mut watch::Receiver<bool>>) {
    match signal {
        Some(signal) => {
            let _ = signal.wait_for(|ended| *ended).await;
        }
        None => std::future::pending().await,
    }
}
