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

//! The per-meeting state machine.
//!
//! [`MeshSession`] owns the roster, local media, the signaling channel and
//! the peer registry, and handles one input at a time: a signaling frame,
//! a peer event, a user command, or the socket closing. Each handler runs
//! to completion (including awaited SDP steps) before the next input is
//! looked at, which is what keeps per-peer negotiation ordered without
//! locks. [`MeshCoordinator`](crate::MeshCoordinator) drives it from a
//! single task; tests drive it directly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{debug, info, warn};
use meshcall_types::{IceServer, InboundMessage, OutboundMessage, Participant};
use tokio::sync::{mpsc, watch};

use crate::error::{MediaError, MeetingError, PeerError};
use crate::event_bus::EventBus;
use crate::events::{MeetingEvent, ScreenShareEvent};
use crate::media::{LocalMedia, LocalMediaState};
use crate::negotiation;
use crate::peer::{
    OutgoingTracks, PeerConnectionConfig, PeerConnectionFactory, PeerEvent, PeerEventKind,
    PeerLinkInfo, PeerRegistry, RemoteStreamEntry,
};
use crate::signaling::{CloseInfo, SignalingChannel, SignalingSocket, SignalingState};
use crate::surface::{compute_tiles, RemoteTile, Tile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingState {
    /// Socket open, waiting for `joined`.
    Joining,
    InMeeting,
    /// Terminal. `None` when the meeting ended without an error.
    Ended(Option<MeetingError>),
}

/// Everything a UI needs to render the meeting at one point in time.
#[derive(Debug, Clone)]
pub struct MeetingSnapshot {
    pub state: MeetingState,
    pub signaling: SignalingState,
    pub participant_id: Option<String>,
    pub roster: Vec<Participant>,
    pub links: Vec<PeerLinkInfo>,
    pub remote_streams: Vec<RemoteStreamEntry>,
    pub local_media: LocalMediaState,
    pub ice_servers: Vec<IceServer>,
    pub tiles: Vec<Tile>,
}

pub struct MeshSession {
    display_name: String,
    local: LocalMedia,
    signaling: SignalingChannel,
    registry: PeerRegistry,
    roster: BTreeMap<String, Participant>,
    participant_id: Option<String>,
    state: MeetingState,
    /// An `error` frame that was the last message received; reported as the
    /// cause if the socket closes next.
    last_server_error: Option<(String, String)>,
    /// Participants whose link failed. They keep their roster entry but
    /// lose their tile until they rejoin or a new link comes up.
    dropped: BTreeSet<String>,
    events: EventBus,
    tiles: Vec<Tile>,
}

impl MeshSession {
    /// Build a session over a socket that has just connected. The returned
    /// receiver carries callbacks from every peer connection this session
    /// creates.
    pub fn new(
        display_name: impl Into<String>,
        local: LocalMedia,
        socket: Arc<dyn SignalingSocket>,
        factory: Arc<dyn PeerConnectionFactory>,
        ice_servers: Vec<IceServer>,
        events: EventBus,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let registry = PeerRegistry::new(factory, PeerConnectionConfig { ice_servers }, peer_tx);
        let session = Self {
            display_name: display_name.into(),
            local,
            signaling: SignalingChannel::new(socket),
            registry,
            roster: BTreeMap::new(),
            participant_id: None,
            state: MeetingState::Joining,
            last_server_error: None,
            dropped: BTreeSet::new(),
            events,
            tiles: Vec::new(),
        };
        (session, peer_rx)
    }

    // === Accessors ===

    pub fn state(&self) -> &MeetingState {
        &self.state
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state, MeetingState::Ended(_))
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.signaling.state()
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.participant_id.as_deref()
    }

    pub fn roster(&self) -> impl Iterator<Item = &Participant> {
        self.roster.values()
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn local(&self) -> &LocalMedia {
        &self.local
    }

    /// Local tile plus one per participant, unless their link was dropped.
    pub fn tiles(&self) -> Vec<Tile> {
        let peer_ids: BTreeSet<&str> = self
            .roster
            .keys()
            .map(String::as_str)
            .filter(|id| !self.dropped.contains(*id))
            .chain(self.registry.links().map(|link| link.peer_id()))
            .collect();
        let remotes: Vec<RemoteTile<'_>> = peer_ids
            .into_iter()
            .map(|peer_id| {
                let entry = self.registry.remote_stream(peer_id);
                let name = self
                    .roster
                    .get(peer_id)
                    .or(entry.map(|e| &e.participant))
                    .map(|p| p.display_name())
                    .unwrap_or(peer_id);
                RemoteTile {
                    peer_id,
                    name,
                    stream: entry.map(|e| &e.stream),
                }
            })
            .collect();
        compute_tiles(
            &self.display_name,
            Some(self.local.preview_stream()),
            &remotes,
        )
    }

    pub fn snapshot(&self) -> MeetingSnapshot {
        MeetingSnapshot {
            state: self.state.clone(),
            signaling: self.signaling.state(),
            participant_id: self.participant_id.clone(),
            roster: self.roster.values().cloned().collect(),
            links: self.registry.links().map(|l| l.info()).collect(),
            remote_streams: self.registry.remote_streams().cloned().collect(),
            local_media: self.local.state(),
            ice_servers: self.registry.config().ice_servers.clone(),
            tiles: self.tiles(),
        }
    }

    /// Receiver that fires when the active screen track ends.
    pub fn screen_ended_signal(&self) -> Option<watch::Receiver<bool>> {
        self.local.screen_ended_signal()
    }

    // === Inputs ===

    /// The socket finished connecting. Nothing is sent; the server speaks
    /// first with `joined`.
    pub fn on_socket_open(&mut self) {
        self.signaling.set_state(SignalingState::Open);
        self.events
            .emit(MeetingEvent::SignalingStateChanged(SignalingState::Open));
        self.events
            .emit(MeetingEvent::LocalMediaChanged(self.local.state()));
        self.publish_tiles();
    }

    /// Decode and handle one text frame. Malformed frames are logged and
    /// dropped.
    pub async fn handle_text(&mut self, text: &str) {
        match InboundMessage::from_json(text) {
            Ok(message) => self.handle_inbound(message).await,
            Err(e) => warn!("Ignoring malformed signaling frame: {e}"),
        }
    }

    pub async fn handle_inbound(&mut self, message: InboundMessage) {
        if self.is_ended() {
            debug!("Meeting ended, ignoring {}", message.kind());
            return;
        }
        if !matches!(message, InboundMessage::Error { .. }) {
            self.last_server_error = None;
        }
        match message {
            InboundMessage::Joined {
                participant_id,
                participants,
            } => self.on_joined(participant_id, participants).await,
            InboundMessage::PeerJoined { participant } => self.on_peer_joined(participant).await,
            InboundMessage::PeerLeft { participant_id } => self.on_peer_left(&participant_id).await,
            InboundMessage::Offer { from, sdp } => self.on_offer(&from, sdp).await,
            InboundMessage::Answer { from, sdp } => {
                if let Err(e) = self.registry.handle_answer(&from, sdp).await {
                    self.drop_peer(&from, e).await;
                }
            }
            InboundMessage::Candidate { from, candidate } => {
                self.registry.handle_candidate(&from, candidate).await;
            }
            InboundMessage::RoomClosed { reason } => {
                info!("Room closed by server: {reason}");
                self.teardown(Some(MeetingError::RoomClosed(reason))).await;
            }
            InboundMessage::Error { code, message } => {
                warn!("Signaling server error {code}: {message}");
                self.last_server_error = Some((code.clone(), message.clone()));
                self.events
                    .emit(MeetingEvent::ServerError { code, message });
            }
            InboundMessage::Unknown(kind) => {
                debug!("Ignoring unknown signaling message type '{kind}'");
            }
        }
        self.publish_tiles();
    }

    pub async fn handle_peer_event(&mut self, event: PeerEvent) {
        if self.is_ended() {
            return;
        }
        let PeerEvent {
            peer_id,
            link_id,
            kind,
        } = event;
        if !self.registry.is_current(&peer_id, link_id) {
            debug!("Ignoring event from stale link {link_id} to {peer_id}");
            return;
        }
        match kind {
            PeerEventKind::IceCandidate(candidate) => {
                let message = OutboundMessage::Candidate {
                    to: peer_id.clone(),
                    candidate,
                };
                if let Err(e) = self.signaling.send(&message).await {
                    warn!("Failed to send candidate to {peer_id}: {e}");
                }
            }
            PeerEventKind::Track { stream_id, track } => {
                let participant = self
                    .roster
                    .get(&peer_id)
                    .cloned()
                    .unwrap_or_else(|| Participant::new(peer_id.clone(), ""));
                debug!("Remote {} track {} from {peer_id}", track.kind(), track.id());
                if self
                    .registry
                    .add_remote_track(&peer_id, link_id, participant, &stream_id, track)
                {
                    let stream_id = self
                        .registry
                        .remote_stream(&peer_id)
                        .map(|e| e.stream.id().to_string())
                        .unwrap_or(stream_id);
                    self.events
                        .emit(MeetingEvent::RemoteStreamUpdated { peer_id, stream_id });
                }
            }
            PeerEventKind::ConnectionState(state) => {
                self.registry.set_connection_state(&peer_id, link_id, state);
                self.events.emit(MeetingEvent::PeerConnectionStateChanged {
                    peer_id: peer_id.clone(),
                    state,
                });
                if state.is_terminal() {
                    self.drop_peer(&peer_id, PeerError::Backend(format!("connection {state}")))
                        .await;
                }
            }
        }
        self.publish_tiles();
    }

    /// Mute or unmute. Never renegotiates.
    pub fn toggle_audio(&mut self) -> bool {
        let enabled = self.local.toggle_audio();
        info!("Microphone {}", if enabled { "on" } else { "off" });
        self.events
            .emit(MeetingEvent::LocalMediaChanged(self.local.state()));
        enabled
    }

    /// Camera on or off. Never renegotiates.
    pub fn toggle_video(&mut self) -> bool {
        let enabled = self.local.toggle_video();
        info!("Camera {}", if enabled { "on" } else { "off" });
        self.events
            .emit(MeetingEvent::LocalMediaChanged(self.local.state()));
        self.publish_tiles();
        enabled
    }

    /// Start or stop sharing. Returns whether sharing is now active.
    pub async fn toggle_screen_share(&mut self) -> Result<bool, MediaError> {
        if self.is_ended() {
            return Ok(false);
        }
        if self.local.is_screen_sharing() {
            self.revert_to_camera(ScreenShareEvent::Stopped).await;
            return Ok(false);
        }
        match self.local.start_screen_share().await {
            Ok(track) => {
                let failed = self.registry.replace_video_track(Some(track)).await;
                self.drop_peers(failed, "screen track replacement failed")
                    .await;
                self.events
                    .emit(MeetingEvent::ScreenShareStateChange(ScreenShareEvent::Started));
                self.events
                    .emit(MeetingEvent::LocalMediaChanged(self.local.state()));
                self.publish_tiles();
                Ok(true)
            }
            Err(e) => {
                warn!("Screen share failed: {e}");
                self.events
                    .emit(MeetingEvent::ScreenShareStateChange(ScreenShareEvent::Failed(
                        e.to_string(),
                    )));
                Err(e)
            }
        }
    }

    /// Revert every link to the camera if the capture source ended the
    /// screen track.
    pub async fn handle_screen_share_ended(&mut self) {
        if self.is_ended() || !self.local.screen_share_ended() {
            return;
        }
        info!("Screen share ended by the capture source");
        self.revert_to_camera(ScreenShareEvent::EndedBySource).await;
    }

    pub async fn handle_socket_closed(&mut self, info: CloseInfo) {
        self.signaling.set_state(SignalingState::Closed);
        self.events
            .emit(MeetingEvent::SignalingStateChanged(SignalingState::Closed));
        if self.is_ended() {
            return;
        }
        let server_error = self.last_server_error.take();
        let error = if !info.is_clean() {
            warn!("Signaling socket closed abnormally: {info:?}");
            let reason = match server_error {
                Some((_, message)) if !message.is_empty() => message,
                Some((code, _)) => code,
                None => info.reason,
            };
            Some(MeetingError::ConnectionLost {
                code: info.code,
                reason,
            })
        } else if let Some((code, message)) = server_error {
            Some(MeetingError::Signaling(if message.is_empty() {
                code
            } else {
                message
            }))
        } else {
            info!("Signaling socket closed normally");
            None
        };
        self.teardown(error).await;
    }

    /// Send `leave`, then close the socket and every link and stop local
    /// tracks. In-flight negotiations are abandoned.
    pub async fn leave(&mut self) {
        if self.is_ended() {
            return;
        }
        info!("Leaving meeting");
        self.signaling.leave().await;
        self.teardown(None).await;
    }

    // === Handlers ===

    async fn on_joined(&mut self, participant_id: String, participants: Vec<Participant>) {
        info!(
            "Joined as {participant_id} with {} participants present",
            participants.len()
        );
        self.roster = participants
            .into_iter()
            .filter(|p| p.id != participant_id)
            .map(|p| (p.id.clone(), p))
            .collect();
        self.dropped.clear();
        self.participant_id = Some(participant_id.clone());
        self.state = MeetingState::InMeeting;
        self.events.emit(MeetingEvent::Joined {
            participant_id: participant_id.clone(),
            participants: self.roster.values().cloned().collect(),
        });

        let to_offer: Vec<String> = self
            .roster
            .keys()
            .filter(|id| negotiation::should_offer(&participant_id, id))
            .cloned()
            .collect();
        for peer_id in to_offer {
            self.start_offer(&peer_id).await;
        }
    }

    async fn on_peer_joined(&mut self, participant: Participant) {
        if self.participant_id.as_deref() == Some(participant.id.as_str()) {
            return;
        }
        let peer_id = participant.id.clone();
        info!("{} ({peer_id}) joined", participant.display_name());
        self.dropped.remove(&peer_id);
        if self.registry.contains(&peer_id) {
            info!("{peer_id} rejoined without leaving, replacing its link");
            self.close_peer_link(&peer_id).await;
        }
        self.roster.insert(peer_id.clone(), participant.clone());
        self.events.emit(MeetingEvent::ParticipantJoined(participant));

        let offer = self
            .participant_id
            .as_deref()
            .is_some_and(|me| negotiation::should_offer(me, &peer_id));
        if offer {
            self.start_offer(&peer_id).await;
        }
    }

    async fn on_peer_left(&mut self, peer_id: &str) {
        info!("{peer_id} left");
        self.roster.remove(peer_id);
        self.dropped.remove(peer_id);
        self.close_peer_link(peer_id).await;
        self.events
            .emit(MeetingEvent::ParticipantLeft(peer_id.to_string()));
    }

    async fn on_offer(&mut self, from: &str, sdp: String) {
        let local_id = self.participant_id.clone().unwrap_or_default();
        let tracks = self.outgoing_tracks();
        if let Err(e) = self
            .registry
            .handle_offer(&local_id, from, sdp, &tracks, &self.signaling)
            .await
        {
            self.drop_peer(from, e).await;
        }
    }

    async fn start_offer(&mut self, peer_id: &str) {
        let tracks = self.outgoing_tracks();
        if let Err(e) = self
            .registry
            .offer(peer_id, &tracks, &self.signaling)
            .await
        {
            self.drop_peer(peer_id, e).await;
        }
    }

    async fn revert_to_camera(&mut self, reason: ScreenShareEvent) {
        let camera = self.local.stop_screen_share();
        let failed = self.registry.replace_video_track(camera).await;
        self.drop_peers(failed, "camera track replacement failed")
            .await;
        self.events
            .emit(MeetingEvent::ScreenShareStateChange(reason));
        self.events
            .emit(MeetingEvent::LocalMediaChanged(self.local.state()));
        self.publish_tiles();
    }

    /// Remove one peer's link after a failure. The participant stays in the
    /// roster; only their tile goes away.
    async fn drop_peer(&mut self, peer_id: &str, error: PeerError) {
        warn!("Dropping peer {peer_id}: {error}");
        self.dropped.insert(peer_id.to_string());
        if self.close_peer_link(peer_id).await {
            self.events.emit(MeetingEvent::PeerDropped {
                peer_id: peer_id.to_string(),
                reason: error.to_string(),
            });
        }
    }

    /// Close the link to `peer_id`, announcing its stream's removal.
    async fn close_peer_link(&mut self, peer_id: &str) -> bool {
        let had_stream = self.registry.remote_stream(peer_id).is_some();
        let closed = self.registry.close_link(peer_id).await;
        if had_stream {
            self.events
                .emit(MeetingEvent::RemoteStreamRemoved(peer_id.to_string()));
        }
        closed
    }

    async fn drop_peers(&mut self, peers: Vec<String>, reason: &str) {
        for peer_id in peers {
            self.drop_peer(&peer_id, PeerError::Backend(reason.to_string()))
                .await;
        }
    }

    async fn teardown(&mut self, error: Option<MeetingError>) {
        self.registry.close_all().await;
        self.local.stop_all();
        self.signaling.close().await;
        self.state = MeetingState::Ended(error.clone());
        match error {
            Some(error) => {
                warn!("Meeting ended: {error}");
                self.events.emit(MeetingEvent::MeetingEnded(error));
            }
            None => self.events.emit(MeetingEvent::Left),
        }
    }

    fn outgoing_tracks(&self) -> OutgoingTracks {
        OutgoingTracks {
            audio: self.local.audio_track().cloned(),
            video: self.local.outgoing_video(),
        }
    }

    fn publish_tiles(&mut self) {
        if self.is_ended() {
            return;
        }
        let tiles = self.tiles();
        if tiles != self.tiles {
            self.tiles = tiles.clone();
            self.events.emit(MeetingEvent::TilesChanged(tiles));
        }
    }
}
