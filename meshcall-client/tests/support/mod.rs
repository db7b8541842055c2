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

//! In-memory stand-ins for the platform seams: a recording WebRTC engine,
//! scripted capture devices, a recording signaling socket and a static ICE
//! provider.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_broadcast::Receiver;
use async_trait::async_trait;
use meshcall_client::{
    CoordinatorDeps, DeviceInfo, DeviceKind, DisplayMediaConstraints, EventBus, IceServerProvider,
    LocalMedia, MediaConstraints, MediaDevices, MediaError, MediaStream, MediaTrack, MeetingEvent,
    MeshSession, PeerConnection, PeerConnectionConfig, PeerConnectionFactory, PeerError,
    PeerEvent, PeerEventSink, SenderId, SignalingConnector, SignalingError,
    SignalingSocket, SocketEvent, TrackKind, TrackSource,
};
use meshcall_types::{IceCandidate, IceServer, SdpType, SessionDescription};
use tokio::sync::mpsc;

// === Peer connections ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AddTransceiver(TrackKind, Option<String>),
    ReplaceTrack(SenderId, Option<String>),
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpType),
    SetRemote(SdpType),
    AddCandidate(String),
    Close,
}

pub struct FakePeerConnection {
    pub peer_id: String,
    calls: Mutex<Vec<Call>>,
    senders: Mutex<Vec<Option<MediaTrack>>>,
    fail_replace: AtomicBool,
}

impl FakePeerConnection {
    fn new(peer_id: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            calls: Mutex::new(Vec::new()),
            senders: Mutex::new(Vec::new()),
            fail_replace: AtomicBool::new(false),
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Track currently on sender slot `index` (0 = audio, 1 = video).
    pub fn sender_track(&self, index: usize) -> Option<MediaTrack> {
        self.senders.lock().unwrap().get(index).cloned().flatten()
    }

    pub fn video_track_id(&self) -> Option<String> {
        self.sender_track(1).map(|t| t.id().to_string())
    }

    pub fn added_candidates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.calls().contains(&Call::Close)
    }

    pub fn fail_replace(&self) {
        self.fail_replace.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PeerConnection for FakePeerConnection {
    async fn add_transceiver(
        &self,
        kind: TrackKind,
        track: Option<MediaTrack>,
    ) -> Result<SenderId, PeerError> {
        self.record(Call::AddTransceiver(
            kind,
            track.as_ref().map(|t| t.id().to_string()),
        ));
        let mut senders = self.senders.lock().unwrap();
        senders.push(track);
        Ok(SenderId(senders.len() - 1))
    }

    async fn replace_track(
        &self,
        sender: SenderId,
        track: Option<MediaTrack>,
    ) -> Result<(), PeerError> {
        self.record(Call::ReplaceTrack(
            sender,
            track.as_ref().map(|t| t.id().to_string()),
        ));
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(PeerError::Backend("replace refused".into()));
        }
        let mut senders = self.senders.lock().unwrap();
        match senders.get_mut(sender.0) {
            Some(slot) => {
                *slot = track;
                Ok(())
            }
            None => Err(PeerError::Backend(format!("unknown sender {}", sender.0))),
        }
    }

    async fn create_offer(&self) -> Result<SessionDescription, PeerError> {
        self.record(Call::CreateOffer);
        Ok(SessionDescription::offer(format!("offer-for-{}", self.peer_id)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        self.record(Call::CreateAnswer);
        Ok(SessionDescription::answer(format!("answer-for-{}", self.peer_id)))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        self.record(Call::SetLocal(description.sdp_type));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        self.record(Call::SetRemote(description.sdp_type));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        self.record(Call::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.record(Call::Close);
        Ok(())
    }
}

/// Hands out [`FakePeerConnection`]s and keeps the latest one (and its
/// event sink) per peer.
#[derive(Default)]
pub struct FakePeerFactory {
    connections: Mutex<BTreeMap<String, Arc<FakePeerConnection>>>,
    sinks: Mutex<BTreeMap<String, PeerEventSink>>,
    created: AtomicUsize,
    fail_create: Mutex<BTreeSet<String>>,
    configs: Mutex<Vec<PeerConnectionConfig>>,
}

impl FakePeerFactory {
    pub fn connection(&self, peer_id: &str) -> Arc<FakePeerConnection> {
        self.connections
            .lock()
            .unwrap()
            .get(peer_id)
            .cloned()
            .unwrap_or_else(|| panic!("no connection created for {peer_id}"))
    }

    pub fn has_connection(&self, peer_id: &str) -> bool {
        self.connections.lock().unwrap().contains_key(peer_id)
    }

    pub fn sink(&self, peer_id: &str) -> PeerEventSink {
        self.sinks
            .lock()
            .unwrap()
            .get(peer_id)
            .cloned()
            .unwrap_or_else(|| panic!("no sink for {peer_id}"))
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn fail_create_for(&self, peer_id: &str) {
        self.fail_create.lock().unwrap().insert(peer_id.to_string());
    }

    pub fn last_config(&self) -> Option<PeerConnectionConfig> {
        self.configs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PeerConnectionFactory for FakePeerFactory {
    async fn create(
        &self,
        peer_id: &str,
        config: &PeerConnectionConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerConnection>, PeerError> {
        if self.fail_create.lock().unwrap().contains(peer_id) {
            return Err(PeerError::Backend(format!("cannot create link to {peer_id}")));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().unwrap().push(config.clone());
        let connection = Arc::new(FakePeerConnection::new(peer_id));
        self.connections
            .lock()
            .unwrap()
            .insert(peer_id.to_string(), connection.clone());
        self.sinks
            .lock()
            .unwrap()
            .insert(peer_id.to_string(), events);
        Ok(connection)
    }
}

// === Capture devices ===

#[derive(Default)]
pub struct FakeDevices {
    pub audio: bool,
    pub video: bool,
    pub deny: bool,
    pub deny_screen: bool,
    screens: AtomicUsize,
    last_screen: Mutex<Option<MediaTrack>>,
}

impl FakeDevices {
    pub fn camera_and_mic() -> Self {
        Self {
            audio: true,
            video: true,
            ..Default::default()
        }
    }

    /// Devices exist but the user refused the permission prompt.
    pub fn denied() -> Self {
        Self {
            audio: true,
            video: true,
            deny: true,
            ..Default::default()
        }
    }

    /// End the current screen capture as the OS "stop sharing" control would.
    pub fn end_screen(&self) {
        if let Some(track) = self.last_screen.lock().unwrap().as_ref() {
            track.stop();
        }
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, MediaError> {
        let mut devices = Vec::new();
        if self.audio {
            devices.push(DeviceInfo::new("mic-0", DeviceKind::AudioInput, "Microphone"));
        }
        if self.video {
            devices.push(DeviceInfo::new("cam-0", DeviceKind::VideoInput, "Camera"));
        }
        Ok(devices)
    }

    async fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        if self.deny {
            return Err(MediaError::PermissionDenied("NotAllowedError".into()));
        }
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::new("mic", TrackKind::Audio, TrackSource::Microphone));
        }
        if constraints.video {
            tracks.push(MediaTrack::new("camera", TrackKind::Video, TrackSource::Camera));
        }
        Ok(MediaStream::with_tracks("local", tracks))
    }

    async fn get_display_media(
        &self,
        _constraints: DisplayMediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        if self.deny_screen {
            return Err(MediaError::PermissionDenied("screen capture refused".into()));
        }
        let n = self.screens.fetch_add(1, Ordering::SeqCst) + 1;
        let track = MediaTrack::new(format!("screen-{n}"), TrackKind::Video, TrackSource::Screen);
        *self.last_screen.lock().unwrap() = Some(track.clone());
        Ok(MediaStream::with_tracks(format!("display-{n}"), vec![track]))
    }
}

// === Signaling ===

#[derive(Default)]
pub struct RecordingSocket {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl RecordingSocket {
    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn sent_of_type(&self, kind: &str) -> Vec<serde_json::Value> {
        self.sent()
            .into_iter()
            .filter(|m| m["type"] == kind)
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingSocket for RecordingSocket {
    async fn send_text(&self, text: String) -> Result<(), SignalingError> {
        if self.is_closed() {
            return Err(SignalingError::NotOpen);
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connects to a [`RecordingSocket`] and keeps the inbound sender so tests
/// can play the server.
#[derive(Default)]
pub struct FakeConnector {
    pub socket: Arc<RecordingSocket>,
    inbound: Mutex<Option<mpsc::Sender<SocketEvent>>>,
    urls: Mutex<Vec<String>>,
    pub refuse: bool,
}

impl FakeConnector {
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Default::default()
        }
    }

    pub fn server(&self) -> mpsc::Sender<SocketEvent> {
        self.inbound
            .lock()
            .unwrap()
            .clone()
            .expect("connect() was not called")
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignalingConnector for FakeConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn SignalingSocket>, mpsc::Receiver<SocketEvent>), SignalingError> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.refuse {
            return Err(SignalingError::Connect {
                url: url.to_string(),
                reason: "connection refused".into(),
                status: None,
            });
        }
        let (tx, rx) = mpsc::channel(64);
        *self.inbound.lock().unwrap() = Some(tx);
        Ok((self.socket.clone(), rx))
    }
}

// === ICE ===

pub struct FailingIceServers;

#[async_trait]
impl IceServerProvider for FailingIceServers {
    async fn ice_servers(&self) -> anyhow::Result<Vec<IceServer>> {
        Err(anyhow::anyhow!("meeting API unreachable"))
    }
}

pub fn turn_server() -> IceServer {
    IceServer {
        urls: vec!["turn:turn.example.com:3478".into()],
        username: Some("user".into()),
        credential: Some("secret".into()),
    }
}

// === Harnesses ===

pub fn joined(me: &str, others: &[(&str, &str)]) -> String {
    let participants: Vec<_> = others
        .iter()
        .map(|(id, name)| serde_json::json!({ "id": id, "name": name }))
        .collect();
    serde_json::json!({
        "type": "joined",
        "participant_id": me,
        "participants": participants,
    })
    .to_string()
}

pub fn peer_joined(id: &str, name: &str) -> String {
    serde_json::json!({ "type": "peer_joined", "participant": { "id": id, "name": name } })
        .to_string()
}

pub fn frame(kind: &str, from: &str, sdp: &str) -> String {
    serde_json::json!({ "type": kind, "from": from, "sdp": sdp }).to_string()
}

pub fn candidate(from: &str, candidate: &str) -> String {
    serde_json::json!({
        "type": "candidate",
        "from": from,
        "candidate": { "candidate": candidate, "sdpMid": "0", "sdpMLineIndex": 0 },
    })
    .to_string()
}

/// A session over fakes, with its socket already open.
pub struct Harness {
    pub session: MeshSession,
    pub peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    pub socket: Arc<RecordingSocket>,
    pub factory: Arc<FakePeerFactory>,
    pub devices: Arc<FakeDevices>,
    pub events: Receiver<MeetingEvent>,
}

impl Harness {
    pub async fn new(devices: FakeDevices) -> Self {
        let devices = Arc::new(devices);
        let local = LocalMedia::acquire(devices.clone()).await;
        let socket = Arc::new(RecordingSocket::default());
        let factory = Arc::new(FakePeerFactory::default());
        let bus = EventBus::new();
        let events = bus.subscribe();
        let (mut session, peer_events) = MeshSession::new(
            "Me",
            local,
            socket.clone(),
            factory.clone(),
            IceServer::public_stun(),
            bus,
        );
        session.on_socket_open();
        Self {
            session,
            peer_events,
            socket,
            factory,
            devices,
            events,
        }
    }

    pub async fn joined_as(me: &str, others: &[(&str, &str)]) -> Self {
        let mut harness = Self::new(FakeDevices::camera_and_mic()).await;
        harness.session.handle_text(&joined(me, others)).await;
        harness
    }

    /// Feed every queued engine callback to the session.
    pub async fn pump_peer_events(&mut self) {
        while let Ok(event) = self.peer_events.try_recv() {
            self.session.handle_peer_event(event).await;
        }
    }

    /// Events published so far.
    pub fn drain_events(&mut self) -> Vec<MeetingEvent> {
        let mut out = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => out.push(event),
                Err(async_broadcast::TryRecvError::Overflowed(_)) => continue,
                Err(_) => break,
            }
        }
        out
    }
}

pub fn deps(
    devices: Arc<FakeDevices>,
    factory: Arc<FakePeerFactory>,
    connector: Arc<FakeConnector>,
    ice: Arc<dyn IceServerProvider>,
) -> CoordinatorDeps {
    CoordinatorDeps {
        media_devices: devices,
        peer_factory: factory,
        connector,
        ice_servers: ice,
    }
}

/// Wait (bounded) for the first event matching `pred`.
pub async fn wait_for_event(
    events: &mut Receiver<MeetingEvent>,
    pred: impl Fn(&MeetingEvent) -> bool,
) -> MeetingEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(async_broadcast::RecvError::Overflowed(_)) => continue,
                Err(e) => panic!("event bus closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
