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

//! Peer connections on the `webrtc` crate.
//!
//! Local tracks are `TrackLocalStaticSample`s carried as the
//! [`MediaTrack`] backend handle; whoever produces media writes samples
//! into them (and should skip writing while the track is disabled).
//! Remote tracks arrive as `TrackRemote` handles.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use meshcall_types::{IceCandidate, SdpType, SessionDescription};
use tokio::sync::Mutex;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::constants::LOCAL_STREAM_ID;
use crate::error::{MediaError, PeerError};
use crate::media::{
    DeviceInfo, DeviceKind, DisplayMediaConstraints, MediaConstraints, MediaDevices,
    MediaStream, MediaTrack, TrackKind, TrackSource,
};
use crate::peer::{
    PeerConnection, PeerConnectionConfig, PeerConnectionFactory, PeerConnectionState,
    PeerEventSink, SenderId,
};

fn backend_err(context: &str, e: impl std::fmt::Display) -> PeerError {
    PeerError::Backend(format!("{context}: {e}"))
}

/// Builds `RTCPeerConnection`s with the default codecs and interceptors.
pub struct WebRtcPeerFactory {
    api: API,
}

impl WebRtcPeerFactory {
    pub fn new() -> Result<Self, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| backend_err("registering codecs", e))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| backend_err("registering interceptors", e))?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();
        Ok(Self { api })
    }
}

#[async_trait]
impl PeerConnectionFactory for WebRtcPeerFactory {
    async fn create(
        &self,
        peer_id: &str,
        config: &PeerConnectionConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerConnection>, PeerError> {
        let ice_servers = config
            .ice_servers
            .iter()
            .map(|server| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                }
            })
            .collect();
        let pc = Arc::new(
            self.api
                .new_peer_connection(RTCConfiguration {
                    ice_servers,
                    ..Default::default()
                })
                .await
                .map_err(|e| backend_err("creating peer connection", e))?,
        );
        debug!("RTCPeerConnection created for {peer_id}");

        let sink = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let sink = sink.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        sink.ice_candidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                            username_fragment: init.username_fragment,
                        });
                    }
                    Err(e) => warn!("Failed to serialize local candidate: {e}"),
                }
            })
        }));

        let sink = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let sink = sink.clone();
            Box::pin(async move {
                if let Some(state) = map_state(state) {
                    sink.connection_state(state);
                }
            })
        }));

        let sink = events;
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let sink = sink.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    let stream_id = track.stream_id();
                    let media =
                        MediaTrack::with_backend(track.id(), kind, TrackSource::Remote, track);
                    sink.remote_track(stream_id, media);
                })
            },
        ));

        Ok(Arc::new(WebRtcPeerConnection {
            pc,
            senders: Mutex::new(Vec::new()),
        }))
    }
}

fn map_state(state: RTCPeerConnectionState) -> Option<PeerConnectionState> {
    Some(match state {
        RTCPeerConnectionState::New => PeerConnectionState::New,
        RTCPeerConnectionState::Connecting => PeerConnectionState::Connecting,
        RTCPeerConnectionState::Connected => PeerConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => PeerConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => PeerConnectionState::Failed,
        RTCPeerConnectionState::Closed => PeerConnectionState::Closed,
        _ => return None,
    })
}

fn local_track(track: Option<MediaTrack>) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
    let track = track?;
    match track.backend::<TrackLocalStaticSample>() {
        Some(sample) => Some(sample as Arc<dyn TrackLocal + Send + Sync>),
        None => {
            warn!("Track {} has no RTP backend; sending nothing", track.id());
            None
        }
    }
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription, PeerError> {
    match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
    }
    .map_err(|e| backend_err("parsing session description", e))
}

pub struct WebRtcPeerConnection {
    pc: Arc<RTCPeerConnection>,
    senders: Mutex<Vec<Arc<RTCRtpSender>>>,
}

#[async_trait]
impl PeerConnection for WebRtcPeerConnection {
    async fn add_transceiver(
        &self,
        kind: TrackKind,
        track: Option<MediaTrack>,
    ) -> Result<SenderId, PeerError> {
        let init = Some(RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Sendrecv,
            send_encodings: vec![],
        });
        let transceiver = match local_track(track) {
            Some(track) => self.pc.add_transceiver_from_track(track, init).await,
            None => {
                let codec_type = match kind {
                    TrackKind::Audio => RTPCodecType::Audio,
                    TrackKind::Video => RTPCodecType::Video,
                };
                self.pc.add_transceiver_from_kind(codec_type, init).await
            }
        }
        .map_err(|e| backend_err("adding transceiver", e))?;

        let mut senders = self.senders.lock().await;
        senders.push(transceiver.sender().await);
        Ok(SenderId(senders.len() - 1))
    }

    async fn replace_track(
        &self,
        sender: SenderId,
        track: Option<MediaTrack>,
    ) -> Result<(), PeerError> {
        let rtp_sender = self
            .senders
            .lock()
            .await
            .get(sender.0)
            .cloned()
            .ok_or_else(|| PeerError::Backend(format!("unknown sender {}", sender.0)))?;
        rtp_sender
            .replace_track(local_track(track))
            .await
            .map_err(|e| backend_err("replacing track", e))
    }

    async fn create_offer(&self) -> Result<SessionDescription, PeerError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| backend_err("creating offer", e))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| backend_err("creating answer", e))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        self.pc
            .set_local_description(to_rtc(description)?)
            .await
            .map_err(|e| backend_err("setting local description", e))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        self.pc
            .set_remote_description(to_rtc(description)?)
            .await
            .map_err(|e| backend_err("setting remote description", e))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: candidate.username_fragment,
            })
            .await
            .map_err(|e| backend_err("adding ICE candidate", e))
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.pc
            .close()
            .await
            .map_err(|e| backend_err("closing peer connection", e))
    }
}

/// Capture devices backed by sample tracks (Opus microphone, VP8 camera
/// and screen) that an external producer feeds.
#[derive(Debug, Clone, Default)]
pub struct SampleTrackDevices {
    pub audio: bool,
    pub video: bool,
}

impl SampleTrackDevices {
    fn track(id: &str, kind: TrackKind, source: TrackSource) -> MediaTrack {
        let (mime_type, clock_rate, channels) = match kind {
            TrackKind::Audio => (MIME_TYPE_OPUS, 48000, 2),
            TrackKind::Video => (MIME_TYPE_VP8, 90000, 0),
        };
        let sample = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_string(),
                clock_rate,
                channels,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            id.to_string(),
            "meshcall".to_string(),
        ));
        MediaTrack::with_backend(id, kind, source, sample)
    }
}

/// The sample track behind a local [`MediaTrack`], for producers.
pub fn sample_track(track: &MediaTrack) -> Option<Arc<TrackLocalStaticSample>> {
    track.backend::<TrackLocalStaticSample>()
}

#[async_trait]
impl MediaDevices for SampleTrackDevices {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, MediaError> {
        let mut devices = Vec::new();
        if self.audio {
            devices.push(DeviceInfo::new("sample-mic", DeviceKind::AudioInput, "Sample microphone"));
        }
        if self.video {
            devices.push(DeviceInfo::new("sample-cam", DeviceKind::VideoInput, "Sample camera"));
        }
        Ok(devices)
    }

    async fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        let mut stream = MediaStream::new(LOCAL_STREAM_ID);
        if constraints.audio && self.audio {
            stream.add_track(Self::track("microphone", TrackKind::Audio, TrackSource::Microphone));
        }
        if constraints.video && self.video {
            stream.add_track(Self::track("camera", TrackKind::Video, TrackSource::Camera));
        }
        if stream.is_empty() {
            return Err(MediaError::NoDevices);
        }
        Ok(stream)
    }

    async fn get_display_media(
        &self,
        _constraints: DisplayMediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        Ok(MediaStream::with_tracks(
            "screen",
            vec![Self::track("screen", TrackKind::Video, TrackSource::Screen)],
        ))
    }
}
