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

//! The WebRTC engine seam.
//!
//! A [`PeerConnection`] is one RTCPeerConnection-like object. Engine
//! callbacks (ICE candidate gathered, remote track, state change) are not
//! handled in place: the engine pushes them through its [`PeerEventSink`],
//! tagged with the peer id and link generation, and the session processes
//! them one at a time on its own task.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use meshcall_types::{IceCandidate, IceServer, SessionDescription};
use tokio::sync::mpsc;

use crate::error::PeerError;
use crate::media::{MediaTrack, TrackKind};

/// SDP negotiation phase of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
}

/// Transport state reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    /// States after which the link is torn down. There is no retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PeerConnectionState::Disconnected
                | PeerConnectionState::Failed
                | PeerConnectionState::Closed
        )
    }
}

impl fmt::Display for PeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            PeerConnectionState::New => "new",
            PeerConnectionState::Connecting => "connecting",
            PeerConnectionState::Connected => "connected",
            PeerConnectionState::Disconnected => "disconnected",
            PeerConnectionState::Failed => "failed",
            PeerConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Handle to one sender (transceiver) slot on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(pub usize);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerConnectionConfig {
    pub ice_servers: Vec<IceServer>,
}

#[derive(Debug, Clone)]
pub enum PeerEventKind {
    /// A local candidate was gathered and should be trickled to the peer.
    IceCandidate(IceCandidate),
    /// A remote track arrived as part of the remote stream `stream_id`.
    Track { stream_id: String, track: MediaTrack },
    ConnectionState(PeerConnectionState),
}

#[derive(Debug, Clone)]
pub struct PeerEvent {
    pub peer_id: String,
    /// Generation of the link that produced the event.
    pub link_id: u64,
    pub kind: PeerEventKind,
}

/// Where an engine delivers callbacks for one link.
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    peer_id: String,
    link_id: u64,
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl PeerEventSink {
    pub fn new(peer_id: impl Into<String>, link_id: u64, tx: mpsc::UnboundedSender<PeerEvent>) -> Self {
        Self {
            peer_id: peer_id.into(),
            link_id,
            tx,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn link_id(&self) -> u64 {
        self.link_id
    }

    /// Returns false once the session is gone.
    pub fn emit(&self, kind: PeerEventKind) -> bool {
        self.tx
            .send(PeerEvent {
                peer_id: self.peer_id.clone(),
                link_id: self.link_id,
                kind,
            })
            .is_ok()
    }

    pub fn ice_candidate(&self, candidate: IceCandidate) -> bool {
        self.emit(PeerEventKind::IceCandidate(candidate))
    }

    pub fn remote_track(&self, stream_id: impl Into<String>, track: MediaTrack) -> bool {
        self.emit(PeerEventKind::Track {
            stream_id: stream_id.into(),
            track,
        })
    }

    pub fn connection_state(&self, state: PeerConnectionState) -> bool {
        self.emit(PeerEventKind::ConnectionState(state))
    }
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Add a send/receive transceiver of `kind`, optionally carrying a track.
    async fn add_transceiver(
        &self,
        kind: TrackKind,
        track: Option<MediaTrack>,
    ) -> Result<SenderId, PeerError>;

    /// Swap the track on an existing sender without renegotiating.
    async fn replace_track(&self, sender: SenderId, track: Option<MediaTrack>)
        -> Result<(), PeerError>;

    async fn create_offer(&self) -> Result<SessionDescription, PeerError>;

    async fn create_answer(&self) -> Result<SessionDescription, PeerError>;

    async fn set_local_description(&self, description: SessionDescription)
        -> Result<(), PeerError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PeerError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError>;

    async fn close(&self) -> Result<(), PeerError>;
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        peer_id: &str,
        config: &PeerConnectionConfig,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerConnection>, PeerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PeerConnectionState::Failed.is_terminal());
        assert!(PeerConnectionState::Disconnected.is_terminal());
        assert!(PeerConnectionState::Closed.is_terminal());
        assert!(!PeerConnectionState::Connecting.is_terminal());
        assert!(!PeerConnectionState::Connected.is_terminal());
    }

    #[tokio::test]
    async fn test_sink_tags_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = PeerEventSink::new("b2", 7, tx);
        assert!(sink.connection_state(PeerConnectionState::Connected));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.peer_id, "b2");
        assert_eq!(event.link_id, 7);
        assert!(matches!(
            event.kind,
            PeerEventKind::ConnectionState(PeerConnectionState::Connected)
        ));

        drop(rx);
        assert!(!sink.ice_candidate(IceCandidate::new("candidate:0")));
    }
}
